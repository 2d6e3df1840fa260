//! Location source boundary.
//!
//! A [`LocationSource`] pushes fixes into a session through a [`FixSink`]. The
//! session starts the source when it starts or resumes and stops it when it
//! suspends or shuts down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::navigation::{Fix, FixSink};

/// Errors from a location source.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location source already started")]
    AlreadyStarted,

    #[error("location source needs a tokio runtime")]
    NoRuntime,

    #[error("invalid recorded fixes: {0}")]
    InvalidRecording(String),
}

/// Produces position fixes.
pub trait LocationSource: Send {
    /// Begin delivering fixes to `sink`.
    fn start_updates(&mut self, sink: FixSink) -> Result<(), LocationError>;

    /// Stop delivering fixes. Idempotent.
    fn stop_updates(&mut self);
}

/// Replays recorded fixes, preserving their original spacing.
///
/// Spacing is divided by `speedup`; a resumed replay continues from the next
/// undelivered fix.
pub struct ReplayLocationSource {
    fixes: Vec<Fix>,
    speedup: f64,
    next_index: Arc<Mutex<usize>>,
    running: Option<(JoinHandle<()>, CancellationToken)>,
}

impl std::fmt::Debug for ReplayLocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayLocationSource")
            .field("fixes", &self.fixes.len())
            .field("speedup", &self.speedup)
            .field("next_index", &*self.next_index.lock())
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl ReplayLocationSource {
    pub fn new(fixes: Vec<Fix>) -> Self {
        Self {
            fixes,
            speedup: 1.0,
            next_index: Default::default(),
            running: None,
        }
    }

    /// Parse a JSON array of fixes.
    pub fn from_json(json: &str) -> Result<Self, LocationError> {
        let fixes: Vec<Fix> =
            serde_json::from_str(json).map_err(|e| LocationError::InvalidRecording(e.to_string()))?;
        Ok(Self::new(fixes))
    }

    /// Play back faster than real time. Values at or below zero are ignored.
    pub fn with_speedup(mut self, speedup: f64) -> Self {
        if speedup.is_finite() && speedup > 0.0 {
            self.speedup = speedup;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Whether every fix has been delivered.
    pub fn is_finished(&self) -> bool {
        *self.next_index.lock() >= self.fixes.len()
    }

    /// Delay before delivering fix `index`.
    fn gap_before(&self, index: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        let gap = self.fixes[index].timestamp - self.fixes[index - 1].timestamp;
        gap.to_std()
            .map(|d| d.div_f64(self.speedup))
            .unwrap_or(Duration::ZERO)
    }
}

impl LocationSource for ReplayLocationSource {
    fn start_updates(&mut self, sink: FixSink) -> Result<(), LocationError> {
        if self.running.is_some() {
            return Err(LocationError::AlreadyStarted);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LocationError::NoRuntime)?;

        let start = *self.next_index.lock();
        let schedule: Vec<(Duration, Fix)> = (start..self.fixes.len())
            .map(|i| {
                let gap = if i == start { Duration::ZERO } else { self.gap_before(i) };
                (gap, self.fixes[i].clone())
            })
            .collect();

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();
        let next_index = Arc::clone(&self.next_index);

        info!(fixes = schedule.len(), speedup = self.speedup, "Replay started");
        let handle = runtime.spawn(async move {
            for (gap, fix) in schedule {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(gap) => {}
                }
                if sink.send(fix).await.is_err() {
                    debug!("Session closed, replay stopping");
                    break;
                }
                *next_index.lock() += 1;
            }
        });

        self.running = Some((handle, cancellation));
        Ok(())
    }

    fn stop_updates(&mut self) {
        if let Some((handle, cancellation)) = self.running.take() {
            cancellation.cancel();
            drop(handle);
            debug!("Replay stopped");
        }
    }
}

impl Drop for ReplayLocationSource {
    fn drop(&mut self) {
        self.stop_updates();
    }
}
