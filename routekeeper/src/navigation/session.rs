//! Navigation session actor.
//!
//! A session is a single tokio task that owns the [`RoutePipeline`]. Fixes,
//! host commands and reroute completions all arrive on one command channel and
//! are processed strictly in order, so the route model is never touched
//! concurrently.
//!
//! # Architecture
//!
//! ```text
//!  SessionHandle ──┐
//!  FixSink ────────┼──► mpsc<Command> ──► actor ──► RoutePipeline
//!  reroute task ───┘                        │
//!        ▲                                  ├──► broadcast<NavigationEvent>
//!        └──── RoutingService (spawned) ◄───┘
//! ```
//!
//! Reroute requests run in their own task and race their cancellation token;
//! the outcome is posted back as a command tagged with its generation.
//! Dead reckoning is a single deadline in the actor's `select!`, re-armed by
//! every processed fix.

use std::future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::location::{LocationError, LocationSource};
use crate::progress::RouteProgress;
use crate::route::{Route, RouteError};
use crate::routing::{RoutingError, RoutingService};
use crate::telemetry::{Feedback, TelemetrySink, TracingTelemetrySink};

use super::config::NavigationConfig;
use super::error::SessionError;
use super::events::NavigationEvent;
use super::fix::Fix;
use super::pipeline::{AlwaysReroute, RerouteHost, RoutePipeline};
use super::reroute::PendingReroute;
use super::session_state::SessionState;

/// Messages processed by the session actor.
enum Command {
    Fix(Fix),
    RerouteFinished {
        generation: u64,
        result: Result<Route, RoutingError>,
    },
    Progress(oneshot::Sender<RouteProgress>),
    SessionState(oneshot::Sender<SessionState>),
    AdvanceLeg(oneshot::Sender<bool>),
    AssignRoute(Route, oneshot::Sender<Result<(), RouteError>>),
    Suspend(oneshot::Sender<()>),
    Resume(oneshot::Sender<Result<(), LocationError>>),
    Feedback(Feedback),
}

/// Delivers fixes into a session.
///
/// Handed to a [`LocationSource`]; cheap to clone.
#[derive(Clone)]
pub struct FixSink {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for FixSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixSink")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl FixSink {
    /// Queue `fix`, waiting for room in the command channel.
    pub async fn send(&self, fix: Fix) -> Result<(), SessionError> {
        self.commands
            .send(Command::Fix(fix))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Whether the session has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Configures and starts a navigation session.
pub struct SessionBuilder {
    route: Route,
    config: NavigationConfig,
    routing: Option<Arc<dyn RoutingService>>,
    telemetry: Arc<dyn TelemetrySink>,
    host: Arc<dyn RerouteHost>,
    location: Option<Box<dyn LocationSource>>,
}

impl SessionBuilder {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            config: NavigationConfig::default(),
            routing: None,
            telemetry: Arc::new(TracingTelemetrySink),
            host: Arc::new(AlwaysReroute),
            location: None,
        }
    }

    pub fn with_config(mut self, config: NavigationConfig) -> Self {
        self.config = config;
        self
    }

    /// Required. Used for every reroute.
    pub fn with_routing_service(mut self, routing: Arc<dyn RoutingService>) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_reroute_host(mut self, host: Arc<dyn RerouteHost>) -> Self {
        self.host = host;
        self
    }

    /// Started with the session, stopped on suspend and shutdown.
    pub fn with_location_source(mut self, source: Box<dyn LocationSource>) -> Self {
        self.location = Some(source);
        self
    }

    /// Validate everything and spawn the session actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<SessionHandle, SessionError> {
        let routing = self.routing.ok_or(SessionError::MissingRoutingService)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::NoRuntime(e.to_string()))?;

        let event_capacity = self.config.event_channel_capacity;
        let command_capacity = self.config.command_channel_capacity;
        let pipeline = RoutePipeline::new(self.route, self.config)?
            .with_telemetry(self.telemetry)
            .with_reroute_host(self.host);

        let (commands_tx, commands_rx) = mpsc::channel(command_capacity);
        let (events_tx, _) = broadcast::channel(event_capacity);
        let cancellation = CancellationToken::new();
        let fix_sink = FixSink {
            commands: commands_tx.clone(),
        };

        let mut location = self.location;
        if let Some(source) = location.as_mut() {
            source.start_updates(fix_sink.clone())?;
        }

        info!(
            session_id = %pipeline.state().id,
            legs = pipeline.progress().route().legs.len(),
            profile = pipeline.progress().route().options.profile.as_str(),
            "Navigation session starting"
        );

        let actor = SessionActor {
            pipeline,
            routing,
            location,
            commands: commands_rx,
            command_tx: commands_tx.clone(),
            events: events_tx.clone(),
            cancellation: cancellation.clone(),
            fix_sink,
            extrapolation_deadline: None,
            last_fix_at: None,
            suspended: false,
        };
        let task = runtime.spawn(actor.run());

        Ok(SessionHandle {
            commands: commands_tx,
            events: events_tx,
            cancellation: cancellation.clone(),
            task: Arc::new(Mutex::new(Some(task))),
            _guard: Arc::new(cancellation.drop_guard()),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Host-side handle to a running session.
///
/// Clones share the session. Dropping the last clone shuts it down.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<NavigationEvent>,
    cancellation: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    _guard: Arc<DropGuard>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("running", &self.is_running())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl SessionHandle {
    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    /// A sink for feeding fixes from elsewhere.
    pub fn fix_sink(&self) -> FixSink {
        FixSink {
            commands: self.commands.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation.is_cancelled() && !self.commands.is_closed()
    }

    /// Queue a fix for processing.
    pub async fn submit_fix(&self, fix: Fix) -> Result<(), SessionError> {
        self.send(Command::Fix(fix)).await
    }

    /// Snapshot of the current progress.
    pub async fn progress(&self) -> Result<RouteProgress, SessionError> {
        self.request(Command::Progress).await
    }

    /// Snapshot of the trip state.
    pub async fn session_state(&self) -> Result<SessionState, SessionError> {
        self.request(Command::SessionState).await
    }

    /// Move on to the next leg. Returns `false` on the final leg.
    pub async fn advance_leg(&self) -> Result<bool, SessionError> {
        self.request(Command::AdvanceLeg).await
    }

    /// Replace the route. The current route is kept if `route` is invalid.
    pub async fn assign_route(&self, route: Route) -> Result<(), SessionError> {
        let result = self
            .request(|tx| Command::AssignRoute(route, tx))
            .await?;
        result.map_err(SessionError::from)
    }

    /// Stop the location source and dead reckoning until [`resume`](Self::resume).
    pub async fn suspend(&self) -> Result<(), SessionError> {
        self.request(Command::Suspend).await
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        let result = self.request(Command::Resume).await?;
        result.map_err(SessionError::from)
    }

    pub async fn record_feedback(&self, feedback: Feedback) -> Result<(), SessionError> {
        self.send(Command::Feedback(feedback)).await
    }

    /// Stop the session and wait for the actor to finish.
    ///
    /// Cancels any outstanding reroute and flushes telemetry. Idempotent.
    pub async fn shutdown(&self) {
        self.cancellation.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Navigation session task failed");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        if self.cancellation.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct SessionActor {
    pipeline: RoutePipeline,
    routing: Arc<dyn RoutingService>,
    location: Option<Box<dyn LocationSource>>,
    commands: mpsc::Receiver<Command>,
    /// For posting reroute completions back to ourselves.
    command_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<NavigationEvent>,
    cancellation: CancellationToken,
    fix_sink: FixSink,
    extrapolation_deadline: Option<Instant>,
    last_fix_at: Option<Instant>,
    suspended: bool,
}

impl SessionActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },

                _ = wait_for(self.extrapolation_deadline) => self.extrapolate(),
            }
        }

        self.stop();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Fix(fix) => self.process_fix(fix),
            Command::RerouteFinished { generation, result } => {
                let events = self.pipeline.complete_reroute(generation, result);
                self.publish(events);
            }
            Command::Progress(tx) => {
                let _ = tx.send(self.pipeline.progress().clone());
            }
            Command::SessionState(tx) => {
                let _ = tx.send(self.pipeline.state().clone());
            }
            Command::AdvanceLeg(tx) => {
                let _ = tx.send(self.pipeline.advance_leg());
            }
            Command::AssignRoute(route, tx) => {
                let result = self.pipeline.assign_route(route);
                if let Err(e) = &result {
                    warn!(error = %e, "Rejected assigned route");
                }
                let _ = tx.send(result);
            }
            Command::Suspend(tx) => {
                self.suspend();
                let _ = tx.send(());
            }
            Command::Resume(tx) => {
                let _ = tx.send(self.resume());
            }
            Command::Feedback(feedback) => self.pipeline.record_feedback(feedback),
        }
    }

    fn process_fix(&mut self, fix: Fix) {
        let schedule = fix.is_qualified() && self.pipeline.dead_reckoning().should_schedule(&fix);

        let ingested = self.pipeline.ingest(fix, &self.cancellation);
        self.publish(ingested.events);
        if let Some(pending) = ingested.reroute {
            self.spawn_reroute(pending);
        }

        if schedule && !self.suspended {
            let now = Instant::now();
            self.last_fix_at = Some(now);
            self.extrapolation_deadline = Some(now + self.pipeline.dead_reckoning().delay());
        } else {
            self.extrapolation_deadline = None;
        }
    }

    fn extrapolate(&mut self) {
        self.extrapolation_deadline = None;
        let Some(last_fix_at) = self.last_fix_at else {
            return;
        };

        match self.pipeline.extrapolate(last_fix_at.elapsed()) {
            Some(fix) => {
                debug!(coordinate = %fix.coordinate, "Synthesized fix during sensor gap");
                self.process_fix(fix);
            }
            None => trace!("No fix to synthesize"),
        }
    }

    fn spawn_reroute(&self, pending: PendingReroute) {
        let PendingReroute {
            generation,
            request,
            cancellation,
        } = pending;
        let routing = Arc::clone(&self.routing);
        let commands = self.command_tx.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(RoutingError::Cancelled),
                result = routing.calculate(request) => result,
            };
            if let Err(RoutingError::Cancelled) = &result {
                debug!(generation, "Reroute request cancelled");
            }
            // The session may already be gone.
            let _ = commands
                .send(Command::RerouteFinished { generation, result })
                .await;
        });
    }

    fn publish(&self, events: Vec<NavigationEvent>) {
        for event in events {
            trace!(event = event.name(), "Publishing event");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;
        self.extrapolation_deadline = None;
        if let Some(source) = self.location.as_mut() {
            source.stop_updates();
        }
        info!("Navigation session suspended");
    }

    fn resume(&mut self) -> Result<(), LocationError> {
        if !self.suspended {
            return Ok(());
        }
        if let Some(source) = self.location.as_mut() {
            source.start_updates(self.fix_sink.clone())?;
        }
        self.suspended = false;
        info!("Navigation session resumed");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(source) = self.location.as_mut() {
            source.stop_updates();
        }
        self.pipeline.finish();
        info!(
            session_id = %self.pipeline.state().id,
            reroutes = self.pipeline.state().reroute_count,
            arrived = self.pipeline.state().has_arrived(),
            "Navigation session stopped"
        );
    }
}

/// Resolves at `deadline`, or never.
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::OfflineRoutingService;
    use crate::test_support::{fix, sample_route};

    fn builder() -> SessionBuilder {
        SessionBuilder::new(sample_route())
            .with_config(NavigationConfig::default().without_dead_reckoning())
            .with_routing_service(Arc::new(OfflineRoutingService))
    }

    #[test]
    fn test_start_needs_runtime() {
        let result = builder().start();
        assert!(matches!(result, Err(SessionError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_start_needs_routing_service() {
        let result = SessionBuilder::new(sample_route()).start();
        assert!(matches!(result, Err(SessionError::MissingRoutingService)));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_route() {
        let mut route = sample_route();
        route.legs.clear();
        let result = SessionBuilder::new(route)
            .with_routing_service(Arc::new(OfflineRoutingService))
            .start();
        assert!(matches!(
            result,
            Err(SessionError::InvalidRoute(RouteError::NoLegs))
        ));
    }

    #[tokio::test]
    async fn test_fix_produces_events_in_order() {
        let session = builder().start().unwrap();
        let mut events = session.subscribe();

        session
            .submit_fix(fix(0.0, 0.0, Some(0.0), 10.0, 0))
            .await
            .unwrap();

        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(events.recv().await.unwrap().name());
        }
        assert_eq!(
            names,
            vec!["fix_received", "alert_level_changed", "progress_changed"]
        );

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshots_and_commands() {
        let session = builder().start().unwrap();
        session
            .submit_fix(fix(0.0045, 0.0, Some(0.0), 10.0, 0))
            .await
            .unwrap();

        let progress = session.progress().await.unwrap();
        assert!(progress.distance_traveled() > 400.0);

        let state = session.session_state().await.unwrap();
        assert_eq!(state.recent_fix_count(), 1);
        assert!(state.departed_at.is_some());

        assert!(!session.advance_leg().await.unwrap());

        let mut broken = sample_route();
        broken.legs.clear();
        assert!(matches!(
            session.assign_route(broken).await,
            Err(SessionError::InvalidRoute(RouteError::NoLegs))
        ));

        session.suspend().await.unwrap();
        session.resume().await.unwrap();
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let session = builder().start().unwrap();
        let sink = session.fix_sink();
        session.shutdown().await;
        session.shutdown().await;

        assert!(!session.is_running());
        assert!(matches!(session.progress().await, Err(SessionError::Closed)));
        assert!(matches!(
            session.submit_fix(fix(0.0, 0.0, None, 0.0, 0)).await,
            Err(SessionError::Closed)
        ));
        assert!(sink.is_closed());
    }
}
