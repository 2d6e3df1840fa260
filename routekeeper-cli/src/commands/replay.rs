//! Replay command - run recorded fixes through a navigation session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use routekeeper::config::ConfigFile;
use routekeeper::location::{LocationSource, ReplayLocationSource};
use routekeeper::navigation::{Fix, NavigationEvent, SessionBuilder, SessionHandle};
use routekeeper::route::TravelProfile;
use routekeeper::routing::{HttpRoutingService, OfflineRoutingService, RoutingError, RoutingService};

use super::common::{load_fixes, load_route};
use super::validate::format_duration;
use crate::error::CliError;

/// Time allowed after the last recorded fix for reroutes to settle.
const SETTLE_GRACE: Duration = Duration::from_secs(3);

/// Arguments for the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Route file: a serialized route or a Directions API response
    #[arg(long)]
    pub route: PathBuf,

    /// JSON array of recorded fixes
    #[arg(long)]
    pub fixes: PathBuf,

    /// Travel profile to assume (driving, driving-traffic, cycling, walking)
    #[arg(long)]
    pub profile: Option<TravelProfile>,

    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    pub speedup: f64,

    /// Do not contact the routing service; every reroute fails
    #[arg(long)]
    pub offline: bool,
}

/// Run the replay command.
pub fn run(args: ReplayArgs, config: &ConfigFile) -> Result<(), CliError> {
    if !(args.speedup.is_finite() && args.speedup > 0.0) {
        return Err(CliError::InvalidInput(format!(
            "--speedup must be positive, got {}",
            args.speedup
        )));
    }

    let route = load_route(&args.route, args.profile)?;
    let fixes = load_fixes(&args.fixes)?;
    let playback = playback_duration(&fixes, args.speedup);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping replay...");
        signal.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    println!("Routekeeper Replay v{}", env!("CARGO_PKG_VERSION"));
    println!("========================");
    println!();
    println!("Route:    {}", args.route.display());
    println!("Fixes:    {} ({})", fixes.len(), args.fixes.display());
    println!("Profile:  {}", route.options.profile);
    println!("Playback: {} at {}x", format_duration(playback.as_secs_f64()), args.speedup);
    println!();

    runtime.block_on(async move {
        let routing = routing_service(config, args.offline)?;
        let session = SessionBuilder::new(route)
            .with_config(config.navigation.clone())
            .with_routing_service(routing)
            .start()?;

        // Subscribe before the first fix is delivered.
        let events = session.subscribe();
        let mut source = ReplayLocationSource::new(fixes).with_speedup(args.speedup);
        source.start_updates(session.fix_sink())?;

        let result = follow(&session, events, playback + SETTLE_GRACE, &shutdown).await;

        source.stop_updates();
        let summary = print_summary(&session).await;
        session.shutdown().await;
        result.and(summary)
    })
}

/// Wall-clock time to replay `fixes` at `speedup`.
fn playback_duration(fixes: &[Fix], speedup: f64) -> Duration {
    match (fixes.first(), fixes.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp)
            .to_std()
            .map(|d| d.div_f64(speedup))
            .unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn routing_service(
    config: &ConfigFile,
    offline: bool,
) -> Result<Arc<dyn RoutingService>, CliError> {
    if offline {
        println!("Routing:  offline (reroutes will fail)");
        return Ok(Arc::new(OfflineRoutingService));
    }
    match HttpRoutingService::new(&config.routing) {
        Ok(service) => {
            println!("Routing:  {}", config.routing.base_url);
            Ok(Arc::new(service))
        }
        Err(RoutingError::MissingCredentials) => Err(CliError::InvalidInput(format!(
            "no routing access token. Set [routing] access_token in config.ini, \
             export {}, or pass --offline",
            routekeeper::config::ACCESS_TOKEN_ENV
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Print events until the final arrival, the end of the recording, or Ctrl+C.
///
/// Arrivals at intermediate waypoints advance to the next leg.
async fn follow(
    session: &SessionHandle,
    mut events: tokio::sync::broadcast::Receiver<NavigationEvent>,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> Result<(), CliError> {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => return Ok(()),

            _ = &mut deadline => {
                println!("End of recording.");
                return Ok(());
            }

            event = events.recv() => match event {
                Ok(NavigationEvent::DidArrive { progress }) => {
                    if progress.is_final_leg() {
                        println!("Arrived at destination.");
                        return Ok(());
                    }
                    println!(
                        "Arrived at waypoint {}, continuing.",
                        progress.leg_index() + 1
                    );
                    session.advance_leg().await?;
                }
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event output fell behind");
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}

fn print_event(event: &NavigationEvent) {
    match event {
        NavigationEvent::AlertLevelChanged {
            progress,
            distance_to_maneuver,
        } => {
            let next = progress
                .upcoming_step()
                .and_then(|s| s.instruction.clone())
                .unwrap_or_else(|| "next maneuver".to_string());
            println!(
                "[leg {} step {}] {:<7} {:>6.0} m  {}",
                progress.leg_index() + 1,
                progress.step_index() + 1,
                progress.alert_level().as_str(),
                distance_to_maneuver,
                next
            );
        }
        NavigationEvent::WillReroute { fix } => {
            println!("Off route at {}, rerouting...", fix.coordinate);
        }
        NavigationEvent::DidReroute { route } => {
            println!(
                "Rerouted: {:.2} km, {}",
                route.distance() / 1000.0,
                format_duration(route.expected_travel_time())
            );
        }
        NavigationEvent::DidFailToReroute { error } => {
            println!("Reroute failed: {}", error);
        }
        NavigationEvent::ProgressChanged {
            progress,
            seconds_remaining_on_step,
            ..
        } => {
            debug!(
                fraction = format!("{:.3}", progress.fraction_traveled()),
                remaining_m = format!("{:.0}", progress.distance_remaining()),
                step_seconds = format!("{:.0}", seconds_remaining_on_step),
                "Progress"
            );
        }
        NavigationEvent::FixReceived { .. } | NavigationEvent::DidArrive { .. } => {}
    }
}

async fn print_summary(session: &SessionHandle) -> Result<(), CliError> {
    let progress = session.progress().await?;
    let state = session.session_state().await?;

    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Session:   {}", state.id);
    println!("  Arrived:   {}", if state.has_arrived() { "yes" } else { "no" });
    println!("  Reroutes:  {}", state.reroute_count);
    println!(
        "  Traveled:  {:.2} km",
        state.total_distance(progress.distance_traveled()) / 1000.0
    );
    println!(
        "  Remaining: {:.2} km",
        progress.distance_remaining() / 1000.0
    );
    Ok(())
}
