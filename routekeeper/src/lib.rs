//! Routekeeper - route progress tracking and rerouting from live position fixes
//!
//! This library follows a moving user along a precomputed multi-leg route. Every
//! position fix is snapped to the active step, checked against an off-route
//! tolerance, and turned into progress and alert-level updates. When the user
//! leaves the route a replacement is requested from a routing service and
//! adopted atomically.
//!
//! # Architecture
//!
//! ```text
//! LocationSource ──► SessionHandle ──► session actor ──► RoutePipeline
//!                                          │                 ├─ OffRouteDetector
//!                                          │                 ├─ AlertMachine
//!                                          │                 ├─ RerouteCoordinator
//!                                          │                 └─ DeadReckoning
//!                                          ├─► RoutingService (spawned, cancellable)
//!                                          └─► broadcast<NavigationEvent>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use routekeeper::navigation::{NavigationConfig, SessionBuilder};
//! use routekeeper::routing::HttpRoutingService;
//!
//! let session = SessionBuilder::new(route)
//!     .with_config(NavigationConfig::default())
//!     .with_routing_service(Arc::new(HttpRoutingService::new(&routing_config)?))
//!     .start()?;
//!
//! let mut events = session.subscribe();
//! session.submit_fix(fix).await?;
//! ```

pub mod config;
pub mod geometry;
pub mod location;
pub mod logging;
pub mod navigation;
pub mod progress;
pub mod route;
pub mod routing;
pub mod telemetry;
