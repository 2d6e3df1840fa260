//! Route progress model.
//!
//! Read accessors answer "where is the user along the plan"; the mutators
//! (`advance_step`, `advance_leg`, `replace_route`) are driven only by the
//! navigation pipeline, which exclusively owns the live value.

mod alert_level;
mod route_progress;

pub use alert_level::AlertLevel;
pub use route_progress::{LegProgress, RouteProgress, StepProgress};
