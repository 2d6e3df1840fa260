//! Validate command - check a route file and print its summary.

use std::path::PathBuf;

use clap::Args;
use routekeeper::route::{Route, TravelProfile};

use super::common::load_route;
use crate::error::CliError;

/// Arguments for the validate command.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Route file: a serialized route or a Directions API response
    #[arg(long)]
    pub route: PathBuf,

    /// Travel profile to assume (driving, driving-traffic, cycling, walking)
    #[arg(long)]
    pub profile: Option<TravelProfile>,
}

/// Run the validate command.
pub fn run(args: ValidateArgs) -> Result<(), CliError> {
    let route = load_route(&args.route, args.profile)?;
    print_summary(&route);
    println!();
    println!("Route is valid.");
    Ok(())
}

fn print_summary(route: &Route) {
    println!("Route Summary");
    println!("─────────────");
    println!("  Profile:   {}", route.options.profile);
    println!("  Legs:      {}", route.legs.len());
    println!("  Waypoints: {}", route.options.waypoints.len());
    println!("  Distance:  {:.2} km", route.distance() / 1000.0);
    println!("  Duration:  {}", format_duration(route.expected_travel_time()));

    for (i, leg) in route.legs.iter().enumerate() {
        println!();
        println!(
            "  Leg {} ({}): {} steps, {:.2} km",
            i + 1,
            if leg.summary.is_empty() { "unnamed" } else { &leg.summary },
            leg.steps.len(),
            leg.distance() / 1000.0
        );
        for step in &leg.steps {
            let label = step
                .instruction
                .as_deref()
                .unwrap_or(step.name.as_str());
            println!(
                "    {:<10} {:>8.0} m  {}",
                format!("{:?}", step.maneuver_type).to_lowercase(),
                step.distance,
                label
            );
        }
    }
}

/// `h:mm:ss` for a duration in seconds.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(59.6), "0:01:00");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(-5.0), "0:00:00");
    }
}
