//! Position fixes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Coordinate;

use super::config::STATIONARY_SPEED_MPS;

/// One position sample from the location source, real or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coordinate: Coordinate,
    /// Meters above sea level.
    #[serde(default)]
    pub altitude: f64,
    /// Direction of travel in degrees; `None` when the sensor has no course.
    #[serde(default)]
    pub course: Option<f64>,
    /// Meters per second.
    #[serde(default)]
    pub speed: f64,
    /// Horizontal error radius in meters. Negative means unusable.
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// A stationary fix with no course and zero accuracy.
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            altitude: 0.0,
            course: None,
            speed: 0.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
            timestamp,
        }
    }

    pub fn with_course(mut self, course: f64) -> Self {
        self.course = Some(course);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_horizontal_accuracy(mut self, accuracy: f64) -> Self {
        self.horizontal_accuracy = accuracy;
        self
    }

    /// Whether the fix can be evaluated against the route at all.
    pub fn is_qualified(&self) -> bool {
        self.coordinate.is_valid()
            && self.horizontal_accuracy.is_finite()
            && self.horizontal_accuracy >= 0.0
    }

    /// Course, if present and finite.
    pub fn valid_course(&self) -> Option<f64> {
        self.course.filter(|c| c.is_finite() && *c >= 0.0)
    }

    /// Speed with sensor garbage (negative, NaN) mapped to zero.
    pub fn effective_speed(&self) -> f64 {
        if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            0.0
        }
    }

    /// Whether the user is effectively standing still.
    pub fn is_stationary(&self) -> bool {
        self.effective_speed() <= STATIONARY_SPEED_MPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_time, fix};

    #[test]
    fn test_qualified_fix() {
        assert!(fix(0.0, 0.0, Some(0.0), 10.0, 0).is_qualified());
    }

    #[test]
    fn test_negative_accuracy_is_unqualified() {
        let f = fix(0.0, 0.0, None, 0.0, 0).with_horizontal_accuracy(-1.0);
        assert!(!f.is_qualified());
    }

    #[test]
    fn test_out_of_range_coordinate_is_unqualified() {
        let f = Fix::new(Coordinate::new(91.0, 0.0), base_time());
        assert!(!f.is_qualified());
        let f = Fix::new(Coordinate::new(f64::NAN, 0.0), base_time());
        assert!(!f.is_qualified());
    }

    #[test]
    fn test_invalid_course_is_ignored() {
        assert_eq!(fix(0.0, 0.0, Some(-1.0), 1.0, 0).valid_course(), None);
        assert_eq!(fix(0.0, 0.0, Some(f64::NAN), 1.0, 0).valid_course(), None);
        assert_eq!(fix(0.0, 0.0, Some(45.0), 1.0, 0).valid_course(), Some(45.0));
    }

    #[test]
    fn test_effective_speed() {
        assert_eq!(fix(0.0, 0.0, None, -3.0, 0).effective_speed(), 0.0);
        assert!(fix(0.0, 0.0, None, 0.05, 0).is_stationary());
        assert!(!fix(0.0, 0.0, None, 12.0, 0).is_stationary());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "coordinate": {"latitude": 1.0, "longitude": 2.0},
            "horizontal_accuracy": 4.0,
            "timestamp": "2023-11-14T22:13:20Z"
        }"#;
        let parsed: Fix = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.timestamp, base_time());
        assert_eq!(parsed.course, None);
        assert_eq!(parsed.speed, 0.0);
    }
}
