// Autonomous motion segments and the canonical moves built from them

use serde::{Deserialize, Serialize};

use super::kinematics::WheelbaseGeometry;

/// One planned move: every wheel rolls `distance_inches` at its own azimuth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSegment {
    distance_inches: f64,
    azimuth_targets_degrees: [f64; 4],
    /// Keep whatever azimuth each wheel already has instead of the targets
    holds_azimuth: bool,
}

impl MotionSegment {
    pub fn new(distance_inches: f64, azimuth_targets_degrees: [f64; 4]) -> Self {
        Self {
            distance_inches,
            azimuth_targets_degrees,
            holds_azimuth: false,
        }
    }

    /// Segment that keeps the wheels' current azimuths
    pub fn holding_azimuth(distance_inches: f64) -> Self {
        Self {
            distance_inches,
            azimuth_targets_degrees: [0.0; 4],
            holds_azimuth: true,
        }
    }

    pub fn distance_inches(&self) -> f64 {
        self.distance_inches
    }

    pub fn azimuth_targets_degrees(&self) -> [f64; 4] {
        self.azimuth_targets_degrees
    }

    pub fn holds_azimuth(&self) -> bool {
        self.holds_azimuth
    }
}

/// Builds segments for the standard moves of a given chassis
#[derive(Debug, Clone, Copy)]
pub struct SegmentFactory {
    geometry: WheelbaseGeometry,
}

impl SegmentFactory {
    pub fn new(geometry: WheelbaseGeometry) -> Self {
        Self { geometry }
    }

    pub fn forward(&self, inches: f64) -> MotionSegment {
        MotionSegment::new(inches, [180.0; 4])
    }

    pub fn backward(&self, inches: f64) -> MotionSegment {
        MotionSegment::new(inches, [0.0; 4])
    }

    pub fn strafe_left(&self, inches: f64) -> MotionSegment {
        MotionSegment::new(inches, [90.0; 4])
    }

    pub fn strafe_right(&self, inches: f64) -> MotionSegment {
        MotionSegment::new(inches, [270.0; 4])
    }

    /// Spin in place counter-clockwise by `degrees`
    pub fn rotate_left(&self, degrees: f64) -> MotionSegment {
        MotionSegment::new(
            self.turn_distance(degrees),
            [360.0 - 135.0, 360.0 - 45.0, 135.0, 45.0],
        )
    }

    /// Spin in place clockwise by `degrees`
    pub fn rotate_right(&self, degrees: f64) -> MotionSegment {
        MotionSegment::new(
            self.turn_distance(degrees),
            [45.0, 135.0, 360.0 - 45.0, 360.0 - 135.0],
        )
    }

    pub fn stop(&self) -> MotionSegment {
        MotionSegment::holding_azimuth(0.0)
    }

    /// Arc length each wheel covers for a spin of `degrees`
    fn turn_distance(&self, degrees: f64) -> f64 {
        self.geometry.turn_radius_inches * degrees.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> SegmentFactory {
        SegmentFactory::new(WheelbaseGeometry::default())
    }

    #[test]
    fn test_translation_segments() {
        let f = factory();
        assert_eq!(f.forward(24.0), MotionSegment::new(24.0, [180.0; 4]));
        assert_eq!(f.backward(10.0).azimuth_targets_degrees(), [0.0; 4]);
        assert_eq!(f.strafe_left(48.0).azimuth_targets_degrees(), [90.0; 4]);
        assert_eq!(f.strafe_right(48.0).azimuth_targets_degrees(), [270.0; 4]);
        assert_eq!(f.strafe_right(48.0).distance_inches(), 48.0);
    }

    #[test]
    fn test_rotate_90_distance() {
        let segment = factory().rotate_left(90.0);
        let expected = 32.5 * std::f64::consts::FRAC_PI_2;
        assert!((segment.distance_inches() - expected).abs() < 1e-9);
        assert!((segment.distance_inches() - 51.05).abs() < 0.01);
        assert_eq!(segment.azimuth_targets_degrees(), [225.0, 315.0, 135.0, 45.0]);
    }

    #[test]
    fn test_rotate_right_mirrors_left() {
        let segment = factory().rotate_right(45.0);
        assert_eq!(segment.azimuth_targets_degrees(), [45.0, 135.0, 315.0, 225.0]);
        assert_eq!(segment.distance_inches(), factory().rotate_left(45.0).distance_inches());
    }

    #[test]
    fn test_turn_radius_comes_from_geometry() {
        let geometry = WheelbaseGeometry {
            turn_radius_inches: 10.0,
            ..WheelbaseGeometry::default()
        };
        let segment = SegmentFactory::new(geometry).rotate_right(180.0);
        assert!((segment.distance_inches() - 10.0 * std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn test_stop_holds_azimuth() {
        let segment = factory().stop();
        assert_eq!(segment.distance_inches(), 0.0);
        assert!(segment.holds_azimuth());
        assert!(!factory().forward(1.0).holds_azimuth());
    }
}
