//! # Localisation module
//!
//! The vehicle pose as used by the controller: a position and a yaw angle. Roll and pitch are
//! handled by the flight controller and are discarded on ingestion.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Serialize;

use comms_if::eqpt::fc::VehiclePose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Quaternions with a norm below this are rejected as degenerate.
const MIN_QUATERNION_NORM: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position and heading of the vehicle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Default)]
pub struct Pose {
    /// Position of the vehicle.
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Yaw of the vehicle.
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Vector3<f64>, yaw_rad: f64) -> Self {
        Self {
            position_m,
            yaw_rad,
        }
    }

    /// Returns true if neither the position nor the yaw contain NaN or infinite values.
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite()) && self.yaw_rad.is_finite()
    }
}

impl From<&VehiclePose> for Pose {
    fn from(pose: &VehiclePose) -> Self {
        Self {
            position_m: Vector3::from(pose.position_m),
            yaw_rad: yaw_from_quaternion(pose.attitude_q),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Extract the yaw (rotation about Z) from an `[x, y, z, w]` quaternion using the roll-pitch-yaw
/// decomposition.
///
/// A degenerate (zero or non-finite) quaternion produces a NaN yaw.
pub fn yaw_from_quaternion(q: [f64; 4]) -> f64 {
    if !q.iter().all(|v| v.is_finite()) {
        return std::f64::NAN
    }

    match UnitQuaternion::try_new(Quaternion::new(q[3], q[0], q[1], q[2]), MIN_QUATERNION_NORM) {
        Some(uq) => uq.euler_angles().2,
        None => std::f64::NAN
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_yaw_from_quaternion() {
        // Identity
        assert_relative_eq!(yaw_from_quaternion([0.0, 0.0, 0.0, 1.0]), 0.0);

        // Pure yaw rotation
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        let yaw = yaw_from_quaternion([q.i, q.j, q.k, q.w]);
        assert_relative_eq!(yaw, 0.5, epsilon = 1e-12);

        // Roll and pitch don't leak into the yaw
        let q = UnitQuaternion::from_euler_angles(0.1, -0.2, -1.2);
        let yaw = yaw_from_quaternion([q.i, q.j, q.k, q.w]);
        assert_relative_eq!(yaw, -1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_quaternion() {
        let pose = Pose::from(&VehiclePose {
            position_m: [1.0, 2.0, 3.0],
            attitude_q: [0.0; 4],
        });
        assert!(!pose.is_finite());

        assert!(yaw_from_quaternion([std::f64::NAN, 0.0, 0.0, 1.0]).is_nan());
    }

    #[test]
    fn test_from_vehicle_pose() {
        let pose = Pose::from(&VehiclePose {
            position_m: [1.0, 2.0, 3.0],
            attitude_q: [0.0, 0.0, 0.0, 1.0],
        });
        assert!(pose.is_finite());
        assert_eq!(pose.position_m, Vector3::new(1.0, 2.0, 3.0));
    }
}
