//! Velocity setpoint produced by VelCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::Serialize;

use comms_if::eqpt::fc::{CoordFrame, PositionTarget, TypeMask};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A velocity and yaw setpoint.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct VelSetpoint {
    /// Frame the setpoint is expressed in
    pub frame: CoordFrame,

    /// Fields of the setpoint the flight controller shall ignore
    pub type_mask: TypeMask,

    /// Velocity demand.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector3<f64>,

    /// Yaw demand.
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelSetpoint {
    /// Build a velocity and yaw setpoint in the local frame.
    pub fn local(velocity_ms: Vector3<f64>, yaw_rad: f64) -> Self {
        Self {
            frame: CoordFrame::LocalNed,
            type_mask: TypeMask::VELOCITY_YAW,
            velocity_ms,
            yaw_rad,
        }
    }

    /// A zero velocity setpoint keeping the given yaw, used when no valid command could be
    /// computed. A non-finite yaw is replaced by zero.
    pub fn stop(yaw_rad: f64) -> Self {
        Self::local(
            Vector3::zeros(),
            if yaw_rad.is_finite() { yaw_rad } else { 0.0 }
        )
    }

    /// Convert into the wire setpoint, stamped with the given time.
    pub fn to_position_target(&self, timestamp: DateTime<Utc>) -> PositionTarget {
        PositionTarget {
            timestamp,
            coordinate_frame: self.frame,
            type_mask: self.type_mask,
            position_m: [0.0; 3],
            velocity_ms: [self.velocity_ms[0], self.velocity_ms[1], self.velocity_ms[2]],
            accel_mss: [0.0; 3],
            yaw_rad: self.yaw_rad,
            yaw_rate_rads: 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_position_target() {
        let sp = VelSetpoint::local(Vector3::new(1.0, -2.0, 0.5), 0.7);
        let now = Utc::now();
        let pt = sp.to_position_target(now);

        assert_eq!(pt.timestamp, now);
        assert_eq!(pt.coordinate_frame, CoordFrame::LocalNed);
        assert_eq!(pt.type_mask, TypeMask::VELOCITY_YAW);
        assert_eq!(pt.velocity_ms, [1.0, -2.0, 0.5]);
        assert_eq!(pt.yaw_rad, 0.7);
    }

    #[test]
    fn test_stop() {
        assert_eq!(VelSetpoint::stop(1.2).velocity_ms, Vector3::zeros());
        assert_eq!(VelSetpoint::stop(1.2).yaw_rad, 1.2);
        assert_eq!(VelSetpoint::stop(std::f64::NAN).yaw_rad, 0.0);
    }
}
