//! # Frame anchor
//!
//! The controller works in a local frame whose origin is the first pose received from the flight
//! controller. The anchor captures that pose exactly once.
//!
//! Current vehicle positions are reported relative to the anchor origin. The current vehicle yaw is
//! reported as is, while the yaw of incoming trajectory commands is composed with the anchor yaw
//! (trajectory yaw plus anchor yaw).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use nalgebra::Vector3;
use serde::Serialize;

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The local reference frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ReferenceFrame {
    /// Origin of the frame in the flight controller's frame.
    ///
    /// Units: meters
    pub origin_m: Vector3<f64>,

    /// Yaw of the vehicle at the time the frame was captured.
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

/// One-shot holder of the reference frame.
#[derive(Debug, Clone, Default)]
pub struct FrameAnchor {
    frame: Option<ReferenceFrame>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the reference frame from the given raw pose.
    ///
    /// Only the first call captures; later calls leave the frame untouched and return the frame
    /// captured originally.
    pub fn capture(&mut self, raw_pose: &Pose) -> ReferenceFrame {
        if let Some(frame) = self.frame {
            return frame
        }

        let frame = ReferenceFrame {
            origin_m: raw_pose.position_m,
            yaw_rad: raw_pose.yaw_rad,
        };

        info!(
            "Reference frame anchored at [{:.2}, {:.2}, {:.2}] m, yaw {:.2} rad",
            frame.origin_m[0],
            frame.origin_m[1],
            frame.origin_m[2],
            frame.yaw_rad
        );

        self.frame = Some(frame);

        frame
    }

    /// The captured frame, or `None` if no pose has been received yet.
    pub fn frame(&self) -> Option<ReferenceFrame> {
        self.frame
    }
}

impl ReferenceFrame {
    /// Express a raw pose in this frame.
    ///
    /// The position is made relative to the origin, the yaw is left absolute.
    pub fn to_local(&self, raw_pose: &Pose) -> Pose {
        Pose {
            position_m: raw_pose.position_m - self.origin_m,
            yaw_rad: raw_pose.yaw_rad,
        }
    }

    /// Compose a trajectory yaw with the frame's yaw offset.
    pub fn compose_yaw(&self, traj_yaw_rad: f64) -> f64 {
        traj_yaw_rad + self.yaw_rad
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capture_once() {
        let mut anchor = FrameAnchor::new();
        assert_eq!(anchor.frame(), None);

        let first = Pose::new(Vector3::new(10.0, -5.0, 0.2), 0.5);
        let frame = anchor.capture(&first);
        assert_eq!(frame.origin_m, first.position_m);
        assert_eq!(frame.yaw_rad, 0.5);

        // Later captures are no-ops
        for i in 0..10 {
            let pose = Pose::new(Vector3::new(i as f64, 2.0 * i as f64, 3.0), -1.0);
            assert_eq!(anchor.capture(&pose), frame);
        }

        assert_eq!(anchor.frame(), Some(frame));
    }

    #[test]
    fn test_to_local() {
        let mut anchor = FrameAnchor::new();
        let frame = anchor.capture(&Pose::new(Vector3::new(1.0, 2.0, 3.0), 0.3));

        let local = frame.to_local(&Pose::new(Vector3::new(1.5, 1.0, 4.0), 1.1));
        assert_relative_eq!(local.position_m[0], 0.5);
        assert_relative_eq!(local.position_m[1], -1.0);
        assert_relative_eq!(local.position_m[2], 1.0);

        // Yaw is not offset
        assert_eq!(local.yaw_rad, 1.1);
    }

    #[test]
    fn test_compose_yaw() {
        let mut anchor = FrameAnchor::new();
        let frame = anchor.capture(&Pose::new(Vector3::zeros(), 0.5));

        assert_relative_eq!(frame.compose_yaw(0.2), 0.7);
    }
}
