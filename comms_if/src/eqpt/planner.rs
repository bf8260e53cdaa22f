//! # Planner Equipment Communications Module
//!
//! Messages published by the external trajectory planner.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Deserializer, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A sample of the planned trajectory.
///
/// Only the position and yaw are required. Planners which don't plan the derivatives may omit them,
/// and a yaw rate of `null` is read as NaN.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PosCmd {
    /// Target position in the trajectory frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Target velocity.
    ///
    /// Units: meters/second
    #[serde(default)]
    pub velocity_ms: [f64; 3],

    /// Target acceleration.
    ///
    /// Units: meters/second^2
    #[serde(default)]
    pub accel_mss: [f64; 3],

    /// Target yaw in the trajectory frame.
    ///
    /// Units: radians
    pub yaw_rad: f64,

    /// Target yaw rate.
    ///
    /// Units: radians/second
    #[serde(default, deserialize_with = "null_as_nan")]
    pub yaw_rate_rads: f64,
}

/// A goal pose selected by the operator.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPose {
    /// Goal position.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Goal attitude quaternion, in `[x, y, z, w]` order.
    pub attitude_q: [f64; 4],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Data published by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlannerData {
    /// Position command sampled from the current trajectory
    PosCmd(PosCmd),

    /// Goal selected by the operator
    Goal(GoalPose),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(std::f64::NAN))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pos_cmd_deser() {
        let data: PlannerData = serde_json::from_str(
            r#"{"PosCmd": {
                "position_m": [3.0, 0.0, 1.0],
                "velocity_ms": [0.5, 0.0, 0.0],
                "accel_mss": [0.0, 0.0, 0.0],
                "yaw_rad": 0.2,
                "yaw_rate_rads": 0.0
            }}"#
        ).unwrap();

        match data {
            PlannerData::PosCmd(c) => {
                assert_eq!(c.position_m, [3.0, 0.0, 1.0]);
                assert_eq!(c.yaw_rad, 0.2);
            },
            d => panic!("Expected PosCmd, got {:?}", d)
        }
    }

    #[test]
    fn test_pos_cmd_partial() {
        let cmd: PosCmd = serde_json::from_str(
            r#"{"position_m": [1.0, 2.0, 3.0], "yaw_rad": 0.0, "yaw_rate_rads": null}"#
        ).unwrap();

        assert_eq!(cmd.position_m, [1.0, 2.0, 3.0]);
        assert_eq!(cmd.velocity_ms, [0.0; 3]);
        assert!(cmd.yaw_rate_rads.is_nan());

        let cmd: PosCmd = serde_json::from_str(
            r#"{"position_m": [1.0, 2.0, 3.0], "yaw_rad": 0.0}"#
        ).unwrap();
        assert_eq!(cmd.yaw_rate_rads, 0.0);
    }
}
