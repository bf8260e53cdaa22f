//! # Velocity control module
//!
//! Velocity control converts the current control mode and the latest inputs into a velocity and
//! yaw setpoint for the flight controller.
//!
//! In `Hold` mode the vehicle is driven towards a fixed hover target in the local frame (one meter
//! above the origin by default) while keeping its current yaw. In `Track` mode it is driven
//! towards the latest trajectory position and pointed at the trajectory yaw.
//!
//! Both modes are pure proportional position controllers, the velocity demand on each axis being
//! the position error multiplied by the mode's gain. The trajectory's velocity, acceleration and
//! yaw rate are not fed forward. The demand is unbounded unless `max_speed_ms` is set, in which
//! case the velocity vector is scaled down to that magnitude.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod setpoint;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use setpoint::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during VelCtrl operation.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum VelCtrlError {
    #[error("VelCtrl has not been initialised")]
    NotInit,

    #[error("Invalid parameters: {0}")]
    InvalidParams(&'static str),

    #[error("Tracking requested but no trajectory command is available")]
    NoTrajectory,

    #[error("Sensor fault, non-finite {0} in the velocity computation")]
    SensorFault(&'static str),
}
