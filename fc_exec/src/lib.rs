//! # Flight controller velocity bridge library.
//!
//! This library holds every module of the velocity bridge so that the executable and the tests
//! can share them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control loop driver - runs the fixed rate closed loop after startup
pub mod ctrl_loop;

/// Flight controller client - receives vehicle pose, link state and RC input
pub mod fc_client;

/// Frame anchor - captures the local reference frame from the first pose
pub mod frame_anchor;

/// Localisation types - vehicle pose expressed as position and yaw
pub mod loc;

/// Control mode selection - latches from hold into track on the first trajectory command
pub mod mode_select;

/// Executable parameters
pub mod params;

/// Planner client - receives trajectory commands and goals
pub mod planner_client;

/// Fixed rate scheduling
pub mod rate;

/// State sampler - latest value store for every input feed
pub mod sampler;

/// Setpoint server - publishes setpoints to the flight controller bridge
pub mod setpoint_server;

/// Output sinks for setpoints and telemetry
pub mod sink;

/// Startup sequencer - link wait and neutral setpoint streaming
pub mod startup;

/// Telemetry server - publishes per cycle diagnostics
pub mod tm_server;

/// Velocity control module - computes the velocity and yaw setpoint
pub mod vel_ctrl;
