//! Implementations for the VelCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::{Params, VelCtrlError, VelSetpoint};
use crate::{mode_select::ControlMode, sampler::Snapshot};
use util::{maths, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity control module state
#[derive(Debug, Default)]
pub struct VelCtrl {
    params: Option<Params>,
}

/// Input data to velocity control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Inputs for this cycle
    pub snapshot: Snapshot,

    /// Mode selected for this cycle
    pub mode: ControlMode,
}

/// Status report for VelCtrl processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    /// Mode the command was computed in
    pub mode: ControlMode,

    /// Target position the controller is driving towards.
    ///
    /// Units: meters
    pub target_m: Vector3<f64>,

    /// Target minus current position.
    ///
    /// Units: meters
    pub pos_error_m: Vector3<f64>,

    /// Horizontal magnitude of the velocity demand.
    ///
    /// Units: meters/second
    pub horiz_speed_ms: f64,

    /// True if the demand was scaled down to `max_speed_ms`
    pub speed_limited: bool,

    /// Age of the trajectory command being tracked, if tracking.
    ///
    /// Units: seconds
    pub traj_age_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelCtrl {
    /// Create an initialised instance with the given parameters.
    pub fn new(params: Params) -> Result<Self, VelCtrlError> {
        let mut vel_ctrl = Self::default();
        vel_ctrl.init(params)?;
        Ok(vel_ctrl)
    }
}

impl State for VelCtrl {
    type InitData = Params;
    type InitError = VelCtrlError;

    type InputData = InputData;
    type OutputData = VelSetpoint;
    type StatusReport = StatusReport;
    type ProcError = VelCtrlError;

    /// Initialise the VelCtrl module.
    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        params.validate()?;
        self.params = Some(params);
        Ok(())
    }

    /// Compute the setpoint for this cycle.
    ///
    /// This function doesn't block and has no side effects other than logging.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let params = self.params.as_ref().ok_or(VelCtrlError::NotInit)?;
        let snapshot = &input_data.snapshot;
        let pose = &snapshot.pose;

        if !pose.is_finite() {
            return Err(VelCtrlError::SensorFault("pose"))
        }

        // Select the target, gain and yaw for the mode
        let (target_m, k_p, yaw_rad, traj_age_s) = match input_data.mode {
            ControlMode::Hold => (
                Vector3::from(params.hold_target_m),
                params.hold_k_p,
                pose.yaw_rad,
                None
            ),
            ControlMode::Track => {
                let traj = snapshot.traj.as_ref().ok_or(VelCtrlError::NoTrajectory)?;
                (traj.position_m, params.track_k_p, traj.yaw_rad, snapshot.traj_age_s)
            }
        };

        let pos_error_m = target_m - pose.position_m;
        let mut velocity_ms = pos_error_m * k_p;

        let speed_limited = match params.max_speed_ms {
            Some(max) => cap_speed(&mut velocity_ms, max),
            None => false
        };

        if !maths::all_finite(velocity_ms.as_slice()) {
            return Err(VelCtrlError::SensorFault("velocity demand"))
        }
        if !yaw_rad.is_finite() {
            return Err(VelCtrlError::SensorFault("yaw demand"))
        }

        let horiz_speed_ms = velocity_ms[0].hypot(velocity_ms[1]);

        match input_data.mode {
            ControlMode::Hold => debug!(
                "Holding, current position: [{:.2}, {:.2}, {:.2}]",
                pose.position_m[0], pose.position_m[1], pose.position_m[2]
            ),
            ControlMode::Track => debug!(
                "Tracking, planned horizontal speed: {:.2} m/s",
                horiz_speed_ms
            )
        }

        let report = StatusReport {
            mode: input_data.mode,
            target_m,
            pos_error_m,
            horiz_speed_ms,
            speed_limited,
            traj_age_s,
        };

        Ok((VelSetpoint::local(velocity_ms, yaw_rad), report))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale the demand down to `max_speed_ms`, keeping its direction. Returns true if it was scaled.
fn cap_speed(velocity_ms: &mut Vector3<f64>, max_speed_ms: f64) -> bool {
    let speed_ms = velocity_ms.norm();

    if speed_ms > max_speed_ms {
        *velocity_ms *= max_speed_ms / speed_ms;
        true
    }
    else {
        false
    }
}
