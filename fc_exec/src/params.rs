//! # Exec Parameters
//!
//! This module provides the parameters of the velocity bridge executable, loaded from
//! `params/fc_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use util::time;

use crate::vel_ctrl::{self, VelCtrlError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecParams {

    /// Frequency of the control loop.
    ///
    /// Units: Hz
    pub tick_rate_hz: f64,

    /// Frequency at which the link status is polled during startup.
    ///
    /// Units: Hz
    pub link_wait_rate_hz: f64,

    /// Number of neutral setpoints streamed before the control loop starts
    pub neutral_setpoint_count: u32,

    /// Frequency at which neutral setpoints are streamed.
    ///
    /// Units: Hz
    pub neutral_setpoint_rate_hz: f64,

    /// Maximum time to wait for the flight controller link. If absent the exec waits forever.
    ///
    /// Units: seconds
    #[serde(default)]
    pub link_wait_timeout_s: Option<f64>,

    /// Age after which the trajectory is reported as stale. Staleness is only reported, the
    /// controller keeps tracking the last command.
    ///
    /// Units: seconds
    pub traj_stale_warn_s: f64,

    /// Velocity controller parameters
    pub vel_ctrl: vel_ctrl::Params,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ParamsError {
    #[error("{0} must be finite and positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("{0} is out of range, found {1}")]
    OutOfRange(&'static str, f64),

    #[error("Invalid velocity controller parameters: {0}")]
    VelCtrl(VelCtrlError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50.0,
            link_wait_rate_hz: 10.0,
            neutral_setpoint_count: 100,
            neutral_setpoint_rate_hz: 50.0,
            link_wait_timeout_s: None,
            traj_stale_warn_s: 1.0,
            vel_ctrl: vel_ctrl::Params::default(),
        }
    }
}

impl ExecParams {
    /// Check that all rates and durations are usable.
    ///
    /// Rates must give a period, and durations must fit, in a `std::time::Duration`.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let rates = [
            ("tick_rate_hz", self.tick_rate_hz),
            ("link_wait_rate_hz", self.link_wait_rate_hz),
            ("neutral_setpoint_rate_hz", self.neutral_setpoint_rate_hz),
        ];
        let durations = [
            ("link_wait_timeout_s", self.link_wait_timeout_s),
            ("traj_stale_warn_s", Some(self.traj_stale_warn_s)),
        ];

        for &(name, v) in rates.iter() {
            check_positive(name, v)?;
            if time::period_from_hz(v).is_none() {
                return Err(ParamsError::OutOfRange(name, v))
            }
        }

        for &(name, value) in durations.iter() {
            if let Some(v) = value {
                check_positive(name, v)?;
                if time::duration_from_seconds(v).is_none() {
                    return Err(ParamsError::OutOfRange(name, v))
                }
            }
        }

        self.vel_ctrl.validate().map_err(ParamsError::VelCtrl)
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if !value.is_finite() || value <= 0.0 {
        Err(ParamsError::NotPositive(name, value))
    }
    else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert_eq!(ExecParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate() {
        let params = ExecParams { tick_rate_hz: 0.0, ..Default::default() };
        assert_eq!(params.validate(), Err(ParamsError::NotPositive("tick_rate_hz", 0.0)));

        let params = ExecParams { link_wait_timeout_s: Some(-1.0), ..Default::default() };
        assert!(params.validate().is_err());

        let mut params = ExecParams::default();
        params.vel_ctrl.hold_k_p = -1.0;
        assert!(matches!(params.validate(), Err(ParamsError::VelCtrl(_))));
    }

    #[test]
    fn test_validate_out_of_range() {
        let params = ExecParams { link_wait_timeout_s: Some(1e20), ..Default::default() };
        assert_eq!(
            params.validate(),
            Err(ParamsError::OutOfRange("link_wait_timeout_s", 1e20))
        );

        let params = ExecParams { link_wait_rate_hz: 1e-300, ..Default::default() };
        assert_eq!(
            params.validate(),
            Err(ParamsError::OutOfRange("link_wait_rate_hz", 1e-300))
        );

        let params = ExecParams { tick_rate_hz: 1e300, ..Default::default() };
        assert!(matches!(params.validate(), Err(ParamsError::OutOfRange(..))));
    }

    #[test]
    fn test_parse() {
        let params: ExecParams = util::params::parse(r#"
            tick_rate_hz = 50.0
            link_wait_rate_hz = 10.0
            neutral_setpoint_count = 100
            neutral_setpoint_rate_hz = 50.0
            traj_stale_warn_s = 1.0

            [vel_ctrl]
            hold_target_m = [0.0, 0.0, 1.0]
            hold_k_p = 1.0
            track_k_p = 2.0
        "#).unwrap();

        assert_eq!(params, ExecParams::default());
    }

    #[test]
    fn test_parse_extensions() {
        let params: ExecParams = util::params::parse(r#"
            tick_rate_hz = 50.0
            link_wait_rate_hz = 10.0
            neutral_setpoint_count = 20
            neutral_setpoint_rate_hz = 50.0
            link_wait_timeout_s = 30.0
            traj_stale_warn_s = 0.5

            [vel_ctrl]
            hold_target_m = [0.0, 0.0, 2.0]
            hold_k_p = 1.0
            track_k_p = 2.0
            max_speed_ms = 3.0
        "#).unwrap();

        assert_eq!(params.link_wait_timeout_s, Some(30.0));
        assert_eq!(params.neutral_setpoint_count, 20);
        assert_eq!(params.vel_ctrl.max_speed_ms, Some(3.0));
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_shipped_params() {
        let params: ExecParams = util::params::load_from_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../params/fc_exec.toml")
        ).unwrap();
        assert_eq!(params, ExecParams::default());

        let net: comms_if::net::NetParams = util::params::load_from_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../params/net.toml")
        ).unwrap();
        assert!(net.setpoint_endpoint.starts_with("tcp://"));
    }
}
