//! Parameters structure for VelCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::VelCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for velocity control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {

    /// Position held until the first trajectory command arrives.
    ///
    /// Units: meters,
    /// Frame: Local
    pub hold_target_m: [f64; 3],

    /// Proportional gain from position error to velocity demand in hold mode.
    ///
    /// Units: 1/seconds
    pub hold_k_p: f64,

    /// Proportional gain from position error to velocity demand in track mode.
    ///
    /// Units: 1/seconds
    pub track_k_p: f64,

    /// Optional limit on the magnitude of the velocity demand. When absent the demand is passed
    /// through unbounded.
    ///
    /// Units: meters/second
    #[serde(default)]
    pub max_speed_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            hold_target_m: [0.0, 0.0, 1.0],
            hold_k_p: 1.0,
            track_k_p: 2.0,
            max_speed_ms: None,
        }
    }
}

impl Params {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), VelCtrlError> {
        if !self.hold_target_m.iter().all(|v| v.is_finite()) {
            return Err(VelCtrlError::InvalidParams("hold_target_m must be finite"))
        }
        if !self.hold_k_p.is_finite() || self.hold_k_p < 0.0 {
            return Err(VelCtrlError::InvalidParams("hold_k_p must be finite and non-negative"))
        }
        if !self.track_k_p.is_finite() || self.track_k_p < 0.0 {
            return Err(VelCtrlError::InvalidParams("track_k_p must be finite and non-negative"))
        }
        if let Some(max) = self.max_speed_ms {
            if !max.is_finite() || max <= 0.0 {
                return Err(VelCtrlError::InvalidParams("max_speed_ms must be finite and positive"))
            }
        }

        Ok(())
    }
}
