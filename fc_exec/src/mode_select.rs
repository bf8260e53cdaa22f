//! # Control mode selection
//!
//! The controller starts out holding position and switches to tracking the planner's trajectory
//! as soon as any trajectory command has been received. The switch is a latch: tracking is never
//! left, even if the planner stops publishing. A stalled planner leaves the vehicle chasing the
//! last received target, which is reported through telemetry but not acted upon.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::{Deserialize, Serialize};

use crate::sampler::Snapshot;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Latching mode selector.
#[derive(Debug, Clone, Default)]
pub struct ModeSelector {
    mode: ControlMode,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Behaviour of the velocity controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Hold position at the hover target
    Hold,

    /// Track the planner's trajectory
    Track,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::Hold
    }
}

impl ModeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the mode for this cycle.
    pub fn select(&mut self, snapshot: &Snapshot) -> ControlMode {
        if self.mode == ControlMode::Hold && snapshot.traj.is_some() {
            info!("First trajectory command received, switching from Hold to Track");
            self.mode = ControlMode::Track;
        }

        self.mode
    }

    /// The currently selected mode.
    pub fn mode(&self) -> ControlMode {
        self.mode
    }
}
