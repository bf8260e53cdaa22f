//! # State sampler
//!
//! Holds the latest value received on each input feed. Every feed is written by its own client
//! thread, while the control loop reads a [`Snapshot`] once per cycle. All values live behind a
//! single mutex so that a snapshot never observes a half-applied update.
//!
//! Pose samples are anchored and converted into the local frame on ingestion, and trajectory yaw is
//! composed with the anchor yaw on ingestion. Samples whose controlled fields contain NaN or
//! infinite values are rejected and counted.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::info;
use nalgebra::Vector3;
use serde::Serialize;

use comms_if::eqpt::{
    fc::{RcIn, VehiclePose},
    planner::{GoalPose, PosCmd},
};
use util::maths::all_finite;

use crate::{
    frame_anchor::{FrameAnchor, ReferenceFrame},
    loc::{yaw_from_quaternion, Pose},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to the latest-value store. Cloning the handle shares the store.
#[derive(Clone, Default)]
pub struct StateSampler {
    store: Arc<Mutex<SampleStore>>,
}

/// The latest trajectory command.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct TrajCmd {
    /// Target position in the local frame.
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Target velocity, not used by the controller. Stored as received, may be non-finite.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector3<f64>,

    /// Target acceleration, not used by the controller. Stored as received, may be non-finite.
    ///
    /// Units: meters/second^2
    pub accel_mss: Vector3<f64>,

    /// Target yaw, already composed with the reference frame yaw.
    ///
    /// Units: radians
    pub yaw_rad: f64,

    /// Target yaw rate, not used by the controller. Stored as received, may be non-finite.
    ///
    /// Units: radians/second
    pub yaw_rate_rads: f64,
}

/// The latest goal selected by the operator.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Goal {
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Units: radians
    pub yaw_rad: f64,
}

/// A consistent copy of every input at one instant.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Default)]
pub struct Snapshot {
    /// Reference frame, `None` until the first pose arrives
    pub frame: Option<ReferenceFrame>,

    /// Vehicle pose in the local frame. Zero until the first pose arrives.
    pub pose: Pose,

    /// True if the bridge reports a connection to the flight controller
    pub link_connected: bool,

    /// Latest trajectory command, `None` if no command was ever received
    pub traj: Option<TrajCmd>,

    /// Seconds since the latest trajectory command was received
    pub traj_age_s: Option<f64>,

    /// Latest goal, `None` if no goal was ever received
    pub goal: Option<Goal>,

    /// Value of the RC mode channel
    pub rc_mode_channel: Option<u16>,

    /// Number of samples rejected for containing non-finite values
    pub num_rejected_samples: u64,
}

#[derive(Default)]
struct SampleStore {
    anchor: FrameAnchor,
    pose: Pose,
    link_connected: bool,
    traj: Option<TrajCmd>,
    traj_rx_instant: Option<Instant>,
    goal: Option<Goal>,
    rc_mode_channel: Option<u16>,
    num_rejected_samples: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a sample can be refused by the sampler.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum IngestError {
    #[error("Sensor fault, the {0} sample contains non-finite values")]
    SensorFault(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a vehicle pose sample.
    ///
    /// The first accepted sample anchors the reference frame.
    pub fn ingest_pose(&self, sample: &VehiclePose) -> Result<(), IngestError> {
        let raw = Pose::from(sample);

        let mut store = self.lock();

        if !raw.is_finite() {
            store.num_rejected_samples += 1;
            return Err(IngestError::SensorFault("pose"))
        }

        let frame = store.anchor.capture(&raw);
        store.pose = frame.to_local(&raw);

        Ok(())
    }

    /// Ingest a link status sample.
    pub fn ingest_link(&self, connected: bool) {
        let mut store = self.lock();

        if connected != store.link_connected {
            info!(
                "Flight controller link {}",
                if connected { "connected" } else { "disconnected" }
            );
        }

        store.link_connected = connected;
    }

    /// Ingest a trajectory command, latching the controller into tracking.
    pub fn ingest_traj(&self, cmd: &PosCmd) -> Result<(), IngestError> {
        self.ingest_traj_at(cmd, Instant::now())
    }

    /// Ingest a trajectory command received at the given instant.
    ///
    /// Only the position and yaw are checked, planners may leave the other fields as NaN.
    pub fn ingest_traj_at(&self, cmd: &PosCmd, rx_instant: Instant) -> Result<(), IngestError> {
        let mut store = self.lock();

        if !all_finite(&cmd.position_m) || !cmd.yaw_rad.is_finite() {
            store.num_rejected_samples += 1;
            return Err(IngestError::SensorFault("trajectory"))
        }

        // Before anchoring the yaw offset is zero
        let yaw_rad = match store.anchor.frame() {
            Some(f) => f.compose_yaw(cmd.yaw_rad),
            None => cmd.yaw_rad
        };

        store.traj = Some(TrajCmd {
            position_m: Vector3::from(cmd.position_m),
            velocity_ms: Vector3::from(cmd.velocity_ms),
            accel_mss: Vector3::from(cmd.accel_mss),
            yaw_rad,
            yaw_rate_rads: cmd.yaw_rate_rads,
        });
        store.traj_rx_instant = Some(rx_instant);

        Ok(())
    }

    /// Ingest an operator goal.
    pub fn ingest_goal(&self, goal: &GoalPose) -> Result<(), IngestError> {
        let yaw_rad = yaw_from_quaternion(goal.attitude_q);

        let mut store = self.lock();

        if !all_finite(&goal.position_m) || !yaw_rad.is_finite() {
            store.num_rejected_samples += 1;
            return Err(IngestError::SensorFault("goal"))
        }

        store.goal = Some(Goal {
            position_m: Vector3::from(goal.position_m),
            yaw_rad,
        });

        Ok(())
    }

    /// Ingest raw RC input, keeping the mode channel.
    pub fn ingest_rc(&self, rc: &RcIn) {
        self.lock().rc_mode_channel = rc.mode_channel();
    }

    /// True if the bridge reports a connection to the flight controller.
    pub fn link_connected(&self) -> bool {
        self.lock().link_connected
    }

    /// Take a consistent snapshot of all inputs.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Instant::now())
    }

    /// Take a snapshot, computing ages relative to the given instant.
    pub fn snapshot_at(&self, now: Instant) -> Snapshot {
        let store = self.lock();

        Snapshot {
            frame: store.anchor.frame(),
            pose: store.pose,
            link_connected: store.link_connected,
            traj: store.traj,
            traj_age_s: store
                .traj_rx_instant
                .map(|t| now.saturating_duration_since(t).as_secs_f64()),
            goal: store.goal,
            rc_mode_channel: store.rc_mode_channel,
            num_rejected_samples: store.num_rejected_samples,
        }
    }

    // The store only holds plain values, so a panic in another thread can't leave it in a state
    // worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, SampleStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
