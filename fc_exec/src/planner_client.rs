//! # Planner Client
//!
//! The PlannerClient subscribes to the trajectory planner. The planner publishes position commands
//! sampled from its current trajectory, and forwards goals selected by the operator.
//!
//! The first position command received latches the controller into tracking. The planner may stop
//! publishing at any time, in which case the last command stays in the sampler.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, thread::{self, JoinHandle}};
use log::{error, info, warn};

use comms_if::{
    eqpt::planner::PlannerData,
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq}
};

use crate::sampler::{IngestError, StateSampler};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct PlannerClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlannerClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not deserialize the message from the planner: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Rejected sample: {0}")]
    Rejected(IngestError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlannerClient {
    /// Create a new instance of the PlannerClient, starting the background thread.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        sampler: StateSampler
    ) -> Result<Self, PlannerClientError> {
        let socket_options = SocketOptions::subscriber();

        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.planner_endpoint
        ).map_err(PlannerClientError::SocketError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let bg_run_clone = bg_run.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(socket, bg_run_clone, sampler)
        }));

        Ok(Self {
            bg_jh,
            bg_run
        })
    }
}

impl Drop for PlannerClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a message from the planner and ingest it into the sampler.
pub fn handle_message(sampler: &StateSampler, msg: &str) -> Result<(), PlannerClientError> {
    let data: PlannerData = serde_json::from_str(msg)
        .map_err(PlannerClientError::DeserializeError)?;

    handle_planner_data(sampler, &data)
}

/// Ingest data from the planner into the sampler.
pub fn handle_planner_data(
    sampler: &StateSampler,
    data: &PlannerData
) -> Result<(), PlannerClientError> {
    match data {
        PlannerData::PosCmd(cmd) => sampler.ingest_traj(cmd)
            .map_err(PlannerClientError::Rejected),
        PlannerData::Goal(goal) => {
            sampler.ingest_goal(goal)
                .map_err(PlannerClientError::Rejected)?;
            info!(
                "Goal received: [{:.2}, {:.2}, {:.2}]",
                goal.position_m[0], goal.position_m[1], goal.position_m[2]
            );
            Ok(())
        }
    }
}

/// Background thread, updates the sampler when the planner publishes something new.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    sampler: StateSampler
) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from the planner");
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving message from the planner: {:?}", e);
                break
            }
        };

        if let Err(e) = handle_message(&sampler, &msg) {
            warn!("PlannerClient: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use comms_if::eqpt::planner::PosCmd;

    #[test]
    fn test_handle_pos_cmd() {
        let sampler = StateSampler::new();

        handle_message(&sampler, r#"{"PosCmd": {
            "position_m": [3.0, 0.0, 1.0],
            "velocity_ms": [1.0, 0.0, 0.0],
            "accel_mss": [0.0, 0.0, 0.0],
            "yaw_rad": 0.2,
            "yaw_rate_rads": 0.0
        }}"#).unwrap();

        let traj = sampler.snapshot().traj.unwrap();
        assert_relative_eq!(traj.position_m[0], 3.0);
        assert_relative_eq!(traj.yaw_rad, 0.2);
    }

    #[test]
    fn test_handle_pos_cmd_without_yaw_rate() {
        let sampler = StateSampler::new();

        handle_message(&sampler, r#"{"PosCmd": {
            "position_m": [3.0, 0.0, 1.0],
            "yaw_rad": 0.2,
            "yaw_rate_rads": null
        }}"#).unwrap();

        let traj = sampler.snapshot().traj.unwrap();
        assert_relative_eq!(traj.position_m[0], 3.0);
        assert!(traj.yaw_rate_rads.is_nan());
    }

    #[test]
    fn test_handle_goal() {
        let sampler = StateSampler::new();

        handle_message(&sampler, r#"{"Goal": {
            "position_m": [5.0, -2.0, 1.5],
            "attitude_q": [0.0, 0.0, 0.0, 1.0]
        }}"#).unwrap();

        let snapshot = sampler.snapshot();
        let goal = snapshot.goal.unwrap();
        assert_relative_eq!(goal.position_m[1], -2.0);
        assert_relative_eq!(goal.yaw_rad, 0.0);

        // A goal is not a trajectory
        assert!(snapshot.traj.is_none());
    }

    #[test]
    fn test_reject_non_finite() {
        let sampler = StateSampler::new();
        let cmd = PosCmd { yaw_rad: std::f64::INFINITY, ..Default::default() };

        assert!(matches!(
            handle_planner_data(&sampler, &PlannerData::PosCmd(cmd)),
            Err(PlannerClientError::Rejected(_))
        ));
        assert!(sampler.snapshot().traj.is_none());
    }
}
