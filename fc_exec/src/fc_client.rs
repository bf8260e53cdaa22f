//! # Flight Controller Client
//!
//! The FcClient subscribes to the data published by the flight controller bridge:
//!
//! - Vehicle pose in the flight controller's frame.
//! - Flight controller state, including whether the bridge is connected to the flight controller.
//! - Raw RC input.
//!
//! Messages are received on a background thread and written straight into the [`StateSampler`],
//! which the control loop reads once per cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, thread::{self, JoinHandle}};
use log::{error, warn};

use comms_if::{
    eqpt::fc::FcData,
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq}
};

use crate::sampler::{IngestError, StateSampler};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FcClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not deserialize the message from the bridge: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Rejected sample: {0}")]
    Rejected(IngestError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FcClient {
    /// Create a new instance of the FcClient, starting the background thread.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        sampler: StateSampler
    ) -> Result<Self, FcClientError> {
        let socket_options = SocketOptions::subscriber();

        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.fc_endpoint
        ).map_err(FcClientError::SocketError)?;

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

impl Drop for FcClient {
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

/// Parse a message from the bridge and ingest it into the sampler.
pub fn handle_message(sampler: &StateSampler, msg: &str) -> Result<(), FcClientError> {
    let data: FcData = serde_json::from_str(msg)
        .map_err(FcClientError::DeserializeError)?;

    handle_fc_data(sampler, &data)
}

/// Ingest data from the bridge into the sampler.
pub fn handle_fc_data(sampler: &StateSampler, data: &FcData) -> Result<(), FcClientError> {
    match data {
        FcData::Pose(pose) => sampler.ingest_pose(pose)
            .map_err(FcClientError::Rejected),
        FcData::State(state) => {
            sampler.ingest_link(state.connected);
            Ok(())
        },
        FcData::RcIn(rc) => {
            sampler.ingest_rc(rc);
            Ok(())
        }
    }
}

/// Background thread, updates the sampler when the bridge publishes something new.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    sampler: StateSampler
) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from the flight controller bridge");
                continue
            },
            Err(zmq::Error::EAGAIN) => {
                // Without the bridge the last reported link state can't be trusted
                if !socket.connected() && sampler.link_connected() {
                    warn!("Connection to the flight controller bridge lost");
                    sampler.ingest_link(false);
                }
                continue
            },
            Err(e) => {
                error!("Error receiving message from the flight controller bridge: {:?}", e);
                break
            }
        };

        if let Err(e) = handle_message(&sampler, &msg) {
            warn!("FcClient: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use comms_if::eqpt::fc::VehiclePose;

    #[test]
    fn test_handle_pose() {
        let sampler = StateSampler::new();

        handle_message(
            &sampler,
            r#"{"Pose": {"position_m": [1.0, 2.0, 3.0], "attitude_q": [0.0, 0.0, 0.0, 1.0]}}"#
        ).unwrap();
        handle_message(
            &sampler,
            r#"{"Pose": {"position_m": [2.0, 2.0, 3.5], "attitude_q": [0.0, 0.0, 0.0, 1.0]}}"#
        ).unwrap();

        let snapshot = sampler.snapshot();
        assert_relative_eq!(snapshot.pose.position_m[0], 1.0);
        assert_relative_eq!(snapshot.pose.position_m[1], 0.0);
        assert_relative_eq!(snapshot.pose.position_m[2], 0.5);
    }

    #[test]
    fn test_handle_state_and_rc() {
        let sampler = StateSampler::new();

        handle_message(&sampler, r#"{"State": {"connected": true, "mode": "OFFBOARD"}}"#).unwrap();
        handle_message(&sampler, r#"{"RcIn": {"channels": [1000, 1500, 1500, 1500, 1900]}}"#)
            .unwrap();

        let snapshot = sampler.snapshot();
        assert!(snapshot.link_connected);
        assert_eq!(snapshot.rc_mode_channel, Some(1900));
    }

    #[test]
    fn test_handle_errors() {
        let sampler = StateSampler::new();

        assert!(matches!(
            handle_message(&sampler, "not json"),
            Err(FcClientError::DeserializeError(_))
        ));
        assert!(matches!(
            handle_message(
                &sampler,
                r#"{"Pose": {"position_m": [1.0, null, 3.0], "attitude_q": [0.0, 0.0, 0.0, 1.0]}}"#
            ),
            Err(FcClientError::DeserializeError(_))
        ));

        let pose = VehiclePose {
            position_m: [std::f64::NAN, 0.0, 0.0],
            attitude_q: [0.0, 0.0, 0.0, 1.0],
        };
        assert!(matches!(
            handle_fc_data(&sampler, &FcData::Pose(pose)),
            Err(FcClientError::Rejected(IngestError::SensorFault(_)))
        ));
        assert_eq!(sampler.snapshot().num_rejected_samples, 1);
        assert_eq!(sampler.snapshot().frame, None);
    }
}
