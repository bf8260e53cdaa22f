//! # TM Server
//!
//! Publishes one telemetry packet per control cycle. Telemetry is best-effort, sends never block
//! and failures are only reported to the caller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::Serialize;

use comms_if::net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq};

use crate::{
    mode_select::ControlMode,
    sampler::Snapshot,
    sink::{SinkError, TmSink},
    vel_ctrl::{StatusReport, VelSetpoint},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: MonitoredSocket
}

/// Telemetry packet that is output by the server.
#[derive(Debug, Clone, Serialize)]
pub struct TmPacket {
    pub timestamp: DateTime<Utc>,

    /// Time since the start of the session
    pub session_time_s: f64,

    /// Control cycle the packet was produced in
    pub cycle: u64,

    pub mode: ControlMode,

    /// Inputs used in this cycle
    pub snapshot: Snapshot,

    /// Setpoint published in this cycle
    pub setpoint: VelSetpoint,

    /// Status of the velocity controller, absent if it faulted
    pub vel_ctrl_status_rpt: Option<StatusReport>,

    /// Description of the fault, if the velocity controller faulted
    pub fault: Option<String>,

    /// True while the trajectory is older than the stale threshold
    pub traj_stale: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        // Telemetry is of no use once stale, so only a short queue is kept
        let socket_options = SocketOptions {
            send_hwm: 10,
            ..SocketOptions::publisher()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.tm_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }
}

impl TmSink for TmServer {
    fn send_tm(&mut self, packet: &TmPacket) -> Result<(), SinkError> {
        let packet_string = serde_json::to_string(packet)
            .map_err(SinkError::SerializationError)?;

        self.socket.send(&packet_string, zmq::DONTWAIT)
            .map_err(SinkError::SendError)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_packet_serialization() {
        let packet = TmPacket {
            timestamp: Utc::now(),
            session_time_s: std::f64::NAN,
            cycle: 12,
            mode: ControlMode::Hold,
            snapshot: Snapshot::default(),
            setpoint: VelSetpoint::stop(0.0),
            vel_ctrl_status_rpt: None,
            fault: Some("Sensor fault".into()),
            traj_stale: false,
        };

        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&packet).unwrap()
        ).unwrap();

        assert_eq!(json["cycle"], 12);
        assert_eq!(json["mode"], "Hold");
        assert_eq!(json["setpoint"]["type_mask"], 0b1011_1100_0111);
        assert_eq!(json["setpoint"]["frame"], 1);
        assert!(json["session_time_s"].is_null());
        assert!(json["snapshot"]["traj"].is_null());
        assert_eq!(json["fault"], "Sensor fault");
    }
}
