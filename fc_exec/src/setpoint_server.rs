//! # Setpoint Server
//!
//! Publishes setpoints to the flight controller bridge as JSON serialised [`PositionTarget`]s.
//! The bridge forwards them to the flight controller, which falls back to a failsafe mode if they
//! stop arriving at the control rate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::fc::PositionTarget,
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq}
};

use crate::sink::{SetpointSink, SinkError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Setpoint server
pub struct SetpointServer {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SetpointServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SetpointServer {
    /// Create a new instance of the setpoint server.
    ///
    /// This function will not block until the bridge connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, SetpointServerError> {
        let socket_options = SocketOptions::publisher();

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.setpoint_endpoint
        ).map_err(SetpointServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// True if a subscriber is connected.
    pub fn connected(&self) -> bool {
        self.socket.connected()
    }
}

impl SetpointSink for SetpointServer {
    /// Publish the setpoint.
    ///
    /// A PUB socket silently drops messages nobody is subscribed to, so the peer count is checked
    /// first and `NotConnected` returned if there are no subscribers.
    fn send_setpoint(&mut self, setpoint: &PositionTarget) -> Result<(), SinkError> {
        if !self.connected() {
            return Err(SinkError::NotConnected)
        }

        let setpoint_string = serde_json::to_string(setpoint)
            .map_err(SinkError::SerializationError)?;

        self.socket.send(&setpoint_string, zmq::DONTWAIT)
            .map_err(SinkError::SendError)
    }
}
