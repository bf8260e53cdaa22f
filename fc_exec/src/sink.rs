//! # Output sinks
//!
//! The startup sequencer and the control loop publish through these traits rather than directly
//! through sockets, so the same code drives the zmq servers in the exec and in-memory sinks in
//! tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{eqpt::fc::PositionTarget, net::zmq};

use crate::tm_server::TmPacket;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Consumer of setpoints for the flight controller.
pub trait SetpointSink {
    /// Publish a setpoint. Must not block for longer than a fraction of a control cycle.
    fn send_setpoint(&mut self, setpoint: &PositionTarget) -> Result<(), SinkError>;
}

/// Consumer of telemetry packets. Delivery is best-effort.
pub trait TmSink {
    fn send_tm(&mut self, packet: &TmPacket) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("The sink has no subscribers")]
    NotConnected,
}

// ---------------------------------------------------------------------------
// TEST SINKS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod recording {
    //! Sinks which record everything sent to them.

    use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

    use super::*;

    /// Records setpoints, optionally raising a shutdown flag once a number have been sent.
    #[derive(Default)]
    pub struct RecordingSink {
        pub setpoints: Vec<PositionTarget>,
        pub packets: Vec<TmPacket>,
        pub shutdown_after: Option<(usize, Arc<AtomicBool>)>,

        /// If set every send fails, although the setpoint is still recorded
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Raise `shutdown` once `num_setpoints` setpoints have been received.
        pub fn shutdown_after(num_setpoints: usize, shutdown: Arc<AtomicBool>) -> Self {
            Self {
                shutdown_after: Some((num_setpoints, shutdown)),
                ..Default::default()
            }
        }
    }

    impl SetpointSink for RecordingSink {
        fn send_setpoint(&mut self, setpoint: &PositionTarget) -> Result<(), SinkError> {
            self.setpoints.push(*setpoint);

            if let Some((n, ref shutdown)) = self.shutdown_after {
                if self.setpoints.len() >= n {
                    shutdown.store(true, Ordering::Relaxed);
                }
            }

            match self.fail {
                true => Err(SinkError::NotConnected),
                false => Ok(())
            }
        }
    }

    impl TmSink for RecordingSink {
        fn send_tm(&mut self, packet: &TmPacket) -> Result<(), SinkError> {
            self.packets.push(packet.clone());
            Ok(())
        }
    }
}
