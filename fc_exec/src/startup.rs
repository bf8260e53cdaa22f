//! # Startup sequencer
//!
//! Before the flight controller accepts offboard velocity commands two things must happen:
//!
//! 1. The bridge must report a connection to the flight controller (`WaitLink`). The link is
//!    polled at a low rate and by default there is no timeout, the exec waits until the link
//!    comes up or a shutdown is requested.
//! 2. A fixed number of neutral setpoints must be streamed (`StreamNeutral`), which the flight
//!    controller requires before switching into offboard mode.
//!
//! Once both are done the sequencer is `Active` and hands over to the control loop. It is never
//! re-entered.
//!
//! The state machine itself is [`StartupSequencer::step`], which doesn't block, so the waiting state
//! can be inspected directly. [`StartupSequencer::run`] drives it at the configured rates.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use comms_if::eqpt::fc::PositionTarget;
use util::time;

use crate::{
    params::ExecParams,
    rate::{Rate, RateError},
    sampler::StateSampler,
    sink::SetpointSink,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period between reminders that the exec is still waiting for the link.
const LINK_WAIT_REPORT_PERIOD: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Startup state machine.
#[derive(Debug)]
pub struct StartupSequencer {
    state: StartupState,

    neutral_setpoint_count: u32,

    link_wait_timeout: Option<Duration>,

    /// Time at which the link wait started
    wait_start: Option<Instant>,

    /// Time of the last waiting report
    last_report: Option<Instant>,

    link_rate_hz: f64,
    neutral_rate_hz: f64,

    /// Number of neutral setpoints the sink failed to deliver
    pub num_failed_sends: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// States of the startup sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum StartupState {
    /// Awaiting the flight controller link
    WaitLink,

    /// Streaming neutral setpoints, `sent` having been issued so far
    StreamNeutral {
        sent: u32
    },

    /// Startup complete
    Active,
}

/// Action required of the caller after a step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartupStep {
    /// The link is not up yet, poll again later
    AwaitingLink,

    /// Send one neutral setpoint
    SendNeutral,

    /// Startup is complete
    Complete,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("The flight controller link was not established within {0:.1} s")]
    LinkTimeout(f64),

    #[error("Shutdown requested during startup")]
    Shutdown,

    #[error("Invalid startup rate: {0}")]
    RateError(RateError),

    #[error("Invalid link wait timeout: {0} s")]
    InvalidTimeout(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StartupSequencer {
    pub fn new(params: &ExecParams) -> Result<Self, StartupError> {
        let link_wait_timeout = match params.link_wait_timeout_s {
            Some(s) => Some(
                time::duration_from_seconds(s).ok_or(StartupError::InvalidTimeout(s))?
            ),
            None => None
        };

        Ok(Self {
            state: StartupState::WaitLink,
            neutral_setpoint_count: params.neutral_setpoint_count,
            link_wait_timeout,
            wait_start: None,
            last_report: None,
            link_rate_hz: params.link_wait_rate_hz,
            neutral_rate_hz: params.neutral_setpoint_rate_hz,
            num_failed_sends: 0,
        })
    }

    /// The current state of the sequence.
    pub fn state(&self) -> StartupState {
        self.state
    }

    /// Advance the sequence given the current link status.
    ///
    /// Each `SendNeutral` returned counts as one neutral setpoint sent, whether or not the caller
    /// manages to deliver it.
    pub fn step(&mut self, link_connected: bool, now: Instant)
        -> Result<StartupStep, StartupError>
    {
        if let StartupState::WaitLink = self.state {
            let wait_start = *self.wait_start.get_or_insert(now);

            if !link_connected {
                let waited = now.saturating_duration_since(wait_start);

                if let Some(timeout) = self.link_wait_timeout {
                    if waited >= timeout {
                        return Err(StartupError::LinkTimeout(waited.as_secs_f64()))
                    }
                }

                let report_due = match self.last_report {
                    Some(t) => now.saturating_duration_since(t) >= LINK_WAIT_REPORT_PERIOD,
                    None => true
                };
                if report_due {
                    info!(
                        "Waiting for the flight controller link ({:.1} s)",
                        waited.as_secs_f64()
                    );
                    self.last_report = Some(now);
                }

                return Ok(StartupStep::AwaitingLink)
            }

            info!("Flight controller link established");
            info!("Streaming {} neutral setpoints", self.neutral_setpoint_count);
            self.state = StartupState::StreamNeutral { sent: 0 };
        }

        match self.state {
            StartupState::StreamNeutral { sent } if sent < self.neutral_setpoint_count => {
                self.state = StartupState::StreamNeutral { sent: sent + 1 };
                Ok(StartupStep::SendNeutral)
            },
            StartupState::StreamNeutral { .. } => {
                info!("Startup complete");
                self.state = StartupState::Active;
                Ok(StartupStep::Complete)
            },
            _ => Ok(StartupStep::Complete)
        }
    }

    /// Run the startup sequence to completion.
    ///
    /// Blocks until the sequence completes, the link wait times out, or `shutdown` is raised.
    pub fn run<S: SetpointSink>(
        &mut self,
        sampler: &StateSampler,
        sink: &mut S,
        shutdown: &AtomicBool
    ) -> Result<(), StartupError> {
        let mut link_rate = Rate::new(self.link_rate_hz)
            .map_err(StartupError::RateError)?
            .quiet();
        let mut neutral_rate = Rate::new(self.neutral_rate_hz)
            .map_err(StartupError::RateError)?;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Err(StartupError::Shutdown)
            }

            match self.step(sampler.link_connected(), Instant::now())? {
                StartupStep::AwaitingLink => {
                    link_rate.sleep();
                },
                StartupStep::SendNeutral => {
                    // Stream at the neutral rate from the moment the link came up
                    if let StartupState::StreamNeutral { sent: 1 } = self.state {
                        neutral_rate.reset();
                    }

                    if let Err(e) = sink.send_setpoint(&PositionTarget::neutral(Utc::now())) {
                        if self.num_failed_sends == 0 {
                            warn!("Could not send neutral setpoint: {}", e);
                        }
                        self.num_failed_sends += 1;
                    }

                    neutral_rate.sleep();
                },
                StartupStep::Complete => {
                    if self.num_failed_sends > 0 {
                        warn!(
                            "{} of {} neutral setpoints could not be delivered",
                            self.num_failed_sends,
                            self.neutral_setpoint_count
                        );
                    }
                    return Ok(())
                }
            }
        }
    }
}
