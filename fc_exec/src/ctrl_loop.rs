//! # Control loop driver
//!
//! After startup the control loop runs at a fixed rate until shutdown is requested. Each cycle:
//!
//! 1. Takes one snapshot of the inputs from the sampler.
//! 2. Selects the control mode.
//! 3. Computes the velocity setpoint.
//! 4. Publishes the setpoint, then the telemetry packet.
//!
//! A setpoint is published every cycle, whatever the state of the inputs. If the velocity
//! controller faults a zero velocity setpoint is published instead so that the flight controller
//! keeps receiving setpoints at the control rate.
//!
//! Loss of the flight controller link and a stale trajectory are reported but never change the
//! behaviour of the loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use util::{module::State, session};

use crate::{
    mode_select::{ControlMode, ModeSelector},
    params::ExecParams,
    rate::{Rate, RateError},
    sampler::{Snapshot, StateSampler},
    sink::{SetpointSink, TmSink},
    tm_server::TmPacket,
    vel_ctrl::{self, VelCtrl, VelCtrlError, VelSetpoint},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The control loop and everything it owns.
pub struct CtrlLoop {
    sampler: StateSampler,
    selector: ModeSelector,
    vel_ctrl: VelCtrl,

    tick_rate_hz: f64,
    traj_stale_warn_s: f64,

    traj_stale: bool,
    link_lost: bool,
    sp_send_failing: bool,
    fault: Option<VelCtrlError>,

    /// Number of cycles executed so far
    pub num_cycles: u64,

    /// Number of setpoints the sink failed to deliver
    pub num_failed_sends: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CtrlLoopError {
    #[error("Could not initialise VelCtrl: {0}")]
    VelCtrlInitError(VelCtrlError),

    #[error("Invalid control rate: {0}")]
    RateError(RateError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlLoop {
    pub fn new(params: &ExecParams, sampler: StateSampler) -> Result<Self, CtrlLoopError> {
        let vel_ctrl = VelCtrl::new(params.vel_ctrl.clone())
            .map_err(CtrlLoopError::VelCtrlInitError)?;

        Ok(Self {
            sampler,
            selector: ModeSelector::new(),
            vel_ctrl,
            tick_rate_hz: params.tick_rate_hz,
            traj_stale_warn_s: params.traj_stale_warn_s,
            traj_stale: false,
            link_lost: false,
            sp_send_failing: false,
            fault: None,
            num_cycles: 0,
            num_failed_sends: 0,
        })
    }

    /// The current control mode.
    pub fn mode(&self) -> ControlMode {
        self.selector.mode()
    }

    /// Run the loop until `shutdown` is raised, returning the number of cycles executed.
    pub fn run<S, T>(
        &mut self,
        sp_sink: &mut S,
        tm_sink: &mut T,
        shutdown: &AtomicBool
    ) -> Result<u64, CtrlLoopError>
    where
        S: SetpointSink,
        T: TmSink
    {
        let mut rate = Rate::new(self.tick_rate_hz).map_err(CtrlLoopError::RateError)?;

        info!("Control loop running at {:.1} Hz", self.tick_rate_hz);

        while !shutdown.load(Ordering::Relaxed) {
            self.tick(sp_sink, tm_sink);
            rate.sleep();
        }

        info!(
            "Control loop stopped after {} cycles ({} overruns, {} undelivered setpoints)",
            self.num_cycles,
            rate.num_overruns,
            self.num_failed_sends
        );

        Ok(self.num_cycles)
    }

    /// Execute one cycle.
    pub fn tick<S, T>(&mut self, sp_sink: &mut S, tm_sink: &mut T) -> VelSetpoint
    where
        S: SetpointSink,
        T: TmSink
    {
        self.tick_at(Instant::now(), sp_sink, tm_sink)
    }

    /// Execute one cycle, computing input ages relative to `now`.
    pub fn tick_at<S, T>(&mut self, now: Instant, sp_sink: &mut S, tm_sink: &mut T) -> VelSetpoint
    where
        S: SetpointSink,
        T: TmSink
    {
        // ---- INPUT ----

        let snapshot = self.sampler.snapshot_at(now);
        let mode = self.selector.select(&snapshot);

        self.check_link(&snapshot);
        self.check_traj_age(&snapshot);

        // ---- VELOCITY CONTROL ----

        let input = vel_ctrl::InputData { snapshot, mode };

        let (setpoint, status_rpt) = match self.vel_ctrl.proc(&input) {
            Ok((sp, rpt)) => {
                if let Some(e) = self.fault.take() {
                    info!("VelCtrl recovered from: {}", e);
                }
                (sp, Some(rpt))
            },
            Err(e) => {
                if self.fault != Some(e) {
                    warn!("Error during VelCtrl processing, commanding zero velocity: {}", e);
                }
                else {
                    debug!("VelCtrl fault persists: {}", e);
                }
                self.fault = Some(e);
                (VelSetpoint::stop(snapshot.pose.yaw_rad), None)
            }
        };

        // ---- OUTPUT ----

        let timestamp = Utc::now();

        match sp_sink.send_setpoint(&setpoint.to_position_target(timestamp)) {
            Ok(()) => {
                if self.sp_send_failing {
                    info!("Setpoints are being delivered again");
                    self.sp_send_failing = false;
                }
            },
            Err(e) => {
                if !self.sp_send_failing {
                    warn!("Could not send setpoint: {}", e);
                    self.sp_send_failing = true;
                }
                self.num_failed_sends += 1;
            }
        }

        let packet = TmPacket {
            timestamp,
            session_time_s: session::get_elapsed_seconds(),
            cycle: self.num_cycles,
            mode,
            snapshot,
            setpoint,
            vel_ctrl_status_rpt: status_rpt,
            fault: self.fault.map(|e| e.to_string()),
            traj_stale: self.traj_stale,
        };

        if let Err(e) = tm_sink.send_tm(&packet) {
            warn!("TmServer error: {}", e);
        }

        self.num_cycles += 1;

        setpoint
    }

    fn check_link(&mut self, snapshot: &Snapshot) {
        if !snapshot.link_connected && !self.link_lost {
            warn!("Flight controller link lost, setpoints are still being published");
            self.link_lost = true;
        }
        else if snapshot.link_connected && self.link_lost {
            info!("Flight controller link restored");
            self.link_lost = false;
        }
    }

    fn check_traj_age(&mut self, snapshot: &Snapshot) {
        let age_s = match snapshot.traj_age_s {
            Some(a) => a,
            None => return
        };

        if age_s > self.traj_stale_warn_s && !self.traj_stale {
            warn!(
                "No trajectory command for {:.2} s, still tracking the last command",
                age_s
            );
            self.traj_stale = true;
        }
        else if age_s <= self.traj_stale_warn_s && self.traj_stale {
            info!("Trajectory commands resumed");
            self.traj_stale = false;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sink::recording::RecordingSink;
    use approx::assert_relative_eq;
    use comms_if::eqpt::{
        fc::{CoordFrame, TypeMask, VehiclePose},
        planner::PosCmd,
    };
    use std::{sync::Arc, time::Duration};

    fn pose(position_m: [f64; 3]) -> VehiclePose {
        VehiclePose {
            position_m,
            attitude_q: [0.0, 0.0, 0.0, 1.0],
        }
    }

    fn fast_params() -> ExecParams {
        ExecParams {
            tick_rate_hz: 1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_setpoint_per_tick() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut sp_sink = RecordingSink::shutdown_after(25, shutdown.clone());
        let mut tm_sink = RecordingSink::new();

        let mut ctrl_loop = CtrlLoop::new(&fast_params(), sampler).unwrap();
        let num_cycles = ctrl_loop.run(&mut sp_sink, &mut tm_sink, &shutdown).unwrap();

        assert_eq!(num_cycles, 25);
        assert_eq!(sp_sink.setpoints.len(), 25);
        assert_eq!(tm_sink.packets.len(), 25);

        for (i, packet) in tm_sink.packets.iter().enumerate() {
            assert_eq!(packet.cycle, i as u64);
        }
    }

    #[test]
    fn test_hold_then_track() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);
        sampler.ingest_pose(&pose([10.0, 10.0, 0.0])).unwrap();

        let mut sp_sink = RecordingSink::new();
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler.clone()).unwrap();

        let sp = ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        assert_eq!(ctrl_loop.mode(), ControlMode::Hold);
        assert_eq!(sp.velocity_ms, nalgebra::Vector3::new(0.0, 0.0, 1.0));

        sampler.ingest_traj(&PosCmd { position_m: [2.0, 0.0, 1.0], ..Default::default() })
            .unwrap();

        let sp = ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        assert_eq!(ctrl_loop.mode(), ControlMode::Track);
        assert_relative_eq!(sp.velocity_ms[0], 4.0);
        assert_relative_eq!(sp.velocity_ms[2], 2.0);

        let pt = sp_sink.setpoints[1];
        assert_eq!(pt.coordinate_frame, CoordFrame::LocalNed);
        assert_eq!(pt.type_mask, TypeMask::VELOCITY_YAW);
        assert_eq!(pt.velocity_ms, [4.0, 0.0, 2.0]);
    }

    #[test]
    fn test_frozen_target() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);
        sampler.ingest_pose(&pose([0.0, 0.0, 0.0])).unwrap();
        sampler.ingest_pose(&pose([0.5, -0.5, 1.0])).unwrap();
        sampler.ingest_traj(&PosCmd {
            position_m: [3.0, 1.0, 2.0],
            yaw_rad: 0.3,
            ..Default::default()
        }).unwrap();

        let mut sp_sink = RecordingSink::new();
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler).unwrap();

        let setpoints: Vec<VelSetpoint> = (0..20)
            .map(|_| ctrl_loop.tick(&mut sp_sink, &mut tm_sink))
            .collect();

        assert!(setpoints.iter().all(|sp| *sp == setpoints[0]));
        assert_eq!(setpoints[0].yaw_rad, 0.3);
    }

    #[test]
    fn test_stale_traj_reported() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);

        let base = Instant::now();
        sampler.ingest_traj_at(&PosCmd::default(), base).unwrap();

        let mut sp_sink = RecordingSink::new();
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler.clone()).unwrap();

        ctrl_loop.tick_at(base + Duration::from_millis(500), &mut sp_sink, &mut tm_sink);
        assert!(!tm_sink.packets[0].traj_stale);

        ctrl_loop.tick_at(base + Duration::from_secs(2), &mut sp_sink, &mut tm_sink);
        assert!(tm_sink.packets[1].traj_stale);

        // Still tracking the stale command
        assert_eq!(tm_sink.packets[1].mode, ControlMode::Track);

        sampler.ingest_traj_at(&PosCmd::default(), base + Duration::from_secs(2)).unwrap();
        ctrl_loop.tick_at(base + Duration::from_secs(2), &mut sp_sink, &mut tm_sink);
        assert!(!tm_sink.packets[2].traj_stale);
    }

    #[test]
    fn test_fault_commands_stop() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);

        // Both samples are finite but their difference in the local frame is not
        sampler.ingest_pose(&pose([-std::f64::MAX, 0.0, 0.0])).unwrap();
        sampler.ingest_pose(&pose([std::f64::MAX, 0.0, 0.0])).unwrap();

        let mut sp_sink = RecordingSink::new();
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler).unwrap();

        for _ in 0..3 {
            let sp = ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
            assert_eq!(sp, VelSetpoint::stop(0.0));
        }

        assert_eq!(sp_sink.setpoints.len(), 3);
        assert!(tm_sink.packets.iter().all(|p| p.fault.is_some()));
        assert!(tm_sink.packets.iter().all(|p| p.vel_ctrl_status_rpt.is_none()));
    }

    #[test]
    fn test_publishes_without_link() {
        let sampler = StateSampler::new();
        sampler.ingest_link(true);

        let mut sp_sink = RecordingSink::new();
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler.clone()).unwrap();

        ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        sampler.ingest_link(false);
        ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        ctrl_loop.tick(&mut sp_sink, &mut tm_sink);

        assert_eq!(sp_sink.setpoints.len(), 3);
        assert!(!tm_sink.packets[2].snapshot.link_connected);
    }

    #[test]
    fn test_send_failure_does_not_stop_loop() {
        let sampler = StateSampler::new();
        let mut sp_sink = RecordingSink { fail: true, ..Default::default() };
        let mut tm_sink = RecordingSink::new();
        let mut ctrl_loop = CtrlLoop::new(&ExecParams::default(), sampler).unwrap();

        for _ in 0..5 {
            ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        }

        assert_eq!(ctrl_loop.num_cycles, 5);
        assert_eq!(ctrl_loop.num_failed_sends, 5);
        assert_eq!(tm_sink.packets.len(), 5);

        // Recovery clears the failing state, the count is kept
        sp_sink.fail = false;
        ctrl_loop.tick(&mut sp_sink, &mut tm_sink);
        assert!(!ctrl_loop.sp_send_failing);
        assert_eq!(ctrl_loop.num_failed_sends, 5);
    }
}
