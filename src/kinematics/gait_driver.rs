//! Gait sequencer between the command link and the servos.
//!
//! The dispatcher stores the latest [`GaitCommand`] here. On every tick the driver advances the
//! ripple phase, solves each foot position and writes the resulting angles to the servo bus. With
//! no command the driver is free and leaves the servos alone.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant, Ticker};
use heapless::Vec;
use log::{debug, info, warn};

use crate::config::SERVO_COUNT;
use crate::kinematics::conversion::leg_servo_angles;
use crate::kinematics::ripple::{ripple_pose, GaitCommand, RippleConfig};
use crate::robot::joint::Joint;
use crate::robot::leg::Leg;
use crate::robot::servo::{Servo, ServoBus, ServoId, ServoTarget};

pub type Pose = Vec<ServoTarget, SERVO_COUNT>;

struct GaitState {
    config: RippleConfig,
    command: Option<GaitCommand>,
    phase: f32,
    commands_applied: u32,
}

pub struct GaitDriver {
    state: Mutex<NoopRawMutex, RefCell<GaitState>>,
}

impl GaitDriver {
    pub fn new(config: RippleConfig) -> Self {
        Self {
            state: Mutex::new(RefCell::new(GaitState {
                config,
                command: None,
                phase: 0.0,
                commands_applied: 0,
            })),
        }
    }

    /// Replaces the gait configuration. The current command is re-clamped to the new limits.
    pub fn set_gait(&self, config: RippleConfig) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.command = state.command.map(|command| command.clamped(&config));
            state.config = config;
        });
    }

    pub fn set_command(&self, command: GaitCommand) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let command = command.clamped(&state.config);
            if state.command.is_none() {
                state.phase = 0.0;
            }
            state.command = Some(command);
            state.commands_applied = state.commands_applied.wrapping_add(1);
            debug!("[GAIT] command {:?}", command);
        });
    }

    /// Stops sequencing. Servos keep their last pose.
    pub fn set_free(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.command = None;
            state.commands_applied = state.commands_applied.wrapping_add(1);
        });
        debug!("[GAIT] free");
    }

    pub fn command(&self) -> Option<GaitCommand> {
        self.state.lock(|state| state.borrow().command)
    }

    pub fn config(&self) -> RippleConfig {
        self.state.lock(|state| state.borrow().config)
    }

    pub fn is_free(&self) -> bool {
        self.command().is_none()
    }

    /// Number of gait commands accepted so far, idle included.
    pub fn commands_applied(&self) -> u32 {
        self.state.lock(|state| state.borrow().commands_applied)
    }

    pub fn phase(&self) -> f32 {
        self.state.lock(|state| state.borrow().phase)
    }

    /// Moves the gait `dt_s` seconds forward and returns the servo targets for the new phase.
    ///
    /// Returns `None` while free. Legs whose foot is out of reach are left out of the pose.
    pub fn advance(&self, dt_s: f32) -> Option<Pose> {
        let (phase, command, config) = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let command = state.command?;
            let mut phase = state.phase + dt_s / state.config.cycle_time_s;
            phase -= (phase as u32) as f32;
            state.phase = phase;
            Some((phase, command, state.config))
        })?;

        let feet = ripple_pose(phase, &command, &config);
        let mut pose = Pose::new();
        for leg in Leg::ALL {
            let Some(angles) = leg_servo_angles(leg, feet[leg]) else {
                warn!("[GAIT] {} cannot reach {:?}", leg, feet[leg]);
                continue;
            };
            for (index, angle) in angles.into_iter().enumerate() {
                // SERVO_COUNT slots for four legs of three joints.
                let _ = pose.push(ServoTarget {
                    id: ServoId::new(leg, Joint::from(index)),
                    angle_deg: angle,
                });
            }
        }
        Some(pose)
    }

    pub async fn run<B: ServoBus>(&self, servo: &Servo<B>, tick: Duration) {
        info!("[GAIT] ticking every {} ms", tick.as_millis());
        let mut ticker = Ticker::every(tick);
        let mut last = Instant::now();
        loop {
            ticker.next().await;
            let now = Instant::now();
            let dt_s = (now - last).as_micros() as f32 / 1_000_000.0;
            last = now;

            let Some(pose) = self.advance(dt_s) else {
                continue;
            };
            if let Err(e) = servo.set_pose(&pose).await {
                warn!("[GAIT] pose write failed: {}", e);
            }
        }
    }
}
