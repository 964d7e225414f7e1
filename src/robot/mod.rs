//! Robot subsystems owned by the dispatcher.
//!
//! - [`leg`] and [`joint`]: body layout and servo addressing.
//! - [`servo`]: the servo bus seam and the shared [`Servo`] facade.
//! - [`pwm`]: PWM hobby servos behind the bus seam.
//! - [`imu`]: IMU driver seam, MPU-6050 driver and sampling loop.
//! - [`monitor`]: periodic servo health checks.
//!
//! [`Members`] groups one instance of each so message handlers can reach them.
pub mod imu;
pub mod joint;
pub mod leg;
pub mod monitor;
pub mod pwm;
pub mod servo;

use embassy_futures::join::join4;
use log::info;

use crate::config::Parameters;
use crate::error::{ConfigError, MechError};
use crate::kinematics::gait_driver::GaitDriver;
use crate::kinematics::ripple::RippleConfig;
use imu::{Imu, ImuDriver};
use monitor::ServoMonitor;
use servo::{Servo, ServoBus};

/// The subsystems message handlers act on.
pub struct Members<B, D> {
    pub servo: Servo<B>,
    pub gait_driver: GaitDriver,
    pub imu: Imu<D>,
    pub servo_monitor: ServoMonitor,
    gait_tick: embassy_time::Duration,
}

impl<B: ServoBus, D: ImuDriver> Members<B, D> {
    /// Builds every subsystem from `parameters`. Fails if the gait configuration is invalid.
    pub fn new(bus: B, imu: D, parameters: &Parameters) -> Result<Self, ConfigError> {
        let gait = RippleConfig::from_json(&parameters.gait_config)?;
        Ok(Self {
            servo: Servo::new(bus, parameters.servo.reply_poll()),
            gait_driver: GaitDriver::new(gait),
            imu: Imu::new(imu, parameters.imu.period()),
            servo_monitor: ServoMonitor::new(&parameters.servo_monitor),
            gait_tick: parameters.gait_driver.tick(),
        })
    }

    /// Brings up the servo bus and the IMU, in that order.
    pub async fn start(&self) -> Result<(), MechError> {
        self.servo.start().await?;
        self.imu.start().await?;
        info!("[ROBOT] members started");
        Ok(())
    }

    /// Runs every periodic loop. Never returns.
    pub async fn run(&self) {
        join4(
            self.servo.run(),
            self.gait_driver.run(&self.servo, self.gait_tick),
            self.servo_monitor.run(&self.servo),
            self.imu.run(),
        )
        .await;
    }
}
