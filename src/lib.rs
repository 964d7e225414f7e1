//! Control core of the mech warfare quadruped.
//!
//! - [`signal`]: event channels and the settle-once "event or timeout" wait.
//! - [`net`] and [`protocol`]: the UDP command link and its JSON wire format.
//! - [`dispatch`]: the [`dispatch::MechWarfare`] dispatcher that ties the link to the robot.
//! - [`robot`] and [`kinematics`]: servos, IMU, health monitor and the ripple gait.
//! - [`config`] and [`error`]: constants, runtime parameters and bring-up errors.
//!
//! The library is `no_std` with `alloc`. ESP32 bring-up lives in [`tasks`] and the binary, both
//! behind the `firmware` feature.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod kinematics;
pub mod net;
pub mod protocol;
pub mod robot;
pub mod signal;
#[cfg(feature = "firmware")]
pub mod tasks;

#[cfg(test)]
mod testing;
