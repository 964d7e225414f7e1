//! Bring-up and configuration errors.
//!
//! Only these propagate out of the dispatcher. Per-message faults are absorbed by the receive loop
//! and timeouts are reported by the subsystem that waited.
use thiserror::Error;

use crate::net::BindError;
use crate::robot::imu::ImuError;
use crate::robot::servo::BusError;

#[derive(Debug, Error)]
pub enum MechError {
    #[error("command socket: {0}")]
    Bind(#[from] BindError),
    #[error("servo bring-up failed: {0}")]
    Servo(#[from] BusError),
    #[error("imu bring-up failed: {0}")]
    Imu(#[from] ImuError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
