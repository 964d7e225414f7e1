//! Compile-time constants and the runtime parameter tree.
//!
//! The constants describe the robot body and the fixed resources of the firmware. [`Parameters`]
//! is the runtime configuration: every field has a default so a partial JSON document is valid,
//! and [`PARAMETER_SCHEMA`] lists every field for external config tooling.
use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// NETWORK
pub const PORT: u16 = 13356;
/// Hard limit for one command datagram. Anything longer is cut by the transport.
pub const RX_BUF_SIZE: usize = 3000;
pub const RX_META_SIZE: usize = 8;
pub const TX_BUF_SIZE: usize = 512;

// ROBOT SIZE
pub const LENGTH_A: f32 = 55.0;
pub const LENGTH_B: f32 = 77.5;
pub const LENGTH_C: f32 = 27.5;
pub const LENGTH_SIDE: f32 = 71.0;

///CONST FOR MOVEMENT
pub const Z_DEFAULT: f32 = -50.0;
pub const Z_UP: f32 = -30.0;
pub const X_DEFAULT: f32 = 62.0;
pub const Y_START: f32 = 0.0;
pub const Y_STEP: f32 = 40.0;

// RESOURCES
pub const SERVO_COUNT: usize = 12;
pub const STATUS_CHANNEL_SIZE: usize = 4;
/// Unread replies one status listener can hold.
pub const STATUS_QUEUE_DEPTH: usize = 4;
pub const IMU_CHANNEL_SIZE: usize = 4;
pub const MAX_MESSAGE_KINDS: usize = 8;

/// Top level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub port: u16,
    /// Inline JSON document with the ripple gait configuration. Empty means defaults.
    pub gait_config: String,
    pub servo: ServoParameters,
    pub gait_driver: GaitDriverParameters,
    pub imu: ImuParameters,
    pub servo_monitor: ServoMonitorParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoParameters {
    pub frequency_hz: u32,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub reply_poll_ms: u64,
}

impl ServoParameters {
    /// Length of one PWM period in whole microseconds. Zero above 1 MHz.
    pub fn period_us(&self) -> u32 {
        1_000_000u32.checked_div(self.frequency_hz).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitDriverParameters {
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuParameters {
    pub address: u8,
    pub period_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoMonitorParameters {
    pub period_ms: u64,
    pub timeout_ms: u64,
    /// Consecutive timeouts before a servo is reported as faulted.
    pub fault_threshold: u8,
    pub servo_ids: Vec<u8>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            port: PORT,
            gait_config: String::new(),
            servo: ServoParameters::default(),
            gait_driver: GaitDriverParameters::default(),
            imu: ImuParameters::default(),
            servo_monitor: ServoMonitorParameters::default(),
        }
    }
}

impl Default for ServoParameters {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            min_pulse_us: 544,
            max_pulse_us: 2400,
            reply_poll_ms: 5,
        }
    }
}

impl Default for GaitDriverParameters {
    fn default() -> Self {
        Self { tick_ms: 20 }
    }
}

impl Default for ImuParameters {
    fn default() -> Self {
        Self {
            address: 0x68,
            period_ms: 10,
        }
    }
}

impl Default for ServoMonitorParameters {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            timeout_ms: 50,
            fault_threshold: 3,
            servo_ids: (0..SERVO_COUNT as u8).collect(),
        }
    }
}

impl ServoParameters {
    pub fn reply_poll(&self) -> Duration {
        Duration::from_millis(self.reply_poll_ms)
    }
}

impl GaitDriverParameters {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl ImuParameters {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl ServoMonitorParameters {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Parameters {
    /// Parses and validates a JSON parameter document. Missing fields keep their defaults.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let parameters: Self = serde_json::from_str(document)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be non-zero"));
        }
        if self.servo.frequency_hz == 0 {
            return Err(ConfigError::invalid("servo.frequency_hz", "must be non-zero"));
        }
        if self.servo.period_us() == 0 {
            return Err(ConfigError::invalid(
                "servo.frequency_hz",
                "PWM period must be at least 1 us",
            ));
        }
        if self.servo.min_pulse_us >= self.servo.max_pulse_us {
            return Err(ConfigError::invalid(
                "servo.min_pulse_us",
                "must be below servo.max_pulse_us",
            ));
        }
        if self.servo.max_pulse_us > self.servo.period_us() {
            return Err(ConfigError::invalid(
                "servo.max_pulse_us",
                "must fit in one PWM period",
            ));
        }
        if self.servo.reply_poll_ms == 0 {
            return Err(ConfigError::invalid("servo.reply_poll_ms", "must be non-zero"));
        }
        if self.gait_driver.tick_ms == 0 {
            return Err(ConfigError::invalid("gait_driver.tick_ms", "must be non-zero"));
        }
        if self.imu.period_ms == 0 {
            return Err(ConfigError::invalid("imu.period_ms", "must be non-zero"));
        }
        if self.servo_monitor.period_ms == 0 {
            return Err(ConfigError::invalid("servo_monitor.period_ms", "must be non-zero"));
        }
        if self.servo_monitor.fault_threshold == 0 {
            return Err(ConfigError::invalid(
                "servo_monitor.fault_threshold",
                "must be non-zero",
            ));
        }
        if self
            .servo_monitor
            .servo_ids
            .iter()
            .any(|&id| id as usize >= SERVO_COUNT)
        {
            return Err(ConfigError::invalid(
                "servo_monitor.servo_ids",
                "servo id out of range",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    IntegerList,
}

/// One configurable field, addressed by its JSON pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

const fn field(path: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        path,
        kind,
        description,
    }
}

pub const PARAMETER_SCHEMA: &[FieldSpec] = &[
    field("/port", FieldKind::Integer, "UDP port the command socket binds to"),
    field("/gait_config", FieldKind::Text, "ripple gait configuration (JSON document)"),
    field("/servo/frequency_hz", FieldKind::Integer, "servo PWM frequency"),
    field("/servo/min_pulse_us", FieldKind::Integer, "pulse width at 0 degrees"),
    field("/servo/max_pulse_us", FieldKind::Integer, "pulse width at 180 degrees"),
    field("/servo/reply_poll_ms", FieldKind::Integer, "servo bus reply polling period"),
    field("/gait_driver/tick_ms", FieldKind::Integer, "gait sequencer update period"),
    field("/imu/address", FieldKind::Integer, "IMU I2C address"),
    field("/imu/period_ms", FieldKind::Integer, "IMU sampling period"),
    field("/servo_monitor/period_ms", FieldKind::Integer, "servo health polling period"),
    field("/servo_monitor/timeout_ms", FieldKind::Integer, "servo status reply deadline"),
    field(
        "/servo_monitor/fault_threshold",
        FieldKind::Integer,
        "consecutive timeouts before a servo is faulted",
    ),
    field("/servo_monitor/servo_ids", FieldKind::IntegerList, "servos to monitor"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let parameters = Parameters::from_json("{}").unwrap();
        assert_eq!(parameters, Parameters::default());
        assert_eq!(parameters.port, 13356);
        assert_eq!(parameters.servo_monitor.servo_ids.len(), SERVO_COUNT);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let parameters =
            Parameters::from_json(r#"{"port": 4000, "servo_monitor": {"timeout_ms": 80}}"#)
                .unwrap();
        assert_eq!(parameters.port, 4000);
        assert_eq!(parameters.servo_monitor.timeout_ms, 80);
        assert_eq!(parameters.servo_monitor.fault_threshold, 3);
        assert_eq!(parameters.gait_driver, GaitDriverParameters::default());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Parameters::from_json(r#"{"servo": {"frequency_hz": 2000000}}"#),
            Err(ConfigError::Invalid {
                field: "servo.frequency_hz",
                ..
            })
        ));
        assert!(matches!(
            Parameters::from_json(r#"{"servo": {"frequency_hz": 1000, "max_pulse_us": 1500}}"#),
            Err(ConfigError::Invalid {
                field: "servo.max_pulse_us",
                ..
            })
        ));
        assert!(matches!(
            Parameters::from_json(r#"{"port": 0}"#),
            Err(ConfigError::Invalid { field: "port", .. })
        ));
        assert!(matches!(
            Parameters::from_json(r#"{"servo": {"min_pulse_us": 3000}}"#),
            Err(ConfigError::Invalid {
                field: "servo.min_pulse_us",
                ..
            })
        ));
        assert!(matches!(
            Parameters::from_json(r#"{"servo_monitor": {"servo_ids": [1, 12]}}"#),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            Parameters::from_json("{port"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn schema_covers_every_serialized_field() {
        let tree = serde_json::to_value(Parameters::default()).unwrap();
        for entry in PARAMETER_SCHEMA {
            let value = tree
                .pointer(entry.path)
                .unwrap_or_else(|| panic!("{} missing from parameter tree", entry.path));
            match entry.kind {
                FieldKind::Integer => assert!(value.is_u64(), "{}", entry.path),
                FieldKind::Text => assert!(value.is_string(), "{}", entry.path),
                FieldKind::IntegerList => assert!(value.is_array(), "{}", entry.path),
            }
        }

        let leaves: usize = tree
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_object().map_or(1, |section| section.len()))
            .sum();
        assert_eq!(leaves, PARAMETER_SCHEMA.len());
    }
}
