//! Four-leg ripple gait.
//!
//! Legs swing one at a time in [`RIPPLE_ORDER`], each a quarter cycle after the previous one.
//! While a leg is on the ground it slides backwards by one stride relative to the body; while it
//! swings it is lifted along a half sine and carried forward by the same stride.
use core::f32::consts::PI;
use micromath::F32Ext;
use serde::{Deserialize, Serialize};

use crate::config::{X_DEFAULT, Y_START, Y_STEP, Z_DEFAULT, Z_UP};
use crate::error::ConfigError;
use crate::robot::leg::Leg;

pub const RIPPLE_ORDER: [Leg; 4] = [
    Leg::FrontLeft,
    Leg::BottomRight,
    Leg::FrontRight,
    Leg::BottomLeft,
];

/// Timing and geometry of the ripple gait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    pub cycle_time_s: f32,
    /// Fraction of the cycle each leg spends in the air.
    pub swing_percent: f32,
    pub lift_height_mm: f32,
    pub stance_x_mm: f32,
    pub stance_y_mm: f32,
    pub body_z_mm: f32,
    pub max_translate_mm_s: f32,
    pub max_rotate_deg_s: f32,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            cycle_time_s: 1.0,
            swing_percent: 0.25,
            lift_height_mm: Z_UP - Z_DEFAULT,
            stance_x_mm: X_DEFAULT,
            stance_y_mm: Y_START + Y_STEP / 2.0,
            body_z_mm: Z_DEFAULT,
            max_translate_mm_s: 100.0,
            max_rotate_deg_s: 30.0,
        }
    }
}

impl RippleConfig {
    /// Parses an inline configuration document; blank means defaults.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        if document.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cycle_time_s > 0.0) {
            return Err(ConfigError::invalid("cycle_time_s", "must be positive"));
        }
        if !(self.swing_percent > 0.0 && self.swing_percent < 1.0) {
            return Err(ConfigError::invalid("swing_percent", "must be within (0, 1)"));
        }
        if self.lift_height_mm < 0.0 {
            return Err(ConfigError::invalid("lift_height_mm", "must not be negative"));
        }
        if self.max_translate_mm_s < 0.0 || self.max_rotate_deg_s < 0.0 {
            return Err(ConfigError::invalid("max_translate_mm_s", "limits must not be negative"));
        }
        Ok(())
    }
}

/// Body velocity requested from the gait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitCommand {
    pub translate_x_mm_s: f32,
    pub translate_y_mm_s: f32,
    pub rotate_deg_s: f32,
    pub body_z_mm: f32,
}

impl GaitCommand {
    pub fn clamped(self, config: &RippleConfig) -> Self {
        let translate = config.max_translate_mm_s;
        let rotate = config.max_rotate_deg_s;
        Self {
            translate_x_mm_s: self.translate_x_mm_s.clamp(-translate, translate),
            translate_y_mm_s: self.translate_y_mm_s.clamp(-translate, translate),
            rotate_deg_s: self.rotate_deg_s.clamp(-rotate, rotate),
            body_z_mm: self.body_z_mm,
        }
    }
}

/// Phase of `leg` within the cycle when the gait is at `phase` (both in `[0, 1)`).
pub fn leg_phase(leg: Leg, phase: f32) -> f32 {
    let slot = RIPPLE_ORDER.iter().position(|&l| l == leg).unwrap_or(0);
    let shifted = phase + slot as f32 / RIPPLE_ORDER.len() as f32;
    if shifted >= 1.0 {
        shifted - 1.0
    } else {
        shifted
    }
}

/// Foot position of `leg` in its own frame at gait `phase`.
pub fn foot_position(
    leg: Leg,
    phase: f32,
    command: &GaitCommand,
    config: &RippleConfig,
) -> [f32; 3] {
    let cycle = config.cycle_time_s;
    let stance_x = config.stance_x_mm;
    let stance_y = leg.fore_sign() * config.stance_y_mm;

    // Displacement of the body over one cycle, seen at this foot.
    let body_x = leg.lateral_sign() * stance_x;
    let yaw = command.rotate_deg_s * PI / 180.0 * cycle;
    let travel_x = command.translate_x_mm_s * cycle - yaw * stance_y;
    let travel_y = command.translate_y_mm_s * cycle + yaw * body_x;
    let travel_x = travel_x * leg.lateral_sign();

    let p = leg_phase(leg, phase);
    let swing = config.swing_percent;
    let (offset, lift) = if p < swing {
        let t = p / swing;
        (t - 0.5, (PI * t).sin() * config.lift_height_mm)
    } else {
        let t = (p - swing) / (1.0 - swing);
        (0.5 - t, 0.0)
    };

    [
        stance_x + travel_x * offset,
        stance_y + travel_y * offset,
        command.body_z_mm + lift,
    ]
}

/// Foot positions of all legs, indexed by [`Leg`].
pub fn ripple_pose(phase: f32, command: &GaitCommand, config: &RippleConfig) -> [[f32; 3]; 4] {
    let mut pose = [[0.0; 3]; 4];
    for leg in Leg::ALL {
        pose[leg] = foot_position(leg, phase, command, config);
    }
    pose
}
