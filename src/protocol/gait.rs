use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kinematics::ripple::GaitCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaitMode {
    #[default]
    Ripple,
    /// Stop sequencing and leave the servos where they are.
    Idle,
}

/// Body of a `gait` command. Missing numbers default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitMessage {
    pub mode: GaitMode,
    pub translate_x_mm_s: f32,
    pub translate_y_mm_s: f32,
    pub rotate_deg_s: f32,
    pub body_z_mm: Option<f32>,
}

/// Gait object nested under [`NESTED_GAIT_FIELD`], with the mode in its own `type` key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NestedGait {
    #[serde(rename = "type")]
    mode: GaitMode,
    translate_x_mm_s: f32,
    translate_y_mm_s: f32,
    rotate_deg_s: f32,
    body_z_mm: Option<f32>,
}

impl From<NestedGait> for GaitMessage {
    fn from(nested: NestedGait) -> Self {
        Self {
            mode: nested.mode,
            translate_x_mm_s: nested.translate_x_mm_s,
            translate_y_mm_s: nested.translate_y_mm_s,
            rotate_deg_s: nested.rotate_deg_s,
            body_z_mm: nested.body_z_mm,
        }
    }
}

pub const NESTED_GAIT_FIELD: &str = "gait";

impl GaitMessage {
    /// Reads either the flat form (`mode` next to the numbers) or a nested `gait` object whose
    /// `type` is `ripple` or `idle`. A null nested object means idle.
    pub fn from_body(body: &Value) -> Result<Self, serde_json::Error> {
        match body.get(NESTED_GAIT_FIELD) {
            Some(Value::Null) => Ok(Self {
                mode: GaitMode::Idle,
                ..Self::default()
            }),
            Some(nested) => NestedGait::deserialize(nested).map(Self::from),
            None => Self::deserialize(body),
        }
    }

    /// The ripple command this message asks for, `None` for idle.
    ///
    /// `default_body_z_mm` is used when the message leaves the body height out.
    pub fn command(&self, default_body_z_mm: f32) -> Option<GaitCommand> {
        match self.mode {
            GaitMode::Idle => None,
            GaitMode::Ripple => Some(GaitCommand {
                translate_x_mm_s: self.translate_x_mm_s,
                translate_y_mm_s: self.translate_y_mm_s,
                rotate_deg_s: self.rotate_deg_s,
                body_z_mm: self.body_z_mm.unwrap_or(default_body_z_mm),
            }),
        }
    }
}
