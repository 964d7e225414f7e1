//! Joint enumeration and display helpers.
//!
//! Defines the [`Joint`] enum for identifying each joint (femur, tibia, coxa). The discriminant is
//! the joint's offset inside a leg's block of servo ids.
use core::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Femur = 0,
    Tibia = 1,
    Coxa = 2,
}

impl Display for Joint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Joint::Femur => f.write_str("femur"),
            Joint::Tibia => f.write_str("tibia"),
            Joint::Coxa => f.write_str("coxa"),
        }
    }
}

impl From<usize> for Joint {
    fn from(value: usize) -> Self {
        match value % 3 {
            0 => Joint::Femur,
            1 => Joint::Tibia,
            _ => Joint::Coxa,
        }
    }
}
