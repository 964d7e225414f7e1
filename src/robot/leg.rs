use core::fmt::Display;
use core::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    FrontLeft = 0,
    BottomLeft = 1,
    FrontRight = 2,
    BottomRight = 3,
}

impl Leg {
    pub const ALL: [Leg; 4] = [
        Leg::FrontLeft,
        Leg::BottomLeft,
        Leg::FrontRight,
        Leg::BottomRight,
    ];

    /// +1 for legs on the right side of the body, -1 on the left.
    pub fn lateral_sign(self) -> f32 {
        match self {
            Leg::FrontLeft | Leg::BottomLeft => -1.0,
            Leg::FrontRight | Leg::BottomRight => 1.0,
        }
    }

    /// +1 for the front pair, -1 for the back pair.
    pub fn fore_sign(self) -> f32 {
        match self {
            Leg::FrontLeft | Leg::FrontRight => 1.0,
            Leg::BottomLeft | Leg::BottomRight => -1.0,
        }
    }
}

impl Display for Leg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Leg::FrontLeft => f.write_str("Front left"),
            Leg::FrontRight => f.write_str("Front right"),
            Leg::BottomLeft => f.write_str("Bottom left"),
            Leg::BottomRight => f.write_str("Bottom right"),
        }
    }
}

impl From<usize> for Leg {
    fn from(value: usize) -> Self {
        match value {
            0 => Leg::FrontLeft,
            1 => Leg::BottomLeft,
            2 => Leg::FrontRight,
            _ => Leg::BottomRight,
        }
    }
}

impl Index<Leg> for [[f32; 3]; 4] {
    type Output = [f32; 3];

    fn index(&self, leg: Leg) -> &Self::Output {
        &self[leg as usize]
    }
}

impl IndexMut<Leg> for [[f32; 3]; 4] {
    fn index_mut(&mut self, leg: Leg) -> &mut Self::Output {
        &mut self[leg as usize]
    }
}
