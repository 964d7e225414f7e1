//! Inverse kinematics and servo angle mapping.
//!
//! Converts a foot position in the leg frame (x outward, y forward, z up, millimetres) into the
//! three joint angles, then into the servo angles of the given leg, whose horns are mounted
//! mirrored on each side.
use core::f32::consts::PI;
use micromath::F32Ext;

use crate::config::{LENGTH_A, LENGTH_B, LENGTH_C};
use crate::robot::{joint::Joint, leg::Leg};

/// Joint angles in degrees for a foot position, or `None` when the point is out of reach.
pub fn cartesian_to_polar(x: f32, y: f32, z: f32) -> Option<(f32, f32, f32)> {
    // Calculate w-z degree
    let w_sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let w = w_sign * (x.powi(2) + y.powi(2)).sqrt();
    let v = w - LENGTH_C;

    let d_squared = v.powi(2) + z.powi(2);
    let d = d_squared.sqrt();

    let femur_cos = (LENGTH_A.powi(2) - LENGTH_B.powi(2) + d_squared) / (2.0 * LENGTH_A * d);
    let tibia_cos = (LENGTH_A.powi(2) + LENGTH_B.powi(2) - d_squared) / (2.0 * LENGTH_A * LENGTH_B);
    if !(-1.0..=1.0).contains(&femur_cos) || !(-1.0..=1.0).contains(&tibia_cos) {
        return None;
    }

    let alpha = z.atan2(v) + femur_cos.acos();
    let beta = tibia_cos.acos();

    // Calculate x-y-z degree
    let gamma = if w >= 0.0 { y.atan2(x) } else { (-y).atan2(-x) };

    Some((alpha * 180.0 / PI, beta * 180.0 / PI, gamma * 180.0 / PI))
}

/// Maps joint angles onto the servo angles of `leg`, indexed by [`Joint`].
pub fn polar_to_servo(leg: Leg, alpha: f32, beta: f32, gamma: f32) -> [f32; 3] {
    let (femur, tibia, coxa) = match leg {
        Leg::FrontLeft | Leg::BottomRight => (90.0 - alpha, beta, gamma + 90.0),
        Leg::BottomLeft | Leg::FrontRight => (alpha + 90.0, 180.0 - beta, 90.0 - gamma),
    };
    let mut angles = [0.0; 3];
    angles[Joint::Femur as usize] = femur;
    angles[Joint::Tibia as usize] = tibia;
    angles[Joint::Coxa as usize] = coxa;
    angles
}

/// Servo angles for a foot position of `leg`.
pub fn leg_servo_angles(leg: Leg, foot: [f32; 3]) -> Option<[f32; 3]> {
    let (alpha, beta, gamma) = cartesian_to_polar(foot[0], foot[1], foot[2])?;
    Some(polar_to_servo(leg, alpha, beta, gamma))
}
