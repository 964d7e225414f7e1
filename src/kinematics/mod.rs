//! Leg kinematics and gait sequencing.
//!
//! - [`conversion`]: inverse kinematics and the per-leg servo angle mapping.
//! - [`ripple`]: the ripple gait, foot trajectories as a function of phase.
//! - [`gait_driver`]: holds the active command and turns it into servo poses every tick.
pub mod conversion;
pub mod gait_driver;
pub mod ripple;
