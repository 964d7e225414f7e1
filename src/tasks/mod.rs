//! ESP32 runtime tasks.
//!
//! - [`net_task`]: Wi-Fi bring-up, the embassy-net runner and waiting for an address.
//! - [`servo_bus`]: LEDC channels driving the twelve leg servos.
//! - [`mech_task`]: the command dispatcher with every robot member.
//!
//! Tasks are spawned from `main.rs`.
pub mod mech_task;
pub mod net_task;
pub mod servo_bus;
