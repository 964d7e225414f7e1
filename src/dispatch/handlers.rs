//! Built-in message handlers.
use serde_json::Value;
use thiserror::Error;

use crate::protocol::GaitMessage;
use crate::robot::imu::ImuDriver;
use crate::robot::servo::ServoBus;
use crate::robot::Members;

pub const GAIT_KIND: &str = "gait";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid message body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Applies a `gait` message to the gait driver. `idle` frees the sequencer.
pub fn handle_gait<B: ServoBus, D: ImuDriver>(
    members: &Members<B, D>,
    body: &Value,
) -> Result<(), CommandError> {
    let message = GaitMessage::from_body(body)?;
    let driver = &members.gait_driver;
    match message.command(driver.config().body_z_mm) {
        Some(command) => driver.set_command(command),
        None => driver.set_free(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;
    use crate::testing::{MockBus, MockImu};
    use serde_json::json;

    fn members() -> Members<MockBus, MockImu> {
        Members::new(MockBus::new(), MockImu::new(), &Parameters::default()).unwrap()
    }

    #[test]
    fn gait_message_becomes_the_active_command() {
        let members = members();
        handle_gait(
            &members,
            &json!({"type": "gait", "translate_x_mm_s": -10, "rotate_deg_s": 5, "body_z_mm": -45}),
        )
        .unwrap();
        let command = members.gait_driver.command().unwrap();
        assert_eq!(command.translate_x_mm_s, -10.0);
        assert_eq!(command.rotate_deg_s, 5.0);
        assert_eq!(command.body_z_mm, -45.0);
    }

    #[test]
    fn idle_frees_the_driver() {
        let members = members();
        handle_gait(&members, &json!({"type": "gait", "translate_y_mm_s": 30})).unwrap();
        handle_gait(&members, &json!({"type": "gait", "mode": "idle"})).unwrap();
        assert!(members.gait_driver.is_free());
        assert_eq!(members.gait_driver.commands_applied(), 2);
    }

    #[test]
    fn bad_body_leaves_the_driver_alone() {
        let members = members();
        let result = handle_gait(&members, &json!({"type": "gait", "mode": "trot"}));
        assert!(matches!(result, Err(CommandError::InvalidBody(_))));
        assert_eq!(members.gait_driver.commands_applied(), 0);
    }
}
