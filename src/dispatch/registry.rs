//! Message kind to handler table.
use heapless::Vec;
use serde_json::Value;
use thiserror::Error;

use crate::config::MAX_MESSAGE_KINDS;
use crate::dispatch::handlers::CommandError;
use crate::robot::Members;

/// Applies one decoded message body to the robot.
pub type Handler<B, D> = fn(&Members<B, D>, &Value) -> Result<(), CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("handler table is full")]
    Full,
}

pub struct HandlerRegistry<B, D> {
    entries: Vec<(&'static str, Handler<B, D>), MAX_MESSAGE_KINDS>,
}

impl<B, D> HandlerRegistry<B, D> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Routes `kind` to `handler`, returning the handler it replaces.
    pub fn register(
        &mut self,
        kind: &'static str,
        handler: Handler<B, D>,
    ) -> Result<Option<Handler<B, D>>, RegistryError> {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            return Ok(Some(core::mem::replace(&mut entry.1, handler)));
        }
        self.entries
            .push((kind, handler))
            .map_err(|_| RegistryError::Full)?;
        Ok(None)
    }

    pub fn lookup(&self, kind: &str) -> Option<Handler<B, D>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|&(_, handler)| handler)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|&(kind, _)| kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B, D> Default for HandlerRegistry<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBus, MockImu};

    type Registry = HandlerRegistry<MockBus, MockImu>;

    fn accept(_: &Members<MockBus, MockImu>, _: &Value) -> Result<(), CommandError> {
        Ok(())
    }

    fn stop(members: &Members<MockBus, MockImu>, _: &Value) -> Result<(), CommandError> {
        members.gait_driver.set_free();
        Ok(())
    }

    #[test]
    fn registering_twice_replaces() {
        let mut registry = Registry::new();
        assert!(registry.register("ping", accept).unwrap().is_none());
        assert!(registry.register("ping", stop).unwrap().is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("ping").is_some());
        assert!(registry.lookup("pong").is_none());
    }

    #[test]
    fn table_has_fixed_capacity() {
        const KINDS: [&str; MAX_MESSAGE_KINDS] = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut registry = Registry::new();
        for kind in KINDS {
            registry.register(kind, accept).unwrap();
        }
        assert!(matches!(
            registry.register("overflow", accept),
            Err(RegistryError::Full)
        ));
        assert_eq!(registry.kinds().count(), MAX_MESSAGE_KINDS);
        // Replacing still works when full.
        assert!(registry.register("a", stop).is_ok());
    }
}
