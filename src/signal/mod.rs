//! Event channels and the "event or timeout" race.
//!
//! - [`channel`]: [`EventChannel`] and its [`Subscription`] registry.
//! - [`result`]: [`SignalResult`], the settle-once wait built on top of a subscription and a timer.
//!
//! Used by the servo facade to bound status replies and by the IMU to publish samples.
pub mod channel;
pub mod result;

pub use channel::{EventChannel, SubscribeError, Subscription, SubscriptionId};
pub use result::{wait_for, Accept, SignalResult, TimeoutError, WaitContext, WaitError};
