//! First of {event, deadline} arbitration.
//!
//! [`SignalResult`] resolves with the payload if the channel delivers one before the deadline, or
//! with [`TimeoutError`] otherwise. The two paths share one [`WaitContext`]; its `active` flag is
//! the commit point and only the first path to reach it settles the wait.
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};
use log::trace;
use thiserror::Error;

use super::channel::{EventChannel, SubscribeError, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timeout")]
pub struct TimeoutError;

/// Failure of [`wait_for`]: either the deadline won or the wait could not be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

/// Payload filter for [`SignalResult::wait_matching`].
pub type Accept<'a, T> = &'a dyn Fn(&T) -> bool;

/// State of one outstanding wait.
pub struct WaitContext<'a, M: RawMutex, T, const N: usize, const Q: usize = 1> {
    active: bool,
    deadline: Instant,
    timer: Timer,
    subscription: Option<Subscription<'a, M, T, N, Q>>,
    accept: Option<Accept<'a, T>>,
}

impl<M: RawMutex, T, const N: usize, const Q: usize> WaitContext<'_, M, T, N, Q> {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Flips `active` and releases the subscription. True for exactly one caller.
    fn settle(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.subscription = None;
        true
    }

    fn accepts(&self, value: &T) -> bool {
        self.accept.map_or(true, |accept| accept(value))
    }

    fn on_event(&mut self, value: T) -> Option<Result<T, TimeoutError>> {
        if !self.settle() {
            return None;
        }
        Some(Ok(value))
    }

    fn on_expiry(&mut self) -> Option<Result<T, TimeoutError>> {
        if !self.settle() {
            return None;
        }
        trace!("[SIGNAL] wait expired at {}", self.deadline.as_millis());
        Some(Err(TimeoutError))
    }
}

/// Future returned by [`SignalResult::wait`].
///
/// Never settles inside `wait` itself, even for a zero timeout. Once settled, further polls stay
/// pending. Dropping it before settlement releases the subscription, so a later delivery reaches
/// nobody.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct SignalResult<'a, M: RawMutex, T, const N: usize, const Q: usize = 1> {
    context: WaitContext<'a, M, T, N, Q>,
}

impl<'a, M: RawMutex, T: Clone, const N: usize, const Q: usize> SignalResult<'a, M, T, N, Q> {
    /// Subscribes to `channel` and arms a deadline `timeout` from now.
    pub fn wait(
        channel: &'a EventChannel<M, T, N, Q>,
        timeout: Duration,
    ) -> Result<Self, SubscribeError> {
        Self::arm(channel, timeout, None)
    }

    /// Like [`SignalResult::wait`], but only a payload `accept` returns true for settles the wait.
    /// Other payloads are dropped and the deadline keeps running.
    pub fn wait_matching(
        channel: &'a EventChannel<M, T, N, Q>,
        timeout: Duration,
        accept: Accept<'a, T>,
    ) -> Result<Self, SubscribeError> {
        Self::arm(channel, timeout, Some(accept))
    }

    fn arm(
        channel: &'a EventChannel<M, T, N, Q>,
        timeout: Duration,
        accept: Option<Accept<'a, T>>,
    ) -> Result<Self, SubscribeError> {
        let subscription = channel.subscribe()?;
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or(Instant::MAX);
        Ok(Self {
            context: WaitContext {
                active: true,
                deadline,
                timer: Timer::at(deadline),
                subscription: Some(subscription),
                accept,
            },
        })
    }

    pub fn context(&self) -> &WaitContext<'a, M, T, N, Q> {
        &self.context
    }
}

impl<M: RawMutex, T: Clone, const N: usize, const Q: usize> Future
    for SignalResult<'_, M, T, N, Q>
{
    type Output = Result<T, TimeoutError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let context = &mut self.get_mut().context;
        if !context.active {
            return Poll::Pending;
        }

        while let Some(subscription) = context.subscription.as_mut() {
            let Poll::Ready(value) = subscription.poll_next(cx) else {
                break;
            };
            if !context.accepts(&value) {
                trace!("[SIGNAL] payload rejected by filter, still waiting");
                continue;
            }
            if let Some(outcome) = context.on_event(value) {
                return Poll::Ready(outcome);
            }
        }

        if Pin::new(&mut context.timer).poll(cx).is_ready() {
            if let Some(outcome) = context.on_expiry() {
                return Poll::Ready(outcome);
            }
        }
        Poll::Pending
    }
}

/// Waits for the next payload on `channel`, giving up after `timeout`.
pub async fn wait_for<M: RawMutex, T: Clone, const N: usize, const Q: usize>(
    channel: &EventChannel<M, T, N, Q>,
    timeout: Duration,
) -> Result<T, WaitError> {
    Ok(SignalResult::wait(channel, timeout)?.await?)
}
