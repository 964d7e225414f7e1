//! Broadcast point with an explicit subscription registry.
//!
//! Every listener owns a slot keyed by a [`SubscriptionId`]. Each slot queues up to `Q` payloads
//! that its owner has not taken yet. [`EventChannel::emit`] copies the payload into every slot with
//! room left and wakes its owner. Dropping the [`Subscription`] removes the slot, so nothing is
//! ever delivered to a listener that went away.
use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::{Deque, Vec};
use log::trace;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("event channel has no free subscription slot")]
    Full,
}

struct Slot<T, const Q: usize> {
    id: SubscriptionId,
    pending: Deque<T, Q>,
    waker: WakerRegistration,
}

struct Registry<T, const N: usize, const Q: usize> {
    next_id: u32,
    slots: Vec<Slot<T, Q>, N>,
}

/// Delivers payloads of type `T` to up to `N` attached listeners, each holding at most `Q`
/// payloads it has not taken yet.
pub struct EventChannel<M: RawMutex, T, const N: usize, const Q: usize = 1> {
    registry: Mutex<M, RefCell<Registry<T, N, Q>>>,
}

impl<M: RawMutex, T, const N: usize, const Q: usize> EventChannel<M, T, N, Q> {
    pub const fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new(Registry {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Attaches a new listener.
    pub fn subscribe(&self) -> Result<Subscription<'_, M, T, N, Q>, SubscribeError> {
        self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            let id = SubscriptionId(registry.next_id);
            registry
                .slots
                .push(Slot {
                    id,
                    pending: Deque::new(),
                    waker: WakerRegistration::new(),
                })
                .map_err(|_| SubscribeError::Full)?;
            registry.next_id = registry.next_id.wrapping_add(1);
            trace!("[EVENT] subscription {:?} attached", id);
            Ok(Subscription { channel: self, id })
        })
    }

    /// Number of currently attached listeners.
    pub fn listeners(&self) -> usize {
        self.registry.lock(|registry| registry.borrow().slots.len())
    }

    fn disconnect(&self, id: SubscriptionId) {
        self.registry.lock(|registry| {
            registry.borrow_mut().slots.retain(|slot| slot.id != id);
        });
        trace!("[EVENT] subscription {:?} released", id);
    }

    fn poll_delivery(&self, id: SubscriptionId, cx: &mut Context<'_>) -> Poll<T> {
        self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            match registry.slots.iter_mut().find(|slot| slot.id == id) {
                Some(slot) => match slot.pending.pop_front() {
                    Some(value) => Poll::Ready(value),
                    None => {
                        slot.waker.register(cx.waker());
                        Poll::Pending
                    }
                },
                // A released slot never receives anything again.
                None => Poll::Pending,
            }
        })
    }
}

impl<M: RawMutex, T: Clone, const N: usize, const Q: usize> EventChannel<M, T, N, Q> {
    /// Queues a copy of `value` for every listener with room left. Payloads a listener already
    /// holds are never overwritten.
    ///
    /// Returns how many listeners received it.
    pub fn emit(&self, value: &T) -> usize {
        self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            let mut delivered = 0;
            for slot in registry.slots.iter_mut() {
                if slot.pending.push_back(value.clone()).is_ok() {
                    slot.waker.wake();
                    delivered += 1;
                }
            }
            delivered
        })
    }
}

impl<M: RawMutex, T, const N: usize, const Q: usize> Default for EventChannel<M, T, N, Q> {
    fn default() -> Self {
        Self::new()
    }
}

/// A live attachment to an [`EventChannel`]. Released on drop.
pub struct Subscription<'a, M: RawMutex, T, const N: usize, const Q: usize = 1> {
    channel: &'a EventChannel<M, T, N, Q>,
    id: SubscriptionId,
}

impl<M: RawMutex, T, const N: usize, const Q: usize> Subscription<'_, M, T, N, Q> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Takes the oldest queued payload, or registers for the next one.
    pub fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<T> {
        self.channel.poll_delivery(self.id, cx)
    }

    /// Waits for the next payload addressed to this subscription.
    pub async fn next(&mut self) -> T {
        poll_fn(|cx| self.poll_next(cx)).await
    }

    /// Explicit form of dropping the subscription.
    pub fn disconnect(self) {}
}

impl<M: RawMutex, T, const N: usize, const Q: usize> Drop for Subscription<'_, M, T, N, Q> {
    fn drop(&mut self) {
        self.channel.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::poll_once;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestChannel = EventChannel<NoopRawMutex, u32, 2>;

    #[test]
    fn emit_without_listeners_reaches_nobody() {
        let channel = TestChannel::new();
        assert_eq!(channel.emit(&1), 0);
    }

    #[test]
    fn every_listener_gets_its_own_copy() {
        let channel = TestChannel::new();
        let mut first = channel.subscribe().unwrap();
        let mut second = channel.subscribe().unwrap();
        assert_ne!(first.id(), second.id());

        assert_eq!(channel.emit(&7), 2);
        assert_eq!(poll_once(first.next()), Poll::Ready(7));
        assert_eq!(poll_once(second.next()), Poll::Ready(7));
        assert_eq!(poll_once(first.next()), Poll::Pending);
    }

    #[test]
    fn undelivered_payload_is_not_overwritten() {
        let channel = TestChannel::new();
        let mut sub = channel.subscribe().unwrap();
        assert_eq!(channel.emit(&1), 1);
        assert_eq!(channel.emit(&2), 0);
        assert_eq!(poll_once(sub.next()), Poll::Ready(1));
    }

    #[test]
    fn queued_payloads_arrive_in_order() {
        let channel: EventChannel<NoopRawMutex, u32, 2, 2> = EventChannel::new();
        let mut sub = channel.subscribe().unwrap();
        assert_eq!(channel.emit(&1), 1);
        assert_eq!(channel.emit(&2), 1);
        assert_eq!(channel.emit(&3), 0);
        assert_eq!(poll_once(sub.next()), Poll::Ready(1));
        assert_eq!(poll_once(sub.next()), Poll::Ready(2));
        assert_eq!(poll_once(sub.next()), Poll::Pending);
        assert_eq!(channel.emit(&4), 1);
        assert_eq!(poll_once(sub.next()), Poll::Ready(4));
    }

    #[test]
    fn dropping_a_subscription_detaches_it() {
        let channel = TestChannel::new();
        let sub = channel.subscribe().unwrap();
        assert_eq!(channel.listeners(), 1);
        sub.disconnect();
        assert_eq!(channel.listeners(), 0);
        assert_eq!(channel.emit(&3), 0);
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let channel = TestChannel::new();
        let _a = channel.subscribe().unwrap();
        let b = channel.subscribe().unwrap();
        assert_eq!(channel.subscribe().err(), Some(SubscribeError::Full));
        drop(b);
        assert!(channel.subscribe().is_ok());
    }
}
