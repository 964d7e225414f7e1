//! Servo bus seam and the servo facade shared by the gait driver and the monitor.
//!
//! [`ServoBus`] is the transport: it writes target angles and answers status requests
//! asynchronously. [`Servo`] owns the bus behind an async mutex, pumps replies onto a status
//! [`EventChannel`], and bounds every status query with a [`SignalResult`] deadline.
use core::fmt::Display;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Ticker};
use log::{debug, trace};
use thiserror::Error;

use crate::config::{SERVO_COUNT, STATUS_CHANNEL_SIZE, STATUS_QUEUE_DEPTH};
use crate::robot::{joint::Joint, leg::Leg};
use crate::signal::{EventChannel, SignalResult, SubscribeError, TimeoutError};

/// Bus address of one servo: `leg * 3 + joint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServoId(pub u8);

impl ServoId {
    pub fn new(leg: Leg, joint: Joint) -> Self {
        Self(leg as u8 * 3 + joint as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn leg(self) -> Leg {
        Leg::from(self.index() / 3)
    }

    pub fn joint(self) -> Joint {
        Joint::from(self.index() % 3)
    }
}

impl Display for ServoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.index() < SERVO_COUNT {
            write!(f, "servo {} ({} {})", self.0, self.leg(), self.joint())
        } else {
            write!(f, "servo {}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoTarget {
    pub id: ServoId,
    pub angle_deg: f32,
}

/// Status reply from one servo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoStatus {
    pub id: ServoId,
    pub angle_deg: f32,
    pub fault: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("{0} is not on the bus")]
    UnknownServo(ServoId),
    #[error("{0} rejected the write")]
    Write(ServoId),
    #[error("bus is not responding")]
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ServoError {
    #[error("status reply timed out")]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
    #[error(transparent)]
    Bus(#[from] BusError),
}

#[allow(async_fn_in_trait)]
pub trait ServoBus {
    async fn start(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    async fn write_pose(&mut self, targets: &[ServoTarget]) -> Result<(), BusError>;

    /// Asks `id` for its status. The reply shows up later through [`ServoBus::try_receive_reply`].
    async fn send_status_request(&mut self, id: ServoId) -> Result<(), BusError>;

    fn try_receive_reply(&mut self) -> Option<ServoStatus>;
}

pub type StatusChannel =
    EventChannel<NoopRawMutex, ServoStatus, STATUS_CHANNEL_SIZE, STATUS_QUEUE_DEPTH>;

pub struct Servo<B> {
    bus: Mutex<NoopRawMutex, B>,
    status: StatusChannel,
    reply_poll: Duration,
}

impl<B: ServoBus> Servo<B> {
    pub fn new(bus: B, reply_poll: Duration) -> Self {
        Self {
            bus: Mutex::new(bus),
            status: StatusChannel::new(),
            reply_poll,
        }
    }

    pub async fn start(&self) -> Result<(), BusError> {
        self.bus.lock().await.start().await
    }

    pub async fn set_pose(&self, targets: &[ServoTarget]) -> Result<(), BusError> {
        self.bus.lock().await.write_pose(targets).await
    }

    /// Requests the status of `id` and waits at most `timeout` for the reply.
    ///
    /// Replies from other servos, such as a late answer to an earlier query that already timed
    /// out, are skipped. Replies are only observed while [`Servo::run`] (or
    /// [`Servo::pump_replies`]) is driven.
    pub async fn query_status(
        &self,
        id: ServoId,
        timeout: Duration,
    ) -> Result<ServoStatus, ServoError> {
        let from_target = |status: &ServoStatus| status.id == id;
        // Subscribe before the request goes out so a fast reply cannot be missed.
        let reply = SignalResult::wait_matching(&self.status, timeout, &from_target)?;
        self.bus.lock().await.send_status_request(id).await?;
        Ok(reply.await?)
    }

    /// Moves every pending bus reply onto the status channel.
    pub async fn pump_replies(&self) -> usize {
        let mut bus = self.bus.lock().await;
        let mut pumped = 0;
        while let Some(reply) = bus.try_receive_reply() {
            let listeners = self.status.emit(&reply);
            trace!("[SERVO] {} replied, {} listener(s)", reply.id, listeners);
            pumped += 1;
        }
        pumped
    }

    pub fn status_channel(&self) -> &StatusChannel {
        &self.status
    }

    /// Runs `f` with exclusive access to the bus.
    pub async fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut *self.bus.lock().await)
    }

    pub async fn run(&self) {
        debug!("[SERVO] reply pump every {} ms", self.reply_poll.as_millis());
        let mut ticker = Ticker::every(self.reply_poll);
        loop {
            ticker.next().await;
            self.pump_replies().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};

    fn query(servo: &Servo<MockBus>, id: u8, timeout_ms: u64) -> Result<ServoStatus, ServoError> {
        let outcome = block_on(select(
            servo.run(),
            servo.query_status(ServoId(id), Duration::from_millis(timeout_ms)),
        ));
        match outcome {
            Either::First(()) => unreachable!("reply pump never returns"),
            Either::Second(result) => result,
        }
    }

    #[test]
    fn servo_ids_map_to_legs_and_joints() {
        let id = ServoId::new(Leg::FrontRight, Joint::Coxa);
        assert_eq!(id, ServoId(8));
        assert_eq!(id.leg(), Leg::FrontRight);
        assert_eq!(id.joint(), Joint::Coxa);
    }

    #[test]
    fn query_returns_the_reply() {
        let servo = Servo::new(MockBus::new(), Duration::from_millis(2));
        let status = query(&servo, 4, 50).unwrap();
        assert_eq!(status.id, ServoId(4));
        assert!(!status.fault);
        assert_eq!(servo.status_channel().listeners(), 0);
    }

    #[test]
    fn silent_servo_times_out() {
        let mut bus = MockBus::new();
        bus.silent.push(ServoId(3));
        let servo = Servo::new(bus, Duration::from_millis(2));
        assert_eq!(query(&servo, 3, 20), Err(ServoError::Timeout(TimeoutError)));
        assert_eq!(servo.status_channel().listeners(), 0);
    }

    #[test]
    fn unknown_servo_is_a_bus_error() {
        let servo = Servo::new(MockBus::new(), Duration::from_millis(2));
        assert_eq!(
            query(&servo, 40, 20),
            Err(ServoError::Bus(BusError::UnknownServo(ServoId(40))))
        );
    }

    #[test]
    fn reply_from_another_servo_does_not_settle_the_query() {
        let mut bus = MockBus::new();
        bus.redirect = Some((ServoId(1), ServoId(2)));
        let servo = Servo::new(bus, Duration::from_millis(2));
        assert_eq!(query(&servo, 1, 20), Err(ServoError::Timeout(TimeoutError)));
        assert_eq!(servo.status_channel().listeners(), 0);
    }

    #[test]
    fn late_reply_to_a_timed_out_query_is_skipped() {
        let mut bus = MockBus::new();
        bus.reply_delay_ms = 15;
        bus.delays.push((ServoId(3), 30));
        let servo = Servo::new(bus, Duration::from_millis(2));
        let outcome = block_on(select(servo.run(), async {
            let first = servo
                .query_status(ServoId(3), Duration::from_millis(20))
                .await;
            let second = servo
                .query_status(ServoId(4), Duration::from_millis(20))
                .await;
            (first, second)
        }));
        let Either::Second((first, second)) = outcome else {
            unreachable!("reply pump never returns");
        };
        assert_eq!(first, Err(ServoError::Timeout(TimeoutError)));
        assert_eq!(second.map(|status| status.id), Ok(ServoId(4)));
    }

    #[test]
    fn set_pose_reaches_the_bus() {
        let servo = Servo::new(MockBus::new(), Duration::from_millis(2));
        let targets = [ServoTarget {
            id: ServoId(0),
            angle_deg: 45.0,
        }];
        block_on(servo.set_pose(&targets)).unwrap();
        let writes = block_on(servo.with_bus(|bus| bus.poses.len()));
        assert_eq!(writes, 1);
    }
}
