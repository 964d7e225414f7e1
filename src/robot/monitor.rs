//! Periodic servo health polling.
//!
//! Every period the monitor asks each configured servo for its status and waits at most
//! `timeout_ms` for the answer. A servo is reported faulted after `fault_threshold` consecutive
//! timeouts or as soon as it replies with its fault flag set. One good reply clears the fault.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Ticker};
use heapless::Vec;
use log::{debug, error, info, warn};

use crate::config::{ServoMonitorParameters, SERVO_COUNT};
use crate::robot::servo::{Servo, ServoBus, ServoError, ServoId, ServoStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoHealth {
    pub id: ServoId,
    pub last_status: Option<ServoStatus>,
    pub consecutive_timeouts: u8,
    pub faulted: bool,
    pub replies: u32,
    pub timeouts: u32,
}

impl ServoHealth {
    fn new(id: ServoId) -> Self {
        Self {
            id,
            last_status: None,
            consecutive_timeouts: 0,
            faulted: false,
            replies: 0,
            timeouts: 0,
        }
    }
}

/// Outcome of one polling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    pub replied: usize,
    pub timed_out: usize,
    pub errors: usize,
}

pub struct ServoMonitor {
    period: Duration,
    timeout: Duration,
    fault_threshold: u8,
    health: Mutex<NoopRawMutex, RefCell<Vec<ServoHealth, SERVO_COUNT>>>,
}

impl ServoMonitor {
    pub fn new(params: &ServoMonitorParameters) -> Self {
        let mut health = Vec::new();
        for &id in &params.servo_ids {
            let id = ServoId(id);
            if health.iter().any(|h: &ServoHealth| h.id == id) {
                continue;
            }
            if health.push(ServoHealth::new(id)).is_err() {
                warn!("[MONITOR] more than {} servos configured, ignoring {}", SERVO_COUNT, id);
            }
        }
        Self {
            period: params.period(),
            timeout: params.timeout(),
            fault_threshold: params.fault_threshold.max(1),
            health: Mutex::new(RefCell::new(health)),
        }
    }

    fn ids(&self) -> Vec<ServoId, SERVO_COUNT> {
        self.health
            .lock(|health| health.borrow().iter().map(|h| h.id).collect())
    }

    fn update(&self, id: ServoId, f: impl FnOnce(&mut ServoHealth)) {
        self.health.lock(|health| {
            if let Some(entry) = health.borrow_mut().iter_mut().find(|h| h.id == id) {
                f(entry);
            }
        });
    }

    /// Queries every monitored servo once.
    pub async fn poll_once<B: ServoBus>(&self, servo: &Servo<B>) -> PollSummary {
        let mut summary = PollSummary::default();
        for id in self.ids() {
            match servo.query_status(id, self.timeout).await {
                Ok(status) => {
                    summary.replied += 1;
                    self.record_reply(status);
                }
                Err(ServoError::Timeout(_)) => {
                    summary.timed_out += 1;
                    self.record_timeout(id);
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!("[MONITOR] {} query failed: {}", id, e);
                }
            }
        }
        summary
    }

    fn record_reply(&self, status: ServoStatus) {
        self.update(status.id, |health| {
            let was_faulted = health.faulted;
            health.last_status = Some(status);
            health.consecutive_timeouts = 0;
            health.replies = health.replies.saturating_add(1);
            health.faulted = status.fault;
            match (was_faulted, health.faulted) {
                (false, true) => error!("[MONITOR] {} reports a fault", status.id),
                (true, false) => info!("[MONITOR] {} recovered", status.id),
                _ => {}
            }
        });
    }

    fn record_timeout(&self, id: ServoId) {
        let threshold = self.fault_threshold;
        self.update(id, |health| {
            health.consecutive_timeouts = health.consecutive_timeouts.saturating_add(1);
            health.timeouts = health.timeouts.saturating_add(1);
            if !health.faulted && health.consecutive_timeouts >= threshold {
                health.faulted = true;
                error!(
                    "[MONITOR] {} silent for {} polls, marking faulted",
                    id, health.consecutive_timeouts
                );
            } else {
                debug!("[MONITOR] {} did not answer", id);
            }
        });
    }

    pub fn health(&self, id: ServoId) -> Option<ServoHealth> {
        self.health
            .lock(|health| health.borrow().iter().find(|h| h.id == id).copied())
    }

    pub fn faulted(&self) -> Vec<ServoId, SERVO_COUNT> {
        self.health.lock(|health| {
            health
                .borrow()
                .iter()
                .filter(|h| h.faulted)
                .map(|h| h.id)
                .collect()
        })
    }

    pub async fn run<B: ServoBus>(&self, servo: &Servo<B>) {
        info!(
            "[MONITOR] watching {} servos every {} ms",
            self.ids().len(),
            self.period.as_millis()
        );
        let mut ticker = Ticker::every(self.period);
        loop {
            ticker.next().await;
            let summary = self.poll_once(servo).await;
            debug!("[MONITOR] {:?}", summary);
        }
    }
}
