//! Open-loop hobby servos driven by PWM channels.
//!
//! Hobby servos cannot talk back, so [`PwmServoBus`] answers status requests itself with the last
//! angle it commanded and whether the last duty write failed.
use embedded_hal::pwm::SetDutyCycle;
use fugit::HertzU32;
use heapless::Deque;
use log::error;

use crate::config::ServoParameters;
use crate::robot::servo::{BusError, ServoBus, ServoId, ServoStatus, ServoTarget};

#[derive(Debug)]
pub struct PwmServo<P> {
    pwm: P,
    id: ServoId,
    angle: Option<u8>,
    frequency: HertzU32,
    min_pulse_us: u32,
    max_pulse_us: u32,
    faulted: bool,
}

impl<P: SetDutyCycle> PwmServo<P> {
    pub fn new(pwm: P, id: ServoId, params: &ServoParameters) -> Self {
        Self {
            pwm,
            id,
            angle: None,
            frequency: HertzU32::from_raw(params.frequency_hz),
            min_pulse_us: params.min_pulse_us,
            max_pulse_us: params.max_pulse_us,
            faulted: false,
        }
    }

    /// Duty cycle for `angle` degrees (0 to 180) at the channel's resolution.
    pub fn duty_for(&self, angle: u8) -> u16 {
        let angle = u64::from(angle.min(180));
        let max_duty = u64::from(self.pwm.max_duty_cycle());
        let min_pulse = u64::from(self.min_pulse_us);
        let span = u64::from(self.max_pulse_us.saturating_sub(self.min_pulse_us));

        // Linearly interpolate the pulse
        let pulse = min_pulse + angle * span / 180;

        // THE WIDTH OF THE PULSE DRIVES THE ANGLE, NOT FREQ
        let period_us = u64::from(1_000_000 / self.frequency.raw().max(1)).max(1);
        ((pulse * max_duty) / period_us).min(max_duty) as u16
    }

    /// Sets the servo angle in degrees. Values above 180 are clamped.
    pub fn set_angle(&mut self, angle: u8) -> Result<(), BusError> {
        let angle = angle.min(180);

        //Avoid setting the same angle again
        if self.angle == Some(angle) && !self.faulted {
            return Ok(());
        }

        let duty = self.duty_for(angle);
        match self.pwm.set_duty_cycle(duty) {
            Ok(()) => {
                self.angle = Some(angle);
                self.faulted = false;
                Ok(())
            }
            Err(e) => {
                error!("[SERVO] {} error writing angle {:?}", self.id, e);
                self.faulted = true;
                Err(BusError::Write(self.id))
            }
        }
    }

    pub fn angle(&self) -> Option<u8> {
        self.angle
    }

    pub fn status(&self) -> ServoStatus {
        ServoStatus {
            id: self.id,
            angle_deg: self.angle.unwrap_or(0) as f32,
            fault: self.faulted,
        }
    }
}

pub struct PwmServoBus<P, const N: usize> {
    servos: [PwmServo<P>; N],
    replies: Deque<ServoStatus, N>,
}

impl<P: SetDutyCycle, const N: usize> PwmServoBus<P, N> {
    /// Channel `i` drives servo id `i`.
    pub fn new(channels: [P; N], params: &ServoParameters) -> Self {
        let mut next_id = 0u8;
        let servos = channels.map(|pwm| {
            let servo = PwmServo::new(pwm, ServoId(next_id), params);
            next_id += 1;
            servo
        });
        Self {
            servos,
            replies: Deque::new(),
        }
    }

    pub fn servo(&self, id: ServoId) -> Option<&PwmServo<P>> {
        self.servos.get(id.index())
    }

    fn servo_mut(&mut self, id: ServoId) -> Result<&mut PwmServo<P>, BusError> {
        self.servos
            .get_mut(id.index())
            .ok_or(BusError::UnknownServo(id))
    }
}

/// Rounds to the nearest whole degree inside the servo range.
fn f32_to_u8(value: f32) -> u8 {
    let value = value + 0.5;
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 180.0) as u8
}

impl<P: SetDutyCycle, const N: usize> ServoBus for PwmServoBus<P, N> {
    async fn write_pose(&mut self, targets: &[ServoTarget]) -> Result<(), BusError> {
        let mut first_error = None;
        for target in targets {
            let result = self
                .servo_mut(target.id)
                .and_then(|servo| servo.set_angle(f32_to_u8(target.angle_deg)));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn send_status_request(&mut self, id: ServoId) -> Result<(), BusError> {
        let status = self.servo_mut(id)?.status();
        if self.replies.is_full() {
            self.replies.pop_front();
        }
        // Cannot fail after making room.
        let _ = self.replies.push_back(status);
        Ok(())
    }

    fn try_receive_reply(&mut self) -> Option<ServoStatus> {
        self.replies.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPwm;
    use embassy_futures::block_on;

    fn bus() -> PwmServoBus<MockPwm, 3> {
        PwmServoBus::new(
            [MockPwm::new(20_000), MockPwm::new(20_000), MockPwm::new(20_000)],
            &ServoParameters::default(),
        )
    }

    #[test]
    fn pulse_width_follows_angle() {
        let servo = PwmServo::new(MockPwm::new(20_000), ServoId(0), &ServoParameters::default());
        // One duty step per microsecond at 50 Hz.
        assert_eq!(servo.duty_for(0), 544);
        assert_eq!(servo.duty_for(90), 1472);
        assert_eq!(servo.duty_for(180), 2400);
        assert_eq!(servo.duty_for(250), 2400);

        let coarse = PwmServo::new(MockPwm::new(255), ServoId(0), &ServoParameters::default());
        assert_eq!(coarse.duty_for(90), 18);
    }

    #[test]
    fn extreme_timing_saturates_instead_of_panicking() {
        let params = ServoParameters {
            frequency_hz: 2_000_000,
            min_pulse_us: 544,
            max_pulse_us: 3_000_000,
            ..ServoParameters::default()
        };
        let servo = PwmServo::new(MockPwm::new(u16::MAX), ServoId(0), &params);
        assert_eq!(servo.duty_for(0), u16::MAX);
        assert_eq!(servo.duty_for(180), u16::MAX);

        let stopped = ServoParameters {
            frequency_hz: 0,
            ..ServoParameters::default()
        };
        let servo = PwmServo::new(MockPwm::new(20_000), ServoId(0), &stopped);
        assert_eq!(servo.duty_for(180), 48);
    }

    #[test]
    fn pose_is_written_to_each_channel() {
        let mut bus = bus();
        let targets = [
            ServoTarget {
                id: ServoId(0),
                angle_deg: 0.0,
            },
            ServoTarget {
                id: ServoId(2),
                angle_deg: 89.6,
            },
        ];
        block_on(bus.write_pose(&targets)).unwrap();
        assert_eq!(bus.servo(ServoId(0)).unwrap().angle(), Some(0));
        assert_eq!(bus.servo(ServoId(1)).unwrap().angle(), None);
        assert_eq!(bus.servo(ServoId(2)).unwrap().angle(), Some(90));
        assert_eq!(bus.servos[2].pwm.duty, 1472);
    }

    #[test]
    fn out_of_range_angles_are_clamped() {
        assert_eq!(f32_to_u8(-20.0), 0);
        assert_eq!(f32_to_u8(400.0), 180);
        assert_eq!(f32_to_u8(f32::NAN), 0);
    }

    #[test]
    fn unknown_target_does_not_stop_the_others() {
        let mut bus = bus();
        let targets = [
            ServoTarget {
                id: ServoId(7),
                angle_deg: 10.0,
            },
            ServoTarget {
                id: ServoId(1),
                angle_deg: 10.0,
            },
        ];
        assert_eq!(
            block_on(bus.write_pose(&targets)),
            Err(BusError::UnknownServo(ServoId(7)))
        );
        assert_eq!(bus.servo(ServoId(1)).unwrap().angle(), Some(10));
    }

    #[test]
    fn status_reports_last_angle_and_faults() {
        let mut bus = bus();
        block_on(bus.write_pose(&[ServoTarget {
            id: ServoId(1),
            angle_deg: 30.0,
        }]))
        .unwrap();
        bus.servos[2].pwm.fail = true;
        assert_eq!(
            block_on(bus.write_pose(&[ServoTarget {
                id: ServoId(2),
                angle_deg: 30.0,
            }])),
            Err(BusError::Write(ServoId(2)))
        );

        block_on(bus.send_status_request(ServoId(1))).unwrap();
        block_on(bus.send_status_request(ServoId(2))).unwrap();
        let first = bus.try_receive_reply().unwrap();
        assert_eq!((first.id, first.angle_deg, first.fault), (ServoId(1), 30.0, false));
        let second = bus.try_receive_reply().unwrap();
        assert_eq!((second.id, second.fault), (ServoId(2), true));
        assert_eq!(bus.try_receive_reply(), None);
    }

    #[test]
    fn reply_queue_keeps_the_newest() {
        let mut bus = bus();
        for id in [0, 1, 2, 0] {
            block_on(bus.send_status_request(ServoId(id))).unwrap();
        }
        let ids: Vec<_> = core::iter::from_fn(|| bus.try_receive_reply())
            .map(|s| s.id.0)
            .collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }
}
