//! Host-side stand-ins for the hardware seams.
use std::collections::VecDeque;
use std::vec::Vec;

use embassy_net::{IpAddress, IpEndpoint};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::config::SERVO_COUNT;
use crate::net::{BindError, Datagram, DatagramSocket, ReceiveError};
use crate::robot::imu::{ImuDriver, ImuError, ImuSample};
use crate::robot::servo::{BusError, ServoBus, ServoId, ServoStatus, ServoTarget};

/// Servo bus that answers every status request on the first pump after its reply delay.
#[derive(Default)]
pub struct MockBus {
    /// Servos that never reply.
    pub silent: Vec<ServoId>,
    /// Servos that reply with their fault flag set.
    pub faulty: Vec<ServoId>,
    /// Requests for the first id are answered as the second.
    pub redirect: Option<(ServoId, ServoId)>,
    /// Reply delay for every servo without an entry in `delays`.
    pub reply_delay_ms: u64,
    pub delays: Vec<(ServoId, u64)>,
    pub start_error: Option<BusError>,
    pub poses: Vec<Vec<ServoTarget>>,
    pub requests: Vec<ServoId>,
    replies: VecDeque<(Instant, ServoStatus)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn delay_for(&self, id: ServoId) -> Duration {
        let delay_ms = self
            .delays
            .iter()
            .find(|(servo, _)| *servo == id)
            .map_or(self.reply_delay_ms, |(_, delay_ms)| *delay_ms);
        Duration::from_millis(delay_ms)
    }
}

impl ServoBus for MockBus {
    async fn start(&mut self) -> Result<(), BusError> {
        self.start_error.map_or(Ok(()), Err)
    }

    async fn write_pose(&mut self, targets: &[ServoTarget]) -> Result<(), BusError> {
        if let Some(target) = targets.iter().find(|t| t.id.index() >= SERVO_COUNT) {
            return Err(BusError::UnknownServo(target.id));
        }
        self.poses.push(targets.to_vec());
        Ok(())
    }

    async fn send_status_request(&mut self, id: ServoId) -> Result<(), BusError> {
        if id.index() >= SERVO_COUNT {
            return Err(BusError::UnknownServo(id));
        }
        self.requests.push(id);
        if self.silent.contains(&id) {
            return Ok(());
        }
        let replying = match self.redirect {
            Some((from, to)) if from == id => to,
            _ => id,
        };
        let due = Instant::now() + self.delay_for(id);
        self.replies.push_back((
            due,
            ServoStatus {
                id: replying,
                angle_deg: 90.0,
                fault: self.faulty.contains(&replying),
            },
        ));
        Ok(())
    }

    fn try_receive_reply(&mut self) -> Option<ServoStatus> {
        let now = Instant::now();
        let ready = self.replies.iter().position(|(due, _)| *due <= now)?;
        self.replies.remove(ready).map(|(_, status)| status)
    }
}

/// PWM channel that records the last duty cycle.
pub struct MockPwm {
    pub max: u16,
    pub duty: u16,
    pub fail: bool,
}

impl MockPwm {
    pub fn new(max: u16) -> Self {
        Self {
            max,
            duty: 0,
            fail: false,
        }
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if self.fail {
            return Err(pwm::ErrorKind::Other);
        }
        self.duty = duty;
        Ok(())
    }
}

/// Register file behind an I2C address. A one byte write moves the register pointer.
pub struct MockI2c {
    pub registers: [u8; 256],
    pub writes: Vec<(u8, Vec<u8>)>,
    pub fail: bool,
    pointer: u8,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            registers: [0; 256],
            writes: Vec::new(),
            fail: false,
            pointer: 0,
        }
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((&register, values)) = bytes.split_first() {
                        self.pointer = register;
                        for value in values {
                            self.registers[self.pointer as usize] = *value;
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                    if bytes.len() > 1 {
                        self.writes.push((address, bytes.to_vec()));
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.registers[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// IMU that reports a level body at rest.
pub struct MockImu {
    pub start_error: Option<ImuError>,
    pub fail_reads: bool,
    pub reads: u32,
}

impl MockImu {
    pub fn new() -> Self {
        Self {
            start_error: None,
            fail_reads: false,
            reads: 0,
        }
    }
}

impl ImuDriver for MockImu {
    async fn start(&mut self) -> Result<(), ImuError> {
        self.start_error.map_or(Ok(()), Err)
    }

    async fn read(&mut self) -> Result<ImuSample, ImuError> {
        if self.fail_reads {
            return Err(ImuError::Bus(i2c::ErrorKind::Other));
        }
        self.reads += 1;
        Ok(ImuSample {
            accel_g: [0.0, 0.0, 1.0],
            gyro_dps: [0.0; 3],
        })
    }
}

pub type Inbox = Channel<NoopRawMutex, Result<Vec<u8>, ReceiveError>, 8>;

/// Datagram socket fed from an [`Inbox`]. Oversized payloads are cut to the buffer like a real
/// socket would.
pub struct MockSocket<'a> {
    inbox: &'a Inbox,
    pub bind_error: Option<BindError>,
    pub bound_port: Option<u16>,
}

impl<'a> MockSocket<'a> {
    pub fn new(inbox: &'a Inbox) -> Self {
        Self {
            inbox,
            bind_error: None,
            bound_port: None,
        }
    }
}

pub fn peer() -> IpEndpoint {
    IpEndpoint::new(IpAddress::v4(127, 0, 0, 1), 9000)
}

impl DatagramSocket for MockSocket<'_> {
    fn open(&mut self, port: u16) -> Result<(), BindError> {
        if let Some(e) = self.bind_error {
            return Err(e);
        }
        self.bound_port = Some(port);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<Datagram, ReceiveError> {
        let payload = self.inbox.receive().await?;
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(Datagram {
            len,
            endpoint: peer(),
        })
    }
}
