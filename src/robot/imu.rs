//! Inertial measurement: driver seam, MPU-6050 driver and the sampling loop.
use core::cell::{Cell, RefCell};
use core::f32::consts::PI;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Ticker};
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{info, warn};
use micromath::F32Ext;
use thiserror::Error;

use crate::config::IMU_CHANNEL_SIZE;
use crate::signal::EventChannel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub accel_g: [f32; 3],
    pub gyro_dps: [f32; 3],
}

impl ImuSample {
    /// Nose up is positive.
    pub fn pitch_deg(&self) -> f32 {
        let [x, y, z] = self.accel_g;
        (-x).atan2((y * y + z * z).sqrt()) * 180.0 / PI
    }

    /// Right side down is positive.
    pub fn roll_deg(&self) -> f32 {
        let [_, y, z] = self.accel_g;
        y.atan2(z) * 180.0 / PI
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImuError {
    #[error("i2c transfer failed: {0}")]
    Bus(ErrorKind),
    #[error("unexpected device id {0:#04x}")]
    UnknownDevice(u8),
    #[error("read before start")]
    NotStarted,
}

#[allow(async_fn_in_trait)]
pub trait ImuDriver {
    async fn start(&mut self) -> Result<(), ImuError>;

    async fn read(&mut self) -> Result<ImuSample, ImuError>;
}

const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I: u8 = 0x68;
// LSB per unit at ±2 g and ±250 °/s
const ACCEL_SCALE: f32 = 16_384.0;
const GYRO_SCALE: f32 = 131.0;

pub struct Mpu6050<I> {
    i2c: I,
    address: u8,
    started: bool,
}

impl<I: I2c> Mpu6050<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            started: false,
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), ImuError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| ImuError::Bus(e.kind()))
    }
}

impl<I: I2c> ImuDriver for Mpu6050<I> {
    async fn start(&mut self) -> Result<(), ImuError> {
        let mut who = [0u8];
        self.i2c
            .write_read(self.address, &[REG_WHO_AM_I], &mut who)
            .map_err(|e| ImuError::Bus(e.kind()))?;
        if who[0] != WHO_AM_I {
            return Err(ImuError::UnknownDevice(who[0]));
        }
        // Wake up, then full scale ±2 g / ±250 °/s.
        self.write_register(REG_PWR_MGMT_1, 0x00)?;
        self.write_register(REG_ACCEL_CONFIG, 0x00)?;
        self.write_register(REG_GYRO_CONFIG, 0x00)?;
        self.started = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<ImuSample, ImuError> {
        if !self.started {
            return Err(ImuError::NotStarted);
        }
        let mut raw = [0u8; 14];
        self.i2c
            .write_read(self.address, &[REG_ACCEL_XOUT_H], &mut raw)
            .map_err(|e| ImuError::Bus(e.kind()))?;
        let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32;
        // Bytes 6 and 7 hold the temperature.
        Ok(ImuSample {
            accel_g: [
                word(0) / ACCEL_SCALE,
                word(2) / ACCEL_SCALE,
                word(4) / ACCEL_SCALE,
            ],
            gyro_dps: [
                word(8) / GYRO_SCALE,
                word(10) / GYRO_SCALE,
                word(12) / GYRO_SCALE,
            ],
        })
    }
}

pub type SampleChannel = EventChannel<NoopRawMutex, ImuSample, IMU_CHANNEL_SIZE>;

/// Samples the driver periodically, keeps the latest sample and broadcasts each one.
pub struct Imu<D> {
    driver: Mutex<NoopRawMutex, D>,
    latest: BlockingMutex<NoopRawMutex, RefCell<Option<ImuSample>>>,
    samples: SampleChannel,
    read_errors: Cell<u32>,
    period: Duration,
}

impl<D: ImuDriver> Imu<D> {
    pub fn new(driver: D, period: Duration) -> Self {
        Self {
            driver: Mutex::new(driver),
            latest: BlockingMutex::new(RefCell::new(None)),
            samples: SampleChannel::new(),
            read_errors: Cell::new(0),
            period,
        }
    }

    pub async fn start(&self) -> Result<(), ImuError> {
        self.driver.lock().await.start().await?;
        info!("[IMU] started, sampling every {} ms", self.period.as_millis());
        Ok(())
    }

    pub async fn sample_once(&self) -> Result<ImuSample, ImuError> {
        let sample = self.driver.lock().await.read().await;
        match sample {
            Ok(sample) => {
                self.latest.lock(|latest| *latest.borrow_mut() = Some(sample));
                self.samples.emit(&sample);
                Ok(sample)
            }
            Err(e) => {
                self.read_errors.set(self.read_errors.get().saturating_add(1));
                Err(e)
            }
        }
    }

    pub fn latest(&self) -> Option<ImuSample> {
        self.latest.lock(|latest| *latest.borrow())
    }

    pub fn samples(&self) -> &SampleChannel {
        &self.samples
    }

    pub fn read_errors(&self) -> u32 {
        self.read_errors.get()
    }

    pub async fn run(&self) {
        let mut ticker = Ticker::every(self.period);
        loop {
            ticker.next().await;
            if let Err(e) = self.sample_once().await {
                warn!("[IMU] read failed: {e}");
            }
        }
    }
}
