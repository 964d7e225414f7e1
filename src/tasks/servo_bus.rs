//! LEDC bring-up for the leg servos.
//!
//! The ESP32 has eight low speed and eight high speed LEDC channels; the twelve servos use all low
//! speed channels and four high speed ones, each group on its own 50 Hz timer.
use alloc::boxed::Box;

use anyhow::anyhow;
use embassy_time::Timer;
use embedded_hal::pwm::{self, Error as _, SetDutyCycle};
use esp_hal::gpio::AnyPin;
use esp_hal::ledc::channel::{self, Channel, ChannelIFace, Number};
use esp_hal::ledc::timer::{LSClockSource, TimerIFace};
use esp_hal::ledc::{timer, HighSpeed, LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::LEDC;
use esp_hal::time::Rate;
use log::info;

use crate::config::{ServoParameters, SERVO_COUNT};
use crate::robot::pwm::PwmServoBus;

pub type LedcServoBus = PwmServoBus<LedcChannel<'static>, SERVO_COUNT>;

pub enum LedcChannel<'a> {
    Low(Channel<'a, LowSpeed>),
    High(Channel<'a, HighSpeed>),
}

impl pwm::ErrorType for LedcChannel<'_> {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for LedcChannel<'_> {
    fn max_duty_cycle(&self) -> u16 {
        match self {
            LedcChannel::Low(channel) => channel.max_duty_cycle(),
            LedcChannel::High(channel) => channel.max_duty_cycle(),
        }
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        match self {
            LedcChannel::Low(channel) => channel.set_duty_cycle(duty).map_err(|e| e.kind()),
            LedcChannel::High(channel) => channel.set_duty_cycle(duty).map_err(|e| e.kind()),
        }
    }
}

async fn create_configure_timers(
    ledc: &'static Ledc<'static>,
    frequency_hz: u32,
) -> anyhow::Result<(
    timer::Timer<'static, LowSpeed>,
    timer::Timer<'static, HighSpeed>,
)> {
    let mut timer_low = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    let mut timer_high = ledc.timer::<HighSpeed>(timer::Number::Timer0);
    Timer::after_millis(500).await;

    // 14 bits keeps one duty step close to one microsecond of pulse at 50 Hz.
    timer_low
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty14Bit,
            clock_source: LSClockSource::APBClk,
            frequency: Rate::from_hz(frequency_hz),
        })
        .map_err(|e| anyhow!("configuring low speed timer: {e:?}"))?;
    Timer::after_millis(500).await;

    timer_high
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty14Bit,
            clock_source: timer::HSClockSource::APBClk,
            frequency: Rate::from_hz(frequency_hz),
        })
        .map_err(|e| anyhow!("configuring high speed timer: {e:?}"))?;

    Ok((timer_low, timer_high))
}

/// Servo `i` is driven from `servo_pins[i]`.
pub async fn ledc_servo_bus(
    servo_pins: [AnyPin<'static>; SERVO_COUNT],
    ledc: LEDC<'static>,
    params: &ServoParameters,
) -> anyhow::Result<LedcServoBus> {
    info!("[SERVO] configuring {} LEDC channels", SERVO_COUNT);
    let ledc = Box::leak(Box::new(Ledc::new(ledc)));
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let ledc: &'static Ledc<'static> = ledc;

    //Configure timers: Leak them to get static lifetime.
    let (timer_low, timer_high) = create_configure_timers(ledc, params.frequency_hz).await?;
    let timer_low: &'static _ = Box::leak(Box::new(timer_low));
    let timer_high: &'static _ = Box::leak(Box::new(timer_high));
    let [p0, p1, p2, p3, p4, p5, p6, p7, p8, p9, p10, p11] = servo_pins;

    let mut low_speed_channels: [Channel<'static, LowSpeed>; 8] = [
        ledc.channel(Number::Channel0, p0),
        ledc.channel(Number::Channel1, p1),
        ledc.channel(Number::Channel2, p2),
        ledc.channel(Number::Channel3, p3),
        ledc.channel(Number::Channel4, p4),
        ledc.channel(Number::Channel5, p5),
        ledc.channel(Number::Channel6, p6),
        ledc.channel(Number::Channel7, p7),
    ];
    for channel in &mut low_speed_channels {
        channel
            .configure(channel::config::Config {
                timer: timer_low,
                duty_pct: 7,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(|e| anyhow!("configuring low speed channel: {e:?}"))?;
    }

    let mut high_speed_channels: [Channel<'static, HighSpeed>; 4] = [
        ledc.channel(Number::Channel0, p8),
        ledc.channel(Number::Channel1, p9),
        ledc.channel(Number::Channel2, p10),
        ledc.channel(Number::Channel3, p11),
    ];
    for channel in &mut high_speed_channels {
        channel
            .configure(channel::config::Config {
                timer: timer_high,
                duty_pct: 7,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(|e| anyhow!("configuring high speed channel: {e:?}"))?;
    }

    let [l0, l1, l2, l3, l4, l5, l6, l7] = low_speed_channels.map(LedcChannel::Low);
    let [h0, h1, h2, h3] = high_speed_channels.map(LedcChannel::High);
    Ok(PwmServoBus::new(
        [l0, l1, l2, l3, l4, l5, l6, l7, h0, h1, h2, h3],
        params,
    ))
}
