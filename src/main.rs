#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

use alloc::boxed::Box;
use core::future::pending;
use embassy_executor::Spawner;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Config as NetConfig, StackResources};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{AnyPin, Pin};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use mech_warfare::config::{Parameters, RX_BUF_SIZE, RX_META_SIZE, SERVO_COUNT, TX_BUF_SIZE};
use mech_warfare::tasks::mech_task::{build_mech, mech_task, Mech};
use mech_warfare::tasks::net_task::{configurate_and_start_wifi, runner_task, wait_for_network};
use mech_warfare::tasks::servo_bus::ledc_servo_bus;

esp_bootloader_esp_idf::esp_app_desc!();

//LEGS: [femur, tibia, coxa]
//FRONT_L: [32, 33, 25]
//BOTTOM_L: [26, 27, 14]
//FRONT_R: [12, 13, 19]
//BOTTOM_R: [18, 5, 17]
//IMU: SDA 21, SCL 22

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

const PARAMETERS: &str = include_str!("../config/mech.json");

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 96 * 1024);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);

    let parameters = Parameters::from_json(PARAMETERS).expect("invalid config/mech.json");

    // take important peripherals
    let mut rng = esp_hal::rng::Rng::new(p.RNG);
    let timer1 = TimerGroup::new(p.TIMG0);
    let wifi_init = esp_wifi::init(timer1.timer0, rng, p.RADIO_CLK)
        .expect("Failed to initialize WIFI controller");
    let wifi_init = Box::leak(Box::new(wifi_init));
    let (mut wifi_controller, interfaces) =
        esp_wifi::wifi::new(wifi_init, p.WIFI).expect("Failed to initialize WIFI controller");

    if let Err(e) = configurate_and_start_wifi(&mut wifi_controller).await {
        error!("[WIFI] {e}");
        pending::<()>().await;
    }

    let servo_pins: [AnyPin<'static>; SERVO_COUNT] = [
        p.GPIO32.degrade(),
        p.GPIO33.degrade(),
        p.GPIO25.degrade(),
        p.GPIO26.degrade(),
        p.GPIO27.degrade(),
        p.GPIO14.degrade(),
        p.GPIO12.degrade(),
        p.GPIO13.degrade(),
        p.GPIO19.degrade(),
        p.GPIO18.degrade(),
        p.GPIO5.degrade(),
        p.GPIO17.degrade(),
    ];
    let bus = ledc_servo_bus(servo_pins, p.LEDC, &parameters.servo)
        .await
        .expect("Fail configuring servo channels");

    let i2c = I2c::new(p.I2C0, I2cConfig::default().with_frequency(Rate::from_khz(400)))
        .expect("Fail configuring i2c")
        .with_sda(p.GPIO21)
        .with_scl(p.GPIO22);

    //Get the embassy net stack up and working.
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let config = NetConfig::dhcpv4(Default::default());
    let device = interfaces.sta;
    let (stack, runner) = embassy_net::new(
        device,
        config,
        mk_static!(StackResources<3>, StackResources::new()),
        seed,
    );
    spawner
        .spawn(runner_task(runner))
        .expect("Fail spawning runner task");
    wait_for_network(stack).await;

    // Room for two full command datagrams.
    let socket = UdpSocket::new(
        stack,
        mk_static!([PacketMetadata; RX_META_SIZE], [PacketMetadata::EMPTY; RX_META_SIZE]),
        mk_static!([u8; 2 * RX_BUF_SIZE], [0; 2 * RX_BUF_SIZE]),
        mk_static!([PacketMetadata; 1], [PacketMetadata::EMPTY; 1]),
        mk_static!([u8; TX_BUF_SIZE], [0; TX_BUF_SIZE]),
    );

    let mech = build_mech(socket, bus, i2c, parameters).expect("Fail building mech");
    info!("Starting mech...");
    spawner
        .spawn(mech_task(mk_static!(Mech, mech)))
        .expect("Fail spawning mech task");

    loop {
        pending::<()>().await;
    }
}
