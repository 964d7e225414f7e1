//! The dispatcher task.
use embassy_net::udp::UdpSocket;
use esp_hal::i2c::master::I2c;
use esp_hal::Blocking;
use log::{error, info};

use crate::config::Parameters;
use crate::dispatch::MechWarfare;
use crate::robot::imu::Mpu6050;
use crate::robot::Members;
use crate::tasks::servo_bus::LedcServoBus;

pub type MechImu = Mpu6050<I2c<'static, Blocking>>;
pub type Mech = MechWarfare<UdpSocket<'static>, LedcServoBus, MechImu>;

/// Wires every member and the command socket into a dispatcher.
pub fn build_mech(
    socket: UdpSocket<'static>,
    bus: LedcServoBus,
    i2c: I2c<'static, Blocking>,
    parameters: Parameters,
) -> anyhow::Result<Mech> {
    let imu = Mpu6050::new(i2c, parameters.imu.address);
    let members = Members::new(bus, imu, &parameters)?;
    Ok(MechWarfare::new(socket, members, parameters))
}

#[embassy_executor::task]
pub async fn mech_task(mech: &'static mut Mech) {
    mech.run(|result| match result {
        Ok(()) => info!("[MECH] up and serving commands"),
        Err(e) => error!("[MECH] bring-up failed: {e}"),
    })
    .await;
}
