//! Wi-Fi bring-up and the network stack runner.
use alloc::string::String;
use core::str::FromStr;

use anyhow::anyhow;
use embassy_net::Stack;
use embassy_time::Timer;
use esp_wifi::wifi::{ClientConfiguration, WifiController, WifiDevice};
use log::{error, info};

#[embassy_executor::task]
pub async fn runner_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

pub async fn configurate_and_start_wifi(
    wifi_controller: &mut WifiController<'_>,
) -> anyhow::Result<()> {
    let ssid = env!("WIFI_SSID");
    let password = env!("WIFI_PASS");
    let config = esp_wifi::wifi::Configuration::Client(ClientConfiguration {
        ssid: String::from_str(ssid)?,
        password: String::from_str(password)?,
        ..Default::default()
    });

    info!("[WIFI] connecting to {ssid}");
    wifi_controller
        .set_configuration(&config)
        .map_err(|e| anyhow!("setting wifi configuration: {e:?}"))?;
    wifi_controller
        .set_power_saving(esp_wifi::config::PowerSaveMode::None)
        .map_err(|e| anyhow!("setting wifi power mode: {e:?}"))?;
    wifi_controller
        .start()
        .map_err(|e| anyhow!("starting wifi: {e:?}"))?;
    wifi_controller
        .connect_async()
        .await
        .inspect_err(|e| error!("[WIFI] an error occured trying to connect: {e:?}"))
        .map_err(|e| anyhow!("connecting wifi: {e:?}"))?;

    if let Ok(rssi) = wifi_controller.rssi() {
        info!("[WIFI] connected! signal: {}", rssi)
    }
    Ok(())
}

/// Waits for the link and a DHCP lease.
pub async fn wait_for_network(stack: Stack<'static>) {
    while !stack.is_link_up() {
        Timer::after_millis(500).await;
    }
    stack.wait_config_up().await;
    if let Some(config) = stack.config_v4() {
        info!("[NET] got address {}", config.address);
    }
}
