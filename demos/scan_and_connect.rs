//! Scan for a Thingy, store it, connect, and print environment readings.
//!
//! Run with: cargo run --example scan_and_connect

use std::time::Duration;

use thingy_ble::data::{LedColor, LedState};
use thingy_ble::{DeviceEvent, DeviceManager, ManagerConfig, ManagerState, PeripheralState, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thingy_ble=debug".parse().unwrap()),
        )
        .init();

    let manager = DeviceManager::with_btleplug(ManagerConfig::default()).await?;
    let mut events = manager.subscribe();

    println!("Waiting for the radio...");

    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => event,
                Err(_) => break,
            },
            _ = &mut deadline => {
                println!("Timed out");
                break;
            }
        };

        match event {
            DeviceEvent::ManagerStateChanged(ManagerState::Idle) => {
                let stored = manager.stored_peripherals();
                if let Some(peripheral) = stored.first() {
                    println!("Reconnecting to stored peripheral {}", peripheral.id());
                    manager.connect(peripheral)?;
                } else {
                    println!("Scanning for Thingy devices...");
                    manager.discover_devices(false)?;
                }
            }
            DeviceEvent::PeripheralDiscovered {
                peripheral,
                pairing_code,
                rssi,
            } => {
                println!(
                    "Discovered {} ({}) pairing code {:?}, RSSI {:?} dBm",
                    peripheral.name().unwrap_or_else(|| "unnamed".to_string()),
                    peripheral.id(),
                    pairing_code,
                    rssi
                );
                manager.stop_scan()?;
                manager.add_peripheral(&peripheral)?;
                manager.connect(&peripheral)?;
            }
            DeviceEvent::PeripheralStateChanged { peripheral, state } => {
                println!("{}: {}", peripheral, state);
                if state != PeripheralState::Ready {
                    continue;
                }
                let Some(peripheral) = manager.peripheral(peripheral) else {
                    continue;
                };

                let configuration = peripheral.configuration_service()?;
                configuration.refresh_all()?;

                let ui = peripheral.ui_service()?;
                ui.set_led(LedState::Breathe {
                    color: LedColor::Green,
                    intensity: 20,
                    delay_ms: 3500,
                })?;

                let environment = peripheral.environment_service()?;
                let _temperature = environment.on_temperature(|celsius| {
                    println!("  Temperature: {:.2}°C", celsius);
                });
                environment.start_all_notifications()?;

                tokio::time::sleep(Duration::from_secs(15)).await;

                println!("  Name: {}", configuration.device_name()?);
                println!("  Firmware: {:?}", configuration.firmware_version()?);
                println!("  Humidity: {:?}%", environment.humidity()?);
                break;
            }
            _ => {}
        }
    }

    manager.shutdown()?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
