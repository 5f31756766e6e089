/// BlueLightMeter over the RFduino GATT service
use bluer::gatt::remote::Characteristic;
use bluer::UuidExt;
use log::{debug, info, warn};
use tokio::time::{sleep, Duration, Instant};

use super::scanner::{find_light_meter, DeviceMatch};
use super::Device;
use crate::error::DeviceError;
use crate::models::Settings;

// RFduino GATT layout
const RFDUINO_SERVICE: u16 = 0x2220;
const RFDUINO_RECEIVE: u16 = 0x2221; // device -> host reports
const RFDUINO_SEND: u16 = 0x2222; // host -> device configuration

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Where and how to find the light meter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Connect to this address instead of scanning by name
    pub mac_address: Option<String>,
    /// Advertised name to scan for
    pub name: String,
    /// Bluetooth adapter, e.g. hci0
    pub adapter: String,
    /// Bound for scan, connect and service resolution
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            mac_address: None,
            name: "RFduino".to_string(),
            adapter: "hci0".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Connected BlueLightMeter
pub struct BleLightMeter {
    // Keeps the D-Bus connection alive for the device handles below
    _session: bluer::Session,
    device: bluer::Device,
    receive: Characteristic,
    send: Characteristic,
    closed: bool,
}

impl BleLightMeter {
    /// Locate, connect and resolve the GATT characteristics of the meter
    pub async fn connect(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let wanted = match &config.mac_address {
            Some(mac) => DeviceMatch::Address(
                mac.parse()
                    .map_err(|_| DeviceError::InvalidAddress(mac.clone()))?,
            ),
            None => DeviceMatch::Name(config.name.clone()),
        };

        let session = bluer::Session::new().await?;
        let adapter = session.adapter(&config.adapter)?;
        adapter.set_powered(true).await?;

        let device = find_light_meter(&adapter, &wanted, config.timeout).await?;
        let addr = device.address();

        info!("Connecting to light meter {}", addr);
        if !device.is_connected().await? {
            device.connect().await?;
        }
        let handle = &device;
        wait_until(config.timeout, || async move { handle.is_connected().await }).await?;
        if !device.is_connected().await? {
            if let Err(e) = device.disconnect().await {
                warn!("Failed to disconnect {}: {}", addr, e);
            }
            return Err(DeviceError::ConnectFailed(addr.to_string()));
        }
        info!("Connected");

        wait_until(config.timeout, || async move {
            handle.is_services_resolved().await
        })
        .await?;
        let (receive, send) = find_characteristics(&device).await?;

        Ok(BleLightMeter {
            _session: session,
            device,
            receive,
            send,
            closed: false,
        })
    }
}

/// Poll `check` until it yields true or `limit` expires
async fn wait_until<F, Fut>(limit: Duration, check: F) -> Result<(), DeviceError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bluer::Result<bool>>,
{
    let deadline = Instant::now() + limit;
    while !check().await? {
        if Instant::now() >= deadline {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

async fn find_characteristics(
    device: &bluer::Device,
) -> Result<(Characteristic, Characteristic), DeviceError> {
    for service in device.services().await? {
        if service.uuid().await?.as_u16() != Some(RFDUINO_SERVICE) {
            continue;
        }

        let mut receive = None;
        let mut send = None;
        for characteristic in service.characteristics().await? {
            match characteristic.uuid().await?.as_u16() {
                Some(RFDUINO_RECEIVE) => receive = Some(characteristic),
                Some(RFDUINO_SEND) => send = Some(characteristic),
                other => debug!("Ignoring characteristic {:?}", other),
            }
        }

        return match (receive, send) {
            (Some(receive), Some(send)) => Ok((receive, send)),
            (None, _) => Err(DeviceError::MissingCharacteristic("receive characteristic")),
            (_, None) => Err(DeviceError::MissingCharacteristic("send characteristic")),
        };
    }
    Err(DeviceError::MissingCharacteristic("RFduino service"))
}

impl Device for BleLightMeter {
    async fn read(&mut self) -> Result<Vec<u8>, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(self.receive.read().await?)
    }

    async fn write(&mut self, settings: Settings) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        debug!(
            "Writing settings: mode={} high_gain={} int_time={}",
            settings.mode.label(),
            settings.high_gain,
            settings.int_time
        );
        self.send.write(&settings.encode()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.disconnect().await?;
        info!("Disconnected");
        Ok(())
    }
}
