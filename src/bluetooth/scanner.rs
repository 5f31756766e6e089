/// Bluetooth Low Energy discovery of the light meter
use futures_util::{pin_mut, StreamExt};
use log::{debug, info, warn};
use tokio::time::{timeout, Duration};

use crate::error::DeviceError;

/// How to recognize the light meter among discovered devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    /// Known MAC address
    Address(bluer::Address),
    /// Advertised local name
    Name(String),
}

impl DeviceMatch {
    async fn matches(&self, device: &bluer::Device) -> bool {
        match self {
            DeviceMatch::Address(addr) => device.address() == *addr,
            DeviceMatch::Name(name) => match device.name().await {
                Ok(Some(advertised)) => advertised == *name,
                Ok(None) => false,
                Err(e) => {
                    debug!("Failed to get name of {}: {}", device.address(), e);
                    false
                }
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            DeviceMatch::Address(addr) => addr.to_string(),
            DeviceMatch::Name(name) => name.clone(),
        }
    }
}

/// Discover the light meter on `adapter`
///
/// Devices already known to BlueZ are checked first, then LE discovery runs
/// until a match shows up or `scan_timeout` expires.
///
/// # Arguments
/// * `adapter` - Powered Bluetooth adapter
/// * `wanted` - Address or advertised name to look for
/// * `scan_timeout` - Upper bound for the whole discovery
pub async fn find_light_meter(
    adapter: &bluer::Adapter,
    wanted: &DeviceMatch,
    scan_timeout: Duration,
) -> Result<bluer::Device, DeviceError> {
    for addr in adapter.device_addresses().await? {
        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };
        if wanted.matches(&device).await {
            info!("Found known light meter {}", addr);
            return Ok(device);
        }
    }

    // Configure discovery filter for Low Energy devices only
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!("Scanning for light meter {}", wanted.describe());
    let events = adapter.discover_devices().await?;
    pin_mut!(events);

    let found = timeout(scan_timeout, async {
        while let Some(event) = events.next().await {
            let addr = match event {
                bluer::AdapterEvent::DeviceAdded(addr) => addr,
                other => {
                    debug!("Discovery event: {:?}", other);
                    continue;
                }
            };
            let device = match adapter.device(addr) {
                Ok(device) => device,
                Err(_) => continue,
            };
            if wanted.matches(&device).await {
                return Some(device);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(device)) => {
            info!("Found: {}", device.address());
            Ok(device)
        }
        Ok(None) | Err(_) => Err(DeviceError::NotFound(wanted.describe())),
    }
}
