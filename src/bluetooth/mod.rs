pub mod device;
pub mod scanner;

use std::future::Future;

use crate::error::DeviceError;
use crate::models::Settings;

pub use device::{BleLightMeter, DeviceConfig};
pub use scanner::find_light_meter;

/// A connected light meter
///
/// Only the acquisition loop calls these, so implementations need no
/// internal locking.
pub trait Device: Send {
    /// Read the latest raw report frame
    fn read(&mut self) -> impl Future<Output = Result<Vec<u8>, DeviceError>> + Send;

    /// Send new gain and integration settings
    fn write(&mut self, settings: Settings) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Disconnect. Further reads and writes fail with [`DeviceError::Closed`].
    fn close(&mut self) -> impl Future<Output = Result<(), DeviceError>> + Send;
}
