/// Acquisition loop: poll the meter, publish telemetry, apply auto-ranging
use log::{debug, error, info, warn};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{timeout, Duration, Instant};

use crate::bluetooth::Device;
use crate::controller::{AutoRanger, ControllerConfig, ProfileSelection};
use crate::error::{AcquisitionError, DecodeError, DeviceError};
use crate::lux::lux_of;
use crate::models::{Command, LuxSample, Settings, Telemetry};
use crate::protocol::decode;
use crate::stats::{StatsWindow, MEAN_TIME};

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub controller: ControllerConfig,
    /// Length of the rolling max/mean window
    pub mean_time: Duration,
    /// Settings assumed until the first manual command. Their integration
    /// time is merged into every auto-ranging step.
    pub initial_settings: Settings,
    /// Give up on a device read after this long
    pub read_timeout: Option<Duration>,
    /// Stop after this many consecutive undecodable frames
    pub max_decode_failures: Option<u32>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            controller: ControllerConfig::default(),
            mean_time: MEAN_TIME,
            initial_settings: Settings::default(),
            read_timeout: None,
            max_decode_failures: None,
        }
    }
}

/// What to do after handling a command
enum Flow {
    Continue,
    Quit,
}

/// Owns the device and all sensor-side state
pub struct Acquisition<D> {
    device: D,
    config: AcquisitionConfig,
    ranger: AutoRanger,
    window: StatsWindow,
    profile: ProfileSelection,
    manual: Settings,
    decode_failures: u32,
}

impl<D: Device> Acquisition<D> {
    pub fn new(device: D, config: AcquisitionConfig) -> Self {
        Acquisition {
            device,
            ranger: AutoRanger::new(config.controller.clone()),
            window: StatsWindow::new(config.mean_time),
            profile: ProfileSelection::Manual,
            manual: config.initial_settings,
            decode_failures: 0,
            config,
        }
    }

    /// Run until a quit command arrives or the device fails
    ///
    /// Telemetry is offered with `try_send` and dropped when the consumer
    /// has not drained the previous message. At most one command is taken
    /// per cycle. The device is closed on every exit path.
    pub async fn run(
        mut self,
        telemetry: Sender<Telemetry>,
        mut commands: Receiver<Command>,
    ) -> Result<(), AcquisitionError> {
        info!("Starting acquisition loop");

        let result = self.run_cycles(&telemetry, &mut commands).await;
        if let Err(e) = &result {
            error!("Acquisition loop stopped: {}", e);
        }

        let closed = self.device.close().await;
        match (result, closed) {
            (Err(e), Err(close_error)) => {
                warn!("Failed to close device: {}", close_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(close_error)) => Err(close_error.into()),
            (Ok(()), Ok(())) => {
                info!("Acquisition loop finished");
                Ok(())
            }
        }
    }

    async fn run_cycles(
        &mut self,
        telemetry: &Sender<Telemetry>,
        commands: &mut Receiver<Command>,
    ) -> Result<(), AcquisitionError> {
        loop {
            if let Some((message, now)) = self.poll().await? {
                let state = message.state;
                publish(telemetry, message);
                self.adjust(state.ch0, state.ch1, now).await?;
            }

            let command = match commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => {
                    info!("Command channel closed, stopping");
                    return Ok(());
                }
            };
            if let Flow::Quit = self.handle_command(command).await? {
                info!("Quit requested");
                return Ok(());
            }
        }
    }

    /// Read and compute one reading with its timestamp. Returns `None` when
    /// the frame could not be decoded.
    async fn poll(&mut self) -> Result<Option<(Telemetry, Instant)>, AcquisitionError> {
        let frame = self.read_frame().await?;
        let state = match decode(&frame) {
            Ok(state) => {
                self.decode_failures = 0;
                state
            }
            Err(e) => {
                self.record_decode_failure(e)?;
                return Ok(None);
            }
        };

        let now = Instant::now();
        let lux = lux_of(&state);
        self.window.push(LuxSample {
            timestamp: now,
            value: lux,
        });
        let message = Telemetry {
            lux,
            max_lux: self.window.max(),
            med_lux: self.window.mean(),
            state,
        };

        Ok(Some((message, now)))
    }

    /// Write the controller's next step, if any, after the reading is out
    async fn adjust(&mut self, ch0: u16, ch1: u16, now: Instant) -> Result<(), AcquisitionError> {
        if let Some(step) = self.ranger.evaluate(&self.profile, ch0, ch1, now) {
            self.device
                .write(step.with_int_time(self.manual.int_time))
                .await?;
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        match self.config.read_timeout {
            Some(limit) => timeout(limit, self.device.read())
                .await
                .map_err(|_| DeviceError::Timeout(limit))?,
            None => self.device.read().await,
        }
    }

    fn record_decode_failure(&mut self, e: DecodeError) -> Result<(), AcquisitionError> {
        self.decode_failures = self.decode_failures.saturating_add(1);
        warn!(
            "Skipping frame: {} ({} in a row)",
            e, self.decode_failures
        );
        match self.config.max_decode_failures {
            Some(limit) if self.decode_failures > limit => {
                Err(AcquisitionError::PersistentDecodeFailure {
                    count: self.decode_failures,
                    last: e,
                })
            }
            _ => Ok(()),
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow, AcquisitionError> {
        match command {
            Command::Quit => Ok(Flow::Quit),
            Command::Set { profile, settings } => {
                self.profile = ProfileSelection::lookup(&profile);
                if self.profile.is_manual() {
                    self.manual = settings;
                    self.device.write(settings).await?;
                }
                debug!("Profile set to {}", self.profile.name());
                Ok(Flow::Continue)
            }
        }
    }
}

fn publish(telemetry: &Sender<Telemetry>, message: Telemetry) {
    match telemetry.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => debug!("Consumer busy, telemetry dropped"),
        Err(TrySendError::Closed(_)) => debug!("No consumer, telemetry dropped"),
    }
}
