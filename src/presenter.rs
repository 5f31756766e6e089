/// Log-based consumer of the acquisition loop
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ExposureConfig;
use crate::exposure::{ev_from_lux, solve, Solution, EV_OUT_OF_RANGE};
use crate::models::{Command, Telemetry};
use crate::utils::{format_ev, format_lux};

/// How often a command stuck behind a full channel is resent
const COMMAND_RETRY: Duration = Duration::from_millis(100);

/// Totals for one presenter session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub started: OffsetDateTime,
    pub finished: OffsetDateTime,
    /// Telemetry messages received
    pub readings: u64,
    /// Readings flagged as sensor over range
    pub over_range: u64,
}

/// Consumer side of the telemetry and command channels
pub struct Presenter {
    commands: Sender<Command>,
    pending: Option<Command>,
    exposure: ExposureConfig,
    started: OffsetDateTime,
    readings: u64,
    over_range: u64,
}

impl Presenter {
    pub fn new(commands: Sender<Command>, exposure: ExposureConfig) -> Self {
        Presenter {
            commands,
            pending: None,
            exposure,
            started: OffsetDateTime::now_utc(),
            readings: 0,
            over_range: 0,
        }
    }

    /// Queue a command for the acquisition loop
    ///
    /// Only the newest command is kept, except that a pending quit is never
    /// replaced. Returns true when the command went out immediately.
    pub fn request(&mut self, command: Command) -> bool {
        if !matches!(self.pending, Some(Command::Quit)) {
            self.pending = Some(command);
        }
        self.flush()
    }

    /// Retry the pending command, true once nothing is left to send
    fn flush(&mut self) -> bool {
        let command = match self.pending.take() {
            Some(command) => command,
            None => return true,
        };
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                debug!("Command channel full, will retry");
                self.pending = Some(command);
                false
            }
            Err(TrySendError::Closed(command)) => {
                warn!("Acquisition loop gone, dropping {:?}", command);
                true
            }
        }
    }

    /// Log one reading with its exposure suggestion
    pub fn report(&mut self, message: &Telemetry) -> Option<Solution> {
        self.readings += 1;
        if message.lux < 0.0 {
            self.over_range += 1;
        }

        let s = &message.state;
        debug!(
            "ch: {},{} mode: {} {} int: {} seq: {}",
            s.ch0,
            s.ch1,
            s.mode.label(),
            if s.high_gain { "hi" } else { "lo" },
            s.int_time,
            s.sequence
        );

        let ev = ev_from_lux(message.med_lux);
        let ev_max = ev_from_lux(message.max_lux);
        let metered = ev_from_lux(
            self.exposure
                .metering
                .lux(message.med_lux, message.max_lux),
        );
        let solution = (metered > EV_OUT_OF_RANGE)
            .then(|| solve(metered, self.exposure.known, self.exposure.solve));

        info!(
            "Lux: {} (EV {}), max: {} (EV {}) -> {}",
            format_lux(message.med_lux),
            format_ev(ev),
            format_lux(message.max_lux),
            format_ev(ev_max),
            solution
                .map(|s| s.to_string())
                .unwrap_or_else(|| "???".to_string())
        );
        solution
    }

    /// Consume telemetry until the acquisition loop closes the channel
    ///
    /// When `shutdown` completes a quit command is queued; telemetry keeps
    /// being drained until the loop acknowledges it by exiting. A pending
    /// command is retried on a timer as well, so it goes out even when no
    /// telemetry arrives.
    pub async fn run<S>(
        mut self,
        mut telemetry: Receiver<Telemetry>,
        shutdown: S,
    ) -> SessionSummary
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut quitting = false;
        let mut retry = interval(COMMAND_RETRY);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.flush();
            tokio::select! {
                _ = &mut shutdown, if !quitting => {
                    info!("Shutdown requested, stopping acquisition");
                    quitting = true;
                    self.request(Command::Quit);
                }
                _ = retry.tick(), if self.pending.is_some() => {}
                message = telemetry.recv() => match message {
                    Some(message) => {
                        self.report(&message);
                    }
                    None => break,
                }
            }
        }

        SessionSummary {
            started: self.started,
            finished: OffsetDateTime::now_utc(),
            readings: self.readings,
            over_range: self.over_range,
        }
    }
}
