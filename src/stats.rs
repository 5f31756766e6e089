/// Rolling peak and mean over recent lux samples
use std::collections::VecDeque;
use std::time::Duration;

use crate::models::LuxSample;

/// Default length of the trailing window
pub const MEAN_TIME: Duration = Duration::from_secs(3);

/// Time-bounded FIFO of lux samples
///
/// Samples must be pushed in timestamp order. Each push evicts the samples
/// that fell out of the trailing window relative to the new sample, so the
/// window always contains at least the sample just pushed.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    span: Duration,
    samples: VecDeque<LuxSample>,
}

impl StatsWindow {
    pub fn new(span: Duration) -> Self {
        StatsWindow {
            span,
            samples: VecDeque::new(),
        }
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    /// Append a sample and evict everything older than `span` before it
    pub fn push(&mut self, sample: LuxSample) {
        let now = sample.timestamp;
        self.samples.push_back(sample);

        // checked_sub fails only when the window reaches back past the clock origin
        if let Some(cutoff) = now.checked_sub(self.span) {
            while let Some(front) = self.samples.front() {
                if front.timestamp >= cutoff {
                    break;
                }
                self.samples.pop_front();
            }
        }
    }

    /// Largest retained value, `0.0` when empty
    pub fn max(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.value)
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Arithmetic mean of retained values, `0.0` when empty
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s.value).sum();
        sum / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest retained sample
    pub fn oldest(&self) -> Option<&LuxSample> {
        self.samples.front()
    }
}

impl Default for StatsWindow {
    fn default() -> Self {
        StatsWindow::new(MEAN_TIME)
    }
}
