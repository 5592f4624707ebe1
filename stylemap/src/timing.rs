//! Wall-clock measurements of the rendering phases.

use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Duration of one named phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSample {
    /// Phase name.
    pub label: String,
    /// Time spent in the phase.
    pub elapsed: Duration,
}

/// Ordered list of measured phases.
#[derive(Debug, Clone, Default)]
pub struct Timings {
    samples: Vec<TimingSample>,
}

impl Timings {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts measuring a phase. The measurement is recorded when the returned guard is dropped.
    pub fn scope(&mut self, label: impl Into<String>) -> ScopedTimer<'_> {
        ScopedTimer {
            timings: self,
            label: label.into(),
            started: Instant::now(),
        }
    }

    /// Runs `f` and records its duration under `label`.
    pub fn time<T>(&mut self, label: impl Into<String>, f: impl FnOnce() -> T) -> T {
        let _timer = self.scope(label);
        f()
    }

    /// Appends a measurement.
    pub fn record(&mut self, label: impl Into<String>, elapsed: Duration) {
        self.samples.push(TimingSample {
            label: label.into(),
            elapsed,
        });
    }

    /// Duration of the first phase with the given label.
    pub fn get(&self, label: &str) -> Option<Duration> {
        self.samples
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.elapsed)
    }

    /// Sum of all recorded phases.
    pub fn total(&self) -> Duration {
        self.samples.iter().map(|s| s.elapsed).sum()
    }

    /// Recorded phases in the order they were finished.
    pub fn samples(&self) -> &[TimingSample] {
        &self.samples
    }

    /// Returns true if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Display for Timings {
    /// Writes one `label = duration` line per phase.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for sample in &self.samples {
            writeln!(f, "{} = {:?}", sample.label, sample.elapsed)?;
        }

        Ok(())
    }
}

/// Guard returned by [`Timings::scope`].
pub struct ScopedTimer<'a> {
    timings: &'a mut Timings,
    label: String,
    started: Instant,
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        log::debug!("{} finished in {elapsed:?}", self.label);
        self.timings.record(std::mem::take(&mut self.label), elapsed);
    }
}
