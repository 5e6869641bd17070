use std::time::Duration;

use super::{Lifecycle, Metric, MetricState};
use crate::{
    config::{Groundtruth, MetricKind},
    report::{MetricResult, ResultAggregator},
    sample::{DataStamped, PoseSample, Timestamp},
};

/// Active time between activation and termination, in seconds.
///
/// Time spent paused is excluded: every pause closes the running interval and
/// every resume opens a new one. The sum is rounded to microseconds when the
/// metric stops and recorded as the single series entry.
#[derive(Debug, Clone)]
pub struct TimeMetric {
    lifecycle: Lifecycle,
    groundtruth: Option<Groundtruth>,
    active_since: Option<Timestamp>,
    accumulated: Duration,
    series: Vec<DataStamped>,
}

impl TimeMetric {
    pub fn new(groundtruth: Option<Groundtruth>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            groundtruth,
            active_since: None,
            accumulated: Duration::ZERO,
            series: Vec::new(),
        }
    }

    /// Active time so far, excluding the interval currently running.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    fn close_interval(&mut self, stamp: Timestamp) {
        if let Some(since) = self.active_since.take() {
            self.accumulated += stamp.saturating_sub(since);
        }
    }
}

/// Seconds in `d`, rounded half-up to the microsecond.
fn round_to_micros(d: Duration) -> f64 {
    let micros = (d.as_nanos() + 500) / 1_000;
    micros as f64 / 1e6
}

impl Metric for TimeMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::Time
    }

    fn state(&self) -> MetricState {
        self.lifecycle.state()
    }

    fn start(&mut self, stamp: Timestamp) {
        if self.lifecycle.start().is_some() {
            self.active_since = Some(stamp);
        } else {
            tracing::debug!(state = ?self.lifecycle.state(), "ignoring start");
        }
    }

    fn pause(&mut self, stamp: Timestamp) {
        if self.lifecycle.pause() {
            self.close_interval(stamp);
        } else {
            tracing::debug!(state = ?self.lifecycle.state(), "ignoring pause");
        }
    }

    fn purge(&mut self, _stamp: Timestamp) {}

    fn stop(&mut self, stamp: Timestamp) {
        match self.lifecycle.stop() {
            Some(_) => {
                self.close_interval(stamp);
                let elapsed = round_to_micros(self.accumulated);
                self.series.push(DataStamped::new(stamp, elapsed));
                tracing::debug!(elapsed, "time stopped");
            }
            None => tracing::debug!(state = ?self.lifecycle.state(), "ignoring stop"),
        }
    }

    fn update(&mut self, _sample: &PoseSample) {}

    fn recorded(&self) -> usize {
        self.series.len()
    }

    fn result(&self) -> MetricResult {
        ResultAggregator::builder()
            .name(MetricKind::Time.as_str())
            .started(self.lifecycle.started())
            .finished(self.lifecycle.finished())
            .series(&self.series)
            .groundtruth(self.groundtruth)
            .build()
            .evaluate()
    }
}
