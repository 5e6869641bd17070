//! Metrics and their lifecycle contract.
//!
//! Every metric follows the same single-shot lifecycle (see [`Lifecycle`]):
//! it is started, optionally paused and resumed any number of times, and
//! stopped exactly once. Samples only count while the metric is active, and a
//! result is only available once the metric has been both started and stopped.
//!
//! The set of metric kinds is closed: [`AnyMetric`] holds one of the built-in
//! kinds and dispatches to it. New kinds are added as new variants.
//!
//! Metrics are fed from two independent paths (the orchestrator driving the
//! lifecycle and a sampler delivering poses), so they are shared through a
//! [`MetricHandle`], which serializes both paths behind one lock.
mod lifecycle;
mod path_length;
mod time;

pub use lifecycle::{Lifecycle, MetricState, StartKind};
pub use path_length::PathLengthMetric;
pub use time::TimeMetric;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::MetricKind,
    report::MetricResult,
    sample::{FramePair, PoseSample, Timestamp},
};

/// Lifecycle and result contract shared by all metric kinds.
///
/// Lifecycle calls that are not allowed in the current state are ignored.
pub trait Metric: Send {
    fn kind(&self) -> MetricKind;

    fn state(&self) -> MetricState;

    /// Begin accumulating, or resume after a pause.
    fn start(&mut self, stamp: Timestamp);

    /// Suspend accumulation without finishing.
    fn pause(&mut self, stamp: Timestamp);

    /// Discard anything buffered but not yet consumed.
    fn purge(&mut self, stamp: Timestamp);

    /// Finish the metric. No further accumulation happens afterwards.
    fn stop(&mut self, stamp: Timestamp);

    /// Feed one pose sample. Ignored unless active.
    fn update(&mut self, sample: &PoseSample);

    /// Frames observed by spatial metrics.
    fn frames(&self) -> Option<&FramePair> {
        None
    }

    /// Push topic this metric is restricted to, if any.
    fn sample_topic(&self) -> Option<&str> {
        None
    }

    /// Series entries recorded so far.
    fn recorded(&self) -> usize;

    fn result(&self) -> MetricResult;
}

/// One of the built-in metric kinds.
#[derive(Debug, Clone)]
pub enum AnyMetric {
    Time(TimeMetric),
    PathLength(PathLengthMetric),
}

macro_rules! dispatch {
    ($self:ident, $m:ident => $e:expr) => {
        match $self {
            AnyMetric::Time($m) => $e,
            AnyMetric::PathLength($m) => $e,
        }
    };
}

impl Metric for AnyMetric {
    fn kind(&self) -> MetricKind {
        dispatch!(self, m => m.kind())
    }

    fn state(&self) -> MetricState {
        dispatch!(self, m => m.state())
    }

    fn start(&mut self, stamp: Timestamp) {
        dispatch!(self, m => m.start(stamp))
    }

    fn pause(&mut self, stamp: Timestamp) {
        dispatch!(self, m => m.pause(stamp))
    }

    fn purge(&mut self, stamp: Timestamp) {
        dispatch!(self, m => m.purge(stamp))
    }

    fn stop(&mut self, stamp: Timestamp) {
        dispatch!(self, m => m.stop(stamp))
    }

    fn update(&mut self, sample: &PoseSample) {
        dispatch!(self, m => m.update(sample))
    }

    fn frames(&self) -> Option<&FramePair> {
        dispatch!(self, m => m.frames())
    }

    fn sample_topic(&self) -> Option<&str> {
        dispatch!(self, m => m.sample_topic())
    }

    fn recorded(&self) -> usize {
        dispatch!(self, m => m.recorded())
    }

    fn result(&self) -> MetricResult {
        dispatch!(self, m => m.result())
    }
}

impl From<TimeMetric> for AnyMetric {
    fn from(value: TimeMetric) -> Self {
        AnyMetric::Time(value)
    }
}

impl From<PathLengthMetric> for AnyMetric {
    fn from(value: PathLengthMetric) -> Self {
        AnyMetric::PathLength(value)
    }
}

/// Shared, lock-protected access to one metric.
///
/// The orchestrator and the sampler each hold a clone. Every call takes the
/// lock for its whole duration, so a `stop` is seen by the very next `update`
/// and a pause/resume never interleaves with a half-applied sample.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    inner: Arc<Mutex<AnyMetric>>,
    kind: MetricKind,
    frames: Option<FramePair>,
    sample_topic: Option<String>,
}

impl MetricHandle {
    pub fn new(metric: impl Into<AnyMetric>) -> Self {
        let metric = metric.into();
        Self {
            kind: metric.kind(),
            frames: metric.frames().cloned(),
            sample_topic: metric.sample_topic().map(str::to_string),
            inner: Arc::new(Mutex::new(metric)),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Frames of a spatial metric. Fixed for the metric's lifetime, so no lock is taken.
    pub fn frames(&self) -> Option<&FramePair> {
        self.frames.as_ref()
    }

    pub fn sample_topic(&self) -> Option<&str> {
        self.sample_topic.as_deref()
    }

    /// Whether pushes from `topic` are meant for this metric.
    pub fn accepts_topic(&self, topic: &str) -> bool {
        self.sample_topic.as_deref().is_none_or(|t| t == topic)
    }

    pub fn state(&self) -> MetricState {
        self.inner.lock().state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == MetricState::Active
    }

    pub fn start(&self, stamp: Timestamp) {
        self.inner.lock().start(stamp);
    }

    pub fn pause(&self, stamp: Timestamp) {
        self.inner.lock().pause(stamp);
    }

    pub fn purge(&self, stamp: Timestamp) {
        self.inner.lock().purge(stamp);
    }

    pub fn stop(&self, stamp: Timestamp) {
        self.inner.lock().stop(stamp);
    }

    pub fn update(&self, sample: &PoseSample) {
        self.inner.lock().update(sample);
    }

    /// Feed several samples under a single lock, in order.
    pub fn update_all<'a>(&self, samples: impl IntoIterator<Item = &'a PoseSample>) -> usize {
        let mut metric = self.inner.lock();
        let mut fed = 0;
        for sample in samples {
            metric.update(sample);
            fed += 1;
        }
        fed
    }

    /// Progress of a running metric. Unlike [`MetricHandle::result`], this
    /// is meaningful before the metric stops.
    pub fn recorded(&self) -> usize {
        self.inner.lock().recorded()
    }

    pub fn result(&self) -> MetricResult {
        self.inner.lock().result()
    }
}

impl From<AnyMetric> for MetricHandle {
    fn from(value: AnyMetric) -> Self {
        MetricHandle::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::GroundtruthResult;
    use std::time::Duration;

    fn secs(s: f64) -> Timestamp {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn dispatch_reaches_each_kind() {
        let time: AnyMetric = TimeMetric::new(None).into();
        let path: AnyMetric = PathLengthMetric::new(FramePair::new("map", "base_link"), None).into();

        assert_eq!(time.kind(), MetricKind::Time);
        assert_eq!(path.kind(), MetricKind::PathLength);
        assert!(time.frames().is_none());
        assert_eq!(path.frames(), Some(&FramePair::new("map", "base_link")));
    }

    #[test]
    fn handle_shares_state_between_clones() {
        let handle = MetricHandle::new(PathLengthMetric::new(FramePair::new("map", "base_link"), None));
        let sampler_side = handle.clone();

        handle.start(secs(0.0));
        assert!(sampler_side.is_active());
        let fed = sampler_side.update_all(&[
            PoseSample::from_translation([0.0, 0.0, 0.0], secs(0.0)),
            PoseSample::from_translation([0.5, 0.0, 0.0], secs(0.1)),
        ]);
        assert_eq!(fed, 2);

        handle.stop(secs(1.0));
        // in flight after stop
        sampler_side.update(&PoseSample::from_translation([0.9, 0.0, 0.0], secs(1.1)));

        let result = handle.result();
        assert_eq!(result.data.map(|d| d.data), Some(0.5));
        assert_eq!(result.groundtruth_result, GroundtruthResult::Unknown);
    }

    #[test]
    fn topic_filter() {
        let open = MetricHandle::new(PathLengthMetric::new(FramePair::new("a", "b"), None));
        let restricted = MetricHandle::new(
            PathLengthMetric::new(FramePair::new("a", "b"), None).with_sample_topic("/tf_gt"),
        );

        assert!(open.accepts_topic("/tf"));
        assert!(restricted.accepts_topic("/tf_gt"));
        assert!(!restricted.accepts_topic("/tf"));
    }
}
