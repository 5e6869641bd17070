use std::collections::BTreeMap;

use super::{Lifecycle, Metric, MetricState, StartKind};
use crate::{
    config::{DEFAULT_OUTLIER_THRESHOLD, Groundtruth, MetricKind},
    report::{MetricResult, ResultAggregator},
    sample::{DataStamped, FramePair, PoseSample, Timestamp},
};

/// Distance travelled by `measured_frame` relative to `root_frame`.
///
/// Each accepted sample adds its displacement from the previous accepted
/// sample (the reference) to a running total. The first sample after a start
/// or a resume only sets the reference, so motion during a pause never counts.
///
/// A displacement at or above the outlier threshold is physically implausible
/// between two consecutive samples and is dropped as a tracking failure; the
/// reference stays where it was. The total is never rounded.
#[derive(Debug, Clone)]
pub struct PathLengthMetric {
    lifecycle: Lifecycle,
    frames: FramePair,
    groundtruth: Option<Groundtruth>,
    sample_topic: Option<String>,
    outlier_threshold: f64,
    reference: Option<PoseSample>,
    path_length: f64,
    series: Vec<DataStamped>,
    rejected: usize,
}

impl PathLengthMetric {
    pub fn new(frames: FramePair, groundtruth: Option<Groundtruth>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            frames,
            groundtruth,
            sample_topic: None,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            reference: None,
            path_length: 0.0,
            series: Vec::new(),
            rejected: 0,
        }
    }

    pub fn with_outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = threshold;
        self
    }

    pub fn with_sample_topic(mut self, topic: impl Into<String>) -> Self {
        self.sample_topic = Some(topic.into());
        self
    }

    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    pub fn outlier_threshold(&self) -> f64 {
        self.outlier_threshold
    }

    /// Number of samples dropped as outliers.
    pub fn rejected_samples(&self) -> usize {
        self.rejected
    }

    pub fn series(&self) -> &[DataStamped] {
        &self.series
    }
}

impl Metric for PathLengthMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::PathLength
    }

    fn state(&self) -> MetricState {
        self.lifecycle.state()
    }

    fn start(&mut self, stamp: Timestamp) {
        match self.lifecycle.start() {
            Some(StartKind::Fresh) => {
                tracing::debug!(frames = %self.frames, ?stamp, "path length started");
            }
            Some(StartKind::Resume) => {
                self.reference = None;
                tracing::debug!(frames = %self.frames, ?stamp, "path length resumed");
            }
            None => {
                tracing::debug!(state = ?self.lifecycle.state(), "ignoring start");
            }
        }
    }

    fn pause(&mut self, _stamp: Timestamp) {
        if self.lifecycle.pause() {
            self.reference = None;
        } else {
            tracing::debug!(state = ?self.lifecycle.state(), "ignoring pause");
        }
    }

    fn purge(&mut self, _stamp: Timestamp) {
        // Samples are consumed as they arrive; nothing is ever buffered.
    }

    fn stop(&mut self, stamp: Timestamp) {
        if self.lifecycle.stop().is_some() {
            self.reference = None;
            tracing::debug!(
                frames = %self.frames,
                ?stamp,
                path_length = self.path_length,
                rejected = self.rejected,
                "path length stopped"
            );
        } else {
            tracing::debug!(state = ?self.lifecycle.state(), "ignoring stop");
        }
    }

    fn update(&mut self, sample: &PoseSample) {
        if !self.lifecycle.is_active() {
            return;
        }

        let Some(reference) = self.reference else {
            self.reference = Some(*sample);
            return;
        };

        if sample.stamp <= reference.stamp {
            tracing::trace!(
                stamp = ?sample.stamp,
                reference = ?reference.stamp,
                "dropping stale pose"
            );
            return;
        }

        let increment = sample.distance_to(&reference);
        if increment >= self.outlier_threshold {
            self.rejected += 1;
            tracing::warn!(
                frames = %self.frames,
                increment,
                threshold = self.outlier_threshold,
                "pose jump exceeds threshold, discarding sample as tracking failure"
            );
            return;
        }

        self.path_length += increment;
        self.reference = Some(*sample);
        self.series
            .push(DataStamped::new(sample.stamp, self.path_length));
    }

    fn frames(&self) -> Option<&FramePair> {
        Some(&self.frames)
    }

    fn sample_topic(&self) -> Option<&str> {
        self.sample_topic.as_deref()
    }

    fn recorded(&self) -> usize {
        self.series.len()
    }

    fn result(&self) -> MetricResult {
        let mut details = BTreeMap::new();
        details.insert("root_frame".to_string(), self.frames.root_frame.clone());
        details.insert(
            "measured_frame".to_string(),
            self.frames.measured_frame.clone(),
        );
        details.insert("rejected_samples".to_string(), self.rejected.to_string());

        ResultAggregator::builder()
            .name(MetricKind::PathLength.as_str())
            .started(self.lifecycle.started())
            .finished(self.lifecycle.finished())
            .series(&self.series)
            .groundtruth(self.groundtruth)
            .details(details)
            .build()
            .evaluate()
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

    fn pose(x: f64, t: f64) -> PoseSample {
        PoseSample::from_translation([x, 0.0, 0.0], secs(t))
    }

    fn metric() -> PathLengthMetric {
        PathLengthMetric::new(FramePair::new("map", "base_link"), None)
    }

    #[test]
    fn zero_displacement_stays_zero() {
        let mut m = metric();
        m.start(secs(0.0));
        for i in 0..10 {
            m.update(&PoseSample::from_translation([1.5, -2.0, 0.3], secs(i as f64 * 0.01)));
        }
        assert_eq!(m.path_length(), 0.0);
    }

    #[test]
    fn first_sample_only_seeds() {
        let mut m = metric();
        m.start(secs(0.0));
        m.update(&pose(5.0, 0.0));
        assert_eq!(m.path_length(), 0.0);
        assert!(m.series().is_empty());
    }

    #[test]
    fn n_steps_integrate_to_n_minus_one() {
        let mut m = metric();
        m.start(secs(0.0));
        let n = 20;
        let step = 0.3;
        for i in 0..n {
            m.update(&pose(i as f64 * step, i as f64 * 0.05));
        }
        assert!((m.path_length() - (n - 1) as f64 * step).abs() < 1e-9);
        assert_eq!(m.series().len(), n - 1);
    }

    #[test]
    fn outlier_is_discarded_and_reference_kept() {
        let mut m = metric();
        m.start(secs(0.0));
        m.update(&pose(0.0, 0.0));
        m.update(&pose(0.5, 0.1));
        m.update(&pose(2.5, 0.2));
        assert_eq!(m.path_length(), 0.5);
        assert_eq!(m.rejected_samples(), 1);

        // measured from 0.5, not from 2.5
        m.update(&pose(0.7, 0.3));
        assert!((m.path_length() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn displacement_equal_to_threshold_is_an_outlier() {
        let mut m = metric().with_outlier_threshold(0.5);
        m.start(secs(0.0));
        m.update(&pose(0.0, 0.0));
        m.update(&pose(0.5, 0.1));
        assert_eq!(m.path_length(), 0.0);
        assert_eq!(m.rejected_samples(), 1);
    }

    #[test]
    fn pause_gap_is_not_counted() {
        let mut m = metric();
        m.start(secs(0.0));
        m.update(&pose(0.0, 0.0));
        m.update(&pose(0.2, 0.1));
        m.pause(secs(0.2));
        // ignored while paused
        m.update(&pose(0.6, 0.3));
        m.start(secs(1.0));
        m.update(&pose(0.8, 1.0));
        m.update(&pose(0.95, 1.1));
        m.stop(secs(2.0));

        assert!((m.path_length() - 0.35).abs() < 1e-12);
    }

    #[test]
    fn updates_before_start_and_after_stop_are_ignored() {
        let mut m = metric();
        m.update(&pose(0.0, 0.0));
        m.update(&pose(0.5, 0.1));
        m.start(secs(1.0));
        m.update(&pose(0.0, 1.0));
        m.update(&pose(0.1, 1.1));
        m.stop(secs(2.0));
        m.update(&pose(0.2, 2.1));
        m.start(secs(3.0));
        m.update(&pose(0.3, 3.1));

        assert!((m.path_length() - 0.1).abs() < 1e-12);
        assert_eq!(m.state(), MetricState::Finished);
    }

    #[test]
    fn repeated_pose_is_not_recorded_twice() {
        let mut m = metric();
        m.start(secs(0.0));
        m.update(&pose(0.0, 0.0));
        m.update(&pose(0.2, 0.1));
        m.update(&pose(0.2, 0.1));
        assert_eq!(m.series().len(), 1);
        assert_eq!(m.path_length(), 0.2);
    }

    #[test]
    fn out_of_order_pose_is_dropped() {
        let mut m = metric();
        m.start(secs(0.0));
        m.update(&pose(0.0, 1.0));
        m.update(&pose(0.3, 0.5));
        assert_eq!(m.path_length(), 0.0);
        m.update(&pose(0.3, 1.5));
        assert!((m.path_length() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn result_carries_frames_and_groundtruth_verdict() {
        let mut m = PathLengthMetric::new(
            FramePair::new("map", "base_link"),
            Some(Groundtruth::new(0.4, 0.05)),
        );
        m.start(secs(0.0));
        for i in 0..5 {
            m.update(&pose(i as f64 * 0.1, i as f64 * 0.05));
        }
        m.stop(secs(0.25));

        let result = m.result();
        assert_eq!(result.name, "path_length");
        assert_eq!(result.details["root_frame"], "map");
        assert_eq!(result.details["measured_frame"], "base_link");
        assert_eq!(result.details["rejected_samples"], "0");
        assert_eq!(result.groundtruth_result, GroundtruthResult::Pass);
        assert_eq!(result.series.len(), 4);
        assert_eq!(result.data.unwrap().stamp, secs(0.2));
    }

    #[test]
    fn series_is_time_ordered_and_non_decreasing() {
        let mut m = metric();
        m.start(secs(0.0));
        let xs = [0.0, 0.1, 0.05, 3.0, 0.2, 0.2, 0.6];
        for (i, x) in xs.iter().enumerate() {
            m.update(&pose(*x, i as f64 * 0.1));
        }
        let series = m.series();
        assert!(series.windows(2).all(|w| w[0].stamp <= w[1].stamp));
        assert!(series.windows(2).all(|w| w[0].data <= w[1].data));
    }
}
