//! The `PollingSampler`: fixed-rate pose lookups.
//!
//! # High-level flow
//! 1. A `tokio::time::Interval` ticks every `1 / frequency` seconds. Missed
//!    ticks are skipped rather than bursted, so a slow source never causes a
//!    flood of back-to-back lookups.
//! 2. On each tick, every spatial metric that is currently active gets one
//!    lookup of the latest pose between its frames, bounded by `wait_timeout`
//!    (two polling periods unless configured). Lookups of one tick run
//!    concurrently, so a tick never takes longer than a single wait.
//! 3. A pose that arrives is passed to the metric's `update`; the metric
//!    itself drops poses it has already seen. A lookup that times out or finds
//!    no transform is counted and skipped until the next tick.
//!
//! Paused, idle and finished metrics are not polled at all.
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use typed_builder::TypedBuilder;

use super::{Sampler, SamplerStats, internals::*};
use crate::{
    config::{DEFAULT_SAMPLING_FREQUENCY, SamplingConfig, sampling_period},
    metric::MetricHandle,
    source::PoseSource,
};

/// Samples poses from a [`PoseSource`] at a fixed frequency.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use metron::{executor::{PollingSampler, Sampler}, source::PoseBuffer};
///
/// # async fn run(metrics: Vec<metron::metric::MetricHandle>) {
/// let source = Arc::new(PoseBuffer::new());
/// let sampler = PollingSampler::builder()
///     .source(source.clone())
///     .frequency(50.0)
///     .build();
/// let handle = sampler.spawn(metrics);
/// // ... drive the testblock ...
/// let stats = handle.shutdown().await.unwrap();
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct PollingSampler<S> {
    /// Where poses are looked up.
    pub source: S,
    /// Lookups per second.
    #[builder(default = DEFAULT_SAMPLING_FREQUENCY)]
    pub frequency: f64,
    /// Upper bound on a single lookup. Defaults to two polling periods.
    #[builder(default, setter(strip_option))]
    pub wait_timeout: Option<Duration>,
}

impl<S: PoseSource> PollingSampler<S> {
    pub fn from_config(source: S, config: &SamplingConfig) -> Self {
        Self {
            source,
            frequency: config.frequency,
            wait_timeout: config.wait_timeout,
        }
    }

    /// An unusable `frequency` (zero, negative, not finite, or so high the
    /// period rounds to zero) falls back to the default rate.
    pub fn period(&self) -> Duration {
        sampling_period(self.frequency).unwrap_or_else(|| {
            tracing::warn!(
                frequency = self.frequency,
                fallback = DEFAULT_SAMPLING_FREQUENCY,
                "unusable sampling frequency"
            );
            Duration::from_secs_f64(1.0 / DEFAULT_SAMPLING_FREQUENCY)
        })
    }

    pub fn effective_wait_timeout(&self) -> Duration {
        self.wait_timeout
            .filter(|wait| !wait.is_zero())
            .unwrap_or_else(|| self.period() * 2)
    }
}

impl<S> Sampler for PollingSampler<S>
where
    S: PoseSource + 'static,
{
    async fn run(self, metrics: Vec<MetricHandle>, mut ctx: SamplingContext) -> SamplerStats {
        let wait = self.effective_wait_timeout();
        let source = &self.source;
        let mut ticker = tokio::time::interval(self.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = SamplerStats::default();

        tracing::info!(
            frequency = self.frequency,
            ?wait,
            metrics = metrics.len(),
            "Polling sampler running"
        );

        loop {
            tokio::select! {
                biased;
                _ = ctx.shutdown_requested() => break,
                _ = ticker.tick() => {}
            }
            stats.ticks += 1;

            let lookups = metrics
                .iter()
                .filter(|metric| metric.is_active())
                .filter_map(|metric| metric.frames().map(|frames| (metric, frames)))
                .map(|(metric, frames)| async move {
                    (metric, frames, poll_once(source, frames, wait).await)
                });

            for (metric, frames, lookup) in join_all(lookups).await {
                match lookup {
                    Ok(pose) => {
                        metric.update(&pose);
                        stats.samples += 1;
                    }
                    Err(err) => {
                        stats.unavailable += 1;
                        tracing::trace!(%frames, %err, "no pose this tick");
                    }
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metric::PathLengthMetric,
        report::GroundtruthResult,
        sample::{FramePair, FramedPose, PoseSample, TransformBatch},
        source::PoseBuffer,
    };
    use std::sync::Arc;

    fn publish_x(buffer: &PoseBuffer, x: f64, t: Duration) {
        buffer.publish(&TransformBatch::new(
            "/tf",
            vec![FramedPose::new(
                "map",
                "base_link",
                PoseSample::from_translation([x, 0.0, 0.0], t),
            )],
        ));
    }

    #[test]
    fn default_wait_is_two_periods() {
        let sampler = PollingSampler::builder()
            .source(PoseBuffer::new())
            .frequency(20.0)
            .build();
        assert_eq!(sampler.period(), Duration::from_millis(50));
        assert_eq!(sampler.effective_wait_timeout(), Duration::from_millis(100));

        let sampler = PollingSampler::from_config(
            PoseBuffer::new(),
            &SamplingConfig {
                wait_timeout: Some(Duration::from_millis(5)),
                ..SamplingConfig::default()
            },
        );
        assert_eq!(sampler.effective_wait_timeout(), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_skip_unavailable_then_integrate() {
        let buffer = Arc::new(PoseBuffer::new());
        let metric = MetricHandle::new(PathLengthMetric::new(
            FramePair::new("map", "base_link"),
            Some(crate::config::Groundtruth::new(0.4, 0.05)),
        ));
        metric.start(Duration::ZERO);

        let handle = PollingSampler::builder()
            .source(buffer.clone())
            .frequency(100.0)
            .build()
            .spawn(vec![metric.clone()]);

        // nothing published yet: lookups time out
        tokio::time::sleep(Duration::from_millis(100)).await;

        for i in 0..5 {
            publish_x(&buffer, i as f64 * 0.1, Duration::from_millis(100 + i * 50));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        metric.stop(Duration::from_secs(1));
        let stats = handle.shutdown().await.unwrap();

        assert!(stats.unavailable > 0);
        assert!(stats.samples >= 5);
        let result = metric.result();
        assert!((result.data.unwrap().data - 0.4).abs() < 1e-9);
        assert_eq!(result.groundtruth_result, GroundtruthResult::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_metrics_are_not_polled() {
        let buffer = Arc::new(PoseBuffer::new());
        publish_x(&buffer, 0.0, Duration::ZERO);
        let metric = MetricHandle::new(PathLengthMetric::new(FramePair::new("map", "base_link"), None));

        let handle = PollingSampler::builder()
            .source(buffer.clone())
            .frequency(50.0)
            .build()
            .spawn(vec![metric.clone()]);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = handle.shutdown().await.unwrap();

        assert!(stats.ticks > 0);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.unavailable, 0);
    }

    #[test]
    fn unusable_frequency_falls_back_to_default_rate() {
        for frequency in [0.0, -1.0, f64::NAN, f64::INFINITY, 1.0e12] {
            let sampler = PollingSampler::builder()
                .source(PoseBuffer::new())
                .frequency(frequency)
                .build();
            assert_eq!(sampler.period(), Duration::from_millis(10));
            assert_eq!(sampler.effective_wait_timeout(), Duration::from_millis(20));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_frames_are_waited_for_together() {
        let buffer = Arc::new(PoseBuffer::new());
        let metrics: Vec<MetricHandle> = ["arm", "gripper", "camera"]
            .into_iter()
            .map(|frame| MetricHandle::new(PathLengthMetric::new(FramePair::new("map", frame), None)))
            .collect();
        for m in &metrics {
            m.start(Duration::ZERO);
        }

        // 20 ms period, 40 ms wait per lookup
        let handle = PollingSampler::builder()
            .source(buffer.clone())
            .frequency(50.0)
            .build()
            .spawn(metrics);
        tokio::time::sleep(Duration::from_millis(400)).await;
        let stats = handle.shutdown().await.unwrap();

        // one-at-a-time lookups would need 120 ms per tick
        assert!(stats.ticks >= 6, "only {} ticks", stats.ticks);
        assert_eq!(stats.unavailable, 3 * stats.ticks);
        assert_eq!(stats.samples, 0);
    }
}
