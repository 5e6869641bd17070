//! The `StreamSampler`: push delivery of transform batches.
//!
//! Each batch is filtered per metric by topic (when the metric names one) and
//! by frame pair, and the matching poses are applied in delivery order under a
//! single lock, so a batch is never split by a concurrent pause or stop.
use futures::{Stream, StreamExt};

use super::{Sampler, SamplerStats, internals::*};
use crate::{metric::MetricHandle, sample::TransformBatch};

/// Feeds metrics from a stream of [`TransformBatch`]es.
///
/// Ends when the stream ends or on shutdown, whichever comes first.
pub struct StreamSampler<St> {
    batches: St,
}

impl<St> StreamSampler<St>
where
    St: Stream<Item = TransformBatch> + Send + Unpin + 'static,
{
    pub fn new(batches: St) -> Self {
        Self { batches }
    }
}

impl<St> Sampler for StreamSampler<St>
where
    St: Stream<Item = TransformBatch> + Send + Unpin + 'static,
{
    async fn run(mut self, metrics: Vec<MetricHandle>, mut ctx: SamplingContext) -> SamplerStats {
        let mut stats = SamplerStats::default();
        tracing::info!(metrics = metrics.len(), "Stream sampler running");

        loop {
            let batch = tokio::select! {
                biased;
                _ = ctx.shutdown_requested() => break,
                batch = self.batches.next() => batch,
            };
            let Some(batch) = batch else {
                tracing::info!("Transform stream ended");
                break;
            };
            stats.ticks += 1;
            stats.samples += deliver_batch(&metrics, &batch);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metric::PathLengthMetric,
        sample::{FramePair, FramedPose, PoseSample},
    };
    use futures::channel::mpsc;
    use std::time::Duration;

    fn batch(topic: &str, xs: &[(f64, f64)]) -> TransformBatch {
        TransformBatch::new(
            topic,
            xs.iter()
                .map(|&(x, t)| {
                    FramedPose::new(
                        "map",
                        "base_link",
                        PoseSample::from_translation([x, 0.0, 0.0], Duration::from_secs_f64(t)),
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn applies_batches_in_order_until_stream_ends() {
        let metric = MetricHandle::new(PathLengthMetric::new(FramePair::new("map", "base_link"), None));
        metric.start(Duration::ZERO);

        let batches = futures::stream::iter(vec![
            batch("/tf", &[(0.0, 0.00), (0.1, 0.05)]),
            batch("/tf", &[(0.2, 0.10), (0.3, 0.15)]),
            batch("/tf", &[(0.4, 0.20)]),
        ]);
        let stats = StreamSampler::new(batches)
            .spawn(vec![metric.clone()])
            .join()
            .await
            .unwrap();

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.samples, 5);
        metric.stop(Duration::from_secs(1));
        assert!((metric.result().data.unwrap().data - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stop_is_seen_by_next_batch() {
        let metric = MetricHandle::new(PathLengthMetric::new(FramePair::new("map", "base_link"), None));
        metric.start(Duration::ZERO);

        let (tx, rx) = mpsc::unbounded();
        let handle = StreamSampler::new(rx).spawn(vec![metric.clone()]);

        tx.unbounded_send(batch("/tf", &[(0.0, 0.0), (0.2, 0.1)]))
            .unwrap();
        // a batch is applied under one lock, so one entry means it is done
        while metric.recorded() == 0 {
            tokio::task::yield_now().await;
        }

        metric.stop(Duration::from_secs(1));
        tx.unbounded_send(batch("/tf", &[(0.5, 0.2)])).unwrap();
        drop(tx);

        let stats = handle.join().await.unwrap();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.samples, 3);
        let result = metric.result();
        assert_eq!(result.series.len(), 1);
        assert!((result.data.unwrap().data - 0.2).abs() < 1e-12);
    }
}
