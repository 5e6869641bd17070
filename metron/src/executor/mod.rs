//! Samplers — delivery of pose samples to running metrics
//!
//! A sampler runs on its own tokio task, independent of the orchestrator that
//! drives the metric lifecycle. It only ever talks to metrics through their
//! [`MetricHandle`]s, so a `stop` issued by the orchestrator is seen by the
//! sampler's very next update.
//!
//! Two delivery strategies are provided:
//!
//! - [`PollingSampler`]: ticks at a fixed frequency and asks a
//!   [`crate::source::PoseSource`] for the latest pose of each active spatial
//!   metric, waiting at most a short, fixed timeout. A missing pose skips the
//!   metric for this tick.
//! - [`StreamSampler`]: consumes a push stream of
//!   [`crate::sample::TransformBatch`]es and hands each metric the poses of its
//!   frame pair, in delivery order.
//!
//! # Start & shutdown coordination
//! [`Sampler::spawn`] returns a [`SamplerHandle`]. Shutdown is signalled
//! through a `watch` channel; the sampler finishes its current tick or batch
//! and returns its [`SamplerStats`]. Dropping the handle also stops the task.
//!
//! Sampling never fails: unavailable poses are counted and retried on the next
//! tick, never surfaced as errors.
pub mod polling;
pub mod stream;
pub use polling::PollingSampler;
pub use stream::StreamSampler;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::watch::{self, Sender},
    task::{JoinError, JoinHandle},
};

use crate::metric::MetricHandle;
use internals::*;

/// Counters reported by a sampler when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerStats {
    /// Polling ticks or push batches processed.
    pub ticks: u64,
    /// Poses handed to metrics.
    pub samples: u64,
    /// Lookups that found no pose in time.
    pub unavailable: u64,
}

/// A delivery strategy for pose samples.
pub trait Sampler
where
    Self: Send + Sized + 'static,
{
    /// Deliver samples to `metrics` until the feed ends or shutdown is signalled.
    fn run(
        self,
        metrics: Vec<MetricHandle>,
        ctx: SamplingContext,
    ) -> impl Future<Output = SamplerStats> + Send + 'static;

    /// Run on a new tokio task.
    fn spawn(self, metrics: Vec<MetricHandle>) -> SamplerHandle {
        let (ctx, shutdown_tx) = SamplingContext::new();
        let spatial: Vec<MetricHandle> = metrics
            .into_iter()
            .filter(|m| m.frames().is_some())
            .collect();
        tracing::info!(metrics = spatial.len(), "Spawning sampler task...");
        let task = tokio::spawn(self.run(spatial, ctx));
        SamplerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Control side of a spawned sampler.
pub struct SamplerHandle {
    shutdown: Sender<bool>,
    task: JoinHandle<SamplerStats>,
}

impl SamplerHandle {
    /// Signal shutdown and wait for the task to wind down.
    pub async fn shutdown(self) -> Result<SamplerStats, JoinError> {
        // the task may already be gone, in which case nobody is listening
        let _ = self.shutdown.send(true);
        let stats = self.task.await?;
        tracing::info!(?stats, "Sampler stopped");
        Ok(stats)
    }

    /// Wait for the sampler to end on its own (its feed was exhausted).
    pub async fn join(self) -> Result<SamplerStats, JoinError> {
        let SamplerHandle { shutdown, task } = self;
        let stats = task.await;
        drop(shutdown);
        stats
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

mod internals {
    use std::time::Duration;

    use tokio::sync::watch::Receiver;

    use super::*;
    use crate::{
        error::SampleError,
        sample::{FramePair, PoseSample, TransformBatch},
        source::PoseSource,
    };

    /// State shared between a sampler task and its handle.
    #[derive(Clone)]
    pub struct SamplingContext {
        pub shutdown: Receiver<bool>,
    }

    impl SamplingContext {
        pub fn new() -> (Self, Sender<bool>) {
            let (tx, rx) = watch::channel(false);
            (Self { shutdown: rx }, tx)
        }

        /// Resolves once shutdown is requested or the handle is gone.
        pub async fn shutdown_requested(&mut self) {
            let _ = self.shutdown.wait_for(|stop| *stop).await;
        }
    }

    /// One bounded pose lookup.
    pub async fn poll_once<S: PoseSource>(
        source: &S,
        frames: &FramePair,
        wait: Duration,
    ) -> Result<PoseSample, SampleError> {
        tokio::time::timeout(
            wait,
            source.latest_pose(&frames.root_frame, &frames.measured_frame),
        )
        .await
        .unwrap_or(Err(SampleError::Timeout))
    }

    /// Hand every metric the poses of its frame pair from `batch`.
    ///
    /// Returns the number of poses delivered.
    pub fn deliver_batch(metrics: &[MetricHandle], batch: &TransformBatch) -> u64 {
        let mut delivered = 0;
        for metric in metrics {
            let Some(frames) = metric.frames() else {
                continue;
            };
            if !metric.accepts_topic(&batch.topic) {
                continue;
            }
            delivered += metric.update_all(batch.poses_for(frames)) as u64;
        }
        delivered
    }
}
