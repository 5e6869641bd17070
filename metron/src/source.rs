//! Where pose samples come from.
//!
//! The engine consumes poses in one of two ways:
//!
//! - **pull**: a [`PoseSource`] is asked for the latest pose between two frames
//!   on every polling tick (see [`crate::executor::PollingSampler`]);
//! - **push**: a stream of [`TransformBatch`]es is handed to a
//!   [`crate::executor::StreamSampler`].
//!
//! [`PoseBuffer`] bridges the two: it is fed batches and answers pull requests
//! with the most recent pose seen for each frame pair.
use std::{collections::HashMap, future::Future, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::{
    error::SampleError,
    sample::{FramePair, PoseSample, TransformBatch},
};

/// Pull access to the latest pose between two frames.
///
/// Implementations may wait for the pose to become available; the caller
/// bounds that wait with a timeout and simply retries on the next tick.
pub trait PoseSource: Send + Sync {
    fn latest_pose(
        &self,
        root_frame: &str,
        measured_frame: &str,
    ) -> impl Future<Output = Result<PoseSample, SampleError>> + Send;
}

impl<S: PoseSource> PoseSource for Arc<S> {
    fn latest_pose(
        &self,
        root_frame: &str,
        measured_frame: &str,
    ) -> impl Future<Output = Result<PoseSample, SampleError>> + Send {
        (**self).latest_pose(root_frame, measured_frame)
    }
}

/// Latest pose per frame pair, fed by push deliveries.
///
/// `latest_pose` waits until the pair has been seen at least once.
#[derive(Debug, Default)]
pub struct PoseBuffer {
    latest: RwLock<HashMap<FramePair, PoseSample>>,
    published: Notify,
}

impl PoseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every pose of `batch`, keeping the newest per frame pair.
    pub fn publish(&self, batch: &TransformBatch) {
        {
            let mut latest = self.latest.write();
            for t in &batch.transforms {
                let key = FramePair::new(t.root_frame.as_str(), t.measured_frame.as_str());
                match latest.get(&key) {
                    Some(current) if current.stamp > t.pose.stamp => {}
                    _ => {
                        latest.insert(key, t.pose);
                    }
                }
            }
        }
        self.published.notify_waiters();
    }

    /// Latest pose without waiting.
    pub fn lookup(&self, root_frame: &str, measured_frame: &str) -> Result<PoseSample, SampleError> {
        self.latest
            .read()
            .get(&FramePair::new(root_frame, measured_frame))
            .copied()
            .ok_or_else(|| SampleError::Unavailable {
                root_frame: root_frame.to_string(),
                measured_frame: measured_frame.to_string(),
            })
    }

    /// Forget every pose seen so far, e.g. between testblocks.
    pub fn clear(&self) {
        self.latest.write().clear();
    }
}

impl PoseSource for PoseBuffer {
    async fn latest_pose(
        &self,
        root_frame: &str,
        measured_frame: &str,
    ) -> Result<PoseSample, SampleError> {
        loop {
            // registered before the check so a publish in between is not missed
            let published = self.published.notified();
            if let Ok(pose) = self.lookup(root_frame, measured_frame) {
                return Ok(pose);
            }
            published.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::FramedPose;
    use std::time::Duration;

    fn batch(poses: &[(&str, &str, f64, f64)]) -> TransformBatch {
        TransformBatch::new(
            "/tf",
            poses
                .iter()
                .map(|&(root, measured, x, t)| {
                    FramedPose::new(
                        root,
                        measured,
                        PoseSample::from_translation([x, 0.0, 0.0], Duration::from_secs_f64(t)),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn keeps_newest_per_pair() {
        let buffer = PoseBuffer::new();
        buffer.publish(&batch(&[("map", "base", 1.0, 1.0), ("map", "arm", 7.0, 1.0)]));
        buffer.publish(&batch(&[("map", "base", 0.5, 0.5)]));
        buffer.publish(&batch(&[("map", "base", 2.0, 2.0)]));

        assert_eq!(buffer.lookup("map", "base").unwrap().translation[0], 2.0);
        assert_eq!(buffer.lookup("map", "arm").unwrap().translation[0], 7.0);
        assert_eq!(
            buffer.lookup("base", "map"),
            Err(SampleError::Unavailable {
                root_frame: "base".into(),
                measured_frame: "map".into(),
            })
        );
    }

    #[test]
    fn clear_forgets_every_pair() {
        let buffer = PoseBuffer::new();
        buffer.publish(&batch(&[("map", "base", 1.0, 1.0), ("map", "arm", 7.0, 1.0)]));
        buffer.clear();

        assert!(matches!(
            buffer.lookup("map", "base"),
            Err(SampleError::Unavailable { .. })
        ));
        assert!(buffer.lookup("map", "arm").is_err());

        // older stamps are accepted again after a clear
        buffer.publish(&batch(&[("map", "base", 0.5, 0.5)]));
        assert_eq!(buffer.lookup("map", "base").unwrap().translation[0], 0.5);
    }

    #[tokio::test]
    async fn lookup_waits_for_first_publish() {
        let buffer = Arc::new(PoseBuffer::new());
        let waiter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.latest_pose("map", "base").await })
        };
        tokio::task::yield_now().await;
        buffer.publish(&batch(&[("map", "base", 3.0, 1.0)]));

        let pose = waiter.await.unwrap().unwrap();
        assert_eq!(pose.translation[0], 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_of_unknown_pair_is_bounded_by_caller() {
        let buffer = PoseBuffer::new();
        let res = tokio::time::timeout(Duration::from_millis(20), buffer.latest_pose("map", "base")).await;
        assert!(res.is_err());
    }
}
