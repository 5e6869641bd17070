//! Timestamped samples flowing through the engine.
//!
//! A [`Sample`] is the smallest unit the engine deals with. Two kinds exist:
//!
//! - [`PoseSample`]: a pose of one frame relative to another, delivered by a
//!   [`crate::source::PoseSource`] or a push feed of [`TransformBatch`]es.
//! - [`DataStamped`]: a scalar produced by a metric and appended to its series.
//!
//! Timestamps are plain [`Duration`]s since whatever epoch the test clock uses
//! (wall time or simulation time). The engine only ever subtracts and compares
//! them, so the epoch never matters.
use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Serialize};

use crate::macros::sample;

/// Point in time on the test clock.
pub type Timestamp = Duration;

/// Anything carrying a timestamp.
///
/// Implemented through the `#[sample]` attribute, which requires a `stamp` field.
pub trait Sample
where
    Self: Serialize + PartialEq + Send + Sync + Debug + Clone,
{
    fn stamp(&self) -> Timestamp;
}

/// A scalar value recorded at a point in time.
#[sample]
#[derive(Copy)]
pub struct DataStamped {
    pub stamp: Timestamp,
    pub data: f64,
}

impl DataStamped {
    pub fn new(stamp: Timestamp, data: f64) -> Self {
        Self { stamp, data }
    }
}

/// Pose of a measured frame relative to a root frame.
///
/// The rotation is a quaternion in `(x, y, z, w)` order. Path length ignores it.
#[sample]
#[derive(Copy)]
pub struct PoseSample {
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
    pub stamp: Timestamp,
}

impl PoseSample {
    /// Pose with identity rotation.
    pub fn from_translation(translation: [f64; 3], stamp: Timestamp) -> Self {
        Self {
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
            stamp,
        }
    }

    /// Euclidean distance between the two translations.
    #[inline]
    pub fn distance_to(&self, other: &PoseSample) -> f64 {
        let dx = self.translation[0] - other.translation[0];
        let dy = self.translation[1] - other.translation[1];
        let dz = self.translation[2] - other.translation[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// The ordered pair of frames a spatial metric observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramePair {
    pub root_frame: String,
    pub measured_frame: String,
}

impl FramePair {
    pub fn new(root_frame: impl Into<String>, measured_frame: impl Into<String>) -> Self {
        Self {
            root_frame: root_frame.into(),
            measured_frame: measured_frame.into(),
        }
    }

    pub fn matches(&self, root_frame: &str, measured_frame: &str) -> bool {
        self.root_frame == root_frame && self.measured_frame == measured_frame
    }
}

impl std::fmt::Display for FramePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.root_frame, self.measured_frame)
    }
}

/// A pose tagged with the frames it relates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramedPose {
    pub root_frame: String,
    pub measured_frame: String,
    pub pose: PoseSample,
}

impl FramedPose {
    pub fn new(
        root_frame: impl Into<String>,
        measured_frame: impl Into<String>,
        pose: PoseSample,
    ) -> Self {
        Self {
            root_frame: root_frame.into(),
            measured_frame: measured_frame.into(),
            pose,
        }
    }
}

/// One push delivery from a transform feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformBatch {
    pub topic: String,
    pub transforms: Vec<FramedPose>,
}

impl TransformBatch {
    pub fn new(topic: impl Into<String>, transforms: Vec<FramedPose>) -> Self {
        Self {
            topic: topic.into(),
            transforms,
        }
    }

    /// Poses for `frames`, in delivery order.
    pub fn poses_for<'a>(&'a self, frames: &'a FramePair) -> impl Iterator<Item = &'a PoseSample> {
        self.transforms
            .iter()
            .filter(|t| frames.matches(&t.root_frame, &t.measured_frame))
            .map(|t| &t.pose)
    }
}
