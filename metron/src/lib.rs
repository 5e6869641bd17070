//! Metron — evaluation metrics for automated robot test runs.
//!
//! Metron measures what happened during a test segment (a "testblock") and
//! compares it against expected values. It is driven by lifecycle events coming
//! from whatever orchestrates the test (`start`, `pause`, `purge`, `stop`), and
//! fed pose samples by a sampler running next to the orchestrator.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`Metric`]: one measurement with its own lifecycle. Two kinds ship with
//!   the crate: [`metric::TimeMetric`] (active duration of the testblock) and
//!   [`metric::PathLengthMetric`] (distance travelled by one frame relative to
//!   another).
//! - [`MetricHandle`]: shared, lock-protected access to a metric, so the
//!   orchestrator and a sampler task can both reach it.
//! - [`Sampler`]: delivers pose samples to active metrics. [`PollingSampler`]
//!   looks poses up at a fixed rate; [`StreamSampler`] consumes pushed batches.
//! - [`Aggregate`]: mergeable accumulator that summarizes a metric's series.
//! - [`Report`]: serializable outcome ([`report::MetricResult`],
//!   [`report::TestblockReport`]); a [`Reporter`] sends it somewhere.
//! - [`Testblock`]: the metrics of one test segment, built from configuration
//!   through [`MetricFactory`].
//! - [`PhaseMachine`]: optional sequencing of test phases for orchestrators.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use metron::{
//!     Testblock,
//!     config::SamplingConfig,
//!     report::GroundtruthResult,
//!     sample::PoseSample,
//! };
//!
//! let yaml = r#"
//! time: []
//! path_length:
//!   - root_frame: map
//!     measured_frame: base_link
//!     groundtruth: 1.0
//!     groundtruth_epsilon: 0.1
//! "#;
//! let block = Testblock::from_yaml("drive", yaml, &SamplingConfig::default()).unwrap();
//!
//! block.start(Duration::from_secs(10));
//! // normally done by a sampler task
//! let path = &block.path_metrics()[0];
//! for i in 0..=10 {
//!     let t = Duration::from_millis(10_000 + i * 100);
//!     path.update(&PoseSample::from_translation([i as f64 * 0.1, 0.0, 0.0], t));
//! }
//! block.stop(Duration::from_secs(12));
//!
//! let report = block.results();
//! assert_eq!(report.results[0].data.unwrap().data, 2.0);
//! assert_eq!(report.results[1].groundtruth_result, GroundtruthResult::Pass);
//! ```
//!
//! # Feature flags
//!
//! - `builtins`: ready-made reporters (`StdoutReporter`, `JsonReporter`).
//!   (Enabled by default)
//! - `internals`: exposes the building blocks samplers are made of
//!   (`SamplingContext`, `poll_once`, `deliver_batch`) for custom samplers.
//!
//! # Where to start
//!
//! - Read the docs for [`Testblock`], [`Metric`] and [`Sampler`].
//! - See `examples/replay.rs` for a full run: configuration, phase machine,
//!   a polling sampler and reporting.

/// Series aggregators
pub mod aggregate;
/// Metric configuration and sampling defaults
pub mod config;
pub mod error;
/// Samplers that deliver poses to running metrics
pub mod executor;
/// Metrics and their lifecycle
pub mod metric;
pub mod phase;
/// Results and Reporters
pub mod report;
pub mod sample;
pub mod source;
/// The metrics of one test segment
pub mod testblock;

pub use aggregate::Aggregate;
pub use config::{MetricFactory, SamplingConfig};
pub use executor::{PollingSampler, Sampler, StreamSampler};
pub use metric::{AnyMetric, Metric, MetricHandle};
pub use phase::PhaseMachine;
pub use report::{Report, Reporter};
pub use testblock::Testblock;

/// Procedural macros to reduce boilerplate
pub mod macros {
    pub use metron_macros::*;
}
