use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::BTreeMap, fmt::Debug};
use typed_builder::TypedBuilder;

use crate::{aggregate::SeriesStats, config::Groundtruth, sample::DataStamped};

/// Message attached to results that have no data.
pub const NO_RESULT: &str = "no result";

/// Outcome of comparing a measurement against its groundtruth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundtruthResult {
    Pass,
    Fail,
    /// No groundtruth configured.
    Unknown,
}

/// Final, serializable outcome of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name: String,
    pub started: bool,
    pub finished: bool,
    pub series: Vec<DataStamped>,
    /// Representative value of the metric.
    pub data: Option<DataStamped>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub groundtruth: Option<f64>,
    pub groundtruth_epsilon: Option<f64>,
    pub groundtruth_result: GroundtruthResult,
    pub groundtruth_error_message: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl MetricResult {
    /// Whether the metric produced data.
    pub fn is_available(&self) -> bool {
        self.data.is_some()
    }
}

/// Turns a metric's recorded series into a [`MetricResult`].
///
/// A result is only computed for metrics that were both started and finished
/// and recorded at least one entry; anything else is reported as unavailable
/// with a failing verdict.
#[derive(TypedBuilder)]
pub struct ResultAggregator<'a> {
    #[builder(setter(into))]
    name: String,
    started: bool,
    finished: bool,
    series: &'a [DataStamped],
    /// Representative value. Defaults to the last series entry.
    #[builder(default, setter(strip_option))]
    data: Option<DataStamped>,
    #[builder(default)]
    groundtruth: Option<Groundtruth>,
    #[builder(default)]
    details: BTreeMap<String, String>,
}

impl ResultAggregator<'_> {
    pub fn evaluate(self) -> MetricResult {
        let mut result = MetricResult {
            name: self.name,
            started: self.started,
            finished: self.finished,
            series: Vec::new(),
            data: None,
            min: None,
            max: None,
            mean: None,
            std: None,
            groundtruth: self.groundtruth.map(|g| g.value),
            groundtruth_epsilon: self.groundtruth.map(|g| g.epsilon),
            groundtruth_result: GroundtruthResult::Unknown,
            groundtruth_error_message: None,
            details: self.details,
        };

        if self.started && self.finished {
            if let Some(stats) = SeriesStats::from_series(self.series) {
                let data = self.data.or_else(|| self.series.last().copied());
                result.series = self.series.to_vec();
                result.data = data;
                result.min = Some(stats.min);
                result.max = Some(stats.max);
                result.mean = Some(stats.mean);
                result.std = Some(stats.std);

                if let (Some(data), Some(gt)) = (data, self.groundtruth) {
                    if gt.accepts(data.data) {
                        result.groundtruth_result = GroundtruthResult::Pass;
                        result.groundtruth_error_message = Some("all OK".to_string());
                    } else {
                        result.groundtruth_result = GroundtruthResult::Fail;
                        result.groundtruth_error_message = Some(format!(
                            "groundtruth mismatch: {} not within {}+-{}",
                            data.data, gt.value, gt.epsilon
                        ));
                    }
                }
            }
        }

        if result.data.is_none() {
            result.groundtruth_result = GroundtruthResult::Fail;
            result.groundtruth_error_message = Some(NO_RESULT.to_string());
        }
        result
    }
}

/// Results of every metric of one testblock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestblockReport {
    pub name: String,
    pub results: Vec<MetricResult>,
}

impl TestblockReport {
    /// Combined verdict: any failure fails the block, all passes pass it.
    pub fn verdict(&self) -> GroundtruthResult {
        let verdicts = self.results.iter().map(|r| r.groundtruth_result);
        if verdicts.clone().any(|v| v == GroundtruthResult::Fail) {
            GroundtruthResult::Fail
        } else if !self.results.is_empty() && verdicts.clone().all(|v| v == GroundtruthResult::Pass) {
            GroundtruthResult::Pass
        } else {
            GroundtruthResult::Unknown
        }
    }
}

/// Anything a [`Reporter`] can emit.
pub trait Report
where
    Self: Send + Sync + Debug + Serialize + DeserializeOwned,
{
}

impl Report for MetricResult {}
impl Report for TestblockReport {}

/// Sends reports somewhere (stdout, a file, a results collector).
#[async_trait]
pub trait Reporter<R: Report> {
    async fn report(&self, report: &R) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    /// Pretty-prints reports to stdout.
    pub struct StdoutReporter;

    #[async_trait]
    impl<R: Report> Reporter<R> for StdoutReporter {
        async fn report(&self, report: &R) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            println!("{report:#?}");
            Ok(())
        }
    }

    /// Writes each report as one JSON line.
    pub struct JsonReporter<W> {
        out: Mutex<W>,
    }

    impl<W: Write + Send> JsonReporter<W> {
        pub fn new(out: W) -> Self {
            Self {
                out: Mutex::new(out),
            }
        }

        pub fn into_inner(self) -> W {
            self.out.into_inner()
        }
    }

    #[async_trait]
    impl<R: Report, W: Write + Send> Reporter<R> for JsonReporter<W> {
        async fn report(&self, report: &R) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let line = serde_json::to_string(report)?;
            let mut out = self.out.lock();
            writeln!(out, "{line}")?;
            out.flush()?;
            Ok(())
        }
    }
}
