//! Metric configuration and the factory that turns it into metrics.
//!
//! A testblock's metric section maps each metric kind to a list of records:
//!
//! ```yaml
//! time:
//!   - groundtruth: 2.3
//!     groundtruth_epsilon: 0.1
//! path_length:
//!   - root_frame: map
//!     measured_frame: base_link
//!     groundtruth: 0.4
//!     groundtruth_epsilon: 0.05
//!     outlier_threshold: 1.0   # optional, meters
//!     topic: /tf               # optional
//! ```
//!
//! Parsing is all-or-nothing: any malformed record aborts creation before a
//! single metric exists.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::{
    error::{ConfigError, ConfigResult},
    metric::{AnyMetric, PathLengthMetric, TimeMetric},
    sample::FramePair,
};

/// Displacement above which a single path increment is treated as a tracking failure.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 1.0;

/// Default polling rate for pose lookups.
pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 100.0;

/// Polling period for `frequency`, or `None` when it does not give a usable,
/// non-zero interval.
pub fn sampling_period(frequency: f64) -> Option<Duration> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / frequency)
        .ok()
        .filter(|period| !period.is_zero())
}

fn default_period() -> Duration {
    Duration::from_millis(10)
}

/// The closed set of metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Time,
    PathLength,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Time, MetricKind::PathLength];

    /// The configuration key and result name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Time => "time",
            MetricKind::PathLength => "path_length",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKind(s.to_string()))
    }
}

/// Expected value of a metric and the tolerance around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Groundtruth {
    pub value: f64,
    pub epsilon: f64,
}

impl Groundtruth {
    pub fn new(value: f64, epsilon: f64) -> Self {
        Self { value, epsilon }
    }

    /// Inclusive tolerance check.
    pub fn accepts(&self, measured: f64) -> bool {
        (self.value - measured).abs() <= self.epsilon
    }
}

/// One validated metric record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub kind: MetricKind,
    /// Always set for spatial kinds.
    pub frames: Option<FramePair>,
    pub groundtruth: Option<Groundtruth>,
    /// Restricts push delivery to batches from this topic.
    pub sample_topic: Option<String>,
    pub outlier_threshold: Option<f64>,
}

impl MetricConfig {
    pub fn time(groundtruth: Option<Groundtruth>) -> Self {
        Self {
            kind: MetricKind::Time,
            frames: None,
            groundtruth,
            sample_topic: None,
            outlier_threshold: None,
        }
    }

    pub fn path_length(frames: FramePair, groundtruth: Option<Groundtruth>) -> Self {
        Self {
            kind: MetricKind::PathLength,
            frames: Some(frames),
            groundtruth,
            sample_topic: None,
            outlier_threshold: None,
        }
    }
}

/// Record as written in the configuration, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    root_frame: Option<String>,
    measured_frame: Option<String>,
    groundtruth: Option<f64>,
    groundtruth_epsilon: Option<f64>,
    topic: Option<String>,
    outlier_threshold: Option<f64>,
}

/// Builds metrics from configuration.
pub struct MetricFactory;

impl MetricFactory {
    /// Validate the records configured for one metric kind.
    ///
    /// `params` must be a YAML sequence. An empty list of `time` records stands
    /// for a single time metric without groundtruth.
    pub fn parse(kind: MetricKind, params: &Value) -> ConfigResult<Vec<MetricConfig>> {
        let records = params.as_sequence().ok_or_else(|| ConfigError::NotAList {
            kind: kind.to_string(),
        })?;

        if records.is_empty() && kind == MetricKind::Time {
            return Ok(vec![MetricConfig::time(None)]);
        }

        records
            .iter()
            .enumerate()
            .map(|(index, record)| Self::parse_record(kind, index, record))
            .collect()
    }

    fn parse_record(kind: MetricKind, index: usize, record: &Value) -> ConfigResult<MetricConfig> {
        let raw: RawRecord = match record {
            // A bare `- ` entry carries no parameters.
            Value::Null => RawRecord::default(),
            Value::Mapping(_) => {
                serde_yaml::from_value(record.clone()).map_err(|e| ConfigError::InvalidRecord {
                    kind,
                    index,
                    reason: e.to_string(),
                })?
            }
            _ => {
                return Err(ConfigError::InvalidRecord {
                    kind,
                    index,
                    reason: "record is not a mapping".to_string(),
                });
            }
        };

        let groundtruth = match (raw.groundtruth, raw.groundtruth_epsilon) {
            (Some(value), Some(epsilon)) => {
                if !value.is_finite() {
                    return Err(ConfigError::InvalidValue {
                        kind,
                        index,
                        field: "groundtruth",
                        value,
                    });
                }
                if !epsilon.is_finite() || epsilon < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        kind,
                        index,
                        field: "groundtruth_epsilon",
                        value: epsilon,
                    });
                }
                Some(Groundtruth::new(value, epsilon))
            }
            (None, None) => None,
            _ => return Err(ConfigError::PartialGroundtruth { kind, index }),
        };

        if let Some(threshold) = raw.outlier_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ConfigError::InvalidValue {
                    kind,
                    index,
                    field: "outlier_threshold",
                    value: threshold,
                });
            }
        }

        let frames = match kind {
            MetricKind::Time => None,
            MetricKind::PathLength => {
                let root_frame = raw.root_frame.ok_or(ConfigError::MissingField {
                    kind,
                    index,
                    field: "root_frame",
                })?;
                let measured_frame = raw.measured_frame.ok_or(ConfigError::MissingField {
                    kind,
                    index,
                    field: "measured_frame",
                })?;
                Some(FramePair::new(root_frame, measured_frame))
            }
        };

        Ok(MetricConfig {
            kind,
            frames,
            groundtruth,
            sample_topic: raw.topic,
            outlier_threshold: raw.outlier_threshold,
        })
    }

    /// Validate a whole testblock metric section (kind → records).
    ///
    /// Kinds are processed in configuration order.
    pub fn parse_section(section: &Value) -> ConfigResult<Vec<MetricConfig>> {
        let mapping = section.as_mapping().ok_or(ConfigError::NotAMapping)?;
        let mut configs = Vec::new();
        for (key, params) in mapping {
            let key = key.as_str().ok_or(ConfigError::NotAMapping)?;
            let kind: MetricKind = key.parse()?;
            configs.extend(Self::parse(kind, params)?);
        }
        Ok(configs)
    }

    /// Parse a YAML metric section and instantiate its metrics.
    pub fn from_yaml_str(yaml: &str, sampling: &SamplingConfig) -> ConfigResult<Vec<AnyMetric>> {
        let section: Value = serde_yaml::from_str(yaml)?;
        let configs = Self::parse_section(&section)?;
        Self::build_all(&configs, sampling)
    }

    /// Instantiate the metric for one record.
    ///
    /// Fails only for hand-built records that skipped [`MetricFactory::parse`].
    pub fn build(config: &MetricConfig, sampling: &SamplingConfig) -> ConfigResult<AnyMetric> {
        sampling.validate()?;
        match config.kind {
            MetricKind::Time => Ok(AnyMetric::Time(TimeMetric::new(config.groundtruth))),
            MetricKind::PathLength => {
                let frames = config.frames.clone().ok_or(ConfigError::MissingField {
                    kind: config.kind,
                    index: 0,
                    field: "root_frame",
                })?;
                let mut metric = PathLengthMetric::new(frames, config.groundtruth)
                    .with_outlier_threshold(
                        config
                            .outlier_threshold
                            .unwrap_or(sampling.outlier_threshold),
                    );
                if let Some(topic) = &config.sample_topic {
                    metric = metric.with_sample_topic(topic.clone());
                }
                Ok(AnyMetric::PathLength(metric))
            }
        }
    }

    pub fn build_all(
        configs: &[MetricConfig],
        sampling: &SamplingConfig,
    ) -> ConfigResult<Vec<AnyMetric>> {
        configs.iter().map(|c| Self::build(c, sampling)).collect()
    }
}

/// Engine-wide sampling defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Pose polling rate in Hz.
    pub frequency: f64,
    /// Bounded wait for a pose to become available. Defaults to two polling periods.
    #[serde(with = "opt_secs")]
    pub wait_timeout: Option<Duration>,
    /// Default outlier threshold for path metrics, in meters.
    pub outlier_threshold: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_SAMPLING_FREQUENCY,
            wait_timeout: None,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

impl SamplingConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings a sampler cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if sampling_period(self.frequency).is_none() {
            return Err(ConfigError::InvalidSampling {
                field: "frequency",
                value: self.frequency,
            });
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(ConfigError::InvalidSampling {
                field: "outlier_threshold",
                value: self.outlier_threshold,
            });
        }
        if self.wait_timeout.is_some_and(|wait| wait.is_zero()) {
            return Err(ConfigError::InvalidSampling {
                field: "wait_timeout",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Falls back to the default rate when `frequency` is unusable.
    pub fn period(&self) -> Duration {
        sampling_period(self.frequency).unwrap_or_else(default_period)
    }

    pub fn effective_wait_timeout(&self) -> Duration {
        self.wait_timeout.unwrap_or_else(|| self.period() * 2)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
