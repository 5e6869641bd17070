//! Error types.
//!
//! Only configuration and phase-machine construction can fail loudly. Sampling
//! problems are transient ([`SampleError`]) and never escape a sampler; lifecycle
//! misuse and missing results are not errors at all.

use thiserror::Error;

use crate::config::MetricKind;

/// A metric configuration could not be turned into metrics.
///
/// Creation is all-or-nothing: when any record fails, no metric is built.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The value for a metric kind must be a list of records.
    #[error("metric config for '{kind}' is not a list")]
    NotAList { kind: String },

    /// The testblock metric section must map metric kinds to record lists.
    #[error("testblock metric config is not a mapping of metric kind to records")]
    NotAMapping,

    #[error("unknown metric kind '{0}'")]
    UnknownKind(String),

    /// A record could not be read as a metric record.
    #[error("invalid {kind} record #{index}: {reason}")]
    InvalidRecord {
        kind: MetricKind,
        index: usize,
        reason: String,
    },

    /// Only one of `groundtruth` / `groundtruth_epsilon` was given.
    #[error("{kind} record #{index}: groundtruth and groundtruth_epsilon must be set together")]
    PartialGroundtruth { kind: MetricKind, index: usize },

    #[error("{kind} record #{index}: missing required field '{field}'")]
    MissingField {
        kind: MetricKind,
        index: usize,
        field: &'static str,
    },

    #[error("{kind} record #{index}: invalid value for '{field}': {value}")]
    InvalidValue {
        kind: MetricKind,
        index: usize,
        field: &'static str,
        value: f64,
    },

    /// An engine-wide sampling setting is out of range.
    #[error("invalid sampling setting '{field}': {value}")]
    InvalidSampling { field: &'static str, value: f64 },

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A pose could not be obtained this time around. Always retried on the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("no transform available from '{root_frame}' to '{measured_frame}'")]
    Unavailable {
        root_frame: String,
        measured_frame: String,
    },

    #[error("timed out waiting for transform")]
    Timeout,
}

/// The phase machine was assembled or driven incorrectly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("no start state set")]
    MissingStart,

    #[error("start state {0} has no handler")]
    UnregisteredStart(String),

    #[error("at least one state must be terminal")]
    NoTerminalState,

    #[error("state {0} is registered both as handler and terminal state")]
    ConflictingState(String),

    #[error("handler moved to unregistered state {0}")]
    UnknownState(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
