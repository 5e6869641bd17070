use typed_builder::TypedBuilder;

use crate::{
    config::{MetricFactory, SamplingConfig},
    error::ConfigResult,
    metric::MetricHandle,
    report::TestblockReport,
    sample::Timestamp,
};

/// A named test segment and the metrics evaluated over it.
///
/// Lifecycle calls fan out to every metric in configuration order. Each
/// metric is behind its own [`MetricHandle`], so samplers can keep feeding
/// them while the testblock is driven from elsewhere.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Testblock {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default)]
    pub metrics: Vec<MetricHandle>,
}

impl Testblock {
    /// Build a testblock from its metric configuration section.
    ///
    /// Either every record is valid and every metric is created, or nothing is.
    pub fn from_yaml(
        name: impl Into<String>,
        yaml: &str,
        sampling: &SamplingConfig,
    ) -> ConfigResult<Self> {
        let metrics = MetricFactory::from_yaml_str(yaml, sampling)?
            .into_iter()
            .map(MetricHandle::from)
            .collect();
        Ok(Self {
            name: name.into(),
            metrics,
        })
    }

    pub fn start(&self, stamp: Timestamp) {
        tracing::info!(testblock = %self.name, ?stamp, "Starting testblock");
        self.metrics.iter().for_each(|m| m.start(stamp));
    }

    pub fn pause(&self, stamp: Timestamp) {
        tracing::info!(testblock = %self.name, ?stamp, "Pausing testblock");
        self.metrics.iter().for_each(|m| m.pause(stamp));
    }

    pub fn purge(&self, stamp: Timestamp) {
        self.metrics.iter().for_each(|m| m.purge(stamp));
    }

    pub fn stop(&self, stamp: Timestamp) {
        tracing::info!(testblock = %self.name, ?stamp, "Stopping testblock");
        self.metrics.iter().for_each(|m| m.stop(stamp));
    }

    /// Metrics that consume pose samples. This is what samplers are given.
    pub fn path_metrics(&self) -> Vec<MetricHandle> {
        self.metrics
            .iter()
            .filter(|m| m.frames().is_some())
            .cloned()
            .collect()
    }

    pub fn results(&self) -> TestblockReport {
        TestblockReport {
            name: self.name.clone(),
            results: self.metrics.iter().map(MetricHandle::result).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MetricKind,
        error::ConfigError,
        metric::MetricState,
        report::GroundtruthResult,
        sample::PoseSample,
    };
    use std::time::Duration;

    const CONFIG: &str = r#"
time:
  - groundtruth: 2.0
    groundtruth_epsilon: 0.5
path_length:
  - root_frame: map
    measured_frame: base_link
    groundtruth: 0.3
    groundtruth_epsilon: 0.01
"#;

    fn secs(s: f64) -> Timestamp {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn builds_metrics_in_configuration_order() {
        let block = Testblock::from_yaml("nav", CONFIG, &SamplingConfig::default()).unwrap();
        let kinds: Vec<_> = block.metrics.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec![MetricKind::Time, MetricKind::PathLength]);
        assert_eq!(block.path_metrics().len(), 1);
    }

    #[test]
    fn invalid_record_creates_nothing() {
        let yaml = "path_length:\n  - root_frame: map\n";
        let err = Testblock::from_yaml("nav", yaml, &SamplingConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn lifecycle_fans_out_and_results_follow() {
        let block = Testblock::from_yaml("nav", CONFIG, &SamplingConfig::default()).unwrap();
        block.start(secs(1.0));
        assert!(block.metrics.iter().all(|m| m.state() == MetricState::Active));

        let path = &block.path_metrics()[0];
        path.update(&PoseSample::from_translation([0.0, 0.0, 0.0], secs(1.0)));
        path.update(&PoseSample::from_translation([0.3, 0.0, 0.0], secs(1.5)));

        block.purge(secs(2.0));
        block.stop(secs(3.0));
        assert!(block.metrics.iter().all(|m| m.state() == MetricState::Finished));

        let report = block.results();
        assert_eq!(report.name, "nav");
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].data.unwrap().data, 2.0);
        assert_eq!(report.verdict(), GroundtruthResult::Pass);
    }

    #[test]
    fn never_started_block_reports_no_result() {
        let block = Testblock::from_yaml("nav", CONFIG, &SamplingConfig::default()).unwrap();
        block.stop(secs(1.0));
        let report = block.results();
        assert!(report.results.iter().all(|r| !r.is_available()));
        assert_eq!(report.verdict(), GroundtruthResult::Fail);
    }

    #[test]
    fn builder_defaults_to_no_metrics() {
        let block = Testblock::builder().name("empty").build();
        assert!(block.metrics.is_empty());
        assert_eq!(block.results().verdict(), GroundtruthResult::Unknown);
    }
}
