use crate::sample::{DataStamped, Sample};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// The `Aggregate` trait defines how the samples of a metric's series are
/// collected into a compact, mergeable representation.
///
/// **Important:** an `Aggregate` keeps raw accumulators (counts, extrema,
/// running moments). Final statistics are derived from it afterwards by
/// [`SeriesStats`], so the same aggregate can feed different summaries.
///
/// # Role
///
/// - Consume the [`DataStamped`] entries of a finished metric's series.
/// - Be cheaply mergeable, so a series recorded in several pieces (for example
///   one piece per active interval) summarizes to the same statistics as the
///   whole series.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use metron::{Aggregate, aggregate::{SeriesAggregate, SeriesStats}, sample::DataStamped};
///
/// let series = [
///     DataStamped::new(Duration::from_secs(1), 1.0),
///     DataStamped::new(Duration::from_secs(2), 3.0),
/// ];
/// let mut agg = SeriesAggregate::new();
/// agg.aggregate(&series);
///
/// let stats = SeriesStats::try_from(agg).unwrap();
/// assert_eq!(stats.mean, 2.0);
/// assert_eq!(stats.std, 1.0);
/// ```
///
/// # Implementor notes
/// - `merge` must be associative and commutative.
/// - Do not derive final values (means, deviations) in `consume`; keep what is
///   needed to derive them later.
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialEq + Send + Sync + Debug + Clone,
{
    /// The sample type this aggregate summarizes.
    type Sample: Sample;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Aggregate multiple samples into the current instance.
    fn aggregate(&mut self, samples: &[Self::Sample]) {
        samples.iter().for_each(|s| self.consume(s));
    }

    /// Incorporate a single sample.
    fn consume(&mut self, sample: &Self::Sample);

    /// Combine two aggregates into one.
    fn merge(&mut self, other: Self);
}

pub use series::*;

mod series {
    use super::*;
    use crate::macros::aggregate;

    /// Running accumulators over a scalar series.
    ///
    /// Keeps count, extrema, running mean and the sum of squared deviations
    /// (`m2`), merged with the pairwise update of Chan et al. so that a single
    /// value always yields a deviation of exactly zero.
    #[aggregate]
    pub struct SeriesAggregate {
        pub count: u64,
        pub mean: f64,
        pub m2: f64,
        pub min: f64,
        pub max: f64,
    }

    impl Default for SeriesAggregate {
        fn default() -> Self {
            Self {
                count: 0,
                mean: 0.0,
                m2: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            }
        }
    }

    impl Aggregate for SeriesAggregate {
        type Sample = DataStamped;

        fn new() -> Self {
            SeriesAggregate::default()
        }

        fn consume(&mut self, sample: &Self::Sample) {
            let x = sample.data;
            self.count += 1;
            let delta = x - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (x - self.mean);
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }

        fn merge(&mut self, other: Self) {
            if other.count == 0 {
                return;
            }
            if self.count == 0 {
                *self = other;
                return;
            }
            let n_a = self.count as f64;
            let n_b = other.count as f64;
            let n = n_a + n_b;
            let delta = other.mean - self.mean;
            self.mean += delta * n_b / n;
            self.m2 += other.m2 + delta * delta * n_a * n_b / n;
            self.count += other.count;
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Summary statistics of a non-empty series.
    ///
    /// `std` is the population standard deviation (ddof = 0).
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
    pub struct SeriesStats {
        pub min: f64,
        pub max: f64,
        pub mean: f64,
        pub std: f64,
    }

    /// The aggregate saw no samples.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EmptySeries;

    impl TryFrom<SeriesAggregate> for SeriesStats {
        type Error = EmptySeries;

        fn try_from(value: SeriesAggregate) -> Result<Self, Self::Error> {
            if value.count == 0 {
                return Err(EmptySeries);
            }
            Ok(Self {
                min: value.min,
                max: value.max,
                mean: value.mean,
                std: (value.m2 / value.count as f64).max(0.0).sqrt(),
            })
        }
    }

    impl SeriesStats {
        /// Statistics over `series`, or `None` when it is empty.
        pub fn from_series(series: &[DataStamped]) -> Option<Self> {
            let mut agg = SeriesAggregate::new();
            agg.aggregate(series);
            Self::try_from(agg).ok()
        }
    }
}
