use serde::{Deserialize, Serialize};

/// Where a metric is in its single-shot lifecycle.
///
/// ```text
/// Idle --start--> Active --stop--> Finished
///                  |  ^              ^
///            pause |  | start        | stop
///                  v  |              |
///                 Paused ------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetricState {
    #[default]
    Idle,
    Active,
    Paused,
    Finished,
}

/// What a successful `start` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// First activation out of `Idle`.
    Fresh,
    /// Resumed out of `Paused`.
    Resume,
}

/// Lifecycle bookkeeping shared by every metric kind.
///
/// Transitions outside the graph are refused and reported as `false`/`None`;
/// callers ignore them instead of failing, since orchestrators may race.
/// `started` and `finished` only ever go from false to true.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: MetricState,
    started: bool,
    finished: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MetricState {
        self.state
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn is_active(&self) -> bool {
        self.state == MetricState::Active
    }

    pub fn start(&mut self) -> Option<StartKind> {
        match self.state {
            MetricState::Idle => {
                self.state = MetricState::Active;
                self.started = true;
                Some(StartKind::Fresh)
            }
            MetricState::Paused => {
                self.state = MetricState::Active;
                Some(StartKind::Resume)
            }
            MetricState::Active | MetricState::Finished => None,
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.state != MetricState::Active {
            return false;
        }
        self.state = MetricState::Paused;
        true
    }

    /// Returns the state the metric was stopped from.
    pub fn stop(&mut self) -> Option<MetricState> {
        match self.state {
            prev @ (MetricState::Active | MetricState::Paused) => {
                self.state = MetricState::Finished;
                self.finished = true;
                Some(prev)
            }
            MetricState::Idle | MetricState::Finished => None,
        }
    }
}
