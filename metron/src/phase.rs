//! Sequencing of test phases.
//!
//! A [`PhaseMachine`] is an enumerated set of states, each either a handler
//! state (a closure that does some work on a shared context and names the next
//! state) or a terminal state. The table is validated once when the machine is
//! built; running it then only has to watch for handlers that name a state the
//! table does not know.
//!
//! ```rust
//! use metron::phase::PhaseMachine;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Phase { Setup, Drive, Done }
//!
//! let mut machine = PhaseMachine::builder()
//!     .state(Phase::Setup, |laps: &mut u32| { *laps = 0; Phase::Drive })
//!     .state(Phase::Drive, |laps: &mut u32| {
//!         *laps += 1;
//!         if *laps < 3 { Phase::Drive } else { Phase::Done }
//!     })
//!     .terminal(Phase::Done)
//!     .start(Phase::Setup)
//!     .build()
//!     .unwrap();
//!
//! let mut laps = 0;
//! assert_eq!(machine.run(&mut laps), Ok(Phase::Done));
//! assert_eq!(laps, 3);
//! ```
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

use crate::error::PhaseError;

type Handler<S, C> = Box<dyn FnMut(&mut C) -> S + Send>;

pub struct PhaseMachine<S, C> {
    handlers: HashMap<S, Handler<S, C>>,
    terminals: HashSet<S>,
    start: S,
}

impl<S, C> PhaseMachine<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    pub fn builder() -> PhaseMachineBuilder<S, C> {
        PhaseMachineBuilder::default()
    }

    pub fn start_state(&self) -> S {
        self.start
    }

    pub fn is_terminal(&self, state: S) -> bool {
        self.terminals.contains(&state)
    }

    /// Run from the start state until a terminal state is reached.
    ///
    /// The machine can be run again; every run begins at the start state.
    pub fn run(&mut self, ctx: &mut C) -> Result<S, PhaseError> {
        let mut current = self.start;
        loop {
            if self.terminals.contains(&current) {
                tracing::debug!(state = ?current, "Reached terminal state");
                return Ok(current);
            }
            let handler = self
                .handlers
                .get_mut(&current)
                .ok_or_else(|| PhaseError::UnknownState(format!("{current:?}")))?;
            let next = handler(ctx);
            tracing::debug!(from = ?current, to = ?next, "Phase transition");
            current = next;
        }
    }
}

pub struct PhaseMachineBuilder<S, C> {
    handlers: HashMap<S, Handler<S, C>>,
    terminals: HashSet<S>,
    start: Option<S>,
    conflict: Option<S>,
}

impl<S, C> Default for PhaseMachineBuilder<S, C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            terminals: HashSet::new(),
            start: None,
            conflict: None,
        }
    }
}

impl<S, C> PhaseMachineBuilder<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    /// Register a handler state. Registering the same state twice keeps the
    /// last handler.
    pub fn state<F>(mut self, state: S, handler: F) -> Self
    where
        F: FnMut(&mut C) -> S + Send + 'static,
    {
        if self.terminals.contains(&state) {
            self.conflict.get_or_insert(state);
        }
        self.handlers.insert(state, Box::new(handler));
        self
    }

    pub fn terminal(mut self, state: S) -> Self {
        if self.handlers.contains_key(&state) {
            self.conflict.get_or_insert(state);
        }
        self.terminals.insert(state);
        self
    }

    pub fn start(mut self, state: S) -> Self {
        self.start = Some(state);
        self
    }

    pub fn build(self) -> Result<PhaseMachine<S, C>, PhaseError> {
        if let Some(state) = self.conflict {
            return Err(PhaseError::ConflictingState(format!("{state:?}")));
        }
        let start = self.start.ok_or(PhaseError::MissingStart)?;
        if !self.handlers.contains_key(&start) {
            return Err(PhaseError::UnregisteredStart(format!("{start:?}")));
        }
        if self.terminals.is_empty() {
            return Err(PhaseError::NoTerminalState);
        }
        Ok(PhaseMachine {
            handlers: self.handlers,
            terminals: self.terminals,
            start,
        })
    }
}
