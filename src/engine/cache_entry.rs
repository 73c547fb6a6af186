use futures::future::BoxFuture;
use futures::future::Shared;

use super::EntryStatus;

/// Result of one producer execution as seen by every waiter.
///
/// Failures are carried as their rendered message so the outcome stays `Clone`.
pub(crate) type ComputeOutcome<V> = std::result::Result<V, String>;

/// Handle on an in-flight producer execution, shared by all callers of one key.
pub(crate) type Computation<V> = Shared<BoxFuture<'static, ComputeOutcome<V>>>;

pub(crate) enum EntryState<V> {
    Empty,
    Computing {
        /// Identifies the execution that owns the entry
        ticket: u64,
        computation: Computation<V>,
    },
    Ready(V),
}

pub(crate) struct CacheEntry<V> {
    pub(crate) key: String,
    pub(crate) state: EntryState<V>,
}

pub(crate) enum Lookup<V> {
    Ready(V),
    InFlight(Computation<V>),
}

impl<V: Clone> CacheEntry<V> {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            state: EntryState::Empty,
        }
    }

    pub(crate) fn status(&self) -> EntryStatus {
        match self.state {
            EntryState::Empty => EntryStatus::Empty,
            EntryState::Computing { .. } => EntryStatus::Computing,
            EntryState::Ready(_) => EntryStatus::Ready,
        }
    }

    /// `None` when the entry is empty and a producer must be started
    pub(crate) fn lookup(&self) -> Option<Lookup<V>> {
        match &self.state {
            EntryState::Empty => None,
            EntryState::Computing { computation, .. } => Some(Lookup::InFlight(computation.clone())),
            EntryState::Ready(value) => Some(Lookup::Ready(value.clone())),
        }
    }

    pub(crate) fn ready_value(&self) -> Option<&V> {
        match &self.state {
            EntryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn is_computing(
        &self,
        ticket: u64,
    ) -> bool {
        matches!(self.state, EntryState::Computing { ticket: t, .. } if t == ticket)
    }

    /// Lands the outcome of execution `ticket`. Returns false if the entry was
    /// flushed or taken over by another execution in the meantime.
    pub(crate) fn complete(
        &mut self,
        ticket: u64,
        outcome: &ComputeOutcome<V>,
    ) -> bool {
        if !self.is_computing(ticket) {
            return false;
        }
        self.state = match outcome {
            Ok(value) => EntryState::Ready(value.clone()),
            Err(_) => EntryState::Empty,
        };
        true
    }

    pub(crate) fn reset(&mut self) {
        self.state = EntryState::Empty;
    }
}
