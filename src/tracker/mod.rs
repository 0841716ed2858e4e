//! Observers of finished trials.
//!
//! The [`Loop`](crate::Loop) drains the scheduler's trace after every round
//! and hands each entry to a [`Tracker`].
//!
//! # Available trackers
//!
//! | Tracker | Description | Feature flag |
//! |---------|-------------|-------------|
//! | [`LogTracker`] | Emits a log event whenever the best objective improves | always |
//! | [`MemoryTracker`] | Keeps every entry in a shared `Vec` behind a read-write lock | always |
//! | [`CompositeTracker`] | Forwards every entry to several trackers | always |
//! | `JournalTracker` | Appends entries as JSON lines with `fs2` file locking | `journal` |

#[cfg(feature = "journal")]
mod journal;
mod memory;

#[cfg(feature = "journal")]
pub use journal::JournalTracker;
pub use memory::MemoryTracker;

use crate::error::Result;
use crate::trial::TraceEntry;

/// Receives every finished trial, in completion order.
pub trait Tracker {
    /// Called once per finished trial.
    ///
    /// # Errors
    ///
    /// An error aborts the [`Loop`](crate::Loop).
    fn notify(&mut self, entry: &TraceEntry) -> Result<()>;
}

/// Logs every improvement of the best non-transient objective.
#[derive(Debug, Default)]
pub struct LogTracker {
    best_objective: Option<f64>,
}

impl LogTracker {
    /// A tracker that has not seen any trial yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Best non-transient objective seen so far.
    #[must_use]
    pub fn best_objective(&self) -> Option<f64> {
        self.best_objective
    }
}

impl Tracker for LogTracker {
    fn notify(&mut self, entry: &TraceEntry) -> Result<()> {
        if entry.transient {
            return Ok(());
        }
        if self
            .best_objective
            .is_none_or(|best| entry.objective < best)
        {
            self.best_objective = Some(entry.objective);
            trace_info!(
                objective = entry.objective,
                x = ?entry.x,
                trial = %entry.id,
                "found new best objective"
            );
        }
        Ok(())
    }
}

/// Forwards every entry to each wrapped tracker in order.
#[derive(Default)]
pub struct CompositeTracker {
    trackers: Vec<Box<dyn Tracker>>,
}

impl CompositeTracker {
    /// An empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tracker.
    #[must_use]
    pub fn with(mut self, tracker: impl Tracker + 'static) -> Self {
        self.trackers.push(Box::new(tracker));
        self
    }
}

impl Tracker for CompositeTracker {
    fn notify(&mut self, entry: &TraceEntry) -> Result<()> {
        for tracker in &mut self.trackers {
            tracker.notify(entry)?;
        }
        Ok(())
    }
}
