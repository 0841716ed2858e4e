use std::sync::Arc;

use parking_lot::RwLock;

use super::Tracker;
use crate::error::Result;
use crate::trial::TraceEntry;

/// Keeps every trace entry in memory.
///
/// This is a thin wrapper around `Arc<RwLock<Vec<TraceEntry>>>`. Clones share
/// the same buffer, so a clone kept by the caller sees what the
/// [`Loop`](crate::Loop) recorded through the other.
#[derive(Clone, Default)]
pub struct MemoryTracker {
    entries: Arc<RwLock<Vec<TraceEntry>>>,
}

impl MemoryTracker {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.read().clone()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The shared buffer.
    #[must_use]
    pub fn entries_arc(&self) -> &Arc<RwLock<Vec<TraceEntry>>> {
        &self.entries
    }
}

impl Tracker for MemoryTracker {
    fn notify(&mut self, entry: &TraceEntry) -> Result<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }
}
