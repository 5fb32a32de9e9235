//! Transactional boundary for balance changes.
//!
//! A balance change and the weight reconciliation it triggers form one
//! logical operation. Participants journal their mutations between `begin`
//! and `commit`; a [`UnitOfWork`] dropped without `commit` replays the
//! journals backwards, so a failure anywhere leaves no partial state.

use tracing::warn;

use crate::listener::SharedListener;

/// State that can be restored to the point where `begin` was called.
pub trait Transactional {
    /// Start recording undo information.
    fn begin(&mut self);

    /// Keep every change made since `begin` and stop recording.
    fn commit(&mut self);

    /// Undo every change made since `begin` and stop recording.
    fn rollback(&mut self);
}

/// Undo log owned by a [`Transactional`] participant.
///
/// Entries are only kept while recording; outside a unit of work mutations
/// are final and cost nothing to journal.
#[derive(Debug)]
pub struct Journal<U> {
    entries: Option<Vec<U>>,
}

impl<U> Journal<U> {
    pub fn new() -> Self {
        Self { entries: None }
    }

    pub fn begin(&mut self) {
        debug_assert!(self.entries.is_none(), "units of work do not nest");
        self.entries = Some(Vec::new());
    }

    pub fn is_recording(&self) -> bool {
        self.entries.is_some()
    }

    pub fn record(&mut self, entry: U) {
        if let Some(entries) = self.entries.as_mut() {
            entries.push(entry);
        }
    }

    /// Stop recording and discard the log.
    pub fn commit(&mut self) {
        self.entries = None;
    }

    /// Stop recording and hand back the log, newest entry first.
    pub fn drain_for_rollback(&mut self) -> Vec<U> {
        let mut entries = self.entries.take().unwrap_or_default();
        entries.reverse();
        entries
    }
}

impl<U> Default for Journal<U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard enlisting every balance listener for one operation.
///
/// Dropping the guard without calling [`UnitOfWork::commit`] rolls every
/// participant back in reverse enlistment order.
pub struct UnitOfWork {
    participants: Vec<SharedListener>,
    committed: bool,
}

impl UnitOfWork {
    pub fn begin<I>(participants: I) -> Self
    where
        I: IntoIterator<Item = SharedListener>,
    {
        let participants: Vec<SharedListener> = participants.into_iter().collect();
        for participant in &participants {
            participant.lock().begin();
        }
        Self {
            participants,
            committed: false,
        }
    }

    pub fn commit(mut self) {
        for participant in &self.participants {
            participant.lock().commit();
        }
        self.committed = true;
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        warn!(participants = self.participants.len(), "Rolling back unit of work");
        for participant in self.participants.iter().rev() {
            participant.lock().rollback();
        }
    }
}
