//! Balance-change subscriptions.
//!
//! The deposit ledger fans every balance change out to its listeners in
//! registration order. Listeners are shared handles so the voting engine can
//! be notified by the ledger and still be driven directly by callers.

use std::sync::Arc;

use parking_lot::Mutex;
use stakepoll_types::{Address, Amount};
use tracing::debug;

use crate::error::Result;
use crate::unit_of_work::Transactional;

/// A committed-to-be balance change for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub member: Address,
    pub previous: Amount,
    pub current: Amount,
    /// Unix time of the change, used for passive deadline checks.
    pub timestamp: u64,
}

/// Capability of reacting to deposit balance changes.
///
/// Implementations must be [`Transactional`]: a later listener failing, or
/// the custody transfer failing, rolls back what an earlier listener did.
pub trait BalanceChangeListener: Transactional + Send {
    fn on_balance_changed(&mut self, change: &BalanceChange) -> Result<()>;
}

pub type SharedListener = Arc<Mutex<dyn BalanceChangeListener>>;

/// Ordered, duplicate-free set of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<SharedListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Registering the same handle twice is a no-op.
    ///
    /// Returns `true` if the listener was newly added.
    pub fn register(&mut self, listener: SharedListener) -> bool {
        let ptr = Arc::as_ptr(&listener) as *const ();
        if self.listeners.iter().any(|l| Arc::as_ptr(l) as *const () == ptr) {
            return false;
        }
        self.listeners.push(listener);
        debug!(listeners = self.listeners.len(), "Registered balance listener");
        true
    }

    /// Notify every listener in registration order.
    ///
    /// Stops at the first failure and returns it; the caller's unit of work
    /// undoes the listeners that already ran.
    pub fn notify_all(&self, change: &BalanceChange) -> Result<()> {
        for listener in &self.listeners {
            listener.lock().on_balance_changed(change)?;
        }
        Ok(())
    }

    pub fn handles(&self) -> impl Iterator<Item = SharedListener> + '_ {
        self.listeners.iter().cloned()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::GovernanceError;

    /// Records notifications; optionally fails every call.
    #[derive(Debug, Default)]
    pub struct RecordingListener {
        pub seen: Vec<BalanceChange>,
        pub fail: bool,
        pending: Option<usize>,
    }

    impl RecordingListener {
        pub fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }
    }

    impl Transactional for RecordingListener {
        fn begin(&mut self) {
            self.pending = Some(self.seen.len());
        }

        fn commit(&mut self) {
            self.pending = None;
        }

        fn rollback(&mut self) {
            if let Some(len) = self.pending.take() {
                self.seen.truncate(len);
            }
        }
    }

    impl BalanceChangeListener for RecordingListener {
        fn on_balance_changed(&mut self, change: &BalanceChange) -> Result<()> {
            if self.fail {
                return Err(GovernanceError::ConsistencyViolation("listener refused".into()));
            }
            self.seen.push(*change);
            Ok(())
        }
    }
}
