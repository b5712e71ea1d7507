use std::collections::HashSet;
use std::fmt;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::workflows::domain::{DealId, LeadId, PropertyId, VisitId};
use crate::workflows::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    Lead(LeadId),
    Property(PropertyId),
    Visit(VisitId),
    Deal(DealId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Lead(id) => write!(f, "lead {id}"),
            RowKey::Property(id) => write!(f, "property {id}"),
            RowKey::Visit(id) => write!(f, "visit {id}"),
            RowKey::Deal(id) => write!(f, "deal {id}"),
        }
    }
}

/// Exclusive row locks. A key is either free or held by exactly one guard.
#[derive(Debug, Default)]
pub(crate) struct RowLocks {
    held: Mutex<HashSet<RowKey>>,
    released: Condvar,
}

impl RowLocks {
    /// Block until `key` is free, then take it. Gives up once `timeout` elapses.
    pub(crate) fn acquire(
        &self,
        key: RowKey,
        timeout: Duration,
    ) -> Result<RowLockGuard<'_>, RepositoryError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().map_err(|_| poisoned())?;

        while held.contains(&key) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(row = %key, ?timeout, "row lock wait timed out");
                return Err(RepositoryError::Unavailable(format!(
                    "timed out waiting for {key} lock"
                )));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, remaining)
                .map_err(|_| poisoned())?;
            held = guard;
        }

        held.insert(key);
        Ok(RowLockGuard { locks: self, key })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, key: RowKey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("row lock table poisoned".to_string())
}

/// Releases its row when dropped and wakes every waiter.
#[derive(Debug)]
pub(crate) struct RowLockGuard<'a> {
    locks: &'a RowLocks,
    key: RowKey,
}

impl Drop for RowLockGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        self.locks.released.notify_all();
    }
}
