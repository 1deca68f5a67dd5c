//! Per-ISBN mutual exclusion for lending transitions
//!
//! Each ISBN maps to its own async mutex, created on first use and dropped
//! from the table once nobody holds or awaits it. Two ISBNs never share a
//! mutex, so transitions on different books never wait on each other.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

type Slot = Arc<AsyncMutex<()>>;
type SlotTable = Arc<Mutex<HashMap<String, Slot>>>;

/// Table of per-ISBN critical sections
#[derive(Default)]
pub struct IsbnLocks {
    slots: SlotTable,
}

/// Held for the duration of one check-and-commit on a single ISBN
pub struct IsbnGuard {
    isbn: String,
    guard: Option<OwnedMutexGuard<()>>,
    slots: SlotTable,
}

impl IsbnGuard {
    pub fn isbn(&self) -> &str {
        &self.isbn
    }
}

impl Drop for IsbnGuard {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            let slot = OwnedMutexGuard::mutex(&guard).clone();
            let mut slots = self.slots.lock();
            drop(guard);
            evict_if_idle(&mut slots, &self.isbn, &slot);
        }
    }
}

/// Remove the entry when the table and `slot` are its only references.
/// Callers hold the table lock, so no new reference can appear meanwhile.
fn evict_if_idle(slots: &mut HashMap<String, Slot>, isbn: &str, slot: &Slot) {
    let idle = slots
        .get(isbn)
        .map(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2)
        .unwrap_or(false);
    if idle {
        slots.remove(isbn);
    }
}

/// Reference held while waiting for a slot. Dropping it, whether the wait
/// timed out, succeeded or was cancelled, evicts the entry if nothing else
/// holds or awaits it.
struct PendingSlot {
    isbn: String,
    slot: Slot,
    slots: SlotTable,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        evict_if_idle(&mut self.slots.lock(), &self.isbn, &self.slot);
    }
}

impl IsbnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the section for `isbn`, waiting at most `timeout`.
    ///
    /// Fails with `Busy` when the wait bound elapses.
    pub async fn acquire(&self, isbn: &str, timeout: Duration) -> AppResult<IsbnGuard> {
        let pending = PendingSlot {
            isbn: isbn.to_string(),
            slot: self.slots.lock().entry(isbn.to_string()).or_default().clone(),
            slots: self.slots.clone(),
        };

        let acquired = {
            let lock = pending.slot.clone().lock_owned();
            tokio::time::timeout(timeout, lock).await
        };

        match acquired {
            Ok(guard) => Ok(IsbnGuard {
                isbn: isbn.to_string(),
                guard: Some(guard),
                slots: self.slots.clone(),
            }),
            Err(_) => Err(AppError::Busy(format!(
                "Book {} is being updated by another request, retry later",
                isbn
            ))),
        }
    }

    /// Number of ISBNs currently held or awaited
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
