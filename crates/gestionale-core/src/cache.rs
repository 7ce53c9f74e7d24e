//! Process-wide cache of the last known good reservation list.

use std::sync::RwLock;

use crate::models::Reservation;
use crate::query::sort_by_date_time;

/// Shared holder of the most recently delivered full reservation list.
///
/// Owned by the synchronization layer and injected into readers; it is only
/// ever replaced wholesale, never patched in place, and every replacement
/// re-sorts by the (date, time) key. Readers receive clones.
#[derive(Debug, Default)]
pub struct Cache {
    entries: RwLock<Vec<Reservation>>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with a freshly delivered snapshot.
    pub fn replace(&self, records: Vec<Reservation>) {
        let sorted = sort_by_date_time(records);
        *self.entries.write().expect("cache lock poisoned") = sorted;
    }

    /// Drop every cached record (after a bulk delete).
    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    /// Copy of the current list, in (date, time) order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Reservation> {
        self.entries.read().expect("cache lock poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("cache lock poisoned").is_empty()
    }

    /// Position of a record with the given creation timestamp, used as the
    /// secondary identity when no remote id exists.
    #[must_use]
    pub fn position_by_created_at(&self, created_at: &str) -> Option<usize> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .iter()
            .position(|r| r.created_at == created_at)
    }
}
