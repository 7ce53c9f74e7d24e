//! In-memory store implementation, primarily for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Reservation, ReservationStatus};
use crate::store::{ReservationStore, MAX_BATCH_OPS};

/// In-memory [`ReservationStore`] that records the batch sizes it commits
/// and the status writes it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<Reservation>>,
    committed_batches: Mutex<Vec<usize>>,
    status_writes: Mutex<Vec<(String, ReservationStatus)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, reservations: Vec<Reservation>) {
        *self.documents.lock().expect("store lock poisoned") = reservations;
    }

    /// Sizes of each committed delete batch, in commit order.
    #[must_use]
    pub fn committed_batches(&self) -> Vec<usize> {
        self.committed_batches
            .lock()
            .expect("store lock poisoned")
            .clone()
    }

    /// Every status update received, in call order.
    #[must_use]
    pub fn status_writes(&self) -> Vec<(String, ReservationStatus)> {
        self.status_writes
            .lock()
            .expect("store lock poisoned")
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().expect("store lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.lock().expect("store lock poisoned").is_empty()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Reservation>> {
        let mut documents = self.documents.lock().expect("store lock poisoned").clone();
        // Server-side ordering: creation timestamp, descending
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn update_status(&self, id: &str, status: ReservationStatus) -> Result<()> {
        let mut documents = self.documents.lock().expect("store lock poisoned");
        let Some(record) = documents.iter_mut().find(|r| r.id.as_deref() == Some(id)) else {
            return Err(Error::NotFound(id.to_string()));
        };
        record.status = status;
        self.status_writes
            .lock()
            .expect("store lock poisoned")
            .push((id.to_string(), status));
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut documents = self.documents.lock().expect("store lock poisoned");
        let before = documents.len();
        documents.retain(|r| r.id.as_deref() != Some(id));
        if documents.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        if ids.len() > MAX_BATCH_OPS {
            return Err(Error::InvalidInput(format!(
                "batch of {} exceeds the {MAX_BATCH_OPS}-operation limit",
                ids.len()
            )));
        }

        let mut documents = self.documents.lock().expect("store lock poisoned");
        documents.retain(|r| {
            r.id.as_ref()
                .is_none_or(|id| !ids.contains(id))
        });
        self.committed_batches
            .lock()
            .expect("store lock poisoned")
            .push(ids.len());
        Ok(())
    }
}
