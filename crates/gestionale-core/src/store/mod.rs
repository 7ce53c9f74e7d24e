//! Storage layer: remote document store clients and the local fallback.

mod fallback;
mod firestore;
mod memory;

use async_trait::async_trait;

pub use fallback::FallbackStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Reservation, ReservationStatus};

/// The backend commits at most this many operations per atomic batch.
pub const MAX_BATCH_OPS: usize = 500;

/// Operations consumed from the external document store.
///
/// The store is opaque: per-document CRUD, an ordered full listing, and a
/// capped batch delete. Live updates are built on top of `list_all` by the
/// synchronization layer.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Fetch the whole collection, ordered by server-side creation
    /// timestamp, descending.
    async fn list_all(&self) -> Result<Vec<Reservation>>;

    /// Update a single document's status field plus its update timestamp.
    async fn update_status(&self, id: &str, status: ReservationStatus) -> Result<()>;

    /// Delete one document by id.
    async fn delete_document(&self, id: &str) -> Result<()>;

    /// Delete up to [`MAX_BATCH_OPS`] documents in one atomic batch.
    async fn delete_batch(&self, ids: &[String]) -> Result<()>;
}
