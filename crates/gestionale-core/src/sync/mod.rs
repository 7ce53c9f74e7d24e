//! Synchronization layer between the remote store, the local fallback, and
//! the process-wide cache.
//!
//! The cache is only ever replaced wholesale with the most recently
//! delivered snapshot; readers never observe a partially patched list.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::models::{Identity, Reservation, ReservationStatus};
use crate::query::sort_by_date_time;
use crate::store::{FallbackStore, ReservationStore, MAX_BATCH_OPS};

/// Connection state of a logical session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Connected,
    /// The store handle never became ready within the bound; reads and
    /// writes fall back to local persisted storage.
    Unavailable,
}

/// Where a load's records came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Fallback,
}

/// Outcome of a full load.
#[derive(Debug)]
pub struct LoadResult {
    pub records: Vec<Reservation>,
    pub source: LoadSource,
    /// Remote error that forced the fallback path, when any.
    pub degraded: Option<Error>,
}

/// Outcome of a status write; skipped writes are observable, not silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusWrite {
    Applied,
    /// No remote id to address, nothing was written.
    Skipped,
}

/// Outcome of a bulk delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkDelete {
    /// The collection was already empty.
    Empty,
    Deleted(usize),
}

/// One-shot readiness handshake for the externally-provided store.
///
/// Bootstrap code resolves the handle exactly once via [`provide`];
/// consumers await [`wait`] with a bound instead of polling.
///
/// [`provide`]: StoreHandle::provide
/// [`wait`]: StoreHandle::wait
#[derive(Clone, Default)]
pub struct StoreHandle {
    store: Arc<OnceLock<Arc<dyn ReservationStore>>>,
    ready: Arc<Notify>,
}

impl StoreHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the handle. Returns false if it was already resolved.
    pub fn provide(&self, store: Arc<dyn ReservationStore>) -> bool {
        let provided = self.store.set(store).is_ok();
        if provided {
            self.ready.notify_waiters();
        }
        provided
    }

    /// Wait for the store, bounded by `timeout`. `None` means the handle
    /// never resolved within the bound.
    pub async fn wait(&self, timeout: Duration) -> Option<Arc<dyn ReservationStore>> {
        if let Some(store) = self.store.get() {
            return Some(Arc::clone(store));
        }

        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.ready.notified();
                if let Some(store) = self.store.get() {
                    return Arc::clone(store);
                }
                notified.await;
            }
        })
        .await
        .ok()
    }
}

/// Handle to the single active live subscription.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Cancel the feed synchronously.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bridges the remote store, the local fallback, and the cache.
pub struct SyncService {
    handle: StoreHandle,
    store: Option<Arc<dyn ReservationStore>>,
    state: SyncState,
    cache: Arc<Cache>,
    fallback: FallbackStore,
    subscription: Option<Subscription>,
    ready_timeout: Duration,
}

impl SyncService {
    #[must_use]
    pub fn new(
        handle: StoreHandle,
        fallback: FallbackStore,
        cache: Arc<Cache>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            handle,
            store: None,
            state: SyncState::Disconnected,
            cache,
            fallback,
            subscription: None,
            ready_timeout,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn cache(&self) -> Arc<Cache> {
        Arc::clone(&self.cache)
    }

    /// Wait for the store handle; lands in `Connected` or `Unavailable`.
    pub async fn connect(&mut self) -> SyncState {
        self.state = SyncState::Connecting;
        match self.handle.wait(self.ready_timeout).await {
            Some(store) => {
                self.store = Some(store);
                self.state = SyncState::Connected;
            }
            None => {
                tracing::error!(
                    timeout_ms = self.ready_timeout.as_millis() as u64,
                    "store handle never became ready, falling back to local storage"
                );
                self.state = SyncState::Unavailable;
            }
        }
        self.state
    }

    /// One-shot full load. The remote path fetches the ordered collection
    /// and replaces the cache; any remote failure degrades to the fallback
    /// list through the same normalize-and-sort pipeline.
    pub async fn load(&mut self) -> Result<LoadResult> {
        if let Some(store) = self.store.clone() {
            match store.list_all().await {
                Ok(records) => {
                    let sorted = sort_by_date_time(records);
                    tracing::info!(count = sorted.len(), "loaded reservations from store");
                    self.cache.replace(sorted.clone());
                    return Ok(LoadResult {
                        records: sorted,
                        source: LoadSource::Remote,
                        degraded: None,
                    });
                }
                Err(error) => {
                    tracing::error!(%error, "remote load failed, using local fallback");
                    let records = self.load_fallback()?;
                    return Ok(LoadResult {
                        records,
                        source: LoadSource::Fallback,
                        degraded: Some(error),
                    });
                }
            }
        }

        tracing::warn!("store unavailable, loading reservations from local fallback");
        let records = self.load_fallback()?;
        Ok(LoadResult {
            records,
            source: LoadSource::Fallback,
            degraded: None,
        })
    }

    fn load_fallback(&self) -> Result<Vec<Reservation>> {
        let sorted = sort_by_date_time(self.fallback.load()?);
        self.cache.replace(sorted.clone());
        Ok(sorted)
    }

    /// Open the live feed: full-collection snapshots delivered in emission
    /// order, each replacing the cache wholesale (last write wins). At most
    /// one subscription is active; starting a new one cancels the prior one
    /// synchronously before the new feed is requested.
    pub fn subscribe(&mut self, interval: Duration) -> Result<mpsc::Receiver<Vec<Reservation>>> {
        let Some(store) = self.store.clone() else {
            return Err(Error::Unavailable(
                "cannot subscribe without a connected store".to_string(),
            ));
        };

        if let Some(previous) = self.subscription.take() {
            previous.cancel();
        }

        let (tx, rx) = mpsc::channel(8);
        let cache = Arc::clone(&self.cache);
        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Reservation>> = None;
            loop {
                match store.list_all().await {
                    Ok(records) => {
                        let sorted = sort_by_date_time(records);
                        if last.as_ref() != Some(&sorted) {
                            cache.replace(sorted.clone());
                            last = Some(sorted.clone());
                            if tx.send(sorted).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        tracing::error!(%error, "live reservation feed update failed");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        self.subscription = Some(Subscription { task });
        Ok(rx)
    }

    /// Cancel the live feed, if any.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Update a single record's status. Records without a remote id are
    /// skipped, and the skip is reported to the caller instead of being
    /// silently swallowed.
    pub async fn update_status(
        &mut self,
        identity: &Identity,
        status: ReservationStatus,
    ) -> Result<StatusWrite> {
        let Identity::Remote(id) = identity else {
            tracing::warn!(?identity, "status update skipped for non-remote record");
            return Ok(StatusWrite::Skipped);
        };

        let Some(store) = self.store.clone() else {
            tracing::warn!("status update skipped, store unavailable");
            return Ok(StatusWrite::Skipped);
        };

        store.update_status(id, status).await?;
        tracing::info!(id = %id, status = %status, "reservation status updated");
        Ok(StatusWrite::Applied)
    }

    /// Delete one record. Callers are expected to have passed a human
    /// confirmation gate before calling.
    pub async fn delete_one(&mut self, identity: &Identity) -> Result<()> {
        match identity {
            Identity::Remote(id) => {
                let Some(store) = self.store.clone() else {
                    return Err(Error::Unavailable(
                        "cannot delete a remote reservation without the store".to_string(),
                    ));
                };
                store.delete_document(id).await?;
                tracing::info!(id = %id, "reservation deleted");
                // Refresh the view from the authoritative collection
                self.load().await?;
                Ok(())
            }
            Identity::Local(index) => {
                let removed = self.fallback.remove_index(*index)?;
                tracing::info!(created_at = %removed.created_at, "local reservation removed");
                self.load_fallback()?;
                Ok(())
            }
            Identity::Unpersisted(created_at) => {
                let resolved = self.resolve_unpersisted(created_at)?;
                Box::pin(self.delete_one(&resolved)).await
            }
        }
    }

    /// Resolve a creation-timestamp identity against the last-known full
    /// list. The fallback position is looked up in the unfiltered persisted
    /// list, never in a filtered view.
    fn resolve_unpersisted(&self, created_at: &str) -> Result<Identity> {
        let snapshot = self.cache.snapshot();
        if let Some(record) = snapshot.iter().find(|r| r.created_at == created_at) {
            if let Some(id) = &record.id {
                return Ok(Identity::Remote(id.clone()));
            }
        }

        let persisted = self.fallback.load()?;
        persisted
            .iter()
            .position(|r| r.created_at == created_at)
            .map(Identity::Local)
            .ok_or_else(|| Error::NotFound(created_at.to_string()))
    }

    /// Delete the whole collection. The remote path commits deletions in
    /// fixed-size batches to respect the backend's atomic-batch cap; the
    /// fallback path clears the persisted list. Both clear the cache.
    pub async fn delete_all(&mut self) -> Result<BulkDelete> {
        if let Some(store) = self.store.clone() {
            let records = store.list_all().await?;
            if records.is_empty() {
                tracing::info!("no reservations to delete");
                return Ok(BulkDelete::Empty);
            }

            let ids: Vec<String> = records.into_iter().filter_map(|r| r.id).collect();
            for (batch_index, chunk) in ids.chunks(MAX_BATCH_OPS).enumerate() {
                store.delete_batch(chunk).await?;
                tracing::info!(
                    batch = batch_index + 1,
                    size = chunk.len(),
                    "committed delete batch"
                );
            }

            self.cache.clear();
            return Ok(BulkDelete::Deleted(ids.len()));
        }

        tracing::warn!("store unavailable, clearing local fallback");
        let count = self.fallback.load()?.len();
        self.fallback.clear_reservations()?;
        self.cache.clear();
        if count == 0 {
            Ok(BulkDelete::Empty)
        } else {
            Ok(BulkDelete::Deleted(count))
        }
    }
}
