//! Notification dispatcher: WhatsApp deep links plus the follow-up status
//! writes and deletions they trigger.

use crate::error::{Error, Result};
use crate::models::{Identity, Reservation, ReservationStatus};
use crate::render::{format_date_message, whatsapp_phone};
use crate::sync::{StatusWrite, SyncService};

/// Seam for opening a messaging deep link in an external context.
pub trait LinkOpener {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opener that prints the deep link for the operator to follow.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOpener;

impl LinkOpener for StdoutOpener {
    fn open(&self, url: &str) -> Result<()> {
        println!("{url}");
        Ok(())
    }
}

/// Composes templated customer messages and dispatches them through a
/// [`LinkOpener`], then records the resulting status transition.
pub struct Notifier<O: LinkOpener> {
    opener: O,
    venue_name: String,
    venue_address: String,
    country_code: String,
}

impl<O: LinkOpener> Notifier<O> {
    pub fn new(
        opener: O,
        venue_name: impl Into<String>,
        venue_address: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            opener,
            venue_name: venue_name.into(),
            venue_address: venue_address.into(),
            country_code: country_code.into(),
        }
    }

    /// Acceptance message interpolating name, long date, time, and venue.
    #[must_use]
    pub fn confirm_message(&self, reservation: &Reservation) -> String {
        format!(
            "Ciao {}, siamo felici di contattarla. La sua prenotazione presso {} \u{e8} stata accettata. Ci vediamo il {} alle {} in {}.",
            reservation.name,
            self.venue_name,
            format_date_message(&reservation.date),
            reservation.time,
            self.venue_address,
        )
    }

    /// Rejection message interpolating name, long date, and time.
    #[must_use]
    pub fn reject_message(&self, reservation: &Reservation) -> String {
        format!(
            "Ciao {}, mi dispiace ma siamo occupati per il {} alle {}. Ci scusiamo per il disagio.",
            reservation.name,
            format_date_message(&reservation.date),
            reservation.time,
        )
    }

    /// Deep-link URL for the given reservation and message body.
    #[must_use]
    pub fn whatsapp_url(&self, reservation: &Reservation, message: &str) -> String {
        let phone = whatsapp_phone(&reservation.phone, &self.country_code);
        format!("https://wa.me/{phone}?text={}", urlencoding::encode(message))
    }

    /// Open the acceptance deep link, then set the record's status to
    /// confirmed. The deep link opens regardless of whether the record has
    /// a remote id; the write outcome is returned so the caller can choose
    /// to ignore it.
    pub async fn confirm(
        &self,
        reservation: &Reservation,
        sync: &mut SyncService,
    ) -> Result<StatusWrite> {
        let message = self.confirm_message(reservation);
        self.opener.open(&self.whatsapp_url(reservation, &message))?;
        sync.update_status(&reservation.identity(), ReservationStatus::Confirmed)
            .await
    }

    /// Open the rejection deep link, then set the record's status to
    /// rejected. Deletion is a separate, gated step: see
    /// [`delete_rejected`].
    ///
    /// [`delete_rejected`]: Notifier::delete_rejected
    pub async fn reject(
        &self,
        reservation: &Reservation,
        sync: &mut SyncService,
    ) -> Result<StatusWrite> {
        let message = self.reject_message(reservation);
        self.opener.open(&self.whatsapp_url(reservation, &message))?;
        sync.update_status(&reservation.identity(), ReservationStatus::Rejected)
            .await
    }

    /// Remove a rejected reservation, after the caller's confirmation gate:
    /// by remote id when available, else by matching the creation timestamp
    /// against the last-known full list. No match means no deletion.
    pub async fn delete_rejected(
        &self,
        reservation: &Reservation,
        sync: &mut SyncService,
    ) -> Result<()> {
        match reservation.identity() {
            identity @ Identity::Remote(_) => sync.delete_one(&identity).await,
            Identity::Unpersisted(created_at) => {
                if sync.cache().position_by_created_at(&created_at).is_none() {
                    return Err(Error::NotFound(created_at));
                }
                sync.delete_one(&Identity::Unpersisted(created_at)).await
            }
            Identity::Local(index) => sync.delete_one(&Identity::Local(index)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::cache::Cache;
    use crate::store::{FallbackStore, MemoryStore};
    use crate::sync::StoreHandle;

    #[derive(Default, Clone)]
    struct RecordingOpener {
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl LinkOpener for RecordingOpener {
        fn open(&self, url: &str) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn reservation(id: Option<&str>) -> Reservation {
        Reservation::from_document(
            id,
            &json!({
                "name": "Mario",
                "phone": "345 123 4567",
                "date": "2024-01-15",
                "time": "20:00",
                "created_at": "2024-01-01T00:00:00Z",
            }),
        )
    }

    fn notifier(opener: RecordingOpener) -> Notifier<RecordingOpener> {
        Notifier::new(
            opener,
            "Agriturismo Camporosso",
            "Cascina Camporosso, Via Serioletto, 24057 Martinengo BG",
            "+39",
        )
    }

    fn sync_with(store: Arc<MemoryStore>, dir: &tempfile::TempDir) -> SyncService {
        let handle = StoreHandle::new();
        handle.provide(store);
        SyncService::new(
            handle,
            FallbackStore::new(dir.path().join("gestionale.json")),
            Arc::new(Cache::new()),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn messages_interpolate_name_date_time_and_venue() {
        let notifier = notifier(RecordingOpener::default());
        let record = reservation(Some("doc-1"));

        let confirm = notifier.confirm_message(&record);
        assert!(confirm.contains("Ciao Mario"));
        assert!(confirm.contains("15 gennaio 2024"));
        assert!(confirm.contains("alle 20:00"));
        assert!(confirm.contains("Cascina Camporosso"));

        let reject = notifier.reject_message(&record);
        assert!(reject.contains("occupati per il 15 gennaio 2024 alle 20:00"));
    }

    #[test]
    fn whatsapp_url_percent_encodes_the_body() {
        let notifier = notifier(RecordingOpener::default());
        let record = reservation(Some("doc-1"));

        let url = notifier.whatsapp_url(&record, "Ci vediamo alle 20:00");
        assert!(url.starts_with("https://wa.me/+393451234567?text="));
        assert!(url.contains("Ci%20vediamo%20alle%2020%3A00"));
    }

    #[tokio::test]
    async fn confirm_applies_status_to_remote_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.seed(vec![reservation(Some("doc-1"))]);
        let mut sync = sync_with(Arc::clone(&store), &dir);
        sync.connect().await;

        let opener = RecordingOpener::default();
        let outcome = notifier(opener.clone())
            .confirm(&reservation(Some("doc-1")), &mut sync)
            .await
            .unwrap();

        assert_eq!(outcome, StatusWrite::Applied);
        assert_eq!(
            store.status_writes(),
            vec![("doc-1".to_string(), ReservationStatus::Confirmed)]
        );
        assert_eq!(opener.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirm_without_id_still_opens_the_deep_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut sync = sync_with(Arc::clone(&store), &dir);
        sync.connect().await;

        let opener = RecordingOpener::default();
        let outcome = notifier(opener.clone())
            .confirm(&reservation(None), &mut sync)
            .await
            .unwrap();

        assert_eq!(outcome, StatusWrite::Skipped);
        assert!(store.status_writes().is_empty());
        assert_eq!(opener.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reject_sets_rejected_and_gated_delete_removes_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.seed(vec![reservation(Some("doc-1"))]);
        let mut sync = sync_with(Arc::clone(&store), &dir);
        sync.connect().await;
        sync.load().await.unwrap();

        let notifier = notifier(RecordingOpener::default());
        let record = reservation(Some("doc-1"));
        let outcome = notifier.reject(&record, &mut sync).await.unwrap();
        assert_eq!(outcome, StatusWrite::Applied);

        notifier.delete_rejected(&record, &mut sync).await.unwrap();
        assert!(store.is_empty());
        assert!(sync.cache().is_empty());
    }

    #[tokio::test]
    async fn delete_rejected_without_match_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = sync_with(Arc::new(MemoryStore::new()), &dir);
        sync.connect().await;

        let error = notifier(RecordingOpener::default())
            .delete_rejected(&reservation(None), &mut sync)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
