//! Local fallback storage used when the remote store is unreachable.
//!
//! A single JSON file mirrors the browser-local key-value store of the
//! original dashboard: the `reservations` key holds the ordered list, the
//! `gestionale_rememberMe` key holds the login persistence flag.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Reservation;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FallbackState {
    #[serde(default)]
    reservations: Vec<Reservation>,
    #[serde(rename = "gestionale_rememberMe", default)]
    remember_me: bool,
}

/// File-backed fallback store.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    path: PathBuf,
}

impl FallbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted reservation list; a missing file is an empty list.
    pub fn load(&self) -> Result<Vec<Reservation>> {
        Ok(self.read_state()?.reservations)
    }

    /// Persist the full reservation list.
    pub fn save(&self, reservations: &[Reservation]) -> Result<()> {
        let mut state = self.read_state()?;
        state.reservations = reservations.to_vec();
        self.write_state(&state)
    }

    /// Remove one record by its position in the persisted (unfiltered) list.
    ///
    /// An out-of-bounds index is rejected without mutation.
    pub fn remove_index(&self, index: usize) -> Result<Reservation> {
        let mut state = self.read_state()?;
        if index >= state.reservations.len() {
            return Err(Error::InvalidIndex(index));
        }
        let removed = state.reservations.remove(index);
        self.write_state(&state)?;
        Ok(removed)
    }

    /// Drop every persisted reservation.
    pub fn clear_reservations(&self) -> Result<()> {
        let mut state = self.read_state()?;
        state.reservations.clear();
        self.write_state(&state)
    }

    pub fn remember_me(&self) -> Result<bool> {
        Ok(self.read_state()?.remember_me)
    }

    pub fn set_remember_me(&self, value: bool) -> Result<()> {
        let mut state = self.read_state()?;
        state.remember_me = value;
        self.write_state(&state)
    }

    fn read_state(&self) -> Result<FallbackState> {
        if !self.path.exists() {
            return Ok(FallbackState::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(FallbackState::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_state(&self, state: &FallbackState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn reservation(created_at: &str) -> Reservation {
        Reservation::from_document(
            None,
            &json!({ "date": "2024-01-15", "time": "20:00", "created_at": created_at }),
        )
    }

    fn store() -> (tempfile::TempDir, FallbackStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::new(dir.path().join("gestionale.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_as_empty_list() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
        assert!(!store.remember_me().unwrap());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (_dir, store) = store();
        store
            .save(&[reservation("a"), reservation("b")])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].created_at, "a");
    }

    #[test]
    fn remove_index_rejects_out_of_bounds_without_mutation() {
        let (_dir, store) = store();
        store.save(&[reservation("a")]).unwrap();

        let error = store.remove_index(5).unwrap_err();
        assert!(matches!(error, Error::InvalidIndex(5)));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn remove_index_splices_the_list() {
        let (_dir, store) = store();
        store
            .save(&[reservation("a"), reservation("b"), reservation("c")])
            .unwrap();

        let removed = store.remove_index(1).unwrap();
        assert_eq!(removed.created_at, "b");

        let remaining = store.load().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r.created_at != "b"));
    }

    #[test]
    fn remember_me_flag_survives_reservation_writes() {
        let (_dir, store) = store();
        store.set_remember_me(true).unwrap();
        store.save(&[reservation("a")]).unwrap();
        store.clear_reservations().unwrap();

        assert!(store.remember_me().unwrap());
        assert!(store.load().unwrap().is_empty());
    }
}
