//! Runtime configuration for the gestionale.
//!
//! Safe-to-ship public identifiers (project id, API key, collection name)
//! plus venue constants used by the notification templates. Secret
//! credentials must never be stored here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// Logical collection holding reservation documents.
pub const RESERVATIONS_COLLECTION: &str = "reservations";

const DEFAULT_USERNAME_DOMAIN: &str = "camporosso.local";
const DEFAULT_COUNTRY_CODE: &str = "+39";
const DEFAULT_VENUE_NAME: &str = "Agriturismo Camporosso";
const DEFAULT_VENUE_ADDRESS: &str = "Cascina Camporosso, Via Serioletto, 24057 Martinengo BG";
const DEFAULT_READY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GestionaleConfig {
    pub firebase_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub collection: String,
    pub username_domain: String,
    pub country_code: String,
    pub venue_name: String,
    pub venue_address: String,
    /// Bound, in seconds, on waiting for the store handle to become ready.
    pub ready_timeout_secs: u64,
}

impl Default for GestionaleConfig {
    fn default() -> Self {
        Self {
            firebase_api_key: None,
            firebase_project_id: None,
            collection: RESERVATIONS_COLLECTION.to_string(),
            username_domain: DEFAULT_USERNAME_DOMAIN.to_string(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            venue_name: DEFAULT_VENUE_NAME.to_string(),
            venue_address: DEFAULT_VENUE_ADDRESS.to_string(),
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
        }
    }
}

impl GestionaleConfig {
    /// Read configuration from `GESTIONALE_*` environment variables,
    /// falling back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            firebase_api_key: env_option("GESTIONALE_FIREBASE_API_KEY"),
            firebase_project_id: env_option("GESTIONALE_FIREBASE_PROJECT_ID"),
            collection: env_option("GESTIONALE_COLLECTION").unwrap_or(defaults.collection),
            username_domain: env_option("GESTIONALE_USERNAME_DOMAIN")
                .unwrap_or(defaults.username_domain),
            country_code: env_option("GESTIONALE_COUNTRY_CODE").unwrap_or(defaults.country_code),
            venue_name: env_option("GESTIONALE_VENUE_NAME").unwrap_or(defaults.venue_name),
            venue_address: env_option("GESTIONALE_VENUE_ADDRESS")
                .unwrap_or(defaults.venue_address),
            ready_timeout_secs: env_option("GESTIONALE_READY_TIMEOUT_SECS")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.ready_timeout_secs),
        }
    }

    /// Project id required by the remote store, if configured.
    #[must_use]
    pub fn project_id(&self) -> Option<String> {
        normalize_text_option(self.firebase_project_id.clone())
    }

    /// API key required by the auth provider, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        normalize_text_option(self.firebase_api_key.clone())
    }

    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

fn env_option(key: &str) -> Option<String> {
    normalize_text_option(std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_the_venue_constants() {
        let config = GestionaleConfig::default();
        assert_eq!(config.collection, "reservations");
        assert_eq!(config.username_domain, "camporosso.local");
        assert_eq!(config.country_code, "+39");
        assert_eq!(config.ready_timeout(), Duration::from_secs(10));
        assert_eq!(config.project_id(), None);
    }

    #[test]
    fn blank_identifiers_normalize_to_none() {
        let config = GestionaleConfig {
            firebase_api_key: Some("   ".to_string()),
            firebase_project_id: Some(" demo-project ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_key(), None);
        assert_eq!(config.project_id(), Some("demo-project".to_string()));
    }

    #[test]
    fn config_roundtrips_through_serde() {
        let config = GestionaleConfig {
            firebase_project_id: Some("demo-project".to_string()),
            ..Default::default()
        };
        let raw = serde_json::to_string(&config).unwrap();
        let parsed: GestionaleConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, config);
    }
}
