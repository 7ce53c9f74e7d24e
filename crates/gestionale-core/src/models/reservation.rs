//! Reservation model and document normalizer

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::iso_timestamp_now;

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Incoming request, not yet handled
    #[default]
    New,
    /// Accepted by the venue
    Confirmed,
    /// Declined by the venue
    Rejected,
    /// Withdrawn by the customer
    Cancelled,
}

impl ReservationStatus {
    /// Badge label shown in the reservations table.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "confirmed" => Self::Confirmed,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            _ => Self::New,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a reservation is addressed for mutation.
///
/// Exactly one variant applies at any call site; callers resolve it
/// explicitly instead of inferring it from value shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Persisted remotely, addressed by document id
    Remote(String),
    /// Only present in the local fallback list, addressed by position
    Local(usize),
    /// Not yet persisted, addressed by its creation timestamp
    Unpersisted(String),
}

/// Canonical reservation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Remote document id, absent for purely local records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Calendar date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Time of day, `HH:MM`
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub guests: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: ReservationStatus,
    /// ISO-8601 creation timestamp; secondary identity when `id` is absent
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

impl Reservation {
    /// Normalize a raw document into a canonical reservation.
    ///
    /// Total over any object-shaped input: missing scalars default to empty
    /// string / zero, a store-native timestamp object is converted to its
    /// ISO-8601 string, and an absent `created_at` is defaulted to "now" at
    /// normalization time. The id is taken from the document's own
    /// identifier when present, else from a raw `id` field, else left absent.
    #[must_use]
    pub fn from_document(doc_id: Option<&str>, data: &Value) -> Self {
        let id = doc_id
            .map(ToString::to_string)
            .or_else(|| string_field(data, "id"));

        Self {
            id,
            name: string_field(data, "name").unwrap_or_default(),
            surname: string_field(data, "surname").unwrap_or_default(),
            email: string_field(data, "email").unwrap_or_default(),
            phone: string_field(data, "phone").unwrap_or_default(),
            date: string_field(data, "date").unwrap_or_default(),
            time: string_field(data, "time").unwrap_or_default(),
            guests: guests_field(data),
            notes: string_field(data, "notes").unwrap_or_default(),
            status: string_field(data, "status")
                .map(|raw| ReservationStatus::parse(&raw))
                .unwrap_or_default(),
            created_at: created_at_field(data).unwrap_or_else(iso_timestamp_now),
        }
    }

    /// Full customer name as rendered in the table.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }

    /// The addressing identity used for mutations on this record.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.id.as_ref().map_or_else(
            || Identity::Unpersisted(self.created_at.clone()),
            |id| Identity::Remote(id.clone()),
        )
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn guests_field(data: &Value) -> u32 {
    match data.get("guests") {
        Some(Value::Number(n)) => u32::try_from(n.as_u64().unwrap_or(0)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Accepts an ISO string (`created_at` or `createdAt`) or a store-native
/// timestamp object carrying a `timestampValue`.
fn created_at_field(data: &Value) -> Option<String> {
    let raw = data.get("created_at").or_else(|| data.get("createdAt"))?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("timestampValue")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}
