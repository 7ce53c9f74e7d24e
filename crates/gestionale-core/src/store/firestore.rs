//! Firestore REST client for the reservations collection.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::models::{Reservation, ReservationStatus};
use crate::store::{ReservationStore, MAX_BATCH_OPS};
use crate::util::{compact_text, iso_timestamp_now};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const LIST_PAGE_SIZE: usize = 300;

/// REST client against a Firestore project's reservation collection.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    project_id: String,
    collection: String,
    /// Bearer token of the signed-in admin, when available.
    auth_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let project_id = project_id.into().trim().to_string();
        if project_id.is_empty() {
            return Err(Error::InvalidInput(
                "Firestore project id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder().build()?,
            project_id,
            collection: collection.into(),
            auth_token: None,
        })
    }

    /// Attach the signed-in user's id token to subsequent requests.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn documents_url(&self) -> String {
        format!(
            "{FIRESTORE_BASE}/projects/{}/databases/(default)/documents/{}",
            self.project_id, self.collection
        )
    }

    fn batch_write_url(&self) -> String {
        format!(
            "{FIRESTORE_BASE}/projects/{}/databases/(default)/documents:batchWrite",
            self.project_id
        )
    }

    /// Fully qualified document name as required by batch writes.
    fn document_name(&self, id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}/{id}",
            self.project_id, self.collection
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_api_error(status, &body))
    }
}

#[async_trait]
impl ReservationStore for FirestoreStore {
    async fn list_all(&self) -> Result<Vec<Reservation>> {
        let mut reservations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .authorized(self.client.get(self.documents_url()))
                .query(&[
                    ("pageSize", LIST_PAGE_SIZE.to_string()),
                    ("orderBy", "created_at desc".to_string()),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = Self::check(request.send().await?).await?;
            let page = response.json::<ListDocumentsResponse>().await?;

            for doc in page.documents {
                reservations.push(doc.into_reservation());
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(reservations)
    }

    async fn update_status(&self, id: &str, status: ReservationStatus) -> Result<()> {
        let url = format!("{}/{id}", self.documents_url());
        let body = json!({
            "fields": {
                "status": { "stringValue": status.label() },
                "updated_at": { "timestampValue": iso_timestamp_now() },
            }
        });

        let request = self
            .authorized(self.client.patch(url))
            .query(&[
                ("updateMask.fieldPaths", "status"),
                ("updateMask.fieldPaths", "updated_at"),
            ])
            .json(&body);

        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let url = format!("{}/{id}", self.documents_url());
        let request = self
            .authorized(self.client.delete(url))
            .query(&[("currentDocument.exists", "true")]);
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        if ids.len() > MAX_BATCH_OPS {
            return Err(Error::InvalidInput(format!(
                "batch of {} exceeds the {MAX_BATCH_OPS}-operation limit",
                ids.len()
            )));
        }

        let writes: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "delete": self.document_name(id) }))
            .collect();
        let request = self
            .authorized(self.client.post(self.batch_write_url()))
            .json(&json!({ "writes": writes }));

        Self::check(request.send().await?).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreDocument {
    fn into_reservation(self) -> Reservation {
        let id = self.name.rsplit('/').next().map(ToString::to_string);
        let plain = decode_fields(&self.fields);
        Reservation::from_document(id.as_deref(), &plain)
    }
}

/// Flatten Firestore's typed value encoding into plain JSON.
fn decode_fields(fields: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for (key, value) in fields {
        out.insert(key.clone(), decode_value(value));
    }
    Value::Object(out)
}

fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };

    if let Some(s) = map.get("stringValue") {
        return s.clone();
    }
    if let Some(s) = map.get("timestampValue") {
        return s.clone();
    }
    if let Some(n) = map.get("integerValue") {
        // Firestore encodes integers as strings
        if let Some(parsed) = n.as_str().and_then(|raw| raw.parse::<i64>().ok()) {
            return json!(parsed);
        }
        return n.clone();
    }
    if let Some(n) = map.get("doubleValue") {
        return n.clone();
    }
    if let Some(b) = map.get("booleanValue") {
        return b.clone();
    }
    if let Some(inner) = map.get("mapValue").and_then(|m| m.get("fields")) {
        if let Some(fields) = inner.as_object() {
            return decode_fields(fields);
        }
    }
    if let Some(items) = map.get("arrayValue").and_then(|a| a.get("values")) {
        if let Some(values) = items.as_array() {
            return Value::Array(values.iter().map(decode_value).collect());
        }
    }
    Value::Null
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorBody {
    error: Option<FirestoreErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn map_api_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<FirestoreErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                compact_text(body)
            }
        });
    let code = detail.and_then(|d| d.status).unwrap_or_default();

    if status == StatusCode::FORBIDDEN || code == "PERMISSION_DENIED" {
        Error::PermissionDenied(message)
    } else if status == StatusCode::NOT_FOUND || code == "NOT_FOUND" {
        Error::NotFound(message)
    } else {
        Error::Store(format!("{message} ({})", status.as_u16()))
    }
}
