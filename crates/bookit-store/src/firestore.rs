//! [`RecordStore`] backed by the Firestore REST API (v1).
//!
//! Documents live in a single collection (default `users`). Each document
//! has `name`, `email`, `password` (a PBKDF2 hash, never plaintext) and a
//! `favorites` array of strings. The document id is the record id.
//!
//! Only the subset of the API the session layer needs is used:
//!
//! | Operation          | Request                                              |
//! |--------------------|------------------------------------------------------|
//! | insert             | `POST documents/users`                               |
//! | get                | `GET documents/users/{id}`                           |
//! | equality queries   | `POST documents:runQuery`                            |
//! | field updates      | `PATCH documents/users/{id}?updateMask.fieldPaths=…` |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::record::{NewUser, RecordStore, StoredCredentials, UserRecord};

/// Default Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Connection settings for a Firestore project.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Web API key, sent as the `key` query parameter when present.
    pub api_key: Option<String>,
    /// Database id, `(default)` for most projects.
    pub database: String,
    pub collection: String,
    /// Override for emulators or proxies.
    pub base_url: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: None,
            database: "(default)".to_string(),
            collection: "users".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Remote user documents in Firestore.
pub struct FirestoreRecordStore {
    config: FirestoreConfig,
    client: reqwest::Client,
}

impl FirestoreRecordStore {
    pub fn new(config: FirestoreConfig) -> StoreResult<Self> {
        if config.project_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "firestore project id must not be empty".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("bookit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, client })
    }

    // -----------------------------------------------------------------------
    // URL helpers
    // -----------------------------------------------------------------------

    /// `{base}/projects/{project}/databases/{db}/documents{suffix}` with the
    /// API key appended.
    fn url(&self, suffix: &str) -> StoreResult<Url> {
        let raw = format!(
            "{}/projects/{}/databases/{}/documents{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.database,
            suffix,
        );
        let mut url = Url::parse(&raw)?;
        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    fn collection_url(&self) -> StoreResult<Url> {
        self.url(&format!("/{}", self.config.collection))
    }

    fn document_url(&self, id: &str) -> StoreResult<Url> {
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::InvalidArgument(format!(
                "invalid document id: {id:?}"
            )));
        }
        self.url(&format!("/{}/{id}", self.config.collection))
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    /// Send a request and return the parsed JSON body, or `None` on 404.
    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<Option<Value>> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "firestore request failed");
            return Err(StoreError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response.json::<Value>().await?))
    }

    /// Run an equality query over `(field, value)` pairs joined with AND.
    async fn query_equal(
        &self,
        filters: &[(&str, &str)],
        limit: Option<u32>,
    ) -> StoreResult<Vec<Document>> {
        let url = self.url(":runQuery")?;
        let body = query_body(&self.config.collection, filters, limit);

        let response = self
            .send(self.client.post(url).json(&body))
            .await?
            .unwrap_or(Value::Array(Vec::new()));

        let rows: Vec<QueryRow> = serde_json::from_value(response)?;
        Ok(rows.into_iter().filter_map(|r| r.document).collect())
    }

    /// PATCH the listed fields of an existing document.
    async fn patch(&self, id: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let mut url = self.document_url(id)?;
        {
            let mut pairs = url.query_pairs_mut();
            for field in fields.keys() {
                pairs.append_pair("updateMask.fieldPaths", field);
            }
            // Without this, PATCH on a missing id would create the document.
            pairs.append_pair("currentDocument.exists", "true");
        }

        let result = self
            .send(self.client.patch(url).json(&json!({ "fields": fields })))
            .await;

        match result {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            }),
            Err(StoreError::Remote { status: 400, message })
                if message.contains("NOT_FOUND") || message.contains("No document") =>
            {
                Err(StoreError::NotFound {
                    entity: "user",
                    id: id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(!self
            .query_equal(&[("email", email)], Some(1))
            .await?
            .is_empty())
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let url = self.collection_url()?;
        let mut fields = Map::new();
        fields.insert("name".into(), string_value(&user.name));
        fields.insert("email".into(), string_value(&user.email));
        fields.insert("password".into(), string_value(&user.password_hash));
        fields.insert("favorites".into(), array_value(&[]));

        let created = self
            .send(self.client.post(url).json(&json!({ "fields": fields })))
            .await?
            .ok_or_else(|| StoreError::Remote {
                status: 404,
                message: format!("collection {} not found", self.config.collection),
            })?;

        let document: Document = serde_json::from_value(created)?;
        let record = document.into_credentials()?.record;
        debug!(user_id = %record.id, "firestore document created");
        Ok(record)
    }

    /// Firestore returns the matches in document-name order.
    #[instrument(skip(self))]
    async fn find_credentials(&self, email: &str) -> StoreResult<Vec<StoredCredentials>> {
        self.query_equal(&[("email", email)], None)
            .await?
            .into_iter()
            .map(Document::into_credentials)
            .collect()
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        let url = self.document_url(id)?;
        match self.send(self.client.get(url)).await? {
            Some(value) => {
                let document: Document = serde_json::from_value(value)?;
                Ok(Some(document.into_credentials()?.record))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, favorites), fields(count = favorites.len()))]
    async fn update_favorites(&self, id: &str, favorites: &[String]) -> StoreResult<()> {
        let mut fields = Map::new();
        fields.insert("favorites".into(), array_value(favorites));
        self.patch(id, fields).await
    }

    #[instrument(skip(self))]
    async fn update_profile(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        let mut fields = Map::new();
        fields.insert("name".into(), string_value(name));
        fields.insert("email".into(), string_value(email));
        self.patch(id, fields).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Wire types
// ═══════════════════════════════════════════════════════════════════════

/// A Firestore document as returned by the REST API.
#[derive(Debug, Deserialize)]
struct Document {
    /// Full resource name ending in `/{collection}/{id}`.
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn id(&self) -> StoreResult<&str> {
        self.name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::MalformedDocument(format!("bad name: {}", self.name)))
    }

    fn into_credentials(self) -> StoreResult<StoredCredentials> {
        let id = self.id()?.to_string();
        let name = read_string(&self.fields, "name")?.unwrap_or_default();
        let email = read_string(&self.fields, "email")?.ok_or_else(|| {
            StoreError::MalformedDocument(format!("document {id} has no email"))
        })?;
        let password_hash = read_string(&self.fields, "password")?.unwrap_or_default();
        let favorites = read_string_array(&self.fields, "favorites")?;

        Ok(StoredCredentials {
            record: UserRecord {
                id,
                name,
                email,
                favorites,
            },
            password_hash,
        })
    }
}

/// One element of a `:runQuery` response stream. Rows without a document
/// only carry a read time.
#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<Document>,
}

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn array_value(items: &[String]) -> Value {
    let values: Vec<Value> = items.iter().map(|s| string_value(s)).collect();
    json!({ "arrayValue": { "values": values } })
}

fn read_string(fields: &Map<String, Value>, key: &str) -> StoreResult<Option<String>> {
    match fields.get(key) {
        None => Ok(None),
        Some(value) => match value.get("stringValue").and_then(Value::as_str) {
            Some(s) => Ok(Some(s.to_string())),
            None if value.get("nullValue").is_some() => Ok(None),
            None => Err(StoreError::MalformedDocument(format!(
                "field {key} is not a string"
            ))),
        },
    }
}

fn read_string_array(fields: &Map<String, Value>, key: &str) -> StoreResult<Vec<String>> {
    let Some(value) = fields.get(key) else {
        return Ok(Vec::new());
    };
    let Some(array) = value.get("arrayValue") else {
        return Err(StoreError::MalformedDocument(format!(
            "field {key} is not an array"
        )));
    };

    // An empty array is encoded as `{"arrayValue": {}}`.
    let items = array
        .get("values")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    items
        .iter()
        .map(|item| {
            item.get("stringValue")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    StoreError::MalformedDocument(format!("field {key} has a non-string item"))
                })
        })
        .collect()
}

/// Build a `structuredQuery` with AND-ed equality filters.
fn query_body(collection: &str, filters: &[(&str, &str)], limit: Option<u32>) -> Value {
    let field_filters: Vec<Value> = filters
        .iter()
        .map(|(field, value)| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": string_value(value),
                }
            })
        })
        .collect();

    let filter = match field_filters.as_slice() {
        [single] => single.clone(),
        _ => json!({ "compositeFilter": { "op": "AND", "filters": field_filters } }),
    };

    let mut query = json!({
        "from": [{ "collectionId": collection }],
        "where": filter,
    });
    if let Some(limit) = limit {
        query["limit"] = json!(limit);
    }
    json!({ "structuredQuery": query })
}

/// Pull `error.message` out of a Google API error body, falling back to
/// the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            let status = error.get("status").and_then(Value::as_str).unwrap_or("");
            let message = error.get("message").and_then(Value::as_str).unwrap_or("");
            Some(format!("{status}: {message}"))
        })
        .unwrap_or_else(|| body.to_string())
}

// ── tests ────────────────────────────────────────────────────────────
