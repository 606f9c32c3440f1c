//! REST client for a hosted headless CMS.
//!
//! Speaks the Strapi 5 content API: `/api/<collection>` endpoints, bearer
//! token auth, `{ "data": ... }` envelopes and `filters[field][$eq]=value`
//! query strings.
//!
//! Status mapping:
//!
//! | Response             | Error                          |
//! |----------------------|--------------------------------|
//! | transport failure    | [`StoreError::Unreachable`]    |
//! | truncated body       | [`StoreError::Unreachable`]    |
//! | 401 / 403            | [`StoreError::Unauthorized`]   |
//! | 404                  | [`StoreError::NotFound`]       |
//! | other non-2xx        | [`StoreError::Rejected`]       |
//! | unparseable body     | [`StoreError::Malformed`]      |
//!
//! A 404 on a single-type read means "no document yet" and yields an empty
//! result instead.

use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::store::ContentStore;
use crate::types::{ContentType, DocumentId, KeyFilter, MediaRef, PublishOutcome, Record, Scope};

/// Largest page the content API returns in one request.
pub const MAX_PAGE_SIZE: usize = 100;

const ERROR_SNIPPET_LEN: usize = 200;

/// Connection settings for a [`RestStore`].
#[derive(Clone, Debug)]
pub struct RestOptions {
    /// Server root, e.g. `https://cms.example.com` (the `/api` prefix is
    /// appended).
    pub base_url: String,
    /// API token sent as `Authorization: Bearer`.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Content store backed by the CMS REST API.
#[derive(Debug)]
pub struct RestStore {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl RestStore {
    /// Build a client. No request is sent until the first call.
    ///
    /// # Errors
    /// Returns [`StoreError::Unreachable`] if the HTTP client cannot be
    /// initialised (TLS backend failure).
    pub fn new(options: RestOptions) -> Result<Self, StoreError> {
        let base_url = options.base_url.trim_end_matches('/').to_owned();
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("cms-seed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Unreachable {
                target: base_url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url,
            token: options.token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn document_path(kind: ContentType, id: &DocumentId) -> String {
        if kind.is_single() {
            kind.rest_path().to_owned()
        } else {
            format!("{}/{id}", kind.rest_path())
        }
    }

    /// Send a request and return the parsed JSON body (`Null` when empty).
    fn send(&self, operation: &str, builder: RequestBuilder) -> Result<Value, StoreError> {
        let response = builder.send().map_err(|e| StoreError::Unreachable {
            target: self.base_url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|e| StoreError::Unreachable {
            target: self.base_url.clone(),
            message: format!("{operation}: reading response body failed: {e}"),
        })?;
        debug!(operation, status = status.as_u16(), "response");

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| StoreError::Malformed {
                operation: operation.to_owned(),
                message: e.to_string(),
            });
        }

        let message = error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| "request failed".to_owned());
        Err(match status.as_u16() {
            401 | 403 => StoreError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            404 => StoreError::NotFound {
                message: format!("{operation}: {message}"),
            },
            code => StoreError::Rejected {
                operation: operation.to_owned(),
                status: code,
                message,
            },
        })
    }

    fn send_record(&self, operation: &str, builder: RequestBuilder) -> Result<Record, StoreError> {
        let body = self.send(operation, builder)?;
        let data = take_data(body).ok_or_else(|| StoreError::Malformed {
            operation: operation.to_owned(),
            message: "response has no data".to_owned(),
        })?;
        Record::from_json(operation, data)
    }
}

impl ContentStore for RestStore {
    fn target(&self) -> String {
        self.base_url.clone()
    }

    #[instrument(skip(self), fields(target = %self.base_url))]
    fn ping(&self) -> Result<(), StoreError> {
        let builder = self
            .request(Method::GET, ContentType::Page.rest_path())
            .query(&[("pagination[limit]", "1")]);
        self.send("ping", builder).map(|_| ())
    }

    fn find(
        &self,
        kind: ContentType,
        filter: Option<&KeyFilter>,
        scope: Scope,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let operation = format!("find {kind}");
        if kind.is_single() {
            let builder = self
                .request(Method::GET, kind.rest_path())
                .query(&[("status", scope.as_str())]);
            return match self.send(&operation, builder) {
                Ok(body) => match take_data(body) {
                    Some(data) => Ok(vec![Record::from_json(&operation, data)?]),
                    None => Ok(Vec::new()),
                },
                Err(StoreError::NotFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let builder = self
            .request(Method::GET, kind.rest_path())
            .query(&find_query(kind, filter, scope, limit));
        match take_data(self.send(&operation, builder)?) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| Record::from_json(&operation, item))
                .collect(),
            None => Ok(Vec::new()),
            Some(other) => Err(StoreError::Malformed {
                operation,
                message: format!("expected a list, got {other}"),
            }),
        }
    }

    fn create(
        &mut self,
        kind: ContentType,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let operation = format!("create {kind}");
        // Single types have no POST endpoint; PUT creates or replaces.
        let method = if kind.is_single() {
            Method::PUT
        } else {
            Method::POST
        };
        let builder = self
            .request(method, kind.rest_path())
            .json(&json!({ "data": data }));
        self.send_record(&operation, builder)
    }

    fn update(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let operation = format!("update {kind}");
        let builder = self
            .request(Method::PUT, &Self::document_path(kind, id))
            .json(&json!({ "data": data }));
        self.send_record(&operation, builder)
    }

    fn publish(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
    ) -> Result<PublishOutcome, StoreError> {
        let operation = format!("publish {kind}");
        let builder = self
            .request(Method::PUT, &Self::document_path(kind, id))
            .json(&json!({ "data": { "publishedAt": crate::timestamp() } }));
        self.send(&operation, builder)?;
        Ok(PublishOutcome::Published)
    }

    fn connect(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        field: &str,
        targets: &[DocumentId],
    ) -> Result<(), StoreError> {
        let operation = format!("connect {kind}.{field}");
        let ids: Vec<&str> = targets.iter().map(DocumentId::as_str).collect();
        let builder = self
            .request(Method::PUT, &Self::document_path(kind, id))
            .json(&json!({ "data": { field: { "connect": ids } } }));
        self.send(&operation, builder).map(|_| ())
    }

    fn find_media(&self, name: &str) -> Result<Option<MediaRef>, StoreError> {
        let operation = "find media";
        let builder = self
            .request(Method::GET, "/upload/files")
            .query(&[("filters[name][$containsi]", name)]);
        let body = self.send(operation, builder)?;
        // The upload plugin answers with a bare array; tolerate an envelope.
        let items = match body {
            Value::Array(items) => items,
            other => match take_data(other) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        };
        Ok(items.into_iter().find_map(|item| media_ref(&item)))
    }

    fn grant_public_read(
        &mut self,
        kind: ContentType,
        actions: &[&str],
    ) -> Result<usize, StoreError> {
        debug!(%kind, ?actions, "public permissions are managed in the admin panel; skipping");
        Ok(0)
    }

    fn missing_public_read(
        &self,
        _kind: ContentType,
        _actions: &[&str],
    ) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Query parameters for a collection lookup.
#[must_use]
pub fn find_query(
    kind: ContentType,
    filter: Option<&KeyFilter>,
    scope: Scope,
    limit: usize,
) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(filter) = filter {
        query.push((
            format!("filters[{}][$eq]", filter.field()),
            filter.value().to_owned(),
        ));
    }
    query.push((
        "pagination[limit]".to_owned(),
        limit.clamp(1, MAX_PAGE_SIZE).to_string(),
    ));
    query.push(("status".to_owned(), scope.as_str().to_owned()));
    if kind == ContentType::Page {
        query.push(("populate".to_owned(), "sections".to_owned()));
    }
    query
}

/// Unwrap a `{ "data": ... }` envelope; `None` when absent or null.
fn take_data(body: Value) -> Option<Value> {
    match body {
        Value::Object(mut map) => map.remove("data").filter(|d| !d.is_null()),
        _ => None,
    }
}

/// Extract `error.message` from an error body, falling back to the start of
/// the raw text.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body)
        && let Some(message) = value
            .pointer("/error/message")
            .and_then(Value::as_str)
    {
        return Some(message.to_owned());
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(ERROR_SNIPPET_LEN).collect())
}

fn media_ref(item: &Value) -> Option<MediaRef> {
    Some(MediaRef {
        id: item.get("id")?.as_u64()?,
        name: item.get("name")?.as_str()?.to_owned(),
    })
}
