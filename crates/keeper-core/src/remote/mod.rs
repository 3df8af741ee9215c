//! HTTP client for the remote Keeper collections.
//!
//! Verbs and paths mirror the Keeper service: notes live under
//! `/rs/keeper/note`, tags under `/rs/keeper/tag`, and public share links
//! resolve through `/rs/keeper/shared/{permalink}`. Authenticated calls are
//! keyed by the caller-supplied user id.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Note, Reconcilable, Tag};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Network operations against one remote collection resource.
///
/// All calls are asynchronous and fail with [`Error::Http`] on transport
/// problems or [`Error::Api`] on non-2xx responses. No retry or backoff
/// happens here; a failed call is retried only by a later user action.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection<R> {
    /// Fetch the full server collection for `user_id`.
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<R>>;

    /// Create or update one record; the response carries server-assigned
    /// fields.
    async fn sync_one(&self, record: &R, user_id: &str) -> Result<R>;

    /// Bulk-push the whole collection.
    async fn sync_all(&self, records: &[R], user_id: &str) -> Result<()>;

    /// Delete the record with the given client id from the server.
    async fn delete_one(&self, id: &str, user_id: &str) -> Result<()>;

    /// Request a public share link for the record; idempotent.
    async fn share(&self, id: &str, user_id: &str) -> Result<String>;

    /// Revoke the record's public share link; idempotent.
    async fn revoke_share(&self, id: &str, user_id: &str) -> Result<()>;
}

/// Shared HTTP client for the Keeper service.
///
/// The bearer token lives behind shared state: clones hand out the same
/// token slot, so updating it after a sign-in or sign-out reaches every
/// collection handle built from this client.
#[derive(Clone)]
pub struct KeeperClient {
    base_url: String,
    token: Arc<Mutex<Option<String>>>,
    http: Client,
}

impl KeeperClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            token: Arc::new(Mutex::new(None)),
            http: Client::builder().build()?,
        })
    }

    /// Attach a bearer token used for authenticated calls.
    #[must_use]
    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    /// Replace the bearer token in place, for all clones of this client.
    pub fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = normalize_text_option(token);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Remote handle for the notes collection.
    pub fn notes(&self) -> HttpCollection<Note> {
        HttpCollection::new(self.clone(), "note", "notes")
    }

    /// Remote handle for the tags collection.
    pub fn tags(&self) -> HttpCollection<Tag> {
        HttpCollection::new(self.clone(), "tag", "tags")
    }

    /// Resolve a note through its public share link. Requires no
    /// authentication; fails with [`Error::NotFound`] for unknown or revoked
    /// links.
    pub async fn fetch_shared_note(&self, permalink: &str) -> Result<Note> {
        let url = format!("{}/rs/keeper/shared/{permalink}", self.base_url);
        let response = expect_success(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn resource_url(&self, resource: &str, suffix: &str) -> String {
        format!("{}/rs/keeper/{resource}{suffix}", self.base_url)
    }
}

/// One remote collection (notes or tags) behind the shared client.
pub struct HttpCollection<R> {
    client: KeeperClient,
    resource: &'static str,
    bulk_key: &'static str,
    _marker: PhantomData<fn() -> R>,
}

impl<R> HttpCollection<R> {
    fn new(client: KeeperClient, resource: &'static str, bulk_key: &'static str) -> Self {
        Self {
            client,
            resource,
            bulk_key,
            _marker: PhantomData,
        }
    }

    fn url(&self, suffix: &str) -> String {
        self.client.resource_url(self.resource, suffix)
    }
}

impl<R: Reconcilable> HttpCollection<R> {
    /// Single-record upsert path, keyed by the client id.
    fn upsert_url(&self, record: &R) -> String {
        self.url(&format!("/{}", record.record_id()))
    }
}

impl<R: Reconcilable + Serialize + DeserializeOwned> RemoteCollection<R> for HttpCollection<R> {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<R>> {
        let request = self
            .client
            .http
            .get(self.url(""))
            .query(&[("userId", user_id)]);
        let response = expect_success(self.client.authed(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn sync_one(&self, record: &R, user_id: &str) -> Result<R> {
        let request = self
            .client
            .http
            .post(self.upsert_url(record))
            .query(&[("userId", user_id)])
            .json(record);
        let response = expect_success(self.client.authed(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn sync_all(&self, records: &[R], user_id: &str) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert(self.bulk_key.to_string(), serde_json::to_value(records)?);
        let request = self
            .client
            .http
            .post(self.url(""))
            .query(&[("userId", user_id)])
            .json(&body);
        expect_success(self.client.authed(request).send().await?).await?;
        Ok(())
    }

    async fn delete_one(&self, id: &str, user_id: &str) -> Result<()> {
        let request = self
            .client
            .http
            .delete(self.url(&format!("/{id}")))
            .query(&[("userId", user_id)]);
        expect_success(self.client.authed(request).send().await?).await?;
        Ok(())
    }

    async fn share(&self, id: &str, user_id: &str) -> Result<String> {
        let request = self
            .client
            .http
            .put(self.url(&format!("/{id}/share")))
            .query(&[("userId", user_id)]);
        let response = expect_success(self.client.authed(request).send().await?).await?;
        let body: ShareResponse = response.json().await?;
        Ok(body.permalink)
    }

    async fn revoke_share(&self, id: &str, user_id: &str) -> Result<()> {
        let request = self
            .client
            .http
            .delete(self.url(&format!("/{id}/share")))
            .query(&[("userId", user_id)]);
        expect_success(self.client.authed(request).send().await?).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    permalink: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[allow(dead_code)]
    #[serde(default)]
    error: bool,
    msg: Option<String>,
}

/// Map non-2xx responses into the error taxonomy. 404 becomes
/// [`Error::NotFound`]; everything else surfaces as [`Error::Api`] with the
/// service's `msg` field when the body carries one.
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|payload| payload.msg)
        .map_or_else(
            || {
                let trimmed = compact_text(&body);
                if trimmed.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    trimmed
                }
            },
            |msg| msg.trim().to_string(),
        );

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(message));
    }
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

fn normalize_base_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("server URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
