//! Hierarchical key-value storage client for add-on components.
//!
//! Records are addressed by slash-delimited keys under an
//! `account/subscription` root, optionally confined below a scoping prefix
//! the client is constructed with. Writes use etag-based optimistic
//! concurrency: a conditional `put` carries the previously observed etag as
//! an `If-Match` precondition and fails with [`StorageError::Conflict`] when
//! the stored etag has moved on.
//!
//! Credential bootstrapping is deliberately outside this crate's contract:
//! the client asks a caller-supplied [`TokenSource`] for a bearer token per
//! request and never speaks to an identity provider itself.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, header::IF_MATCH};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

mod error;

pub use error::StorageError;

/// Supplies the bearer token presented to the storage service.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StorageError>;
}

/// Token source for callers that already hold a long-lived bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StorageError> {
        Ok(self.0.clone())
    }
}

/// A stored record together with its current version marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub data: Value,
    pub etag: String,
}

/// Paging controls for [`StorageClient::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub count: Option<usize>,
    /// Token returned as [`ListPage::next`] by the previous page.
    pub continuation_token: Option<String>,
}

/// One page of a listing. Callers page explicitly by feeding `next` back
/// into [`ListOptions::continuation_token`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// Full key of the record, relative to the storage root.
    pub storage_id: String,
}

/// Client for the remote hierarchical storage service.
pub struct StorageClient {
    http: HttpClient,
    base_url: String,
    account_id: String,
    subscription_id: String,
    /// Normalized scoping prefix; empty when the client is unscoped.
    prefix: String,
    tokens: Arc<dyn TokenSource>,
}

impl StorageClient {
    /// Creates a client bound to `account_id/subscription_id`, optionally
    /// confined below `prefix`.
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        subscription_id: impl Into<String>,
        prefix: Option<&str>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, StorageError> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            subscription_id: subscription_id.into(),
            prefix: normalize_path(prefix.unwrap_or_default()),
            tokens,
        })
    }

    /// Reads the record at `sub_path`.
    ///
    /// Returns `None` when the combined path is empty or the remote record
    /// is absent; absence is not an error.
    pub async fn get(&self, sub_path: Option<&str>) -> Result<Option<StorageRecord>, StorageError> {
        let path = self.combined_path(sub_path);
        if path.is_empty() {
            return Ok(None);
        }
        debug!(%path, "storage get");
        let response = self
            .http
            .get(self.storage_url(&path))
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(api_error(status, response).await),
        }
    }

    /// Writes `data` at `sub_path`, returning the stored record with its
    /// fresh etag.
    ///
    /// When `etag` is supplied the write is conditional: the service rejects
    /// it when the stored etag differs, surfaced as
    /// [`StorageError::Conflict`].
    pub async fn put(
        &self,
        data: &Value,
        sub_path: Option<&str>,
        etag: Option<&str>,
    ) -> Result<StorageRecord, StorageError> {
        let path = self.combined_path(sub_path);
        if path.is_empty() {
            return Err(StorageError::RootWriteForbidden);
        }
        debug!(%path, conditional = etag.is_some(), "storage put");
        let mut request = self
            .http
            .put(self.storage_url(&path))
            .bearer_auth(self.tokens.access_token().await?)
            .json(&serde_json::json!({ "data": data }));
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        let response = request.send().await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => Err(StorageError::Conflict),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(api_error(status, response).await),
        }
    }

    /// Deletes the record at `sub_path`, or the whole subtree when
    /// `recursive`. A remote "not found" counts as success.
    ///
    /// No record is addressable at an empty combined path, so a
    /// non-recursive delete there is a no-op. Recursive delete at an empty
    /// combined path requires the explicit `force_recursive` double opt-in;
    /// the guard exists so one careless call cannot wipe an entire
    /// subscription's storage.
    pub async fn delete(
        &self,
        sub_path: Option<&str>,
        recursive: bool,
        force_recursive: bool,
    ) -> Result<(), StorageError> {
        let path = self.combined_path(sub_path);
        if path.is_empty() {
            if !recursive {
                return Ok(());
            }
            if !force_recursive {
                return Err(StorageError::RecursiveRootDeleteForbidden);
            }
        }
        let mut url = self.storage_url(&path);
        if recursive {
            url.push_str("/*");
        }
        debug!(%path, recursive, "storage delete");
        let response = self
            .http
            .delete(url)
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(api_error(status, response).await),
        }
    }

    /// Lists records under `sub_path`, one page at a time.
    pub async fn list(
        &self,
        sub_path: Option<&str>,
        options: &ListOptions,
    ) -> Result<ListPage, StorageError> {
        let path = self.combined_path(sub_path);
        let mut url = Url::parse(&format!("{}/*", self.storage_url(&path)))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(count) = options.count {
                query.append_pair("count", &count.to_string());
            }
            if let Some(token) = &options.continuation_token {
                query.append_pair("next", token);
            }
        }
        debug!(%path, "storage list");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            status => Err(api_error(status, response).await),
        }
    }

    fn combined_path(&self, sub_path: Option<&str>) -> String {
        let sub = normalize_path(sub_path.unwrap_or_default());
        match (self.prefix.is_empty(), sub.is_empty()) {
            (_, true) => self.prefix.clone(),
            (true, false) => sub,
            (false, false) => format!("{}/{sub}", self.prefix),
        }
    }

    fn storage_url(&self, path: &str) -> String {
        let mut url = format!(
            "{}/v1/account/{}/subscription/{}/storage",
            self.base_url, self.account_id, self.subscription_id
        );
        if !path.is_empty() {
            url.push('/');
            url.push_str(path);
        }
        url
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> StorageError {
    let message = response.text().await.unwrap_or_default();
    StorageError::Api {
        status: status.as_u16(),
        message,
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(prefix: Option<&str>) -> StorageClient {
        StorageClient::new(
            "https://api.example.com/",
            "acc",
            "sub",
            prefix,
            Arc::new(StaticToken::new("token")),
        )
        .unwrap()
    }

    #[test]
    fn sub_paths_are_normalized_before_composing() {
        let scoped = client(Some("/boundary/b/"));
        assert_eq!(scoped.combined_path(None), "boundary/b");
        assert_eq!(scoped.combined_path(Some("/function/f/")), "boundary/b/function/f");

        let unscoped = client(None);
        assert_eq!(unscoped.combined_path(None), "");
        assert_eq!(unscoped.combined_path(Some("a/b")), "a/b");
    }

    #[test]
    fn storage_url_has_no_trailing_separator_at_the_root() {
        let unscoped = client(None);
        assert_eq!(
            unscoped.storage_url(""),
            "https://api.example.com/v1/account/acc/subscription/sub/storage"
        );
        assert_eq!(
            unscoped.storage_url("a/b"),
            "https://api.example.com/v1/account/acc/subscription/sub/storage/a/b"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = StorageClient::new(
            "not a url",
            "acc",
            "sub",
            None,
            Arc::new(StaticToken::new("token")),
        );
        assert!(matches!(result, Err(StorageError::Url(_))));
    }

    #[tokio::test]
    async fn get_at_the_root_is_none_without_network() {
        // localhost:1 would refuse the connection; the guard answers first.
        let unscoped = StorageClient::new(
            "http://127.0.0.1:1",
            "acc",
            "sub",
            None,
            Arc::new(StaticToken::new("token")),
        )
        .unwrap();
        assert!(unscoped.get(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_at_the_root_is_forbidden() {
        let unscoped = StorageClient::new(
            "http://127.0.0.1:1",
            "acc",
            "sub",
            None,
            Arc::new(StaticToken::new("token")),
        )
        .unwrap();
        let err = unscoped
            .put(&serde_json::json!({"foo": "bar"}), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RootWriteForbidden));
        assert!(
            err.to_string()
                .contains("Storage objects cannot be stored at the root of the hierarchy")
        );
    }

    #[tokio::test]
    async fn recursive_root_delete_requires_double_opt_in() {
        let unscoped = StorageClient::new(
            "http://127.0.0.1:1",
            "acc",
            "sub",
            None,
            Arc::new(StaticToken::new("token")),
        )
        .unwrap();
        let err = unscoped.delete(None, true, false).await.unwrap_err();
        assert!(matches!(err, StorageError::RecursiveRootDeleteForbidden));
    }

    #[tokio::test]
    async fn non_recursive_root_delete_never_reaches_the_remote() {
        // localhost:1 would refuse the connection; the empty combined path
        // must short-circuit before any request is sent.
        let unscoped = StorageClient::new(
            "http://127.0.0.1:1",
            "acc",
            "sub",
            None,
            Arc::new(StaticToken::new("token")),
        )
        .unwrap();
        unscoped.delete(None, false, false).await.unwrap();
        unscoped.delete(None, false, true).await.unwrap();
    }
}
