//! # StackExchange API Client
//!
//! A dedicated client for the StackExchange REST API. It wraps the generic
//! `ApiClient` with the StackExchange query conventions (`key`, `site`,
//! `filter`), reads the response envelope (quota, backoff, `has_more`) and
//! drops malformed records.
//!
//! Backoff hints are logged but not enforced. They are rare enough in
//! practice that no request throttling has been added.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::retrieve::ky_http::ApiClient;
use crate::stackexchange::model::{ApiEnvelope, ApiErrorBody, ApiSite, Question, TagWiki};
use crate::stackexchange::source::QuestionSource;

/// Base URL of the v2.3 API.
pub const API_BASE_URL: &str = "https://api.stackexchange.com/2.3/";
/// Application key. StackExchange: "This is not considered a secret".
pub const DEFAULT_API_KEY: &str = "igopOTPhc5E*ngiLuMc8HQ((";
/// Server-side response shape selector including the fields `Question` needs.
pub const FILTER_NAME: &str = "5147LfK)H";
/// Maximum number of ids and maximum page size accepted by a single request.
pub const MAX_BATCH: usize = 100;

/// Failures of a single API call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("undecodable response body: {0}")]
    Decode(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid client setup: {0}")]
    Setup(String),
}

impl RemoteError {
    fn from_anyhow(err: anyhow::Error) -> Self {
        if err.downcast_ref::<serde_json::Error>().is_some() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// StackExchange API client. Stateless apart from the connection pool.
pub struct StackExchangeApi {
    client: ApiClient,
}

impl StackExchangeApi {
    /// Client against the public API with the default application key.
    pub fn new() -> Result<Self, RemoteError> {
        Self::with_base_url(API_BASE_URL, DEFAULT_API_KEY)
    }

    /// Client against an arbitrary base URL, used for tests and proxies.
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let client = ApiClient::new(base_url, vec![("key".to_string(), api_key.to_string())])
            .map_err(|e| RemoteError::Setup(e.to_string()))?;
        Ok(Self { client })
    }

    /// Questions carrying `tag`, created after `created_after` (epoch seconds),
    /// newest first as far as the server is concerned.
    ///
    /// # Panics
    /// When `limit` is outside `1..=100`.
    pub async fn questions_by_tag(
        &self,
        site: &str,
        tag: &str,
        created_after: i64,
        limit: usize,
    ) -> Result<Vec<Question>, RemoteError> {
        assert!((1..=MAX_BATCH).contains(&limit), "limit {} outside 1..={}", limit, MAX_BATCH);
        let query = [
            ("site", site.to_string()),
            ("filter", FILTER_NAME.to_string()),
            ("sort", "creation".to_string()),
            ("tagged", tag.to_string()),
            ("min", created_after.to_string()),
            ("pagesize", limit.to_string()),
        ];
        let envelope = self.call::<Question>("questions", &query).await?;
        Ok(filter_valid(envelope.items))
    }

    /// Current state of the given questions, fetched in one request.
    ///
    /// # Panics
    /// When more than 100 ids are passed.
    pub async fn questions_by_ids(
        &self,
        site: &str,
        ids: &[i64],
        limit: usize,
    ) -> Result<Vec<Question>, RemoteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        assert!(ids.len() <= MAX_BATCH, "{} ids exceed the batch cap of {}", ids.len(), MAX_BATCH);
        let joined = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(";");
        let query = [
            ("site", site.to_string()),
            ("filter", FILTER_NAME.to_string()),
            ("sort", "creation".to_string()),
            ("pagesize", limit.clamp(1, MAX_BATCH).to_string()),
        ];
        let envelope = self.call::<Question>(&format!("questions/{}", joined), &query).await?;
        Ok(filter_valid(envelope.items))
    }

    /// One page of the featured (bountied) listing.
    pub async fn featured_page(
        &self,
        site: &str,
        page: u32,
        page_size: usize,
    ) -> Result<(Vec<Question>, bool), RemoteError> {
        let query = [
            ("site", site.to_string()),
            ("filter", FILTER_NAME.to_string()),
            ("sort", "creation".to_string()),
            ("pagesize", page_size.clamp(1, MAX_BATCH).to_string()),
            ("page", page.to_string()),
        ];
        let envelope = self.call::<Question>("questions/featured", &query).await?;
        Ok((envelope.items, envelope.has_more))
    }

    /// Every page of the featured listing, starting at page 1.
    pub async fn featured_questions(&self, site: &str, page_size: usize) -> Result<Vec<Question>, RemoteError> {
        let mut result = Vec::new();
        let mut page = 1;
        loop {
            let (items, more) = self.featured_page(site, page, page_size).await?;
            result.extend(items);
            if !more {
                break;
            }
            page += 1;
        }
        log::debug!("Fetched {} featured question(s) on {} in {} page(s)", result.len(), site, page);
        Ok(filter_valid(result))
    }

    /// The wiki excerpt of a tag, if it has one.
    pub async fn tag_excerpt(&self, site: &str, tag: &str) -> Result<Option<String>, RemoteError> {
        let query = [("site", site.to_string()), ("filter", FILTER_NAME.to_string())];
        let envelope = self.call::<TagWiki>(&format!("tags/{}/wikis", tag), &query).await?;
        Ok(envelope.items.into_iter().next().and_then(|wiki| wiki.excerpt))
    }

    /// All sites of the network.
    pub async fn sites(&self) -> Result<Vec<ApiSite>, RemoteError> {
        let query = [("pagesize", "9999".to_string())];
        let envelope = self.call::<ApiSite>("sites", &query).await?;
        Ok(envelope.items)
    }

    async fn call<T>(&self, path: &str, query: &[(&str, String)]) -> Result<ApiEnvelope<T>, RemoteError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .request::<ApiEnvelope<T>>(Method::GET, path, query, None)
            .await
            .map_err(RemoteError::from_anyhow)?;
        log::debug!("Request to {} returned with status {}", path, response.status);

        if !response.success {
            let body = response.error_body.unwrap_or_default();
            log::error!("Request to {} failed with status code {}, body was {}", path, response.status, body);
            if (400..500).contains(&response.status) {
                match serde_json::from_str::<ApiErrorBody>(&body) {
                    Ok(error) => handle_backoff(path, error.backoff),
                    Err(e) => log::error!("Error parsing error response from {}: {}", body, e),
                }
            }
            return Err(RemoteError::Rejected {
                status: response.status,
                body,
            });
        }

        let envelope = response
            .data
            .ok_or_else(|| RemoteError::Decode(format!("empty body for {}", path)))?;
        if envelope.quota_remaining < envelope.quota_max / 2 {
            log::warn!("Quota remaining low: {}/{}", envelope.quota_remaining, envelope.quota_max);
        } else {
            log::trace!("Quota remaining: {}/{}", envelope.quota_remaining, envelope.quota_max);
        }
        handle_backoff(path, envelope.backoff);
        Ok(envelope)
    }
}

fn handle_backoff(path: &str, backoff: Option<u32>) {
    if let Some(seconds) = backoff {
        log::warn!("Got backoff request for {} seconds on {}", seconds, path);
    }
}

/// Drops questions with a blank title. The API sometimes returns records
/// missing most of their fields.
pub fn filter_valid(questions: Vec<Question>) -> Vec<Question> {
    questions
        .into_iter()
        .filter(|q| {
            let valid = !q.title.trim().is_empty();
            if !valid {
                log::warn!("Got question with empty title: {:?}", q);
            }
            valid
        })
        .collect()
}

#[async_trait]
impl QuestionSource for StackExchangeApi {
    async fn questions_by_tag(
        &self,
        site: &str,
        tag: &str,
        created_after: i64,
        limit: usize,
    ) -> Result<Vec<Question>, RemoteError> {
        StackExchangeApi::questions_by_tag(self, site, tag, created_after, limit).await
    }

    async fn questions_by_ids(&self, site: &str, ids: &[i64], limit: usize) -> Result<Vec<Question>, RemoteError> {
        StackExchangeApi::questions_by_ids(self, site, ids, limit).await
    }

    async fn featured_questions(&self, site: &str, page_size: usize) -> Result<Vec<Question>, RemoteError> {
        StackExchangeApi::featured_questions(self, site, page_size).await
    }

    async fn tag_excerpt(&self, site: &str, tag: &str) -> Result<Option<String>, RemoteError> {
        StackExchangeApi::tag_excerpt(self, site, tag).await
    }
}
