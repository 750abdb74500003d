// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP lexicon search backend
//!
//! Posts `{query, scope_id, mode, limit}` as JSON and expects
//! `{"hits": [{"surface", "aliases": [{"variant", "confidence"}], "relevance"}]}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backend::LexiconBackend;
use super::types::{ResolverError, SearchHit, SearchMode};

/// Lexicon search service reached over HTTP
pub struct HttpLexiconBackend {
    endpoint: String,
    client: Client,
    timeout_ms: u64,
}

impl HttpLexiconBackend {
    /// Create a backend for `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - Search URL
    /// * `timeout_ms` - Per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Result<Self, ResolverError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ResolverError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            timeout_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    scope_id: &'a str,
    mode: SearchMode,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[async_trait]
impl LexiconBackend for HttpLexiconBackend {
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ResolverError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&SearchRequest {
                query,
                scope_id,
                mode,
                limit,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolverError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ResolverError::Unavailable {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ResolverError::Unavailable {
                message: format!("HTTP {}: {}", status.as_u16(), message),
            });
        }

        let data: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| ResolverError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                })?;

        let mut hits = data.hits;
        hits.truncate(limit);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
