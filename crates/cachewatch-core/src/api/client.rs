//! API client for the geocaching REST service.
//!
//! Provides `ApiClient`, which logs in with the account credentials and
//! fetches the owner's caches and their recent logbook entries.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, warn};

use crate::config::GeocachingConfig;
use crate::models::{CacheSummary, LogEntry, LogType, LOG_WINDOW};

use super::{ApiError, LogSource};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of caches returned by the owner search.
const SEARCH_LIMIT: usize = 100;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiLog {
    #[serde(rename = "referenceCode")]
    reference_code: String,
    #[serde(rename = "loggedDate")]
    logged_date: String,
    owner: ApiUser,
    #[serde(rename = "geocacheLogType")]
    log_type: ApiLogType,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiLogType {
    id: i64,
    #[serde(default)]
    name: String,
}

impl ApiLog {
    fn into_entry(self, waypoint: &str) -> Result<LogEntry, ApiError> {
        Ok(LogEntry {
            author: self.owner.username,
            log_type: LogType::from_api(self.log_type.id, &self.log_type.name),
            date: parse_visit_date(&self.logged_date)?,
            id: self.reference_code,
            cache_code: waypoint.to_string(),
        })
    }
}

/// The service sends local timestamps like `2024-05-01T14:03:00`; only the day matters.
fn parse_visit_date(raw: &str) -> Result<NaiveDate, ApiError> {
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| ApiError::InvalidResponse(format!("Unparseable log date: {}", raw)))
}

/// API client for the geocaching service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: GeocachingConfig,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: GeocachingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            config,
            token: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await
                .map_err(ApiError::NetworkError)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Exchange username and password for a bearer token.
    async fn login(&self) -> Result<String> {
        let url = format!("{}/token", self.config.auth_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .context("Failed to send authentication request")?;

        let status = response.status();
        if matches!(status.as_u16(), 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::LoginFailed(format!("{}: {}", status, body)).into());
        }
        let response = Self::check_response_for_retry(response)
            .await?
            .ok_or(ApiError::RateLimited)?;

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse auth response")?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl LogSource for ApiClient {
    async fn authenticate(&mut self) -> Result<()> {
        let token = self.login().await?;
        self.token = Some(token);
        info!(username = %self.config.username, "Logged in to geocaching service");
        Ok(())
    }

    async fn owned_caches(&self) -> Result<Vec<CacheSummary>> {
        let url = self.api_url("/v1/geocaches/search");
        let query = [
            ("q", format!("hby:{}", self.config.owner)),
            ("take", SEARCH_LIMIT.to_string()),
            ("fields", "referenceCode,name".to_string()),
        ];
        let caches: Vec<CacheSummary> = self
            .get(&url, &query)
            .await
            .with_context(|| format!("Failed to list caches owned by {}", self.config.owner))?;
        debug!(owner = %self.config.owner, count = caches.len(), "Fetched owned caches");
        Ok(caches)
    }

    async fn recent_logs(&self, waypoint: &str) -> Result<Vec<LogEntry>> {
        let url = self.api_url(&format!("/v1/geocaches/{}/geocachelogs", waypoint));
        let query = [
            ("take", LOG_WINDOW.to_string()),
            ("fields", "referenceCode,loggedDate,owner,geocacheLogType".to_string()),
        ];
        let logs: Vec<ApiLog> = self
            .get(&url, &query)
            .await
            .with_context(|| format!("Failed to fetch logbook for {}", waypoint))?;

        logs.into_iter()
            .take(LOG_WINDOW)
            .map(|log| log.into_entry(waypoint).map_err(anyhow::Error::from))
            .collect()
    }
}
