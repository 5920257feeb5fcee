use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::config::{TdxConfig, WebClientConfig, DEFAULT_OAUTH_SCOPE};
use crate::models::{TicketPayload, TokenResponse};
use crate::providers::StructuredLogger;
use crate::utils::error::{AppError, Result};
use crate::utils::json::{parse_object_or_empty, parse_response_body, JsonMap};

/// A token is only reused while more than this many seconds remain
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

// Caps absurd `expires_in` values so the expiry stays representable
const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 3600;

pub type QueryParams = Vec<(String, String)>;

/// The slice of the TDX REST API this service talks to
#[async_trait]
pub trait TdxApi: Send + Sync {
    async fn create_ticket(&self, app_id: &str, payload: TicketPayload, params: QueryParams) -> Result<JsonMap>;

    async fn post_feed(&self, app_id: &str, ticket_id: &str, payload: Value) -> Result<JsonMap>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - chrono::Duration::seconds(TOKEN_SAFETY_MARGIN_SECS)
    }
}

/// OAuth2 client-credentials client for the TDX gateway.
///
/// Clones share one token cache. The cache mutex is held for the whole
/// refresh, so concurrent callers wait for a single token request.
#[derive(Clone)]
pub struct TdxClient {
    client: Client,
    base_url: Option<String>,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl TdxClient {
    pub fn new(config: &TdxConfig, webclient: &WebClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(webclient.connect_timeout))
            .timeout(Duration::from_secs(webclient.timeout))
            .build()?;

        let scope = if config.oauth_scope.trim().is_empty() {
            DEFAULT_OAUTH_SCOPE.to_string()
        } else {
            config.oauth_scope.clone()
        };

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            token_url: config.oauth_token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope,
            token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns a usable access token, fetching a new one when none is cached
    /// or the cached one is within the safety margin of expiring.
    pub async fn ensure_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);

        Ok(access_token)
    }

    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.lock().await.as_ref().map(|t| t.expires_at)
    }

    pub async fn clear_token(&self) {
        *self.token.lock().await = None;
        StructuredLogger::log_info("TDX token cache cleared", None, None);
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        StructuredLogger::log_info(
            "Fetching new TDX OAuth token",
            None,
            Some(serde_json::json!({ "token_url": self.token_url, "scope": self.scope })),
        );

        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
        );

        let response = self
            .client
            .post(&self.token_url)
            .header(AUTHORIZATION, auth_header)
            .form(&[("grant_type", "client_credentials"), ("scope", self.scope.as_str())])
            .send()
            .await?;

        let (status, body) = Self::read_response(response).await?;
        let token_response = TokenResponse::from_map(&parse_object_or_empty(&body));

        let access_token = match token_response.access_token.clone() {
            Some(token) => token,
            None => {
                StructuredLogger::log_error(
                    &format!("OAuth token missing from response with status {}", status),
                    None,
                );
                return Err(AppError::token_missing(status, body));
            }
        };

        let expires_in = token_response.expires_in_or_default();
        let lifetime = expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64;
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);

        StructuredLogger::log_info(
            &format!("Obtained TDX token, expires in {} seconds", expires_in),
            None,
            None,
        );

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }

    /// Joins `path` onto the base URL and appends `params` to any query it already has
    pub fn build_url(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let base_url = self
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::invalid_argument("base_url is missing"))?;

        let mut url = Url::parse(&format!("{}{}", base_url, path))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }

        Ok(url)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T, params: &[(String, String)]) -> Result<JsonMap> {
        let url = self.build_url(path, params)?;
        let token = self.ensure_token().await?;

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                StructuredLogger::log_error(&format!("TDX request to {} failed: {}", url, e), None);
                AppError::from(e)
            })?;

        let (_, body) = Self::read_response(response).await?;
        Ok(parse_response_body(&body))
    }

    async fn read_response(response: Response) -> Result<(u16, String)> {
        let status = response.status();

        if !status.is_success() {
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            StructuredLogger::log_error(
                &format!("TDX request to {} failed with status {}: {}", url, status, body),
                None,
            );
            return Err(AppError::http(status.as_u16(), body));
        }

        let body = response.text().await?;
        Ok((status.as_u16(), body))
    }
}

#[async_trait]
impl TdxApi for TdxClient {
    async fn create_ticket(&self, app_id: &str, payload: TicketPayload, params: QueryParams) -> Result<JsonMap> {
        let path = format!("/{}/tickets", app_id);
        self.post_json(&path, &payload, &params).await
    }

    async fn post_feed(&self, app_id: &str, ticket_id: &str, payload: Value) -> Result<JsonMap> {
        let path = format!("/{}/tickets/{}/feed", app_id, ticket_id);
        self.post_json(&path, &payload, &[]).await
    }
}
