//! Google OAuth2 access tokens for the Dialogflow API.
//!
//! Sources, in the order [`ambient`] tries them:
//! - `GOOGLE_OAUTH_ACCESS_TOKEN`: a pre-minted bearer token
//! - `GOOGLE_APPLICATION_CREDENTIALS`: a service-account key file
//! - the GCE metadata server
//!
//! An explicit key file from config bypasses the ambient chain entirely.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the upstream expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("token request failed: {0}")]
    Request(String),
}

/// Yields a bearer token for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Subset of a service-account JSON key that the JWT grant needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        serde_json::from_str(raw).map_err(|e| AuthError::Credentials(e.to_string()))
    }

    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign the RS256 assertion exchanged for an access token.
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, now: i64) -> Result<String, AuthError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let signing_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AuthError::Credentials(format!("bad private key: {e}")))?;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &signing_key,
    )
    .map_err(|e| AuthError::Credentials(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

async fn read_token_response(resp: reqwest::Response) -> Result<TokenResponse, AuthError> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::Request(format!("{status}: {body}")));
    }
    resp.json()
        .await
        .map_err(|e| AuthError::Request(format!("bad token response: {e}")))
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Single-slot cache shared by the refreshing sources.
#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<TokenResponse, AuthError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let fresh = refresh().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = fresh.expires_in, "Fetched Google access token");
        *slot = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

/// Fixed token, e.g. from `gcloud auth print-access-token`.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// Service-account key file exchanged through the JWT-bearer grant.
///
/// The file is read on every refresh, so a missing or broken key surfaces as
/// an error on the request that needed it rather than at startup.
pub struct ServiceAccountTokenSource {
    path: PathBuf,
    scope: String,
    client: reqwest::Client,
    cache: TokenCache,
}

impl ServiceAccountTokenSource {
    pub fn new(path: PathBuf, client: reqwest::Client) -> Self {
        Self {
            path,
            scope: CLOUD_PLATFORM_SCOPE.into(),
            client,
            cache: TokenCache::default(),
        }
    }

    async fn exchange(&self) -> Result<TokenResponse, AuthError> {
        let key = ServiceAccountKey::from_file(&self.path).await?;
        let assertion = sign_assertion(&key, &self.scope, chrono::Utc::now().timestamp())?;

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        info!(account = %key.client_email, "Exchanged service-account assertion");
        read_token_response(resp).await
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.cache.get_or_refresh(|| self.exchange()).await
    }
}

/// Token from the compute metadata server.
pub struct MetadataTokenSource {
    url: String,
    client: reqwest::Client,
    cache: TokenCache,
}

impl MetadataTokenSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(METADATA_TOKEN_URL, client)
    }

    pub fn with_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            cache: TokenCache::default(),
        }
    }

    async fn fetch(&self) -> Result<TokenResponse, AuthError> {
        let resp = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError::Request(format!("metadata server unreachable: {e}")))?;
        read_token_response(resp).await
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.cache.get_or_refresh(|| self.fetch()).await
    }
}

/// Pick a token source from the environment.
pub fn ambient(client: reqwest::Client) -> Arc<dyn TokenSource> {
    if let Some(token) = non_empty_env("GOOGLE_OAUTH_ACCESS_TOKEN") {
        debug!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
        return Arc::new(StaticTokenSource::new(token));
    }
    if let Some(path) = non_empty_env("GOOGLE_APPLICATION_CREDENTIALS") {
        debug!(path = %path, "Using service account from GOOGLE_APPLICATION_CREDENTIALS");
        return Arc::new(ServiceAccountTokenSource::new(PathBuf::from(path), client));
    }
    debug!("Using GCE metadata server credentials");
    Arc::new(MetadataTokenSource::new(client))
}

/// Explicit key file when given, ambient credentials otherwise.
pub fn token_source(credentials_file: Option<PathBuf>, client: reqwest::Client) -> Arc<dyn TokenSource> {
    match credentials_file {
        Some(path) => Arc::new(ServiceAccountTokenSource::new(path, client)),
        None => ambient(client),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
