//! JWT validation for identity provider access tokens

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::db::UserProfile;

/// How long fetched signing keys stay fresh
pub const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Claims extracted from the JWT
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub exp: u64,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl Claims {
    /// Profile fields for the user repository
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            subject: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone().or_else(|| self.nickname.clone()),
            picture: self.picture.clone(),
        }
    }
}

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is missing")]
    MissingHeader,

    #[error("authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    #[error("invalid token header: {0}")]
    InvalidHeader(String),

    #[error("could not fetch verification keys: {0}")]
    KeysUnavailable(String),

    #[error("could not find matching key to verify token")]
    UnknownKey,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("server configuration error")]
    NotConfigured,
}

/// Verifies bearer tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing why the token was rejected
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Cached JWKS for validating RS256 tokens
///
/// Keys are fetched lazily on first use, refreshed after [`JWKS_TTL`], and
/// refetched once immediately when a token names a key id the cache lacks.
pub struct JwksCache {
    jwks_url: String,
    issuer: String,
    audience: String,
    client: reqwest::Client,
    ttl: Duration,
    keys: RwLock<Option<CachedJwks>>,
}

struct CachedJwks {
    keys: Vec<Jwk>,
    expires_at: Instant,
}

impl JwksCache {
    /// Create a cache for an identity provider tenant
    #[must_use]
    pub fn new(domain: &str, audience: impl Into<String>) -> Self {
        Self {
            jwks_url: format!("https://{domain}/.well-known/jwks.json"),
            issuer: format!("https://{domain}/"),
            audience: audience.into(),
            client: reqwest::Client::new(),
            ttl: JWKS_TTL,
            keys: RwLock::new(None),
        }
    }

    /// Create a cache from auth configuration, `None` if incomplete
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        match (&config.domain, &config.audience) {
            (Some(domain), Some(audience)) => Some(Self::new(domain, audience.clone())),
            _ => None,
        }
    }

    /// Override the JWKS endpoint
    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Override the key freshness window
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Signing key for `kid`, refreshing once if it is not cached
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, AuthError> {
        let keys = self.get_jwks(false).await?;
        if let Some(jwk) = find_key(&keys, kid) {
            return Ok(jwk);
        }

        tracing::info!(kid = ?kid, "unknown signing key, refreshing JWKS");
        let keys = self.get_jwks(true).await?;
        find_key(&keys, kid).ok_or(AuthError::UnknownKey)
    }

    /// Fetch JWKS from the identity provider, honouring the cache unless forced
    async fn get_jwks(&self, force: bool) -> Result<Vec<Jwk>, AuthError> {
        if !force {
            let cache = self.keys.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.expires_at > Instant::now()
            {
                return Ok(cached.keys.clone());
            }
        }

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeysUnavailable(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwk_set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeysUnavailable(format!("invalid JWKS response: {e}")))?;

        tracing::debug!(url = %self.jwks_url, key_count = jwk_set.keys.len(), "fetched JWKS");

        self.store(jwk_set.keys.clone()).await;
        Ok(jwk_set.keys)
    }

    async fn store(&self, keys: Vec<Jwk>) {
        let mut cache = self.keys.write().await;
        *cache = Some(CachedJwks {
            keys,
            expires_at: Instant::now() + self.ttl,
        });
    }
}

#[async_trait]
impl TokenVerifier for JwksCache {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let jwk = self.key_for(header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            tracing::debug!(kid = ?header.kid, error = %e, "token rejected");
            AuthError::InvalidToken(e.to_string())
        })?;

        Ok(data.claims)
    }
}

fn find_key(keys: &[Jwk], kid: Option<&str>) -> Option<Jwk> {
    let kid = kid?;
    keys.iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
        .cloned()
}
