//! Authentication profiles and the OAuth2 token cache

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use apiforge_core::AuthType;

/// Token endpoint timeout.
const TOKEN_TIMEOUT_SECS: u64 = 10;
/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;
/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Turns a stored credential blob into plaintext JSON.
pub trait CredentialDecryptor {
    /// # Errors
    ///
    /// Returns error if the blob cannot be decrypted with the current key.
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError>;
}

/// Credentials stored unencrypted (local config files).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCredentials;

impl CredentialDecryptor for PlaintextCredentials {
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError> {
        Ok(ciphertext.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecryptionError {
    #[error(
        "Cannot decrypt stored credentials: {0}. The encryption key may have changed; re-enter the credentials for this target"
    )]
    Undecryptable(String),
    #[error("Credentials are not valid for {auth_type} auth: {reason}. Re-enter them as a JSON object")]
    Malformed { auth_type: String, reason: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthAcquisitionError {
    #[error("OAuth2 token request to {url} failed: {reason}")]
    TokenRequest { url: String, reason: String },
    #[error("OAuth2 token response from {url} has no access_token")]
    MissingToken { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuth2Credentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_grant_type() -> String {
    "client_credentials".to_string()
}

fn default_key_name() -> String {
    "X-API-Key".to_string()
}

/// Decrypted credentials, by scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProfile {
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { key_name: String, key_value: String },
    OAuth2(OAuth2Credentials),
}

impl AuthProfile {
    /// Parse the plaintext credential JSON for `auth_type`.
    ///
    /// # Errors
    ///
    /// Returns error if the blob is not JSON or lacks the scheme's fields.
    pub fn parse(auth_type: AuthType, plaintext: &str) -> Result<Self, DecryptionError> {
        #[derive(Deserialize)]
        struct Basic {
            username: String,
            password: String,
        }
        #[derive(Deserialize)]
        struct Bearer {
            token: String,
        }
        #[derive(Deserialize)]
        struct ApiKey {
            #[serde(default = "default_key_name")]
            key_name: String,
            key_value: String,
        }

        let malformed = |e: serde_json::Error| DecryptionError::Malformed {
            auth_type: auth_type.as_str().to_string(),
            reason: e.to_string(),
        };
        Ok(match auth_type {
            AuthType::Basic => {
                let c: Basic = serde_json::from_str(plaintext).map_err(malformed)?;
                Self::Basic {
                    username: c.username,
                    password: c.password,
                }
            }
            AuthType::Bearer => {
                let c: Bearer = serde_json::from_str(plaintext).map_err(malformed)?;
                Self::Bearer { token: c.token }
            }
            AuthType::ApiKey => {
                let c: ApiKey = serde_json::from_str(plaintext).map_err(malformed)?;
                Self::ApiKey {
                    key_name: c.key_name,
                    key_value: c.key_value,
                }
            }
            AuthType::Oauth2 => Self::OAuth2(serde_json::from_str(plaintext).map_err(malformed)?),
        })
    }

    /// Decrypt `ciphertext` and parse it for `auth_type`.
    ///
    /// # Errors
    ///
    /// Returns error if decryption or parsing fails.
    pub fn decrypt(
        auth_type: AuthType,
        ciphertext: &str,
        decryptor: &dyn CredentialDecryptor,
    ) -> Result<Self, DecryptionError> {
        Self::parse(auth_type, &decryptor.decrypt(ciphertext)?)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Client-credentials token, refreshed lazily once `expires_in - 60s` passes.
#[derive(Debug, Clone, Default)]
struct TokenCache {
    token: Option<CachedToken>,
    fetches: u32,
}

impl TokenCache {
    fn get(
        &mut self,
        client: &reqwest::blocking::Client,
        creds: &OAuth2Credentials,
    ) -> Result<String, AuthAcquisitionError> {
        if let Some(cached) = &self.token {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.access_token.clone());
            }
            tracing::debug!("OAuth2 token expired");
        }

        let url = &creds.token_url;
        let request_failed = |reason: String| AuthAcquisitionError::TokenRequest {
            url: url.clone(),
            reason,
        };
        let mut form = vec![
            ("grant_type", creds.grant_type.as_str()),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
        ];
        if let Some(scope) = &creds.scope {
            form.push(("scope", scope.as_str()));
        }

        self.fetches += 1;
        let resp = client
            .post(url)
            .form(&form)
            .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
            .send()
            .map_err(|e| request_failed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(request_failed(format!("HTTP {}", status.as_u16())));
        }
        let body: Value = resp.json().map_err(|e| request_failed(e.to_string()))?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthAcquisitionError::MissingToken { url: url.clone() })?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(DEFAULT_EXPIRES_IN);
        let lifetime = Duration::from_secs(expires_in.saturating_sub(EXPIRY_MARGIN_SECS));

        tracing::info!(token_url = %url, expires_in, "OAuth2 token acquired");
        self.token = Some(CachedToken {
            access_token: access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }
}

/// Applies an [`AuthProfile`] to outgoing requests.
#[derive(Debug, Clone)]
pub struct Authenticator {
    profile: AuthProfile,
    cache: TokenCache,
}

impl Authenticator {
    #[must_use]
    pub fn new(profile: AuthProfile) -> Self {
        Self {
            profile,
            cache: TokenCache::default(),
        }
    }

    #[must_use]
    pub fn profile(&self) -> &AuthProfile {
        &self.profile
    }

    /// Number of token requests made so far.
    #[must_use]
    pub fn token_fetches(&self) -> u32 {
        self.cache.fetches
    }

    /// Attach credentials to `req`, fetching a token first when needed.
    ///
    /// # Errors
    ///
    /// Returns error if an OAuth2 token cannot be obtained.
    pub fn apply(
        &mut self,
        client: &reqwest::blocking::Client,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::RequestBuilder, AuthAcquisitionError> {
        Ok(match &self.profile {
            AuthProfile::Basic { username, password } => req.basic_auth(username, Some(password)),
            AuthProfile::Bearer { token } => req.bearer_auth(token),
            AuthProfile::ApiKey {
                key_name,
                key_value,
            } => req.header(key_name.as_str(), key_value.as_str()),
            AuthProfile::OAuth2(creds) => req.bearer_auth(self.cache.get(client, creds)?),
        })
    }
}
