use crate::config::CredentialsSource;
use crate::store::sheets::SheetsError;

use jwt_simple::prelude::{Claims, Duration as JwtDuration, RS256KeyPair, RSAKeyPairLike};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use std::path::Path;
use std::time::{Duration, Instant};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceAccount {
    pub(crate) client_email: String,
    pub(crate) private_key: String,
}

impl ServiceAccount {
    pub(crate) async fn resolve(source: &CredentialsSource) -> Result<Self, SheetsError> {
        match source {
            CredentialsSource::Inline {
                client_email,
                private_key,
            } => Ok(Self {
                client_email: client_email.clone(),
                private_key: unescape_newlines(private_key),
            }),
            CredentialsSource::File(path) => Self::from_file(path).await,
            CredentialsSource::Missing => Err(SheetsError::MissingCredentials),
        }
    }

    async fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SheetsError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|err| SheetsError::InvalidCredentials(err.to_string()))
    }
}

/// Keys pasted into environment variables usually carry literal `\n`.
pub(crate) fn unescape_newlines(key: &str) -> String {
    key.replace("\\n", "\n")
}

#[derive(Serialize, Deserialize)]
struct ScopeClaims {
    scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Exchanges a signed service-account assertion for an OAuth access token
/// and reuses it until shortly before it expires.
pub(crate) struct TokenSource {
    http: reqwest::Client,
    client_email: String,
    key_pair: RS256KeyPair,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub(crate) fn new(
        http: reqwest::Client,
        account: ServiceAccount,
        token_url: String,
    ) -> Result<Self, SheetsError> {
        let key_pair = RS256KeyPair::from_pem(&account.private_key)
            .map_err(|err| SheetsError::InvalidCredentials(err.to_string()))?;
        Ok(Self {
            http,
            client_email: account.client_email,
            key_pair,
            token_url,
            cached: Mutex::new(None),
        })
    }

    pub(crate) async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let assertion = self.assertion()?;
        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        let value = response.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    fn assertion(&self) -> Result<String, SheetsError> {
        let claims = Claims::with_custom_claims(
            ScopeClaims {
                scope: SHEETS_SCOPE.to_string(),
            },
            JwtDuration::from_secs(ASSERTION_TTL_SECS),
        )
        .with_issuer(&self.client_email)
        .with_audience(&self.token_url);
        self.key_pair
            .sign(claims)
            .map_err(|err| SheetsError::Signing(err.to_string()))
    }
}
