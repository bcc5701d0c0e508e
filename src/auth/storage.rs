use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rusqlite::Connection;

use super::TokenSource;
use super::oauth::{self, AuthorizedUser};
use crate::consts::{ACCESS_TOKEN_ENV, GCP_PROVIDER, TOKEN_URL};

/// Credential types stored per provider.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Credential {
    /// A raw bearer token, used as-is until it stops working.
    #[serde(rename = "access_token")]
    AccessToken { token: String },
    /// A gcloud user credential that can mint fresh access tokens.
    #[serde(rename = "authorized_user")]
    AuthorizedUser(AuthorizedUser),
}

/// Manages credential storage in SQLite.
///
/// Shares a database with [`Config`](crate::config::Config): pass the same
/// path to both.
pub struct AuthStorage {
    conn: Mutex<Connection>,
    token_url: String,
}

impl AuthStorage {
    /// Open or create a credentials table in the given database path.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS credentials (
                provider TEXT PRIMARY KEY,
                data     TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Refresh tokens against a different endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))
    }

    /// Get credential for a provider.
    pub fn get(&self, provider: &str) -> Result<Option<Credential>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM credentials WHERE provider = ?1")?;
        let mut rows = stmt.query([provider])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                let cred: Credential = serde_json::from_str(&json)?;
                Ok(Some(cred))
            }
            None => Ok(None),
        }
    }

    /// Store credential for a provider (upsert).
    pub fn set(&self, provider: &str, credential: Credential) -> Result<()> {
        let json = serde_json::to_string(&credential)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO credentials (provider, data) VALUES (?1, ?2)
             ON CONFLICT(provider) DO UPDATE SET data = excluded.data",
            [provider, &json],
        )?;
        Ok(())
    }

    /// Remove credential for a provider.
    pub fn remove(&self, provider: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM credentials WHERE provider = ?1", [provider])?;
        Ok(())
    }

    /// Get an access token for a provider, refreshing user credentials
    /// when their cached token has expired.
    /// Priority: stored token → stored user credential → environment variable.
    pub async fn get_access_token(&self, provider: &str, env_var: &str) -> Result<Option<String>> {
        if let Some(cred) = self.get(provider)? {
            match cred {
                Credential::AccessToken { token } => return Ok(Some(token)),
                Credential::AuthorizedUser(user) => {
                    if !user.is_expired()
                        && let Some(access) = &user.access
                    {
                        return Ok(Some(access.clone()));
                    }
                    tracing::debug!(provider, "refreshing access token");
                    let refreshed = oauth::refresh_token(&self.token_url, &user).await?;
                    self.set(provider, Credential::AuthorizedUser(refreshed.clone()))?;
                    return Ok(refreshed.access);
                }
            }
        }

        // Fall back to environment variable
        if let Ok(token) = std::env::var(env_var)
            && !token.is_empty()
        {
            return Ok(Some(token));
        }

        Ok(None)
    }
}

#[async_trait]
impl TokenSource for AuthStorage {
    async fn access_token(&self) -> Result<String> {
        self.get_access_token(GCP_PROVIDER, ACCESS_TOKEN_ENV)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "no GCP credentials found. Run `cloudprep login` or set {ACCESS_TOKEN_ENV}."
                )
            })
    }
}
