pub mod oauth;
pub mod storage;

pub use storage::AuthStorage;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use storage::Credential;

/// Providers that credentials can be stored for.
const SUPPORTED_PROVIDERS: &[&str] = &["gcp"];

/// Anything that can hand out a bearer token for API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token. Handy for tests and for tokens minted elsewhere
/// (`gcloud auth print-access-token`).
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Save a credential for a provider.
///
/// Shared by `cloudprep login --token` and `cloudprep login --adc`.
pub fn login(db_path: &str, provider: &str, credential: Credential) -> Result<()> {
    if !SUPPORTED_PROVIDERS.contains(&provider) {
        bail!("unsupported provider: {provider}");
    }
    let storage = AuthStorage::open(db_path).context("failed to open auth storage")?;
    storage
        .set(provider, credential)
        .context("failed to save credentials")?;
    Ok(())
}

/// Remove stored credentials for a provider.
pub fn logout(db_path: &str, provider: &str) -> Result<()> {
    let storage = AuthStorage::open(db_path).context("failed to open auth storage")?;
    storage
        .remove(provider)
        .context("failed to remove credentials")?;
    Ok(())
}
