use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::consts::ADC_ENV;

/// Five minute buffer before a token's real expiry.
const EXPIRY_BUFFER_MS: u64 = 5 * 60 * 1000;

/// A gcloud user credential plus the last access token minted from it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Expiration timestamp in milliseconds since epoch.
    #[serde(default)]
    pub expires: u64,
}

impl AuthorizedUser {
    pub fn is_expired(&self) -> bool {
        self.access.is_none() || now_ms() >= self.expires
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Mint a new access token from the user's refresh token.
pub async fn refresh_token(token_url: &str, user: &AuthorizedUser) -> Result<AuthorizedUser> {
    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "client_id": user.client_id,
        "client_secret": user.client_secret,
        "refresh_token": user.refresh_token,
    });

    let client = reqwest::Client::new();
    let resp = client
        .post(token_url)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("failed to read error body: {e}"));
        bail!("token refresh failed ({status}): {text}");
    }

    let data: TokenResponse = resp.json().await?;

    let expires = now_ms()
        .saturating_add(data.expires_in.saturating_mul(1000))
        .saturating_sub(EXPIRY_BUFFER_MS);

    Ok(AuthorizedUser {
        access: Some(data.access_token),
        expires,
        ..user.clone()
    })
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Where gcloud keeps application default credentials.
pub fn default_adc_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ADC_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("gcloud").join("application_default_credentials.json"))
}

/// Read an application default credentials file. Only user credentials
/// (`gcloud auth application-default login`) are supported.
pub fn load_application_default(path: &Path) -> Result<AuthorizedUser> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials file {}", path.display()))?;
    parse_application_default(&text)
        .with_context(|| format!("invalid credentials file {}", path.display()))
}

fn parse_application_default(text: &str) -> Result<AuthorizedUser> {
    let file: AdcFile = serde_json::from_str(text)?;
    if file.kind != "authorized_user" {
        bail!(
            "unsupported credential type {:?}: only authorized_user is supported",
            file.kind
        );
    }
    let (Some(client_id), Some(client_secret), Some(refresh_token)) =
        (file.client_id, file.client_secret, file.refresh_token)
    else {
        bail!("authorized_user credentials need client_id, client_secret and refresh_token");
    };
    Ok(AuthorizedUser {
        client_id,
        client_secret,
        refresh_token,
        access: None,
        expires: 0,
    })
}

#[derive(serde::Deserialize)]
struct AdcFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}
