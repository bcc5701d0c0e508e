//! Project-wide constants.

use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::api::{PortSpec, Protocol};

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Compute Engine v1 REST endpoint.
pub const COMPUTE_API_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Google OAuth2 token endpoint, used for refresh-token grants.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Credential provider key for Google Cloud.
pub const GCP_PROVIDER: &str = "gcp";

/// Environment variable holding a raw OAuth access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Environment variable pointing at an application default credentials file.
pub const ADC_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// VXLAN tunnel port between cluster nodes.
pub const VXLAN_PORT: u16 = 4800;

/// Metrics ports exposed by the gateway and route agent.
pub const METRICS_PORTS: [u16; 2] = [8080, 8081];

/// Ports opened when `--port` is not given.
pub fn default_internal_ports() -> Vec<PortSpec> {
    let mut ports = vec![PortSpec::new(VXLAN_PORT, Protocol::Udp)];
    ports.extend(METRICS_PORTS.iter().map(|&p| PortSpec::new(p, Protocol::Tcp)));
    ports
}

/// Default database path: `~/.cloudprep/cloudprep.db`.
/// Single DB for credentials and config.
pub fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".cloudprep").join("cloudprep.db"))
}
