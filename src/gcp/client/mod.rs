//! The Compute Engine seam. [`GcpCloud`](crate::gcp::GcpCloud) only talks
//! to [`ComputeClient`]; the REST implementation and the scripted mock
//! both live behind it.

pub mod mock;
pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Traffic direction of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ingress,
    Egress,
}

/// One allowed protocol and its ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallAllowed {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

/// A Compute Engine v1 `Firewall` resource. Only the fields we manage are
/// modelled; anything else the API returns is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<FirewallAllowed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ranges: Vec<String>,
}

/// An error response from a Google API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("googleapi: error {code}: {message}")]
pub struct GoogleApiError {
    pub code: u16,
    pub message: String,
    pub reason: Option<String>,
}

impl GoogleApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: None,
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self {
            code: 404,
            message: format!("The resource '{resource}' was not found"),
            reason: Some("notFound".to_string()),
        }
    }
}

/// True if any error in the chain is a Google API 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<GoogleApiError>()
            .is_some_and(|e| e.code == 404)
    })
}

/// Firewall operations against a Compute Engine project.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn get_firewall_rule(&self, project_id: &str, name: &str) -> Result<Firewall>;
    async fn insert_firewall_rule(&self, project_id: &str, rule: &Firewall) -> Result<()>;
    async fn update_firewall_rule(&self, project_id: &str, name: &str, rule: &Firewall)
    -> Result<()>;
    async fn delete_firewall_rule(&self, project_id: &str, name: &str) -> Result<()>;
}
