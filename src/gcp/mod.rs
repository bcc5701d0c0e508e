//! Google Cloud implementation of [`Cloud`].
//!
//! Preparing reconciles a single ingress firewall rule: insert it when the
//! project doesn't have it, otherwise overwrite it in place. Cleanup
//! deletes it and treats "already gone" as done.

pub mod client;
pub mod firewall;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::api::{Cloud, PrepareInput, format_ports};
use crate::reporter::Reporter;
use client::{ComputeClient, Firewall, is_not_found};
use firewall::{INTERNAL_PORTS_RULE, internal_ingress_rule, rule_name};

/// Where the cluster lives and how to reach the Compute API.
pub struct CloudInfo {
    pub infra_id: String,
    /// Informational only; firewall rules are global.
    pub region: Option<String>,
    pub project_id: String,
    pub client: Arc<dyn ComputeClient>,
}

pub struct GcpCloud {
    info: CloudInfo,
}

impl GcpCloud {
    pub fn new(info: CloudInfo) -> Self {
        Self { info }
    }

    /// Name of the rule that opens internal ports for this cluster.
    pub fn internal_rule_name(&self) -> String {
        rule_name(&self.info.infra_id, INTERNAL_PORTS_RULE)
    }

    /// Insert `rule` if it's missing, otherwise replace the existing one.
    /// The update is a full PUT, so it also resets anything the rule gained
    /// out of band, like `disabled` or a different priority.
    async fn open_ports(&self, rule: &Firewall) -> Result<()> {
        let client = &self.info.client;
        let project_id = &self.info.project_id;

        match client.get_firewall_rule(project_id, &rule.name).await {
            Ok(_) => {
                tracing::info!(rule = %rule.name, "updating firewall rule");
                client
                    .update_firewall_rule(project_id, &rule.name, rule)
                    .await
                    .with_context(|| format!("error updating firewall rule {:?}", rule.name))
            }
            Err(e) if is_not_found(&e) => {
                tracing::info!(rule = %rule.name, "inserting firewall rule");
                client
                    .insert_firewall_rule(project_id, rule)
                    .await
                    .with_context(|| format!("error inserting firewall rule {:?}", rule.name))
            }
            Err(e) => Err(e.context(format!("error retrieving firewall rule {:?}", rule.name))),
        }
    }

    async fn delete_rule(&self, name: &str, reporter: &dyn Reporter) -> Result<()> {
        match self
            .info
            .client
            .delete_firewall_rule(&self.info.project_id, name)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                reporter.warning(&format!("Firewall rule {name:?} was already deleted"));
                Ok(())
            }
            Err(e) => Err(e.context(format!("error deleting firewall rule {name:?}"))),
        }
    }
}

#[async_trait]
impl Cloud for GcpCloud {
    async fn prepare(&self, input: &PrepareInput, reporter: &dyn Reporter) -> Result<()> {
        let ports = format_ports(&input.internal_ports);
        reporter.started(&format!(
            "Opening internal ports {ports} for intra-cluster communications on GCP"
        ));

        let rule = internal_ingress_rule(
            &self.info.project_id,
            &self.info.infra_id,
            &input.internal_ports,
        );
        tracing::debug!(
            project = %self.info.project_id,
            region = self.info.region.as_deref().unwrap_or("-"),
            rule = %rule.name,
            "preparing"
        );

        if let Err(e) = self.open_ports(&rule).await {
            reporter.failed(&e);
            return Err(e);
        }

        reporter.succeeded(&format!(
            "Opened internal ports {ports} with firewall rule {:?} on GCP",
            rule.name
        ));
        Ok(())
    }

    async fn cleanup(&self, reporter: &dyn Reporter) -> Result<()> {
        let name = self.internal_rule_name();
        reporter.started(&format!(
            "Deleting internal ports firewall rule {name:?} on GCP"
        ));

        if let Err(e) = self.delete_rule(&name, reporter).await {
            reporter.failed(&e);
            return Err(e);
        }

        reporter.succeeded(&format!(
            "Deleted internal ports firewall rule {name:?} on GCP"
        ));
        Ok(())
    }
}
