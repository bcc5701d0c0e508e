//! Building the firewall rules a cluster needs.

use super::client::{Direction, Firewall, FirewallAllowed};
use crate::api::PortSpec;

/// Suffix of the rule that opens internal ports between cluster nodes.
pub const INTERNAL_PORTS_RULE: &str = "submariner-internal-ports-ingress";

/// `{infra_id}-{suffix}`.
pub fn rule_name(infra_id: &str, suffix: &str) -> String {
    format!("{infra_id}-{suffix}")
}

/// The VPC network the installer created for this cluster.
pub fn network_url(project_id: &str, infra_id: &str) -> String {
    format!("projects/{project_id}/global/networks/{infra_id}-network")
}

/// Network tags carried by every node of the cluster.
pub fn node_tags(infra_id: &str) -> Vec<String> {
    vec![format!("{infra_id}-worker"), format!("{infra_id}-master")]
}

/// One `allowed` entry per port, in input order.
pub fn allowed_ports(ports: &[PortSpec]) -> Vec<FirewallAllowed> {
    ports
        .iter()
        .map(|p| FirewallAllowed {
            ip_protocol: p.protocol.as_str().to_string(),
            ports: vec![p.port.to_string()],
        })
        .collect()
}

/// Ingress rule letting cluster nodes reach each other on `ports`.
pub fn internal_ingress_rule(project_id: &str, infra_id: &str, ports: &[PortSpec]) -> Firewall {
    let tags = node_tags(infra_id);
    Firewall {
        name: rule_name(infra_id, INTERNAL_PORTS_RULE),
        description: Some("Internal ports for multi-cluster networking".to_string()),
        network: Some(network_url(project_id, infra_id)),
        direction: Some(Direction::Ingress),
        allowed: allowed_ports(ports),
        source_tags: tags.clone(),
        target_tags: tags,
        disabled: Some(false),
        ..Firewall::default()
    }
}
