//! Provider-neutral surface: what to open and the [`Cloud`] trait that
//! each provider implements.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use crate::reporter::Reporter;

/// Transport protocol of an opened port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => bail!("unsupported protocol: {other}"),
        }
    }
}

/// A single port/protocol pair, written as `4800/udp` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortSpec {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

impl FromStr for PortSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (port, protocol) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid port spec {s:?}: expected PORT/PROTOCOL"))?;
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow!("invalid port spec {s:?}: {port:?} is not a port number"))?;
        if port == 0 {
            bail!("invalid port spec {s:?}: port must be non-zero");
        }
        Ok(Self {
            port,
            protocol: protocol.parse()?,
        })
    }
}

/// Render ports for progress messages, e.g. `4800/UDP, 8080/TCP`.
pub fn format_ports(ports: &[PortSpec]) -> String {
    ports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What to open before the overlay is deployed.
#[derive(Debug, Clone, Default)]
pub struct PrepareInput {
    pub internal_ports: Vec<PortSpec>,
}

/// The outermost boundary. main.rs only knows this trait.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Make sure the cloud lets cluster nodes reach each other on the
    /// requested internal ports.
    async fn prepare(&self, input: &PrepareInput, reporter: &dyn Reporter) -> Result<()>;

    /// Undo whatever `prepare` created. Missing resources are not an error.
    async fn cleanup(&self, reporter: &dyn Reporter) -> Result<()>;
}
