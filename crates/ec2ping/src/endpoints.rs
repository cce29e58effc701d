//! Endpoint Expansion
//!
//! Turns matched private addresses into candidate endpoints. Every address is
//! combined with `base_port ..= base_port + port_range` so several protocol
//! instances colocated on one host are all probed.

use crate::error::{DiscoveryError, Result};
use crate::observability::events;
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// A single `(address, port)` candidate handed to the discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateEndpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl CandidateEndpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl fmt::Display for CandidateEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl From<CandidateEndpoint> for SocketAddr {
    fn from(endpoint: CandidateEndpoint) -> Self {
        endpoint.socket_addr()
    }
}

/// Base port plus the number of additional ports probed after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPolicy {
    pub base_port: u16,
    pub port_range: u16,
}

impl Default for PortPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_PORT, Self::DEFAULT_PORT_RANGE)
    }
}

impl PortPolicy {
    pub const DEFAULT_BASE_PORT: u16 = 7800;
    pub const DEFAULT_PORT_RANGE: u16 = 50;

    pub fn new(base_port: u16, port_range: u16) -> Self {
        Self {
            base_port,
            port_range,
        }
    }

    /// Rejects policies whose last port does not fit in a `u16`.
    pub fn validate(&self) -> Result<()> {
        if self.base_port.checked_add(self.port_range).is_none() {
            return Err(DiscoveryError::InvalidConfig(format!(
                "port_number {} + port_range {} exceeds {}",
                self.base_port,
                self.port_range,
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Ports probed per host, inclusive of the base port.
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        let last = self.base_port.saturating_add(self.port_range);
        self.base_port..=last
    }

    pub fn ports_per_host(&self) -> usize {
        self.ports().count()
    }
}

/// Expand every address into its candidate endpoints.
///
/// Addresses that cannot be resolved are skipped with a warning. The result has
/// set semantics: duplicates are dropped, first-seen order is kept.
pub async fn expand<S: AsRef<str>>(addresses: &[S], policy: PortPolicy) -> Vec<CandidateEndpoint> {
    let resolved = futures::future::join_all(addresses.iter().map(|a| resolve_address(a.as_ref()))).await;

    let mut seen = HashSet::new();
    let mut endpoints = Vec::with_capacity(addresses.len() * policy.ports_per_host());

    for result in resolved {
        let ip = match result {
            Ok(ip) => ip,
            Err(e) => {
                events::address_skipped(&e.to_string());
                continue;
            }
        };

        for port in policy.ports() {
            let endpoint = CandidateEndpoint::new(ip, port);
            if seen.insert(endpoint) {
                endpoints.push(endpoint);
            }
        }
    }

    debug!(
        addresses = addresses.len(),
        endpoints = endpoints.len(),
        "Expanded addresses into candidate endpoints"
    );
    endpoints
}

/// Parse an IP literal, falling back to DNS for plausible host names.
async fn resolve_address(address: &str) -> Result<IpAddr> {
    let trimmed = address.trim();
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Ok(ip);
    }

    let failed = || DiscoveryError::AddressResolutionFailed {
        address: address.to_string(),
    };

    if !looks_like_host_name(trimmed) {
        return Err(failed());
    }

    match tokio::net::lookup_host((trimmed, 0)).await {
        Ok(mut addrs) => addrs.next().map(|a| a.ip()).ok_or_else(failed),
        Err(e) => {
            debug!(address = %trimmed, error = %e, "DNS lookup failed");
            Err(failed())
        }
    }
}

fn looks_like_host_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 253
        && candidate
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
}
