//! Kubeconfig mutation
//!
//! Points the first cluster of a kubeconfig at a load balancer host port and
//! optionally relaxes TLS verification. Everything here is a pure
//! transformation over [`Kubeconfig`]; reading and writing secrets happens in
//! the daemon.

use crate::{Error, Result};
use kube::config::Kubeconfig;
use std::fmt;
use std::net::Ipv6Addr;

/// Address the mutated kubeconfig should point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: String,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Server URL in the form `https://<host>:<port>`
    ///
    /// Bare IPv6 literals are bracketed so the port stays unambiguous.
    pub fn url(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// TLS verification policy applied to the mutated cluster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Leave CA data and the insecure flag untouched
    Verify,
    /// Drop CA data and set `insecure-skip-tls-verify`
    SkipVerify,
}

impl TlsPolicy {
    pub fn from_disable_flag(disable_tls_verify: bool) -> Self {
        if disable_tls_verify {
            Self::SkipVerify
        } else {
            Self::Verify
        }
    }
}

/// Parse a serialized kubeconfig (YAML or JSON)
pub fn parse_kubeconfig(bytes: &[u8]) -> Result<Kubeconfig> {
    Ok(serde_yaml::from_slice(bytes)?)
}

/// Serialize a kubeconfig back to YAML bytes
pub fn serialize_kubeconfig(kubeconfig: &Kubeconfig) -> Result<Vec<u8>> {
    serde_yaml::to_string(kubeconfig)
        .map(String::into_bytes)
        .map_err(|e| Error::Serialize(e.to_string()))
}

/// Rewrite the first cluster entry to point at `endpoint`
///
/// Only the first cluster is touched; any further entries pass through
/// unchanged.
pub fn mutate_kubeconfig(
    mut kubeconfig: Kubeconfig,
    endpoint: &ServerEndpoint,
    tls: TlsPolicy,
) -> Result<Kubeconfig> {
    let named = kubeconfig
        .clusters
        .first_mut()
        .ok_or_else(|| Error::MalformedKubeconfig("no cluster entries".to_string()))?;

    let cluster = named.cluster.as_mut().ok_or_else(|| {
        Error::MalformedKubeconfig(format!("cluster '{}' has no definition", named.name))
    })?;

    cluster.server = Some(endpoint.url());

    if tls == TlsPolicy::SkipVerify {
        cluster.certificate_authority_data = None;
        cluster.insecure_skip_tls_verify = Some(true);
    }

    Ok(kubeconfig)
}
