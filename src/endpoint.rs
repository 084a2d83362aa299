//! Network endpoints.
//!
//! An [`Endpoint`] names one side of an operation: the local service that
//! recorded a span, or the remote peer of an RPC or messaging span. Only the
//! service name is required in practice; address fields are attached when the
//! instrumentation knows them.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The network context of a node in a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Lowercase service name, used for queries by service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// IPv4 address of this endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,

    /// IPv6 address of this endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,

    /// Listen or client port, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Endpoint {
    /// Creates an endpoint with only a service name.
    ///
    /// The name is lowercased, matching how collectors index it.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into().to_lowercase()),
            ipv4: None,
            ipv6: None,
            port: None,
        }
    }

    /// Sets the IPv4 address.
    pub fn with_ipv4(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4 = Some(addr);
        self
    }

    /// Sets the IPv6 address.
    pub fn with_ipv6(mut self, addr: Ipv6Addr) -> Self {
        self.ipv6 = Some(addr);
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}
