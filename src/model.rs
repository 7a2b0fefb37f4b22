//! Data model for merged scan results

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Transport protocol of a scanned port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(format!("Unsupported protocol: {}", s)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which protocols a unique-port query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortScope {
    Tcp,
    Udp,
    #[default]
    Combined,
}

impl PortScope {
    pub fn includes(&self, protocol: Protocol) -> bool {
        match self {
            PortScope::Tcp => protocol == Protocol::Tcp,
            PortScope::Udp => protocol == Protocol::Udp,
            PortScope::Combined => true,
        }
    }
}

impl std::str::FromStr for PortScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(PortScope::Tcp),
            "udp" => Ok(PortScope::Udp),
            "" | "default" | "combined" => Ok(PortScope::Combined),
            _ => Err(format!("Unknown port scope: {}", s)),
        }
    }
}

/// How a host's liveness is resolved when several files mention it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliveMerge {
    /// The last file processed decides
    #[default]
    KeepLast,
    /// A host stays alive once any file reported it up
    KeepAliveIfAny,
}

impl AliveMerge {
    pub fn resolve(&self, current: bool, incoming: bool) -> bool {
        match self {
            AliveMerge::KeepLast => incoming,
            AliveMerge::KeepAliveIfAny => current || incoming,
        }
    }
}

impl std::str::FromStr for AliveMerge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep-last" | "last" => Ok(AliveMerge::KeepLast),
            "keep-alive-if-any" | "any" => Ok(AliveMerge::KeepAliveIfAny),
            _ => Err(format!("Unknown alive merge strategy: {}", s)),
        }
    }
}

/// An open port recorded for a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub port_id: u16,
    /// Service name, empty when the scanner could not name it
    pub service: String,
}

impl Port {
    pub fn new(protocol: Protocol, port_id: u16, service: &str) -> Self {
        Self {
            protocol,
            port_id,
            service: service.to_string(),
        }
    }

    pub fn key(&self) -> (Protocol, u16) {
        (self.protocol, self.port_id)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.service.is_empty() {
            write!(f, "{}/{}", self.port_id, self.protocol)
        } else {
            write!(f, "{}/{}/{}", self.port_id, self.protocol, self.service)
        }
    }
}

/// A scanned endpoint, keyed by its IP string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub ip: String,
    pub hostname: String,
    pub alive: bool,
    /// Kept sorted by (protocol, port id), unique per key
    pub ports: Vec<Port>,
    pub services_seen: BTreeSet<String>,
    /// Source files in first-seen order
    pub files_containing_host: Vec<String>,
}

impl Host {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            hostname: ip.to_string(),
            alive: false,
            ports: Vec::new(),
            services_seen: BTreeSet::new(),
            files_containing_host: Vec::new(),
        }
    }

    /// Record an open port. An existing entry only has its service name
    /// filled in if it was blank.
    pub fn add_port(&mut self, protocol: Protocol, port_id: u16, service: &str) {
        if !service.is_empty() {
            self.services_seen.insert(service.to_string());
        }

        match self.ports.binary_search_by(|p| p.key().cmp(&(protocol, port_id))) {
            Ok(idx) => {
                let existing = &mut self.ports[idx];
                if existing.service.is_empty() && !service.is_empty() {
                    existing.service = service.to_string();
                }
            }
            Err(idx) => self.ports.insert(idx, Port::new(protocol, port_id, service)),
        }
    }

    pub fn record_file(&mut self, file_id: &str) {
        if !self.files_containing_host.iter().any(|f| f == file_id) {
            self.files_containing_host.push(file_id.to_string());
        }
    }

    /// Replace the ip placeholder with a resolved name; a resolved name is kept
    pub fn promote_hostname(&mut self, name: &str) {
        if !name.is_empty() && !self.has_hostname() {
            self.hostname = name.to_string();
        }
    }

    pub fn has_hostname(&self) -> bool {
        self.hostname != self.ip
    }

    pub fn merge_alive(&mut self, alive: bool, strategy: AliveMerge) {
        self.alive = strategy.resolve(self.alive, alive);
    }

    pub fn state(&self) -> &'static str {
        if self.alive { "up" } else { "down" }
    }

    pub fn port(&self, protocol: Protocol, port_id: u16) -> Option<&Port> {
        self.ports
            .binary_search_by(|p| p.key().cmp(&(protocol, port_id)))
            .ok()
            .map(|idx| &self.ports[idx])
    }

    pub fn unique_port_ids(&self, scope: PortScope) -> Vec<u16> {
        let ids: BTreeSet<u16> = self.ports.iter()
            .filter(|p| scope.includes(p.protocol))
            .map(|p| p.port_id)
            .collect();
        ids.into_iter().collect()
    }
}

/// A named service aggregated across every host it was seen on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub hosts: BTreeSet<String>,
    pub ports: BTreeSet<u16>,
}

impl Service {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hosts: BTreeSet::new(),
            ports: BTreeSet::new(),
        }
    }
}
