//! Host, port and service filters applied to query views
//!
//! A `Filters` value is a plain description of what the caller wants to see.
//! Evaluation is pure: nothing here touches the registry.

use crate::model::{Host, Port};
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// One entry of a host filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFilterEntry {
    Address(IpAddr),
    Network(IpNetwork),
}

impl HostFilterEntry {
    /// Parse a literal IP or CIDR network
    pub fn parse(token: &str) -> Option<Self> {
        if let Ok(ip) = IpAddr::from_str(token) {
            return Some(HostFilterEntry::Address(ip));
        }
        if let Ok(network) = IpNetwork::from_str(token) {
            return Some(HostFilterEntry::Network(network));
        }
        None
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            HostFilterEntry::Address(addr) => *addr == ip,
            HostFilterEntry::Network(network) => network.contains(ip),
        }
    }
}

impl fmt::Display for HostFilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostFilterEntry::Address(addr) => write!(f, "{}", addr),
            HostFilterEntry::Network(network) => write!(f, "{}", network),
        }
    }
}

/// Literal IPs and CIDR ranges a host must fall in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFilter {
    entries: Vec<HostFilterEntry>,
}

impl HostFilter {
    /// Build a filter from raw tokens. Tokens that are neither an IP nor a
    /// CIDR network are dropped with a warning.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut entries = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            match HostFilterEntry::parse(token) {
                Some(entry) => entries.push(entry),
                None => log::warn!("Dropping invalid host filter entry: {}", token),
            }
        }
        Self { entries }
    }

    /// Build a filter from "10.0.0.1,192.168.0.0/24"
    pub fn from_csv(raw: &str) -> Self {
        Self::parse(&raw.split(',').collect::<Vec<_>>())
    }

    pub fn entries(&self) -> &[HostFilterEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn matches(&self, ip: &str) -> bool {
        match IpAddr::from_str(ip) {
            Ok(addr) => self.entries.iter().any(|entry| entry.contains(addr)),
            Err(_) => false,
        }
    }
}

/// Query filters. Unset dimensions (`None`) let everything through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub hosts: Option<HostFilter>,
    pub ports: Option<Vec<u16>>,
    pub services: Option<Vec<String>>,
    /// Exclude hosts that were down
    pub only_alive: bool,
    /// Exclude hosts without open ports
    pub must_have_ports: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            hosts: None,
            ports: None,
            services: None,
            only_alive: true,
            must_have_ports: true,
        }
    }
}

impl Filters {
    /// No filtering at all: down hosts and hosts without ports included
    pub fn unrestricted() -> Self {
        Self {
            only_alive: false,
            must_have_ports: false,
            ..Self::default()
        }
    }

    pub fn with_hosts(mut self, hosts: HostFilter) -> Self {
        self.hosts = if hosts.is_empty() { None } else { Some(hosts) };
        self
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = if ports.is_empty() { None } else { Some(ports) };
        self
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = if services.is_empty() { None } else { Some(services) };
        self
    }

    pub fn with_only_alive(mut self, only_alive: bool) -> Self {
        self.only_alive = only_alive;
        self
    }

    pub fn with_must_have_ports(mut self, must_have_ports: bool) -> Self {
        self.must_have_ports = must_have_ports;
        self
    }

    pub fn hosts_filtered(&self) -> bool {
        self.hosts.as_ref().map_or(false, |h| !h.is_empty())
    }

    pub fn ports_filtered(&self) -> bool {
        self.ports.as_ref().map_or(false, |p| !p.is_empty())
    }

    pub fn services_filtered(&self) -> bool {
        self.services.as_ref().map_or(false, |s| !s.is_empty())
    }

    pub fn port_id_allowed(&self, port_id: u16) -> bool {
        match &self.ports {
            Some(ports) if !ports.is_empty() => ports.contains(&port_id),
            _ => true,
        }
    }

    pub fn service_allowed(&self, service: &str) -> bool {
        match &self.services {
            Some(services) if !services.is_empty() => services.iter().any(|s| s == service),
            _ => true,
        }
    }

    /// Whether a port satisfies both the port and the service filter.
    /// This annotates ports; it never excludes a host by itself.
    pub fn matches_port(&self, port: &Port) -> bool {
        self.port_id_allowed(port.port_id) && self.service_allowed(&port.service)
    }

    /// Liveness and address checks only
    pub fn matches_host_address(&self, host: &Host) -> bool {
        if self.only_alive && !host.alive {
            return false;
        }
        match &self.hosts {
            Some(filter) if !filter.is_empty() => filter.matches(&host.ip),
            _ => true,
        }
    }

    /// Whether a host belongs in a filtered result
    pub fn matches_host(&self, host: &Host) -> bool {
        if !self.matches_host_address(host) {
            return false;
        }
        if self.must_have_ports && host.ports.is_empty() {
            return false;
        }
        if self.ports_filtered() || self.services_filtered() {
            return host.ports.iter().any(|port| self.matches_port(port));
        }
        true
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(hosts) = self.hosts.as_ref().filter(|h| !h.is_empty()) {
            let entries: Vec<String> = hosts.entries().iter().map(|e| e.to_string()).collect();
            parts.push(format!("hosts={}", entries.join(",")));
        }
        if let Some(ports) = self.ports.as_ref().filter(|p| !p.is_empty()) {
            let ports: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
            parts.push(format!("ports={}", ports.join(",")));
        }
        if let Some(services) = self.services.as_ref().filter(|s| !s.is_empty()) {
            parts.push(format!("services={}", services.join(",")));
        }
        if self.only_alive {
            parts.push("only alive".to_string());
        }
        if self.must_have_ports {
            parts.push("must have ports".to_string());
        }

        if parts.is_empty() {
            write!(f, "no filters")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn host(ip: &str, alive: bool, ports: &[(Protocol, u16, &str)]) -> Host {
        let mut host = Host::new(ip);
        host.alive = alive;
        for (protocol, port_id, service) in ports {
            host.add_port(*protocol, *port_id, service);
        }
        host
    }

    #[test]
    fn test_cidr_host_filter() {
        let filters = Filters::default().with_hosts(HostFilter::parse(&["10.0.0.0/24"]));
        let inside = host("10.0.0.1", true, &[(Protocol::Tcp, 80, "http")]);
        let outside = host("192.168.1.1", true, &[(Protocol::Tcp, 80, "http")]);

        assert!(filters.matches_host(&inside));
        assert!(!filters.matches_host(&outside));
    }

    #[test]
    fn test_literal_ip_filter() {
        let filter = HostFilter::from_csv("192.168.1.1, 10.1.0.0/16");
        assert!(filter.matches("192.168.1.1"));
        assert!(filter.matches("10.1.200.3"));
        assert!(!filter.matches("192.168.1.2"));
        assert!(!filter.matches("not-an-ip"));
    }

    #[test]
    fn test_invalid_tokens_dropped() {
        let filter = HostFilter::parse(&["bogus", "10.0.0.300", "10.0.0.0/24", ""]);
        assert_eq!(filter.entries().len(), 1);
        assert!(filter.matches("10.0.0.42"));

        let all_bad = Filters::default().with_hosts(HostFilter::parse(&["bogus"]));
        assert!(all_bad.hosts.is_none());
    }

    #[test]
    fn test_only_alive_excludes_first() {
        let down = host("10.0.0.1", false, &[(Protocol::Tcp, 80, "http")]);
        assert!(!Filters::default().matches_host(&down));
        assert!(Filters::default().with_only_alive(false).matches_host(&down));
    }

    #[test]
    fn test_must_have_ports() {
        let empty = host("10.0.0.1", true, &[]);
        assert!(!Filters::default().matches_host(&empty));
        assert!(Filters::default().with_must_have_ports(false).matches_host(&empty));
    }

    #[test]
    fn test_service_filter_requires_matched_port() {
        let filters = Filters::default().with_services(vec!["http".to_string()]);
        let web = host("10.0.0.1", true, &[(Protocol::Tcp, 80, "http"), (Protocol::Tcp, 22, "ssh")]);
        let ssh_only = host("10.0.0.2", true, &[(Protocol::Tcp, 22, "ssh")]);

        assert!(filters.matches_host(&web));
        assert!(!filters.matches_host(&ssh_only));
        assert!(filters.matches_port(&web.ports[1]));
        assert!(!filters.matches_port(&web.ports[0]));
    }

    #[test]
    fn test_port_and_service_filters_combine() {
        let filters = Filters::default()
            .with_ports(vec![8080])
            .with_services(vec!["http".to_string()]);
        let h = host("10.0.0.1", true, &[(Protocol::Tcp, 80, "http"), (Protocol::Tcp, 8080, "proxy")]);
        assert!(!filters.matches_host(&h));
    }

    #[test]
    fn test_display() {
        assert_eq!(Filters::unrestricted().to_string(), "no filters");
        let filters = Filters::default().with_ports(vec![80, 443]);
        assert_eq!(filters.to_string(), "ports=80,443; only alive; must have ports");
    }
}
