//! Read-only, filter-driven projections of the registry
//!
//! Every query builds its own snapshot that borrows the registry. Port match
//! flags live on the snapshot, so two queries with different filters never
//! see each other's annotations.

use crate::filter::Filters;
use crate::model::{Host, Port, PortScope};
use crate::registry::Registry;
use crate::utils::ip_sort_key;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

/// A port together with its match flag for the current query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortView<'a> {
    pub port: &'a Port,
    pub matched: bool,
}

/// A host selected by a query, with per-port match flags
#[derive(Debug, Clone)]
pub struct HostView<'a> {
    host: &'a Host,
    matched: Vec<bool>,
}

impl<'a> HostView<'a> {
    fn new(host: &'a Host, filters: &Filters) -> Self {
        let matched = host.ports.iter().map(|p| filters.matches_port(p)).collect();
        Self { host, matched }
    }

    pub fn host(&self) -> &'a Host {
        self.host
    }

    pub fn ports(&self) -> impl Iterator<Item = PortView<'a>> + '_ {
        self.host.ports.iter()
            .zip(self.matched.iter())
            .map(|(port, matched)| PortView { port, matched: *matched })
    }

    pub fn matched_ports(&self) -> impl Iterator<Item = &'a Port> + '_ {
        self.ports().filter(|p| p.matched).map(|p| p.port)
    }

    /// Sorted ids of the matched ports within `scope`
    pub fn unique_port_ids(&self, scope: PortScope) -> Vec<u16> {
        let ids: BTreeSet<u16> = self.matched_ports()
            .filter(|p| scope.includes(p.protocol))
            .map(|p| p.port_id)
            .collect();
        ids.into_iter().collect()
    }
}

impl Deref for HostView<'_> {
    type Target = Host;

    fn deref(&self) -> &Host {
        self.host
    }
}

/// A service narrowed to the hosts and ports that survive a query
#[derive(Debug, Clone)]
pub struct ServiceView<'a> {
    pub name: &'a str,
    pub hosts: Vec<&'a Host>,
    pub ports: Vec<u16>,
}

/// Counters describing what has been imported so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported_count: usize,
    pub failed_count: usize,
    pub failed_files: Vec<String>,
    pub imported_files: Vec<String>,
    pub skipped_hosts: usize,
}

/// Query entry point over a borrowed registry
#[derive(Debug, Clone, Copy)]
pub struct QueryViews<'a> {
    registry: &'a Registry,
}

impl<'a> QueryViews<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn host(&self, ip: &str) -> Option<&'a Host> {
        self.registry.host(ip)
    }

    /// Hosts passing `filters`, in ascending numeric IP order
    pub fn hosts(&self, filters: &Filters) -> Vec<HostView<'a>> {
        let registry: &'a Registry = self.registry;
        let mut hosts: Vec<HostView<'a>> = registry.hosts()
            .filter(|host| filters.matches_host(host))
            .map(|host| HostView::new(host, filters))
            .collect();
        hosts.sort_by(|a, b| ip_sort_key(&a.host.ip).cmp(&ip_sort_key(&b.host.ip)));
        hosts
    }

    pub fn alive_hosts(&self, filters: &Filters) -> Vec<&'a str> {
        self.hosts(filters)
            .into_iter()
            .filter(|view| view.host.alive)
            .map(|view| view.host.ip.as_str())
            .collect()
    }

    /// Every host reported up, whether or not it has open ports
    pub fn all_alive_hosts(&self) -> Vec<&'a str> {
        self.alive_hosts(&Filters::unrestricted())
    }

    /// Unique matched port ids across `hosts(filters)`
    pub fn unique_port_ids(&self, scope: PortScope, filters: &Filters) -> Vec<u16> {
        let ids: BTreeSet<u16> = self.hosts(filters)
            .iter()
            .flat_map(|view| view.unique_port_ids(scope))
            .collect();
        ids.into_iter().collect()
    }

    /// Services narrowed by every filter dimension, sorted by name.
    ///
    /// A service drops out once no host or no port survives.
    pub fn services(&self, filters: &Filters) -> Vec<ServiceView<'a>> {
        let registry: &'a Registry = self.registry;
        let mut services: Vec<ServiceView<'a>> = registry.services()
            .filter(|service| filters.service_allowed(&service.name))
            .filter_map(|service| {
                let ports: Vec<u16> = service.ports.iter()
                    .copied()
                    .filter(|p| filters.port_id_allowed(*p))
                    .collect();

                let mut hosts: Vec<&'a Host> = service.hosts.iter()
                    .filter_map(|ip| registry.host(ip))
                    .filter(|host| filters.matches_host_address(host))
                    // The host must offer this service on one of the surviving ports
                    .filter(|host| {
                        host.ports.iter().any(|p| p.service == service.name && ports.contains(&p.port_id))
                    })
                    .collect();
                hosts.sort_by(|a, b| ip_sort_key(&a.ip).cmp(&ip_sort_key(&b.ip)));

                if hosts.is_empty() || ports.is_empty() {
                    None
                } else {
                    Some(ServiceView { name: service.name.as_str(), hosts, ports })
                }
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(b.name));
        services
    }

    /// Filtered hosts grouped under every file that mentioned them
    pub fn hosts_by_file(&self, filters: &Filters) -> BTreeMap<&'a str, Vec<HostView<'a>>> {
        let mut by_file: BTreeMap<&'a str, Vec<HostView<'a>>> = BTreeMap::new();
        for view in self.hosts(filters) {
            for file in &view.host().files_containing_host {
                by_file.entry(file.as_str()).or_default().push(view.clone());
            }
        }
        by_file
    }

    pub fn hosts_within_file(&self, file_id: &str, filters: &Filters) -> Vec<HostView<'a>> {
        self.hosts(filters)
            .into_iter()
            .filter(|view| view.host.files_containing_host.iter().any(|f| f == file_id))
            .collect()
    }

    pub fn import_summary(&self) -> ImportSummary {
        ImportSummary {
            imported_count: self.registry.files_imported().len(),
            failed_count: self.registry.files_failed().len(),
            failed_files: self.registry.files_failed().to_vec(),
            imported_files: self.registry.files_imported().to_vec(),
            skipped_hosts: self.registry.skipped_hosts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for (ip, alive, ports) in [
            ("10.0.0.10", true, vec![(Protocol::Tcp, 80, "http"), (Protocol::Tcp, 22, "ssh")]),
            ("10.0.0.9", true, vec![(Protocol::Tcp, 22, "ssh"), (Protocol::Udp, 161, "snmp")]),
            ("10.0.0.2", false, vec![(Protocol::Tcp, 443, "https")]),
        ] {
            let host = registry.add_or_merge_host(ip);
            host.alive = alive;
            host.record_file("scan.xml");
            for (protocol, port_id, service) in &ports {
                host.add_port(*protocol, *port_id, service);
            }
            for (_, port_id, service) in &ports {
                registry.add_service(service, ip, *port_id);
            }
        }
        registry
    }

    #[test]
    fn test_match_flags_are_per_query() {
        let registry = registry();
        let views = QueryViews::new(&registry);

        let http = Filters::default().with_services(vec!["http".to_string()]);
        let ssh = Filters::default().with_services(vec!["ssh".to_string()]);
        let http_hosts = views.hosts(&http);
        let ssh_hosts = views.hosts(&ssh);

        let http_matched: Vec<u16> = http_hosts[0].matched_ports().map(|p| p.port_id).collect();
        assert_eq!(http_matched, vec![80]);
        let ssh_ips: Vec<&str> = ssh_hosts.iter().map(|h| h.ip.as_str()).collect();
        assert_eq!(ssh_ips, vec!["10.0.0.9", "10.0.0.10"]);
        assert!(ssh_hosts[1].ports().any(|p| p.port.port_id == 22 && p.matched));
        assert!(ssh_hosts[1].ports().any(|p| p.port.port_id == 80 && !p.matched));
    }

    #[test]
    fn test_services_narrowed_by_filters() {
        let registry = registry();
        let views = QueryViews::new(&registry);

        let all: Vec<&str> = views.services(&Filters::unrestricted()).iter().map(|s| s.name).collect();
        assert_eq!(all, vec!["http", "https", "snmp", "ssh"]);

        let alive: Vec<&str> = views.services(&Filters::default()).iter().map(|s| s.name).collect();
        assert_eq!(alive, vec!["http", "snmp", "ssh"]);

        let port_22 = views.services(&Filters::default().with_ports(vec![22]));
        assert_eq!(port_22.len(), 1);
        assert_eq!(port_22[0].name, "ssh");
        assert_eq!(port_22[0].hosts.len(), 2);
    }

    #[test]
    fn test_service_hosts_need_the_service_on_a_filtered_port() {
        let mut registry = Registry::new();
        for (ip, ports) in [
            ("10.0.0.1", vec![(80, "http"), (8080, "proxy")]),
            ("10.0.0.2", vec![(8080, "http")]),
        ] {
            let host = registry.add_or_merge_host(ip);
            host.alive = true;
            for (port_id, service) in &ports {
                host.add_port(Protocol::Tcp, *port_id, service);
            }
            for (port_id, service) in &ports {
                registry.add_service(service, ip, *port_id);
            }
        }

        let filters = Filters::default()
            .with_ports(vec![8080])
            .with_services(vec!["http".to_string()]);
        let services = QueryViews::new(&registry).services(&filters);

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "http");
        assert_eq!(services[0].ports, vec![8080]);
        let ips: Vec<&str> = services[0].hosts.iter().map(|h| h.ip.as_str()).collect();
        assert_eq!(ips, vec!["10.0.0.2"]);
    }

    #[test]
    fn test_all_alive_hosts_ignores_filters() {
        let mut registry = registry();
        registry.add_or_merge_host("10.0.0.1").alive = true;
        let views = QueryViews::new(&registry);

        assert_eq!(views.all_alive_hosts(), vec!["10.0.0.1", "10.0.0.9", "10.0.0.10"]);
        let http_only = Filters::default().with_services(vec!["http".to_string()]);
        assert_eq!(views.alive_hosts(&http_only), vec!["10.0.0.10"]);
    }

    #[test]
    fn test_import_summary_counts() {
        let mut registry = registry();
        registry.mark_imported("scan.xml");
        registry.mark_failed("broken.xml");
        let summary = QueryViews::new(&registry).import_summary();
        assert_eq!(summary.imported_count, 1);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.failed_files, vec!["broken.xml"]);
    }
}
