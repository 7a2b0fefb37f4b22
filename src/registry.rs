//! Session-scoped store of merged hosts and services

use crate::model::{Host, Service};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Merged state of every scan file imported into a session
#[derive(Debug, Default, Clone)]
pub struct Registry {
    hosts: HashMap<String, Host>,
    services: HashMap<String, Service>,
    files_imported: Vec<String>,
    files_failed: Vec<String>,
    skipped_hosts: usize,
    cmdlines: Vec<(String, String)>,
    /// Canonical paths of imported files, so aliases of one file import once
    sources: HashSet<PathBuf>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the host for `ip`, creating it on first encounter
    pub fn add_or_merge_host(&mut self, ip: &str) -> &mut Host {
        self.hosts.entry(ip.to_string()).or_insert_with(|| Host::new(ip))
    }

    /// Add `ip` and `port_id` to the service named `name`
    pub fn add_service(&mut self, name: &str, ip: &str, port_id: u16) {
        if name.is_empty() {
            return;
        }
        let service = self.services
            .entry(name.to_string())
            .or_insert_with(|| Service::new(name));
        service.hosts.insert(ip.to_string());
        service.ports.insert(port_id);
    }

    pub fn host(&self, ip: &str) -> Option<&Host> {
        self.hosts.get(ip)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn is_imported(&self, file_id: &str) -> bool {
        self.files_imported.iter().any(|f| f == file_id)
    }

    pub fn files_imported(&self) -> &[String] {
        &self.files_imported
    }

    pub fn files_failed(&self) -> &[String] {
        &self.files_failed
    }

    pub fn skipped_hosts(&self) -> usize {
        self.skipped_hosts
    }

    pub(crate) fn mark_imported(&mut self, file_id: &str) {
        self.files_failed.retain(|f| f != file_id);
        if !self.is_imported(file_id) {
            self.files_imported.push(file_id.to_string());
        }
    }

    pub fn is_source_imported(&self, source: &Path) -> bool {
        self.sources.contains(source)
    }

    pub(crate) fn mark_source(&mut self, source: PathBuf) {
        self.sources.insert(source);
    }

    pub(crate) fn mark_failed(&mut self, file_id: &str) {
        if !self.files_failed.iter().any(|f| f == file_id) {
            self.files_failed.push(file_id.to_string());
        }
    }

    pub(crate) fn add_skipped_hosts(&mut self, count: usize) {
        self.skipped_hosts += count;
    }

    pub(crate) fn record_cmdline(&mut self, file_id: &str, args: &str) {
        self.cmdlines.push((file_id.to_string(), args.to_string()));
    }

    /// Command line of the first imported scan that recorded one
    pub fn nmap_cmdline(&self) -> Option<&str> {
        self.cmdlines.first().map(|(_, args)| args.as_str())
    }

    /// `(file, command line)` for every imported scan that recorded one
    pub fn nmap_cmdlines(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cmdlines.iter().map(|(file, args)| (file.as_str(), args.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    #[test]
    fn test_add_or_merge_host_is_get_or_create() {
        let mut registry = Registry::new();
        registry.add_or_merge_host("10.0.0.1").add_port(Protocol::Tcp, 80, "http");
        registry.add_or_merge_host("10.0.0.1").add_port(Protocol::Tcp, 22, "ssh");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.host("10.0.0.1").map(|h| h.ports.len()), Some(2));
    }

    #[test]
    fn test_add_service_unions_hosts_and_ports() {
        let mut registry = Registry::new();
        registry.add_service("http", "10.0.0.1", 80);
        registry.add_service("http", "10.0.0.2", 8080);
        registry.add_service("http", "10.0.0.1", 80);
        registry.add_service("", "10.0.0.3", 9999);

        let http = registry.service("http").unwrap();
        assert_eq!(http.hosts.len(), 2);
        assert_eq!(http.ports.iter().copied().collect::<Vec<_>>(), vec![80, 8080]);
        assert_eq!(registry.services().count(), 1);
    }

    #[test]
    fn test_failed_file_cleared_once_imported() {
        let mut registry = Registry::new();
        registry.mark_failed("a.xml");
        registry.mark_failed("a.xml");
        assert_eq!(registry.files_failed(), ["a.xml"]);

        registry.mark_imported("a.xml");
        registry.mark_imported("a.xml");
        assert!(registry.files_failed().is_empty());
        assert_eq!(registry.files_imported(), ["a.xml"]);
    }
}
