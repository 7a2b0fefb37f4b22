//! Utility helpers shared by the library and the binary

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

/// Sort key placing IPv4 hosts in numeric order.
///
/// Anything that is not a dotted quad (IPv6, garbage) sorts after every IPv4
/// address, in plain string order.
pub fn ip_sort_key(ip: &str) -> (u8, u32, &str) {
    match ip.parse::<Ipv4Addr>() {
        Ok(addr) => (0, u32::from(addr), ip),
        Err(_) => (1, 0, ip),
    }
}

static PORT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,5}$").unwrap());

/// Parse "80, 443,8080" into port numbers.
///
/// Tokens that are not a number in 0-65535 are dropped with a warning; the
/// remaining ports still apply.
pub fn parse_port_list(raw: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let port = if PORT_TOKEN.is_match(token) { token.parse::<u16>().ok() } else { None };
        match port {
            Some(port) => ports.push(port),
            None => log::warn!("Dropping invalid port filter entry: {}", token),
        }
    }
    ports
}

/// Split a comma separated list, dropping blank entries
pub fn parse_csv_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level
    pub fn init(level: log::LevelFilter) {
        env_logger::Builder::from_default_env()
            .filter_level(level)
            .format_timestamp_secs()
            .init();
    }

    pub fn log_import_complete(imported: usize, failed: usize, skipped_hosts: usize) {
        log::info!(
            "Import finished - {} file(s) imported, {} failed, {} host(s) skipped",
            imported,
            failed,
            skipped_hosts
        );
    }
}
