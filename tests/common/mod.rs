#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Minimal host entry for building scan fixtures
pub struct FixtureHost<'a> {
    pub ip: &'a str,
    pub up: bool,
    pub hostname: Option<&'a str>,
    pub ports: &'a [(&'a str, u16, &'a str)],
}

pub fn host<'a>(ip: &'a str, up: bool, ports: &'a [(&'a str, u16, &'a str)]) -> FixtureHost<'a> {
    FixtureHost { ip, up, hostname: None, ports }
}

pub fn scan_xml(args: &str, hosts: &[FixtureHost]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<nmaprun scanner=\"nmap\" args=\"{}\">\n",
        args
    );
    for host in hosts {
        let addrtype = if host.ip.contains(':') { "ipv6" } else { "ipv4" };
        xml.push_str("  <host>\n");
        xml.push_str(&format!(
            "    <status state=\"{}\"/>\n    <address addr=\"{}\" addrtype=\"{}\"/>\n",
            if host.up { "up" } else { "down" },
            host.ip,
            addrtype
        ));
        if let Some(name) = host.hostname {
            xml.push_str(&format!(
                "    <hostnames><hostname name=\"{}\" type=\"PTR\"/></hostnames>\n",
                name
            ));
        }
        xml.push_str("    <ports>\n");
        for (protocol, port_id, service) in host.ports {
            xml.push_str(&format!(
                "      <port protocol=\"{}\" portid=\"{}\"><state state=\"open\"/><service name=\"{}\"/></port>\n",
                protocol, port_id, service
            ));
        }
        xml.push_str("    </ports>\n  </host>\n");
    }
    xml.push_str("</nmaprun>\n");
    xml
}

pub fn write_scan(dir: &Path, name: &str, args: &str, hosts: &[FixtureHost]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, scan_xml(args, hosts)).expect("Failed to write scan fixture");
    path
}
