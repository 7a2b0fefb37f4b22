//! Export of the merged registry
//!
//! The `nmapparse` XML format mirrors the subset of `nmaprun` that the
//! ingester reads, so an exported file can be imported again later.

use crate::error::{NmapParseError, Result};
use crate::model::Host;
use crate::registry::Registry;
use crate::utils::ip_sort_key;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    NmapParseXml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" | "nmapparse" => Ok(OutputFormat::NmapParseXml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// JSON-serializable snapshot of the registry
#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    generated: String,
    files_imported: &'a [String],
    hosts: Vec<&'a Host>,
}

fn sorted_hosts(registry: &Registry) -> Vec<&Host> {
    let mut hosts: Vec<&Host> = registry.hosts().collect();
    hosts.sort_by(|a, b| ip_sort_key(&a.ip).cmp(&ip_sort_key(&b.ip)));
    hosts
}

fn addr_type(ip: &str) -> &'static str {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => "ipv6",
        _ => "ipv4",
    }
}

/// Write the whole, unfiltered registry to `path` in `format`
pub fn export(registry: &Registry, path: &Path, format: OutputFormat) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    match format {
        OutputFormat::NmapParseXml => write_nmapparse_xml(registry, &mut out)?,
        OutputFormat::Json => serde_json::to_writer_pretty(&mut out, &json_export(registry))?,
    }
    out.flush()?;
    log::info!("Exported {} hosts to {}", registry.len(), path.display());
    Ok(())
}

/// Write the combined `nmapparse` XML file
pub fn export_combined(registry: &Registry, path: &Path) -> Result<()> {
    export(registry, path, OutputFormat::NmapParseXml)
}

fn json_export(registry: &Registry) -> JsonExport<'_> {
    JsonExport {
        generated: chrono::Utc::now().to_rfc3339(),
        files_imported: registry.files_imported(),
        hosts: sorted_hosts(registry),
    }
}

pub fn to_json_string(registry: &Registry) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json_export(registry))?)
}

pub fn to_nmapparse_xml(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    write_nmapparse_xml(registry, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| NmapParseError::malformed("export", e.to_string()))
}

/// Serialize the registry as `nmapparse` XML into `out`
pub fn write_nmapparse_xml<W: Write>(registry: &Registry, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let now = chrono::Utc::now();
    let start = now.timestamp().to_string();
    let start_str = now.format("%a %b %d %H:%M:%S %Y").to_string();
    let mut root = BytesStart::new("nmapparse");
    root.push_attribute(("scanner", "nmapparse"));
    root.push_attribute(("version", env!("CARGO_PKG_VERSION")));
    root.push_attribute(("start", start.as_str()));
    root.push_attribute(("startstr", start_str.as_str()));
    writer.write_event(Event::Start(root))?;

    for host in sorted_hosts(registry) {
        write_host(&mut writer, host)?;
    }

    writer.write_event(Event::End(BytesEnd::new("nmapparse")))?;
    Ok(())
}

fn write_host<W: Write>(writer: &mut Writer<W>, host: &Host) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("host")))?;

    let mut status = BytesStart::new("status");
    status.push_attribute(("state", host.state()));
    writer.write_event(Event::Empty(status))?;

    let mut address = BytesStart::new("address");
    address.push_attribute(("addr", host.ip.as_str()));
    address.push_attribute(("addrtype", addr_type(&host.ip)));
    writer.write_event(Event::Empty(address))?;

    // The ip doubles as the hostname placeholder, so only real names are written
    if host.has_hostname() {
        writer.write_event(Event::Start(BytesStart::new("hostnames")))?;
        let mut hostname = BytesStart::new("hostname");
        hostname.push_attribute(("name", host.hostname.as_str()));
        hostname.push_attribute(("type", "PTR"));
        writer.write_event(Event::Empty(hostname))?;
        writer.write_event(Event::End(BytesEnd::new("hostnames")))?;
    }

    writer.write_event(Event::Start(BytesStart::new("ports")))?;
    for port in &host.ports {
        let port_id = port.port_id.to_string();
        let mut element = BytesStart::new("port");
        element.push_attribute(("protocol", port.protocol.as_str()));
        element.push_attribute(("portid", port_id.as_str()));
        writer.write_event(Event::Start(element))?;

        let mut state = BytesStart::new("state");
        state.push_attribute(("state", "open"));
        writer.write_event(Event::Empty(state))?;

        if !port.service.is_empty() {
            let mut service = BytesStart::new("service");
            service.push_attribute(("name", port.service.as_str()));
            writer.write_event(Event::Empty(service))?;
        }

        writer.write_event(Event::End(BytesEnd::new("port")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("ports")))?;

    writer.write_event(Event::End(BytesEnd::new("host")))?;
    Ok(())
}
