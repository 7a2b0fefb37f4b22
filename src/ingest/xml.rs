//! Pull parser turning one Nmap XML document into host and port facts

use crate::error::{NmapParseError, Result};
use crate::model::Protocol;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// An open port as reported by one scan file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPort {
    pub protocol: Protocol,
    pub port_id: u16,
    pub service: String,
}

/// A host as reported by one scan file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedHost {
    pub ip: String,
    pub hostname: Option<String>,
    pub alive: bool,
    pub ports: Vec<ScannedPort>,
}

/// Everything the merge step needs from one scan file
#[derive(Debug, Clone, Default)]
pub struct ScanDocument {
    /// `args` of the root element, the command line that produced the scan
    pub args: Option<String>,
    pub hosts: Vec<ScannedHost>,
    /// Hosts dropped because they carried no IPv4 or IPv6 address
    pub skipped_hosts: usize,
}

#[derive(Debug, Default)]
struct HostBuilder {
    ipv4: Option<String>,
    ipv6: Option<String>,
    hostname: Option<String>,
    state: Option<String>,
    ports: Vec<ScannedPort>,
}

#[derive(Debug, Default)]
struct PortBuilder {
    protocol: Option<String>,
    port_id: Option<String>,
    state: Option<String>,
    service: Option<String>,
}

/// Read and parse a scan file from disk
pub fn parse_scan_file(path: &Path) -> Result<ScanDocument> {
    let content = fs::read_to_string(path)?;
    parse_scan(&content, &path.display().to_string())
}

/// Parse an `nmaprun` (or exported `nmapparse`) document
pub fn parse_scan(content: &str, file_id: &str) -> Result<ScanDocument> {
    let mut parser = ScanParser::new(file_id);
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                parser.open(&e, depth)?;
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                parser.open(&e, depth)?;
                parser.close(e.name().as_ref());
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                parser.close(e.name().as_ref());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(NmapParseError::malformed(
                    file_id,
                    format!("{} at byte {}", e, reader.buffer_position()),
                ));
            }
        }
    }

    if !parser.root_seen {
        return Err(NmapParseError::malformed(file_id, "no root element"));
    }
    if depth != 0 {
        return Err(NmapParseError::malformed(file_id, "unexpected end of document"));
    }

    Ok(parser.doc)
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    let attribute = e.try_get_attribute(name).map_err(quick_xml::Error::from)?;
    match attribute {
        Some(a) => {
            let value = a.unescape_value().map_err(quick_xml::Error::from)?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

struct ScanParser<'f> {
    file_id: &'f str,
    doc: ScanDocument,
    host: Option<HostBuilder>,
    port: Option<PortBuilder>,
    root_seen: bool,
}

impl<'f> ScanParser<'f> {
    fn new(file_id: &'f str) -> Self {
        Self {
            file_id,
            doc: ScanDocument::default(),
            host: None,
            port: None,
            root_seen: false,
        }
    }

    fn open(&mut self, e: &BytesStart, depth: usize) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();

        if depth == 0 {
            self.root_seen = true;
            match name {
                b"nmaprun" | b"nmapparse" => self.doc.args = attr(e, "args")?,
                other => log::warn!(
                    "{}: unexpected root element <{}>, no hosts will be found",
                    self.file_id,
                    String::from_utf8_lossy(other)
                ),
            }
            return Ok(());
        }

        if name == b"host" {
            if self.host.is_none() {
                self.host = Some(HostBuilder::default());
            }
            return Ok(());
        }

        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };

        if let Some(port) = self.port.as_mut() {
            match name {
                b"state" => port.state = attr(e, "state")?,
                b"service" => port.service = attr(e, "name")?,
                _ => {}
            }
            return Ok(());
        }

        match name {
            b"address" => {
                let addr = attr(e, "addr")?;
                match attr(e, "addrtype")?.as_deref() {
                    Some("ipv4") => host.ipv4 = addr,
                    Some("ipv6") => host.ipv6 = addr,
                    _ => {}
                }
            }
            b"hostname" if host.hostname.is_none() => {
                let kind = attr(e, "type")?;
                if matches!(kind.as_deref(), None | Some("PTR")) {
                    host.hostname = attr(e, "name")?.filter(|n| !n.is_empty());
                }
            }
            b"status" => host.state = attr(e, "state")?,
            b"port" => {
                self.port = Some(PortBuilder {
                    protocol: attr(e, "protocol")?,
                    port_id: attr(e, "portid")?,
                    ..PortBuilder::default()
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"port" => {
                if let Some(port) = self.port.take() {
                    self.finish_port(port);
                }
            }
            b"host" if self.port.is_none() => {
                if let Some(host) = self.host.take() {
                    self.finish_host(host);
                }
            }
            _ => {}
        }
    }

    fn finish_port(&mut self, port: PortBuilder) {
        if port.state.as_deref() != Some("open") {
            return;
        }
        let Some(host) = self.host.as_mut() else {
            return;
        };

        let protocol = match port.protocol.as_deref().map(str::parse::<Protocol>) {
            Some(Ok(protocol)) => protocol,
            _ => {
                log::debug!("{}: skipping port with protocol {:?}", self.file_id, port.protocol);
                return;
            }
        };
        let port_id = match port.port_id.as_deref().map(str::parse::<u16>) {
            Some(Ok(port_id)) => port_id,
            _ => {
                log::debug!("{}: skipping port with id {:?}", self.file_id, port.port_id);
                return;
            }
        };

        host.ports.push(ScannedPort {
            protocol,
            port_id,
            service: port.service.unwrap_or_default(),
        });
    }

    fn finish_host(&mut self, host: HostBuilder) {
        // IPv6 wins when a host carries both address families
        let ip = match host.ipv6.or(host.ipv4) {
            Some(ip) => ip,
            None => {
                log::warn!("{}: skipping host without an IPv4 or IPv6 address", self.file_id);
                self.doc.skipped_hosts += 1;
                return;
            }
        };

        self.doc.hosts.push(ScannedHost {
            ip,
            hostname: host.hostname,
            alive: host.state.as_deref() == Some("up"),
            ports: host.ports,
        });
    }
}
