//! Scan file ingestion
//!
//! Expands the caller's paths into scan files, parses each one in turn and
//! merges the result into a [`Registry`]. A broken file never aborts the batch.

pub mod xml;

use crate::error::{NmapParseError, Result};
use crate::model::AliveMerge;
use crate::registry::Registry;
use crate::utils::Logger;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use xml::{parse_scan, parse_scan_file, ScanDocument, ScannedHost, ScannedPort};

/// Outcome of one `ingest` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub imported: Vec<String>,
    pub failed: Vec<String>,
    /// Files skipped because an earlier call already imported them
    pub already_imported: Vec<String>,
    pub skipped_hosts: usize,
}

/// Parses scan files and merges them into a registry
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlIngester {
    alive_merge: AliveMerge,
}

impl XmlIngester {
    pub fn new(alive_merge: AliveMerge) -> Self {
        Self { alive_merge }
    }

    pub fn alive_merge(&self) -> AliveMerge {
        self.alive_merge
    }

    /// Expand files and directories into the list of scan files to parse.
    ///
    /// Directories contribute their `*.xml` files, descending into
    /// subdirectories only when `recurse` is set. Fails on the first path
    /// that is neither a file nor a directory.
    pub fn collect_files<P: AsRef<Path>>(paths: &[P], recurse: bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                let max_depth = if recurse { usize::MAX } else { 1 };
                let walker = WalkDir::new(path)
                    .min_depth(1)
                    .max_depth(max_depth)
                    .follow_links(true)
                    .sort_by_file_name();

                for entry in walker {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            log::warn!("Skipping {:?}: {}", err.path(), err);
                            continue;
                        }
                    };
                    let is_xml = entry.file_name().to_string_lossy().ends_with(".xml");
                    if entry.file_type().is_file() && is_xml {
                        files.push(entry.into_path());
                    }
                }
            } else {
                return Err(NmapParseError::PathNotFound(path.to_path_buf()));
            }
        }

        Ok(files)
    }

    /// Import every scan file found under `paths` into `registry`.
    ///
    /// Only a missing path is reported as an error, and it is reported before
    /// any file is touched. Parse failures land in `ImportResult::failed`.
    pub fn ingest<P: AsRef<Path>>(
        &self,
        registry: &mut Registry,
        paths: &[P],
        recurse: bool,
    ) -> Result<ImportResult> {
        let files = Self::collect_files(paths, recurse)?;
        let mut result = ImportResult::default();

        for file in files {
            let file_id = file.display().to_string();
            let source = fs::canonicalize(&file).unwrap_or_else(|_| file.clone());

            if registry.is_imported(&file_id) || registry.is_source_imported(&source) {
                log::info!("{} has already been imported, skipping", file_id);
                if !result.already_imported.contains(&file_id) {
                    result.already_imported.push(file_id);
                }
                continue;
            }

            match parse_scan_file(&file) {
                Ok(doc) => {
                    log::info!("Imported {} ({} hosts)", file_id, doc.hosts.len());
                    result.skipped_hosts += doc.skipped_hosts;
                    self.merge_document(registry, &file_id, doc);
                    registry.mark_source(source);
                    result.imported.push(file_id);
                }
                Err(err) => {
                    log::warn!("Failed to import {}: {}", file_id, err);
                    registry.mark_failed(&file_id);
                    if !result.failed.contains(&file_id) {
                        result.failed.push(file_id);
                    }
                }
            }
        }

        Logger::log_import_complete(result.imported.len(), result.failed.len(), result.skipped_hosts);
        Ok(result)
    }

    /// Merge one parsed document into the registry under `file_id`
    pub fn merge_document(&self, registry: &mut Registry, file_id: &str, doc: ScanDocument) {
        if let Some(args) = doc.args.as_deref() {
            registry.record_cmdline(file_id, args);
        }
        registry.add_skipped_hosts(doc.skipped_hosts);

        for scanned in doc.hosts {
            let host = registry.add_or_merge_host(&scanned.ip);
            host.merge_alive(scanned.alive, self.alive_merge);
            if let Some(name) = scanned.hostname.as_deref() {
                host.promote_hostname(name);
            }
            host.record_file(file_id);
            for port in &scanned.ports {
                host.add_port(port.protocol, port.port_id, &port.service);
            }

            for port in &scanned.ports {
                registry.add_service(&port.service, &scanned.ip, port.port_id);
            }
        }

        registry.mark_imported(file_id);
    }
}
