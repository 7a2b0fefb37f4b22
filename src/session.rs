//! The session object tying ingestion, queries and export together

use crate::config::ParserConfig;
use crate::error::Result;
use crate::ingest::{ImportResult, XmlIngester};
use crate::model::AliveMerge;
use crate::output::{self, OutputFormat};
use crate::registry::Registry;
use crate::views::{ImportSummary, QueryViews};
use std::path::Path;

/// Owns one registry and the ingester that feeds it.
///
/// Only [`Session::ingest`] needs `&mut self`; every query hands out
/// snapshots borrowing the registry, so readers can run in parallel once
/// ingestion is done.
#[derive(Debug, Clone, Default)]
pub struct Session {
    registry: Registry,
    ingester: XmlIngester,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alive_merge(alive_merge: AliveMerge) -> Self {
        Self {
            registry: Registry::new(),
            ingester: XmlIngester::new(alive_merge),
        }
    }

    pub fn with_config(config: &ParserConfig) -> Self {
        Self::with_alive_merge(config.alive_merge)
    }

    /// Import files and directories into the session
    pub fn ingest<P: AsRef<Path>>(&mut self, paths: &[P], recurse: bool) -> Result<ImportResult> {
        self.ingester.ingest(&mut self.registry, paths, recurse)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn views(&self) -> QueryViews<'_> {
        QueryViews::new(&self.registry)
    }

    pub fn import_summary(&self) -> ImportSummary {
        self.views().import_summary()
    }

    pub fn nmap_cmdline(&self) -> Option<&str> {
        self.registry.nmap_cmdline()
    }

    pub fn export_combined(&self, path: &Path) -> Result<()> {
        output::export_combined(&self.registry, path)
    }

    pub fn export(&self, path: &Path, format: OutputFormat) -> Result<()> {
        output::export(&self.registry, path, format)
    }
}
