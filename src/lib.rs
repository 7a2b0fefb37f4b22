//! nmapparse - merge and query Nmap XML scan results
//!
//! Scan files are folded into one registry of hosts and services, which can
//! then be sliced with filters and exported as a single combined file.

pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod model;
pub mod output;
pub mod registry;
pub mod session;
pub mod utils;
pub mod views;

// Re-export commonly used types
pub use config::ParserConfig;
pub use error::{NmapParseError, Result};
pub use filter::{Filters, HostFilter};
pub use ingest::{ImportResult, XmlIngester};
pub use model::{AliveMerge, Host, Port, PortScope, Protocol, Service};
pub use output::OutputFormat;
pub use registry::Registry;
pub use session::Session;
pub use views::{HostView, ImportSummary, QueryViews, ServiceView};
