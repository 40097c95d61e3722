//! Core library for dbexport.
//!
//! Reads schema, grant and credential metadata from a live MySQL or MariaDB
//! catalog, reconciles it into an [`ExportPlan`], and writes a set of
//! re-importable artifacts:
//!
//! - `00users.sql`: drop/create statements for every granted principal
//! - `<schema>.sql.gz`: schema DDL, grants, and delegated row content
//! - `import.sh`: applies the users script first, then every schema
//!
//! # Security Guarantees
//! - All catalog queries are read-only
//! - The administrative password is zeroized on drop, never logged, and
//!   reaches `mysqldump` through its environment rather than its arguments
//! - Errors never carry credential secrets; connection URLs are redacted
//!
//! # Architecture
//! - Catalog access goes through the [`CatalogSource`] capability
//! - External tools sit behind the [`DumpDelegate`] and [`Compressor`] traits
//! - [`ExportOrchestrator`] sequences a run and owns cancellation

pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod credential;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod plan;
pub mod security;

// Re-export commonly used types
pub use artifacts::{ArtifactWriter, Compressor, DumpDelegate, GzipCompressor, MysqldumpDelegate};
#[cfg(feature = "mysql")]
pub use catalog::MySqlCatalog;
pub use catalog::{CatalogSource, CredentialLayout, MetadataReader};
pub use config::{ConnectionConfig, ExportOptions};
pub use credential::{ClassificationError, classify};
pub use error::{ExportError, Result};
pub use models::{AuthScheme, Credential, Principal, Schema};
pub use orchestrator::{ExportOrchestrator, ExportState, ExportSummary};
pub use plan::ExportPlan;
pub use security::Credentials;
