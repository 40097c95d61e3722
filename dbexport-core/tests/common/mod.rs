//! In-memory catalog and recording delegates for pipeline tests.

#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use dbexport_core::artifacts::ImportEncoding;
use dbexport_core::catalog::{CredentialLayout, CredentialRow, GrantRow, SchemaRow};
use dbexport_core::{CatalogSource, Compressor, DumpDelegate, ExportError, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Catalog served from fixed rows, using the legacy `Password` layout
/// unless columns are overridden.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub schemata: Vec<SchemaRow>,
    pub grants: Vec<GrantRow>,
    pub columns: Vec<String>,
    pub credentials: Vec<CredentialRow>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            columns: vec!["Password".to_string()],
            ..Default::default()
        }
    }

    pub fn schema(mut self, name: &str) -> Self {
        self.schemata.push(SchemaRow {
            name: name.to_string(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_general_ci".to_string(),
        });
        self
    }

    pub fn grant(mut self, schema: &str, username: &str, host: &str) -> Self {
        self.grants.push(GrantRow {
            schema: schema.to_string(),
            username: username.to_string(),
            host: host.to_string(),
        });
        self
    }

    pub fn user(mut self, username: &str, host: &str, password: &str) -> Self {
        self.credentials.push(CredentialRow {
            username: username.to_string(),
            host: host.to_string(),
            password: Some(password.to_string()),
            ..Default::default()
        });
        self
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn schemata(&self) -> Result<Vec<SchemaRow>> {
        Ok(self.schemata.clone())
    }

    async fn schema_grants(&self) -> Result<Vec<GrantRow>> {
        Ok(self.grants.clone())
    }

    async fn credential_columns(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn credential_rows(&self, _layout: CredentialLayout) -> Result<Vec<CredentialRow>> {
        Ok(self.credentials.clone())
    }
}

/// Dump delegate that appends a marker line and records each schema.
#[derive(Debug, Default)]
pub struct RecordingDump {
    pub calls: Mutex<Vec<String>>,
    pub fail_on: BTreeSet<String>,
}

impl RecordingDump {
    pub fn failing_on(schema: &str) -> Self {
        Self {
            fail_on: BTreeSet::from([schema.to_string()]),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DumpDelegate for RecordingDump {
    async fn append_schema_content(&self, schema: &str, mut file: std::fs::File) -> Result<()> {
        self.calls.lock().unwrap().push(schema.to_string());
        if self.fail_on.contains(schema) {
            return Err(ExportError::dump_failed(schema, "access denied"));
        }
        writeln!(file, "-- rows of {schema}").unwrap();
        Ok(())
    }
}

/// Compressor that renames `<file>` to `<file>.gz` without compressing.
#[derive(Debug, Default)]
pub struct RenamingCompressor {
    pub fail: bool,
}

#[async_trait]
impl Compressor for RenamingCompressor {
    async fn compress(&self, path: &Path) -> Result<PathBuf> {
        if self.fail {
            return Err(ExportError::compression_failed(path, "disk full"));
        }
        let mut target = path.as_os_str().to_owned();
        target.push(".gz");
        let target = PathBuf::from(target);
        std::fs::rename(path, &target).unwrap();
        Ok(target)
    }

    fn encoding(&self) -> ImportEncoding {
        ImportEncoding::gzip()
    }
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
