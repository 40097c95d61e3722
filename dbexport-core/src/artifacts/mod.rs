//! Artifact generation.
//!
//! # Module Structure
//! - `sql`: user script and schema header rendering
//! - `script`: artifact file names and the import orchestration script
//! - `delegate`: row-dump and compression subprocesses
//!
//! [`ArtifactWriter`] ties them to one pre-existing output directory. Files
//! are always created with truncate semantics; nothing assumes a clean
//! directory.

pub mod delegate;
pub mod script;
pub mod sql;

use crate::Result;
use crate::error::ExportError;
use crate::models::Schema;
use crate::plan::ExportPlan;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub use delegate::{Compressor, DumpDelegate, GzipCompressor, MysqldumpDelegate};
pub use script::{IMPORT_SCRIPT_FILE, ImportEncoding, USERS_FILE, schema_file_name};

/// Writes export artifacts into one output directory.
pub struct ArtifactWriter {
    output_dir: PathBuf,
    dump: Option<Arc<dyn DumpDelegate>>,
    compressor: Option<Arc<dyn Compressor>>,
    client_args: String,
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("output_dir", &self.output_dir)
            .field("dump_content", &self.dump.is_some())
            .field("compress", &self.compressor.is_some())
            .finish_non_exhaustive()
    }
}

impl ArtifactWriter {
    /// Creates a writer for an existing directory.
    ///
    /// Without a dump delegate schema files carry only their header; without
    /// a compressor they stay as plain `.sql`.
    ///
    /// # Errors
    /// Returns `OutputDirectoryMissing` if `output_dir` is not a directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        if !output_dir.is_dir() {
            return Err(ExportError::OutputDirectoryMissing { path: output_dir });
        }
        Ok(Self {
            output_dir,
            dump: None,
            compressor: None,
            client_args: "-u root".to_string(),
        })
    }

    /// Builder method to append row content through a dump delegate.
    pub fn with_dump_delegate(mut self, dump: Arc<dyn DumpDelegate>) -> Self {
        self.dump = Some(dump);
        self
    }

    /// Builder method to compress schema files after rendering.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Builder method to set the client arguments used by the import script.
    pub fn with_client_args(mut self, client_args: impl Into<String>) -> Self {
        self.client_args = client_args.into();
        self
    }

    /// The directory artifacts are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `00users.sql` for every principal in the plan.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be written.
    pub async fn write_users(&self, plan: &ExportPlan) -> Result<PathBuf> {
        let path = self.output_dir.join(USERS_FILE);
        tracing::info!("Generating user creation script {}", USERS_FILE);

        let users = sql::render_users(plan);
        tokio::fs::write(&path, users)
            .await
            .map_err(|e| ExportError::io(format!("Failed to write {}", path.display()), e))?;
        Ok(path)
    }

    /// Writes one schema's dump-request file and compresses it.
    ///
    /// # Errors
    /// Returns `DumpDelegateFailed` or `CompressionFailed` when a delegated
    /// tool fails, or an I/O error if the header cannot be written.
    pub async fn write_schema(&self, schema: &Schema) -> Result<PathBuf> {
        let path = self.output_dir.join(schema_file_name(&schema.name));
        tracing::info!("Exporting schema {} to {}", schema.name, path.display());

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ExportError::io(format!("Failed to create {}", path.display()), e))?;
        file.write_all(sql::render_schema_header(schema).as_bytes())
            .await
            .map_err(|e| ExportError::io(format!("Failed to write {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| ExportError::io(format!("Failed to flush {}", path.display()), e))?;

        match &self.dump {
            Some(dump) => {
                let file = file.into_std().await;
                dump.append_schema_content(&schema.name, file).await?;
            }
            None => tracing::debug!("Content export suppressed for {}", schema.name),
        }

        match &self.compressor {
            Some(compressor) => {
                tracing::info!("Compressing {}", path.display());
                compressor.compress(&path).await
            }
            None => Ok(path),
        }
    }

    /// Writes the executable `import.sh`.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be written.
    pub async fn write_import_script(&self, plan: &ExportPlan) -> Result<PathBuf> {
        let path = self.output_dir.join(IMPORT_SCRIPT_FILE);
        tracing::info!("Generating import script {}", IMPORT_SCRIPT_FILE);

        let script = script::render_import_script(plan, &self.client_args, &self.encoding());
        tokio::fs::write(&path, script)
            .await
            .map_err(|e| ExportError::io(format!("Failed to write {}", path.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| {
                    ExportError::io(format!("Failed to mark {} executable", path.display()), e)
                })?;
        }

        Ok(path)
    }

    /// How schema files end up on disk.
    pub fn encoding(&self) -> ImportEncoding {
        self.compressor
            .as_ref()
            .map_or(ImportEncoding::Plain, |compressor| compressor.encoding())
    }

    /// Logs schemas whose file names differ only by letter case.
    ///
    /// Such files overwrite each other on case-insensitive filesystems.
    pub fn warn_on_case_collisions(&self, plan: &ExportPlan) {
        let mut seen = std::collections::BTreeMap::new();
        for schema in plan.schemas() {
            let folded = schema_file_name(&schema.name).to_ascii_lowercase();
            if let Some(previous) = seen.insert(folded, schema.name.clone()) {
                tracing::warn!(
                    "Schemas {} and {} map to file names that differ only by case",
                    previous,
                    schema.name
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthScheme, Credential, Principal};
    use std::collections::{BTreeMap, BTreeSet};

    fn plan() -> ExportPlan {
        let alice = Principal::new("alice", "%");
        let schemas = BTreeMap::from([(
            "s1".to_string(),
            Schema::new("s1", "utf8mb4", "utf8mb4_general_ci"),
        )]);
        let grants = BTreeMap::from([("s1".to_string(), BTreeSet::from([alice.clone()]))]);
        let credentials = BTreeMap::from([(
            alice,
            Credential::new("*ABC123", AuthScheme::MysqlNativePassword),
        )]);
        ExportPlan::build(schemas, grants, credentials).unwrap()
    }

    #[test]
    fn test_writer_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            ArtifactWriter::new(&missing),
            Err(ExportError::OutputDirectoryMissing { path }) if path == missing
        ));
    }

    #[tokio::test]
    async fn test_write_schema_without_delegates_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let plan = plan();

        let path = writer.write_schema(plan.schema("s1").unwrap()).await.unwrap();
        assert_eq!(path, dir.path().join("s1.sql"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, sql::render_schema_header(plan.schema("s1").unwrap()));
    }

    #[tokio::test]
    async fn test_write_schema_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s1.sql"), "stale content that is much longer than the header\n".repeat(10)).unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let plan = plan();

        writer.write_schema(plan.schema("s1").unwrap()).await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("s1.sql")).unwrap();
        assert!(!content.contains("stale"));
    }

    #[tokio::test]
    async fn test_write_users_and_import_script() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap().with_client_args("-u admin");
        let plan = plan();

        let users = writer.write_users(&plan).await.unwrap();
        let content = std::fs::read_to_string(users).unwrap();
        assert!(content.starts_with("DROP USER IF EXISTS 'alice'@'%';\n"));

        let import = writer.write_import_script(&plan).await.unwrap();
        let script = std::fs::read_to_string(&import).unwrap();
        assert!(script.contains("MYSQL_ARGS='-u admin'"));
        assert!(script.contains("mysql $MYSQL_ARGS < 's1.sql'"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&import).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
