//! External tools an export delegates to.
//!
//! - [`DumpDelegate`]: appends a schema's logical row content to its file
//! - [`Compressor`]: replaces a finished file with a compressed equivalent
//!
//! Production implementations spawn `mysqldump` and `gzip`. Both are opaque
//! subprocesses: a non-zero exit status is the only failure signal.

use super::script::ImportEncoding;
use crate::Result;
use crate::config::{ConnectionConfig, ExportOptions};
use crate::error::ExportError;
use crate::security::Credentials;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Longest stderr excerpt carried in an error.
const STDERR_EXCERPT_CHARS: usize = 512;

/// Appends the logical content of one schema to an open file.
#[async_trait]
pub trait DumpDelegate: Send + Sync {
    /// Streams `schema`'s content into `file`, positioned after the header.
    ///
    /// # Errors
    /// Returns `DumpDelegateFailed` if the content could not be produced.
    async fn append_schema_content(&self, schema: &str, file: std::fs::File) -> Result<()>;
}

/// Compresses a finished artifact in place.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Replaces `path` with its compressed equivalent and returns the new path.
    ///
    /// # Errors
    /// Returns `CompressionFailed` if the tool fails or leaves no output.
    async fn compress(&self, path: &Path) -> Result<PathBuf>;

    /// How the import script reads files this compressor produced.
    fn encoding(&self) -> ImportEncoding;
}

/// Row-content delegate spawning `mysqldump` against the live server.
///
/// # Security
/// The password is handed over in the `MYSQL_PWD` environment variable of
/// the child, never on its command line.
pub struct MysqldumpDelegate {
    program: String,
    extra_args: Vec<String>,
    host: String,
    port: u16,
    credentials: Credentials,
}

impl std::fmt::Debug for MysqldumpDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqldumpDelegate")
            .field("program", &self.program)
            .field("extra_args", &self.extra_args)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl MysqldumpDelegate {
    /// Creates a delegate dumping from the configured server.
    pub fn new(connection: &ConnectionConfig, credentials: Credentials, options: &ExportOptions) -> Self {
        Self {
            program: options.dump_program.clone(),
            extra_args: options.dump_args.clone(),
            host: connection.host.clone(),
            port: connection.port,
            credentials,
        }
    }

    fn command(&self, schema: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--skip-extended-insert")
            .args(&self.extra_args)
            .arg("--host")
            .arg(&self.host)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--user")
            .arg(self.credentials.username())
            .arg(schema)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(password) = self.credentials.password() {
            command.env("MYSQL_PWD", password);
        }
        command
    }
}

#[async_trait]
impl DumpDelegate for MysqldumpDelegate {
    async fn append_schema_content(&self, schema: &str, file: std::fs::File) -> Result<()> {
        tracing::debug!("Running {} for schema {}", self.program, schema);

        // spawn rather than output(): output() would replace the stdout redirect
        let child = self
            .command(schema)
            .stdout(Stdio::from(file))
            .spawn()
            .map_err(|e| {
                ExportError::dump_failed(schema, format!("failed to execute {}: {}", self.program, e))
            })?;
        let output = child.wait_with_output().await.map_err(|e| {
            ExportError::dump_failed(schema, format!("failed waiting for {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            return Err(ExportError::dump_failed(
                schema,
                format!("{} exited with {}: {}", self.program, output.status, stderr_excerpt(&output.stderr)),
            ));
        }
        Ok(())
    }
}

/// Compressor spawning `gzip -f`, which replaces `<file>` with `<file>.gz`.
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    program: String,
}

impl GzipCompressor {
    /// Creates a compressor running `program` (normally `gzip`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new("gzip")
    }
}

#[async_trait]
impl Compressor for GzipCompressor {
    async fn compress(&self, path: &Path) -> Result<PathBuf> {
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExportError::compression_failed(path, format!("failed to execute {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(ExportError::compression_failed(
                path,
                format!("{} exited with {}: {}", self.program, output.status, stderr_excerpt(&output.stderr)),
            ));
        }

        let mut compressed = path.as_os_str().to_owned();
        compressed.push(".gz");
        let compressed = PathBuf::from(compressed);
        if !tokio::fs::try_exists(&compressed).await.unwrap_or(false) {
            return Err(ExportError::compression_failed(
                path,
                format!("{} reported success but {} is missing", self.program, compressed.display()),
            ));
        }
        Ok(compressed)
    }

    fn encoding(&self) -> ImportEncoding {
        ImportEncoding::gzip()
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "no error output".to_string();
    }
    trimmed.chars().take(STDERR_EXCERPT_CHARS).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    fn delegate(program: &str) -> MysqldumpDelegate {
        let options = ExportOptions {
            dump_program: program.to_string(),
            ..Default::default()
        };
        MysqldumpDelegate::new(
            &ConnectionConfig::new("db.internal".to_string()),
            Credentials::new("root".to_string(), Some("dump_secret".to_string())),
            &options,
        )
    }

    #[test]
    fn test_mysqldump_command_keeps_password_off_argv() {
        let command = delegate("mysqldump").command("s1");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args.first().map(String::as_str), Some("--skip-extended-insert"));
        assert_eq!(args.last().map(String::as_str), Some("s1"));
        assert!(args.iter().all(|a| !a.contains("dump_secret")));

        let env: Vec<_> = command.as_std().get_envs().collect();
        assert!(env.iter().any(|(k, v)| *k == "MYSQL_PWD" && v.is_some()));
    }

    #[test]
    fn test_mysqldump_debug_hides_password() {
        assert!(!format!("{:?}", delegate("mysqldump")).contains("dump_secret"));
    }

    #[tokio::test]
    async fn test_dump_appends_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.sql");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"USE `s1`;\n").unwrap();

        // `echo` stands in for mysqldump and prints its arguments
        delegate("echo").append_schema_content("s1", file).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("USE `s1`;\n--skip-extended-insert"));
        assert!(content.trim_end().ends_with("s1"));
    }

    #[tokio::test]
    async fn test_dump_failure_is_dump_delegate_failed() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("s1.sql")).unwrap();

        let error = delegate("false").append_schema_content("s1", file).await.unwrap_err();
        assert!(matches!(error, ExportError::DumpDelegateFailed { ref schema, .. } if schema == "s1"));
    }

    #[tokio::test]
    async fn test_dump_missing_program_is_dump_delegate_failed() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("s1.sql")).unwrap();

        let error = delegate("/nonexistent/mysqldump")
            .append_schema_content("s1", file)
            .await
            .unwrap_err();
        assert!(matches!(error, ExportError::DumpDelegateFailed { .. }));
    }

    #[tokio::test]
    async fn test_compression_failure_is_compression_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.sql");
        std::fs::write(&path, "USE `s1`;\n").unwrap();

        let error = GzipCompressor::new("false").compress(&path).await.unwrap_err();
        assert!(matches!(error, ExportError::CompressionFailed { .. }));
    }

    #[tokio::test]
    async fn test_compression_without_output_is_compression_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.sql");
        std::fs::write(&path, "USE `s1`;\n").unwrap();

        // `true` exits 0 but produces nothing
        let error = GzipCompressor::new("true").compress(&path).await.unwrap_err();
        match error {
            ExportError::CompressionFailed { detail, .. } => assert!(detail.contains("missing")),
            other => panic!("expected CompressionFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_stderr_excerpt() {
        assert_eq!(stderr_excerpt(b""), "no error output");
        assert_eq!(stderr_excerpt(b"  access denied\n"), "access denied");
        assert_eq!(stderr_excerpt(&[b'x'; 2000]).len(), STDERR_EXCERPT_CHARS);
    }
}
