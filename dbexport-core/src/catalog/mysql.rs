//! Live MySQL/MariaDB catalog source.
//!
//! # Security Features
//! - Read-only session enforced on connect
//! - Statement timeout applied to every catalog query
//! - Connection strings are redacted in error messages and logs
//! - A single pooled connection, reused for every read of the run

use super::{CatalogSource, CredentialLayout, CredentialRow, GrantRow, SchemaRow};
use crate::Result;
use crate::config::ConnectionConfig;
use crate::error::{ExportError, redact_database_url};
use crate::security::Credentials;
use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

/// Catalog source backed by a live MySQL-compatible server.
pub struct MySqlCatalog {
    pool: MySqlPool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for MySqlCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlCatalog")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl MySqlCatalog {
    /// Creates a catalog source for the configured server.
    ///
    /// The connection is established lazily; call [`MySqlCatalog::verify`]
    /// to check reachability before reading metadata.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the pool cannot be
    /// created.
    pub fn connect(config: ConnectionConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;
        let url = config.connection_url(credentials)?;
        let pool = create_catalog_pool(&url, &config)?;

        tracing::debug!("Created catalog pool for {}", redact_database_url(&url));
        Ok(Self { pool, config })
    }

    /// Checks that the server answers and the catalog tables are readable.
    ///
    /// # Errors
    /// Returns `MetadataUnavailable` if the server is unreachable or the
    /// account cannot read `mysql.user`.
    pub async fn verify(&self) -> Result<()> {
        let connectivity: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ExportError::metadata_unavailable("Database connection failed", e))?;
        if connectivity != 1 {
            return Err(ExportError::catalog_shape(
                "Basic connectivity test returned an unexpected result",
            ));
        }

        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mysql.user")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                ExportError::metadata_unavailable("Cannot read mysql.user (insufficient privileges?)", e)
            })?;

        let version: String = sqlx::query_scalar("SELECT VERSION()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ExportError::metadata_unavailable("Failed to get server version", e))?;
        tracing::info!(
            "Connected to {}:{} (server version {})",
            self.config.host,
            self.config.port,
            version
        );
        Ok(())
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatalogSource for MySqlCatalog {
    async fn schemata(&self) -> Result<Vec<SchemaRow>> {
        // Cast to CHAR to avoid VARBINARY type issues in MySQL 8.0+
        let query = r#"
            SELECT
                CAST(SCHEMA_NAME AS CHAR) AS schema_name,
                CAST(DEFAULT_CHARACTER_SET_NAME AS CHAR) AS charset,
                CAST(DEFAULT_COLLATION_NAME AS CHAR) AS collation_name
            FROM INFORMATION_SCHEMA.SCHEMATA
            ORDER BY SCHEMA_NAME
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExportError::metadata_unavailable("Failed to enumerate schemata", e))?;

        rows.iter()
            .map(|row| {
                Ok(SchemaRow {
                    name: get_text(row, "schema_name")?,
                    charset: get_text(row, "charset")?,
                    collation: get_text(row, "collation_name")?,
                })
            })
            .collect()
    }

    async fn schema_grants(&self) -> Result<Vec<GrantRow>> {
        let query = r#"
            SELECT
                CAST(Db AS CHAR) AS db,
                CAST(User AS CHAR) AS user_name,
                CAST(Host AS CHAR) AS host
            FROM mysql.db
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExportError::metadata_unavailable("Failed to read mysql.db grants", e))?;

        rows.iter()
            .map(|row| {
                Ok(GrantRow {
                    schema: get_text(row, "db")?,
                    username: get_text(row, "user_name")?,
                    host: get_text(row, "host")?,
                })
            })
            .collect()
    }

    async fn credential_columns(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR) AS column_name
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = 'mysql'
            AND TABLE_NAME = 'user'
            AND LOWER(COLUMN_NAME) IN ('password', 'plugin', 'authentication_string')
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                ExportError::metadata_unavailable("Failed to probe mysql.user columns", e)
            })?;

        rows.iter().map(|row| get_text(row, "column_name")).collect()
    }

    async fn credential_rows(&self, layout: CredentialLayout) -> Result<Vec<CredentialRow>> {
        let query = credential_query(layout);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                ExportError::metadata_unavailable("Failed to read mysql.user credentials", e)
            })?;

        rows.iter()
            .map(|row| {
                Ok(CredentialRow {
                    username: get_text(row, "user_name")?,
                    host: get_text(row, "host")?,
                    password: get_optional_text(row, "password")?,
                    plugin: get_optional_text(row, "plugin")?,
                    authentication_string: get_optional_text(row, "authentication_string")?,
                })
            })
            .collect()
    }
}

/// Builds the credential query for a layout.
///
/// Only accounts holding at least one schema-level grant are selected.
/// Columns the layout does not have are selected as NULL.
fn credential_query(layout: CredentialLayout) -> String {
    let (password, plugin) = match layout {
        CredentialLayout::LegacyCredentialColumn => ("CAST(u.Password AS CHAR)", false),
        CredentialLayout::PluginCredentialColumns {
            legacy_fallback: true,
        } => ("CAST(u.Password AS CHAR)", true),
        CredentialLayout::PluginCredentialColumns {
            legacy_fallback: false,
        } => ("CAST(NULL AS CHAR)", true),
    };
    let (plugin_column, token_column) = if plugin {
        (
            "CAST(u.plugin AS CHAR)",
            "CAST(u.authentication_string AS CHAR)",
        )
    } else {
        ("CAST(NULL AS CHAR)", "CAST(NULL AS CHAR)")
    };

    format!(
        r#"
        SELECT
            CAST(u.User AS CHAR) AS user_name,
            CAST(u.Host AS CHAR) AS host,
            {password} AS password,
            {plugin_column} AS plugin,
            {token_column} AS authentication_string
        FROM mysql.user u
        WHERE EXISTS (SELECT 1 FROM mysql.db d WHERE d.User = u.User AND d.Host = u.Host)
        ORDER BY u.User, u.Host
        "#
    )
}

fn get_text(row: &sqlx::mysql::MySqlRow, column: &str) -> Result<String> {
    get_optional_text(row, column).map(Option::unwrap_or_default)
}

fn get_optional_text(row: &sqlx::mysql::MySqlRow, column: &str) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(column).map_err(|e| {
        ExportError::metadata_unavailable(format!("Failed to parse catalog column '{}'", column), e)
    })
}

/// Creates the catalog connection pool.
///
/// # Security Features
/// - One connection only: every catalog read shares the same session
/// - Read-only session and statement timeout set on connect
fn create_catalog_pool(url: &str, config: &ConnectionConfig) -> Result<MySqlPool> {
    use sqlx::Executor;

    let query_timeout_ms = config.query_timeout.as_millis();
    let read_only = config.read_only;

    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // MariaDB ignores max_execution_time; the variable is optional
                let _ = conn
                    .execute(format!("SET SESSION max_execution_time = {}", query_timeout_ms).as_str())
                    .await;

                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }

                conn.execute("SET time_zone = '+00:00'").await?;
                Ok(())
            })
        })
        .connect_lazy(url)
        .map_err(|e| {
            ExportError::metadata_unavailable(
                format!(
                    "Failed to create MySQL connection pool to {}",
                    redact_database_url(url)
                ),
                e,
            )
        })
}
