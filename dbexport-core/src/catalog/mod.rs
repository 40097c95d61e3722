//! Server catalog access.
//!
//! # Module Structure
//! - `reader`: `MetadataReader`, which turns raw catalog rows into schemas,
//!   grants and credentials
//! - `mysql`: `MySqlCatalog`, the live `CatalogSource` over a single-connection pool
//!
//! The catalog is reached only through the [`CatalogSource`] capability that
//! the caller passes in. There is no ambient connection.

#[cfg(feature = "mysql")]
pub mod mysql;
pub mod reader;

use crate::Result;
use async_trait::async_trait;

#[cfg(feature = "mysql")]
pub use mysql::MySqlCatalog;
pub use reader::MetadataReader;

/// One row of `information_schema.SCHEMATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRow {
    /// `SCHEMA_NAME`
    pub name: String,
    /// `DEFAULT_CHARACTER_SET_NAME`
    pub charset: String,
    /// `DEFAULT_COLLATION_NAME`
    pub collation: String,
}

/// One schema-level grant row of `mysql.db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    /// `Db` column, matched against schema names exactly
    pub schema: String,
    /// `User` column
    pub username: String,
    /// `Host` column
    pub host: String,
}

/// One row of `mysql.user`, restricted to the columns the layout exposes.
///
/// Columns absent from the layout are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRow {
    /// `User` column
    pub username: String,
    /// `Host` column
    pub host: String,
    /// Legacy `Password` column
    pub password: Option<String>,
    /// `plugin` column
    pub plugin: Option<String>,
    /// `authentication_string` column
    pub authentication_string: Option<String>,
}

/// Which credential columns the server's `mysql.user` exposes.
///
/// Detected once per run and dispatched on for every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialLayout {
    /// Only the legacy `Password` column; schemes must be classified
    LegacyCredentialColumn,
    /// `plugin` + `authentication_string`; `legacy_fallback` is set when the
    /// legacy `Password` column exists as well
    PluginCredentialColumns { legacy_fallback: bool },
}

impl CredentialLayout {
    /// Detects the layout from the credential column names present on
    /// `mysql.user`. Names are compared ASCII-case-insensitively.
    ///
    /// Modern plugin columns take precedence whenever both are present.
    ///
    /// # Errors
    /// Returns `MetadataUnavailable` when neither layout is usable.
    pub fn detect<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        let has = |wanted: &str| {
            columns
                .iter()
                .any(|column| column.as_ref().eq_ignore_ascii_case(wanted))
        };
        let legacy = has("password");
        let plugin = has("plugin") && has("authentication_string");

        match (plugin, legacy) {
            (true, legacy_fallback) => Ok(Self::PluginCredentialColumns { legacy_fallback }),
            (false, true) => Ok(Self::LegacyCredentialColumn),
            (false, false) => Err(crate::error::ExportError::catalog_shape(
                "mysql.user exposes neither a Password column nor plugin/authentication_string columns",
            )),
        }
    }
}

/// Read-only access to the catalog tables an export needs.
///
/// Implementations must not mutate server state. Failures are reported as
/// `ExportError::MetadataUnavailable`.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// All schemas on the server with their default character set and collation.
    async fn schemata(&self) -> Result<Vec<SchemaRow>>;

    /// All schema-level grant rows.
    async fn schema_grants(&self) -> Result<Vec<GrantRow>>;

    /// Names of the credential-related columns present on `mysql.user`.
    async fn credential_columns(&self) -> Result<Vec<String>>;

    /// Credential rows of every account holding at least one schema-level grant.
    async fn credential_rows(&self, layout: CredentialLayout) -> Result<Vec<CredentialRow>>;
}
