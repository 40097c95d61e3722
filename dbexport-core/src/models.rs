//! Core data models for an export run.
//!
//! These types describe the server state an export reproduces: schemas with
//! their opaque character set and collation, the principals authorized on
//! them, and the credential each principal is recreated with. All of them
//! are built fresh from the live catalog on every run.

use std::collections::BTreeSet;
use zeroize::Zeroizing;

/// Schemas owned by the server itself. They are never exported.
pub const RESERVED_SCHEMAS: [&str; 4] = ["mysql", "information_schema", "performance_schema", "sys"];

/// Returns true when `name` is one of the server's own reserved schemas.
///
/// The comparison is exact: on a case-sensitive server `Sys` is a user schema.
pub fn is_reserved_schema(name: &str) -> bool {
    RESERVED_SCHEMAS.contains(&name)
}

/// A server account, identified by the (username, host pattern) pair.
///
/// The same username may exist several times with distinct host patterns,
/// each with its own grants and credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    /// Account name
    pub username: String,
    /// Host pattern, possibly with `%` wildcards
    pub host: String,
}

impl Principal {
    /// Creates a principal from its username and host pattern.
    pub fn new(username: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            host: host.into(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'@'{}'", self.username, self.host)
    }
}

/// Authentication scheme a credential was produced by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// `mysql_native_password` (SHA1-based, `*`-prefixed hash)
    MysqlNativePassword,
    /// `caching_sha2_password` (`$A$`-prefixed hash)
    CachingSha2Password,
    /// `mysql_old_password` (pre-4.1, 16 hex digits)
    MysqlOldPassword,
    /// Any other plugin, named as the catalog reports it
    Plugin(String),
}

impl AuthScheme {
    /// Maps a plugin name read from the catalog onto a scheme.
    pub fn from_plugin_name(name: &str) -> Self {
        match name {
            "mysql_native_password" => Self::MysqlNativePassword,
            "caching_sha2_password" => Self::CachingSha2Password,
            "mysql_old_password" => Self::MysqlOldPassword,
            other => Self::Plugin(other.to_string()),
        }
    }

    /// Plugin name used in `IDENTIFIED WITH`.
    pub fn plugin_name(&self) -> &str {
        match self {
            Self::MysqlNativePassword => "mysql_native_password",
            Self::CachingSha2Password => "caching_sha2_password",
            Self::MysqlOldPassword => "mysql_old_password",
            Self::Plugin(name) => name,
        }
    }

    /// Whether current server majors (8.0+) still accept this scheme.
    pub fn is_legacy_old_format(&self) -> bool {
        matches!(self, Self::MysqlOldPassword)
    }
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.plugin_name())
    }
}

/// The credential a principal is recreated with.
///
/// # Security
/// The secret is zeroized on drop and omitted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: Zeroizing<String>,
    /// Scheme the secret belongs to
    pub scheme: AuthScheme,
}

impl Credential {
    /// Creates a credential from its stored secret and scheme.
    pub fn new(secret: impl Into<String>, scheme: AuthScheme) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            scheme,
        }
    }

    /// The stored secret, verbatim (hash, token, or empty).
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("secret_len", &self.secret.len())
            .finish_non_exhaustive()
    }
}

/// A schema to export, with the principals authorized on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Schema name
    pub name: String,
    /// Default character set, passed through verbatim
    pub charset: String,
    /// Default collation, passed through verbatim
    pub collation: String,
    /// Principals granted on this schema
    pub authorized: BTreeSet<Principal>,
}

impl Schema {
    /// Creates a schema with no authorized principals yet.
    pub fn new(
        name: impl Into<String>,
        charset: impl Into<String>,
        collation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            charset: charset.into(),
            collation: collation.into(),
            authorized: BTreeSet::new(),
        }
    }

    /// Builder method to add an authorized principal.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.authorized.insert(principal);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_schemas_match_exact_case() {
        assert!(is_reserved_schema("mysql"));
        assert!(is_reserved_schema("information_schema"));
        assert!(is_reserved_schema("performance_schema"));
        assert!(is_reserved_schema("sys"));
        assert!(!is_reserved_schema("Sys"));
        assert!(!is_reserved_schema("MySQL"));
        assert!(!is_reserved_schema("Information_Schema"));
        assert!(!is_reserved_schema("mysql_app"));
        assert!(!is_reserved_schema("s1"));
    }

    #[test]
    fn test_principal_identity_includes_host() {
        let local = Principal::new("alice", "localhost");
        let any = Principal::new("alice", "%");
        assert_ne!(local, any);
        assert_eq!(any.to_string(), "'alice'@'%'");
    }

    #[test]
    fn test_plugin_name_mapping() {
        assert_eq!(
            AuthScheme::from_plugin_name("mysql_native_password"),
            AuthScheme::MysqlNativePassword
        );
        assert_eq!(
            AuthScheme::from_plugin_name("caching_sha2_password"),
            AuthScheme::CachingSha2Password
        );
        assert_eq!(
            AuthScheme::from_plugin_name("auth_socket"),
            AuthScheme::Plugin("auth_socket".to_string())
        );
        assert_eq!(AuthScheme::Plugin("ed25519".into()).to_string(), "ed25519");
        assert!(AuthScheme::MysqlOldPassword.is_legacy_old_format());
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = Credential::new("*2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19", AuthScheme::MysqlNativePassword);
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("2470C0C0"));
        assert!(debug.contains("MysqlNativePassword"));
    }
}
