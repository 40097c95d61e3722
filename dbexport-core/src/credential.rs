//! Classification of legacy credential values.
//!
//! Older servers only store a password hash in `mysql.user.Password`; the
//! plugin that produced it has to be inferred from the hash shape. This
//! module holds that inference and nothing else. When the catalog reports a
//! plugin name explicitly, it is used as-is and this module is bypassed.

use crate::models::AuthScheme;
use thiserror::Error;

/// Length of a pre-4.1 `mysql_old_password` hash.
const OLD_PASSWORD_HASH_LEN: usize = 16;

/// Rough shape of the first character of an unrecognized secret.
///
/// Carried instead of the character itself so diagnostics never leak
/// secret material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadingChar {
    /// `0-9`, `a-f`, `A-F`
    HexDigit,
    /// Any other letter
    Alphabetic,
    /// ASCII punctuation
    Punctuation,
    /// Whitespace, control or non-ASCII symbols
    Other,
}

impl LeadingChar {
    fn of(c: char) -> Self {
        if c.is_ascii_hexdigit() {
            Self::HexDigit
        } else if c.is_alphabetic() {
            Self::Alphabetic
        } else if c.is_ascii_punctuation() {
            Self::Punctuation
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for LeadingChar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::HexDigit => "hex digit",
            Self::Alphabetic => "letter",
            Self::Punctuation => "punctuation",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Classification failure. Never contains the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    /// The value matched none of the known hash shapes
    #[error("unrecognized credential hash ({length} characters, starting with a {leading})")]
    UnknownCredentialFormat {
        /// Length in characters
        length: usize,
        /// Class of the first character
        leading: LeadingChar,
    },
}

/// Determines which scheme produced a legacy secret.
///
/// Rules are checked in order and the first match wins:
/// 1. empty or `*`-prefixed: `mysql_native_password` (empty means no
///    password and is recreated with the native plugin)
/// 2. `$`-prefixed: `caching_sha2_password`
/// 3. exactly 16 characters: `mysql_old_password`
///
/// # Errors
/// Returns [`ClassificationError::UnknownCredentialFormat`] for anything else.
///
/// # Example
/// ```rust
/// use dbexport_core::credential::classify;
/// use dbexport_core::models::AuthScheme;
///
/// assert_eq!(classify("").unwrap(), AuthScheme::MysqlNativePassword);
/// assert_eq!(classify("0123456789abcdef").unwrap(), AuthScheme::MysqlOldPassword);
/// assert!(classify("plaintext").is_err());
/// ```
pub fn classify(secret: &str) -> Result<AuthScheme, ClassificationError> {
    if secret.is_empty() || secret.starts_with('*') {
        return Ok(AuthScheme::MysqlNativePassword);
    }
    if secret.starts_with('$') {
        return Ok(AuthScheme::CachingSha2Password);
    }
    let length = secret.chars().count();
    if length == OLD_PASSWORD_HASH_LEN {
        return Ok(AuthScheme::MysqlOldPassword);
    }

    let leading = secret.chars().next().map_or(LeadingChar::Other, LeadingChar::of);
    Err(ClassificationError::UnknownCredentialFormat { length, leading })
}
