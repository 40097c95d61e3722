//! Secure administrative credential container with automatic memory zeroing.
//!
//! # Security
//! - Credentials are stored in `Zeroizing<T>` containers
//! - Memory is automatically cleared when credentials go out of scope
//! - The password is never exposed in debug output or logs

use zeroize::{Zeroize, Zeroizing};

/// Credentials of the administrative account an export connects with.
///
/// # Example
///
/// ```rust
/// use dbexport_core::security::Credentials;
///
/// let creds = Credentials::new("root".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "root");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    ///
    /// An empty password is treated as no password.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password.filter(|p| !p.is_empty())),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Gets the password, if one was supplied.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Checks if password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &*self.username)
            .field("has_password", &self.has_password())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("root".to_string(), Some("testpass".to_string()));
        assert_eq!(creds.username(), "root");
        assert_eq!(creds.password(), Some("testpass"));
    }

    #[test]
    fn test_credentials_empty_password_is_none() {
        let creds = Credentials::new("root".to_string(), Some(String::new()));
        assert!(!creds.has_password());
        assert_eq!(creds.password(), None);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("root".to_string(), Some("super_secret_123".to_string()));
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super_secret_123"));
        assert!(debug.contains("has_password: true"));
    }
}
