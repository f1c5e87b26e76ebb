//! Secure credential container with automatic memory zeroing.

use zeroize::{Zeroize, Zeroizing};

/// Database credentials that are zeroed from memory on drop.
///
/// # Example
///
/// ```rust
/// use erdsync_core::security::Credentials;
///
/// let creds = Credentials::new("erd".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "erd");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Default, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if a password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Gets the password for handing to the database driver.
    ///
    /// Callers must not log or format the returned value.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Replaces the password, zeroing the previous one.
    pub fn set_password(&mut self, password: Option<String>) {
        self.password = Zeroizing::new(password);
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}
