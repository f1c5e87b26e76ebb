//! Credential protection.
//!
//! - `credentials`: secure credential container with automatic memory zeroing
//! - `connection`: `mysql://` URL parsing with credential extraction
//!
//! Passwords live in `Zeroizing` containers and never reach logs, error
//! messages or `Display` output.

mod connection;
mod credentials;

pub use connection::parse_connection_url;
pub use credentials::Credentials;
