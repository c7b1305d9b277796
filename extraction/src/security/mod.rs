//! SSRF protection and credential redaction.

pub mod credentials;
pub mod url_validator;

pub use credentials::{ProviderCredentials, SecretString};
pub use url_validator::UrlValidator;
