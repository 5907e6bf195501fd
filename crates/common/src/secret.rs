//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types. `SecretString` implements `Debug` with
//! redaction, so a struct that derives `Debug` and holds one (for example the
//! classroom `Config` carrying the directory API token) cannot leak it through
//! `{:?}` or tracing fields. Values are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct DirectoryCredentials {
//!     base_url: String,
//!     api_token: SecretString,
//! }
//!
//! let creds = DirectoryCredentials {
//!     base_url: "https://portal.example.edu".to_string(),
//!     api_token: SecretString::from("tok-123"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("tok-123"));
//! assert_eq!(creds.api_token.expose_secret(), "tok-123");
//! ```
//!
//! Use `SecretString` for bearer tokens and API keys handed to the session
//! directory client.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("bearer-abc");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("bearer-abc"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token123");
        assert_eq!(secret.expose_secret(), "token123");
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ApiCredentials {
            principal: String,
            token: SecretString,
        }

        let json = r#"{"principal": "prof-ada", "token": "my-secret-value"}"#;
        let creds: ApiCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.token.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
