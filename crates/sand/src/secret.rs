//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used throughout this crate. Client
//! secrets and access tokens are held as [`SecretString`], whose `Debug`
//! output is redacted, so structs that derive `Debug` stay safe to log.
//! Inbound bearer tokens are borrowed as `&str` for the length of a
//! verification and reach logs only through [`fingerprint`].
//!
//! ```rust
//! use sand::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("client-secret");
//! assert!(!format!("{secret:?}").contains("client-secret"));
//! assert_eq!(secret.expose_secret(), "client-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

/// Short, non-reversible fingerprint of a value for log correlation.
///
/// Verification cache keys embed the caller's bearer token, so they are
/// logged through this fingerprint rather than verbatim.
#[must_use]
pub fn fingerprint(value: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, value.as_bytes());
    hex::encode(digest.as_ref().get(..8).unwrap_or_default())
}
