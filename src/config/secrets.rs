//! Secret handling utilities.
//!
//! Re-exports the secrecy types used for the database URL and the
//! generative-language API key.

pub use secrecy::{ExposeSecret, SecretString};
