//! Third-party JWT verification
//!
//! Used by the Google ID-token verifier. Access tokens minted by this crate
//! are handled in [`crate::token`] instead; they are HMAC-signed and never
//! touch a JWKS.

pub mod jwks;
pub mod validator;

pub use jwks::JwksClient;
pub use validator::{JwtValidationResult, JwtValidator};
