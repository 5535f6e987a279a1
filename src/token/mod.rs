//! Capability Token Store
//!
//! Converts a library path into a short-lived, unguessable access token.
//!
//! - 128-bit random tokens, URL-safe base64 encoded
//! - Fixed TTL, no renewal and no explicit revocation
//! - Expired entries are removed by a cancellable periodic sweep

mod error;
mod store;

pub use error::TokenError;
pub use store::{
    CapabilityStore, CapabilityToken, SweepHandle,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_TOKEN_TTL, TOKEN_BYTES,
};
