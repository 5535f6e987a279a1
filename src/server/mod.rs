//! Audio Stream Server
//!
//! HTTP front end over the library and the capability token store.
//!
//! Security features:
//! - Bearer credentials verified by an identity provider, plus an email whitelist
//! - Short-lived capability tokens for the streaming routes
//! - Request paths confined to the configured roots
//! - Security response headers (X-Content-Type-Options, X-Frame-Options)

mod auth;
mod error;
mod paths;
mod range;
mod routes;
mod server;

pub use auth::{
    verifier_from_config, AuthError, IdentityVerifier, Principal, RemoteIdentityVerifier,
    StaticIdentityVerifier,
};
pub use error::ServerError;
pub use range::{ByteRange, CHUNK_SIZE};
pub use routes::{FileEntry, TokenParams, TokenResponse, MIX_FILENAME};
pub use server::{build_router, ServerState, StreamServer};
