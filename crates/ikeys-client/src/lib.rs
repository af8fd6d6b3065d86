#![forbid(unsafe_code)]

//! Service-side plumbing for signed requests: configuration, an HTTP
//! client that signs what it sends, a cached directory resolver for
//! key-pair IDs, and request authentication (with axum middleware behind
//! the `axum` feature).

pub mod authenticate;
pub mod config;
pub mod error;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod proptests;

pub use authenticate::{verify_with, Authenticator, KeySource};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use resolver::{Application, DirectoryFetcher, KeyResolver, RemoteIdentity};
pub use session::{RequestBody, SignedClient};
