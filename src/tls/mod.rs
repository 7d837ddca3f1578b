//! Handshake-engine boundary
//!
//! The session controller never talks to OpenSSL directly. It consumes the
//! narrow [`HandshakeAdapter`] interface: allocate a per-session handshake,
//! start it, feed it inbound TLS-framed bytes, and observe the resulting
//! [`HandshakeStatus`]. Everything else about the TLS exchange (certificate
//! validation, cipher negotiation, record fragmentation, resumption
//! bookkeeping) stays behind this boundary.
//!
//! # Architecture
//!
//! 1. [`TlsProfile`] holds the static TLS configuration, loaded once at
//!    module instantiation and shared read-only.
//! 2. [`ThreadContext`] is the per-worker-thread `SslContext`, created at
//!    thread start and used to derive per-session TLS objects.
//! 3. [`HandshakeState`] / [`TlsSession`] are the per-session handles the
//!    controller owns for the lifetime of one authentication attempt.
//! 4. [`OpensslEngine`] is the default adapter, running the handshake over
//!    in-memory buffers so the surrounding EAP engine can carry the records.

pub mod adapter;
pub mod engine;
pub mod profile;
pub mod status;

pub use adapter::{HandshakeAdapter, HandshakeState, TlsSession};
pub use engine::OpensslEngine;
pub use profile::{ProfileBuilder, ThreadContext, TlsProfile, TlsProfileRegistry, TlsVersion};
pub use status::HandshakeStatus;

/// TLS boundary errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Failed to allocate session handshake: {0}")]
    Allocation(String),

    #[error("Failed to start handshake: {0}")]
    HandshakeStart(String),

    #[error("No outbound handshake data pending")]
    NoPendingData,
}

/// Result type for TLS boundary operations
pub type Result<T> = std::result::Result<T, TlsError>;
