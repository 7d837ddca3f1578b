//! EAP-TTLS authenticator core (RFC 5281)
//!
//! This crate implements the server side of the tunneled EAP method: a TLS
//! handshake carried inside EAP framing, followed by tunneled credential
//! records dispatched to an inner virtual server. The heart of the crate is
//! the per-session state machine in [`session`], which drives each
//! authentication attempt from method start to a terminal outcome while
//! consuming the TLS engine and the inner pipeline through narrow trait
//! boundaries.
//!
//! # Architecture
//!
//! - [`config`] resolves the module configuration into an immutable instance
//!   shared by all sessions.
//! - [`tls`] is the handshake-engine boundary: the status enum, the adapter
//!   trait, the per-session handles, and an OpenSSL-backed default engine.
//! - [`session`] holds the session controller and outcome dispatcher.
//! - [`tunnel`] carries per-session tunnel state opaquely across the engine
//!   boundary, with checked typed recovery.
//! - [`inner`] is the boundary to the inner authentication pipeline.
//! - [`dict`] and [`attrs`] model the process-wide attribute registry and
//!   the decoded attribute lists the outer server hands in.

pub mod attrs;
pub mod config;
pub mod dict;
pub mod inner;
pub mod policy;
pub mod session;
pub mod tls;
pub mod tunnel;

pub use config::{ConfigError, TtlsConfig, TtlsInstance};
pub use inner::{InnerOutcome, InnerPipeline, VirtualServerRegistry};
pub use session::{Disposition, EapSession, Event, Request, SessionController};
pub use tls::{HandshakeAdapter, HandshakeStatus, OpensslEngine, TlsProfile};
pub use tunnel::TunnelContext;
