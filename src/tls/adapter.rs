//! Per-session handshake handles and the adapter trait
//!
//! [`HandshakeState`] and [`TlsSession`] are the handles the session
//! controller owns for one authentication attempt. They are engine-agnostic:
//! an engine keeps its private connection state in the session's engine slot
//! and communicates progress only through [`HandshakeStatus`].

use super::profile::ThreadContext;
use super::status::HandshakeStatus;
use super::Result;
use crate::tunnel::OpaqueSlot;
use bytes::Bytes;

/// Per-session TLS state
///
/// Conceptually owned by the handshake; carries the resumption flag, the
/// opaque slot tunnel state rides in, and a second slot private to the
/// handshake engine.
#[derive(Debug)]
pub struct TlsSession {
    resumed: bool,
    record: Vec<u8>,
    opaque: OpaqueSlot,
    engine: OpaqueSlot,
}

impl TlsSession {
    /// Create a fresh TLS session handle
    pub fn new() -> Self {
        TlsSession {
            resumed: false,
            record: Vec::new(),
            opaque: OpaqueSlot::empty(),
            engine: OpaqueSlot::empty(),
        }
    }

    /// Whether this connection resumed a previously negotiated session
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    /// Record the engine's resumption verdict
    pub fn set_resumed(&mut self, resumed: bool) {
        self.resumed = resumed;
    }

    /// The slot tunnel state is attached to
    pub fn opaque(&self) -> &OpaqueSlot {
        &self.opaque
    }

    /// Mutable access to the tunnel-state slot
    pub fn opaque_mut(&mut self) -> &mut OpaqueSlot {
        &mut self.opaque
    }

    /// The engine-private slot
    pub fn engine(&self) -> &OpaqueSlot {
        &self.engine
    }

    /// Mutable access to the engine-private slot
    pub fn engine_mut(&mut self) -> &mut OpaqueSlot {
        &mut self.engine
    }

    /// Append decrypted tunneled-record bytes for the controller to collect
    pub fn push_record(&mut self, data: &[u8]) {
        self.record.extend_from_slice(data);
    }

    /// Take the decrypted tunneled record received this round
    pub fn take_record(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.record))
    }
}

impl Default for TlsSession {
    fn default() -> Self {
        TlsSession::new()
    }
}

/// Per-session handshake handle owned by the EAP session
#[derive(Debug)]
pub struct HandshakeState {
    status: HandshakeStatus,
    include_length: bool,
    client_cert_required: bool,
    tls: TlsSession,
}

impl HandshakeState {
    /// Create a handshake handle around a TLS session
    pub fn new(tls: TlsSession, client_cert_required: bool) -> Self {
        HandshakeState {
            status: HandshakeStatus::Invalid,
            include_length: true,
            client_cert_required,
            tls,
        }
    }

    /// Status after the most recent advance
    pub fn status(&self) -> HandshakeStatus {
        self.status
    }

    /// Record the status of an advance
    pub fn set_status(&mut self, status: HandshakeStatus) {
        self.status = status;
    }

    /// Whether the TLS length field is emitted in every fragment
    pub fn include_length(&self) -> bool {
        self.include_length
    }

    /// Apply the configured length-field policy
    pub fn set_include_length(&mut self, include_length: bool) {
        self.include_length = include_length;
    }

    /// Whether a client certificate was required for this session
    pub fn client_cert_required(&self) -> bool {
        self.client_cert_required
    }

    /// The underlying TLS session
    pub fn tls(&self) -> &TlsSession {
        &self.tls
    }

    /// Mutable access to the underlying TLS session
    pub fn tls_mut(&mut self) -> &mut TlsSession {
        &mut self.tls
    }
}

/// The narrow interface the session controller consumes from a TLS engine
pub trait HandshakeAdapter {
    /// Allocate a handshake bound to the thread's crypto context
    ///
    /// The certificate requirement must be known here; it configures peer
    /// verification before the first record is exchanged.
    fn allocate(
        &self,
        thread: &ThreadContext,
        require_client_cert: bool,
    ) -> Result<HandshakeState>;

    /// Queue the handshake's first outbound message
    fn start(&self, hs: &mut HandshakeState) -> Result<()>;

    /// Consume inbound TLS-framed bytes and advance the exchange
    fn advance(&self, hs: &mut HandshakeState, inbound: &[u8]) -> HandshakeStatus;

    /// Whether the connection resumed a prior session
    fn is_resumed(&self, tls: &TlsSession) -> bool {
        tls.resumed()
    }

    /// Produce the next outbound EAP-TLS payload from pending handshake data
    fn emit_request(&self, hs: &mut HandshakeState) -> Result<Bytes>;
}
