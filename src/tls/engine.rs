//! OpenSSL-backed handshake engine
//!
//! Runs the server-side TLS handshake over in-memory buffers instead of a
//! socket: inbound TLS records arrive as reassembled EAP payloads, outbound
//! records accumulate until the controller asks for the next EAP-TLS request
//! fragment. The engine keeps its connection state in the TLS session's
//! engine slot and reports progress only through [`HandshakeStatus`].

use super::adapter::{HandshakeAdapter, HandshakeState, TlsSession};
use super::profile::{ThreadContext, TlsProfile};
use super::status::HandshakeStatus;
use super::{Result, TlsError};
use bytes::{BufMut, Bytes, BytesMut};
use openssl::ssl::{ErrorCode, Ssl, SslStream, SslVerifyMode};
use std::io::{self, Read, Write};
use tracing::debug;

/// EAP-TLS flag bits (RFC 5216 section 3.1, shared by RFC 5281)
const FLAG_LENGTH: u8 = 0x80;
const FLAG_MORE: u8 = 0x40;
const FLAG_START: u8 = 0x20;

/// In-memory transport the `SslStream` reads and writes
///
/// Reading with no inbound data yields `WouldBlock`, which OpenSSL surfaces
/// as `WANT_READ` so the handshake can be suspended between round trips.
#[derive(Debug, Default)]
struct RecordTransport {
    inbound: Vec<u8>,
    outbound: Vec<u8>,
}

impl RecordTransport {
    fn new() -> Self {
        RecordTransport::default()
    }

    fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl Read for RecordTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no inbound data"));
        }

        let n = buf.len().min(self.inbound.len());
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.drain(..n);
        Ok(n)
    }
}

impl Write for RecordTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Engine-private per-session state, kept in the TLS session's engine slot
struct EngineState {
    stream: SslStream<RecordTransport>,
    established: bool,
    start_pending: bool,
    pending_out: BytesMut,
    message_len: usize,
    first_fragment: bool,
}

impl EngineState {
    fn new(stream: SslStream<RecordTransport>) -> Self {
        EngineState {
            stream,
            established: false,
            start_pending: false,
            pending_out: BytesMut::new(),
            message_len: 0,
            first_fragment: true,
        }
    }

    /// Move freshly written TLS records into the fragmentation queue
    fn drain_outbound(&mut self) {
        let out = self.stream.get_mut().take_outbound();
        if !out.is_empty() {
            let starting_new_message = self.pending_out.is_empty();
            self.pending_out.extend_from_slice(&out);
            if starting_new_message {
                self.first_fragment = true;
            }
            self.message_len = self.pending_out.len();
        }
    }
}

/// The default [`HandshakeAdapter`], driving OpenSSL over memory buffers
pub struct OpensslEngine {
    fragment_size: usize,
}

impl OpensslEngine {
    /// Create an engine using the profile's fragmentation settings
    pub fn new(profile: &TlsProfile) -> Self {
        OpensslEngine {
            fragment_size: profile.fragment_size(),
        }
    }

    fn advance_handshake(&self, state: &mut EngineState, tls: &mut TlsSession) -> HandshakeStatus {
        match state.stream.do_handshake() {
            Ok(()) => {
                state.established = true;
                tls.set_resumed(state.stream.ssl().session_reused());
                state.drain_outbound();
                HandshakeStatus::Established
            }
            Err(e) if e.code() == ErrorCode::WANT_READ => {
                state.drain_outbound();
                HandshakeStatus::Handled
            }
            Err(e) => {
                debug!(error = %e, "handshake failed");
                HandshakeStatus::Fail
            }
        }
    }

    fn read_records(&self, state: &mut EngineState, tls: &mut TlsSession) -> HandshakeStatus {
        let mut buf = [0u8; 4096];
        let mut received = false;

        loop {
            match state.stream.ssl_read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    tls.push_record(&buf[..n]);
                    received = true;
                }
                Err(e) if e.code() == ErrorCode::WANT_READ => break,
                Err(e) if e.code() == ErrorCode::ZERO_RETURN => break,
                Err(e) => {
                    debug!(error = %e, "record decryption failed");
                    return HandshakeStatus::Fail;
                }
            }
        }

        // No new application data: the channel is simply established and the
        // packet was an acknowledgement.
        if received {
            HandshakeStatus::RecordRecvComplete
        } else {
            HandshakeStatus::Established
        }
    }
}

impl HandshakeAdapter for OpensslEngine {
    fn allocate(
        &self,
        thread: &ThreadContext,
        require_client_cert: bool,
    ) -> Result<HandshakeState> {
        let mut ssl = Ssl::new(thread.ctx())?;
        ssl.set_accept_state();

        let mode = if require_client_cert {
            SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT
        } else {
            SslVerifyMode::NONE
        };
        ssl.set_verify(mode);

        let stream = SslStream::new(ssl, RecordTransport::new())
            .map_err(|e| TlsError::Allocation(e.to_string()))?;

        let mut tls = TlsSession::new();
        tls.engine_mut().attach(EngineState::new(stream));

        Ok(HandshakeState::new(tls, require_client_cert))
    }

    fn start(&self, hs: &mut HandshakeState) -> Result<()> {
        let state = hs
            .tls_mut()
            .engine_mut()
            .get_mut::<EngineState>()
            .ok_or_else(|| TlsError::HandshakeStart("session was not allocated".to_string()))?;

        state.start_pending = true;
        Ok(())
    }

    fn advance(&self, hs: &mut HandshakeState, inbound: &[u8]) -> HandshakeStatus {
        let tls = hs.tls_mut();
        let mut state = match tls.engine_mut().take::<EngineState>() {
            Some(state) => state,
            // Driven before allocation; fail safe.
            None => return HandshakeStatus::Invalid,
        };

        state.start_pending = false;
        state.stream.get_mut().push_inbound(inbound);

        let status = if !state.established {
            self.advance_handshake(&mut state, tls)
        } else {
            self.read_records(&mut state, tls)
        };

        tls.engine_mut().attach(state);
        status
    }

    fn emit_request(&self, hs: &mut HandshakeState) -> Result<Bytes> {
        let include_length = hs.include_length();
        let state = hs
            .tls_mut()
            .engine_mut()
            .get_mut::<EngineState>()
            .ok_or(TlsError::NoPendingData)?;

        if state.start_pending {
            return Ok(Bytes::from_static(&[FLAG_START]));
        }

        if state.pending_out.is_empty() {
            // Established with nothing queued: a bare request prompting the
            // peer's next tunneled record.
            if state.established {
                return Ok(Bytes::from_static(&[0u8]));
            }
            return Err(TlsError::NoPendingData);
        }

        let chunk_len = self.fragment_size.min(state.pending_out.len());
        let chunk = state.pending_out.split_to(chunk_len);
        let more = !state.pending_out.is_empty();

        // RFC 5281: the length field MUST NOT appear in fragments after the
        // first one, but the include_length knob keeps it in all of them for
        // peers that have always expected that.
        let with_length = state.first_fragment || include_length;

        let mut flags = 0u8;
        if with_length {
            flags |= FLAG_LENGTH;
        }
        if more {
            flags |= FLAG_MORE;
        }

        let mut payload = BytesMut::with_capacity(1 + 4 + chunk.len());
        payload.put_u8(flags);
        if with_length {
            payload.put_u32(state.message_len as u32);
        }
        payload.extend_from_slice(&chunk);

        state.first_fragment = false;
        Ok(payload.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ssl::{SslContextBuilder, SslMethod};

    fn server_setup() -> (OpensslEngine, ThreadContext) {
        let profile = TlsProfile::builder("test")
            .fragment_size(16384)
            .build()
            .unwrap();
        let thread = profile.new_thread_context().unwrap();
        (OpensslEngine::new(&profile), thread)
    }

    fn client_stream() -> SslStream<RecordTransport> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_client()).unwrap();
        builder.set_verify(SslVerifyMode::NONE);
        let ctx = builder.build();

        let mut ssl = Ssl::new(&ctx).unwrap();
        ssl.set_connect_state();
        SslStream::new(ssl, RecordTransport::new()).unwrap()
    }

    /// Strip the EAP-TLS flags byte and optional length field
    fn unwrap_payload(payload: &[u8]) -> (u8, Vec<u8>) {
        let flags = payload[0];
        let data_start = if flags & FLAG_LENGTH != 0 { 5 } else { 1 };
        (flags, payload[data_start..].to_vec())
    }

    /// Drive the client one step: consume server bytes, return client bytes
    fn client_step(client: &mut SslStream<RecordTransport>, inbound: &[u8]) -> Vec<u8> {
        client.get_mut().push_inbound(inbound);
        // WANT_READ mid-handshake is expected.
        let _ = client.do_handshake();
        client.get_mut().take_outbound()
    }

    #[test]
    fn test_start_emits_start_packet() {
        let (engine, thread) = server_setup();
        let mut hs = engine.allocate(&thread, false).unwrap();
        engine.start(&mut hs).unwrap();

        let payload = engine.emit_request(&mut hs).unwrap();
        assert_eq!(payload.as_ref(), &[FLAG_START]);
    }

    #[test]
    fn test_full_handshake_and_record_delivery() {
        let (engine, thread) = server_setup();
        let mut hs = engine.allocate(&thread, false).unwrap();
        engine.start(&mut hs).unwrap();
        let _start = engine.emit_request(&mut hs).unwrap();

        let mut client = client_stream();

        // Client answers the start packet with its first flight.
        let mut to_server = client_step(&mut client, &[]);
        let mut status = HandshakeStatus::Invalid;

        // Shuttle flights until the server reports completion.
        for _ in 0..10 {
            status = engine.advance(&mut hs, &to_server);
            if status == HandshakeStatus::Established {
                break;
            }
            assert_eq!(status, HandshakeStatus::Handled);

            let payload = engine.emit_request(&mut hs).unwrap();
            let (_, data) = unwrap_payload(&payload);
            to_server = client_step(&mut client, &data);
        }
        assert_eq!(status, HandshakeStatus::Established);
        assert!(!hs.tls().resumed());

        // Deliver the server's final flight so the client finishes too.
        if let Ok(payload) = engine.emit_request(&mut hs) {
            let (_, data) = unwrap_payload(&payload);
            let trailing = client_step(&mut client, &data);
            if !trailing.is_empty() {
                engine.advance(&mut hs, &trailing);
            }
        }

        // Tunneled application data comes out as a received record.
        client.write_all(b"tunneled credential").unwrap();
        let record = client.get_mut().take_outbound();
        let status = engine.advance(&mut hs, &record);
        assert_eq!(status, HandshakeStatus::RecordRecvComplete);
        assert_eq!(hs.tls_mut().take_record().as_ref(), b"tunneled credential");
    }

    #[test]
    fn test_advance_without_allocation_is_invalid() {
        let (engine, _thread) = server_setup();
        let mut hs = HandshakeState::new(TlsSession::new(), false);
        assert_eq!(engine.advance(&mut hs, b""), HandshakeStatus::Invalid);
    }

    #[test]
    fn test_garbage_inbound_fails() {
        let (engine, thread) = server_setup();
        let mut hs = engine.allocate(&thread, false).unwrap();
        engine.start(&mut hs).unwrap();

        let status = engine.advance(&mut hs, b"this is not a TLS record at all....");
        assert_eq!(status, HandshakeStatus::Fail);
    }

    #[test]
    fn test_fragmentation_respects_include_length() {
        let (_engine, thread) = server_setup();
        let profile = TlsProfile::builder("small")
            .fragment_size(16)
            .build()
            .unwrap();
        let engine = OpensslEngine::new(&profile);

        let mut hs = engine.allocate(&thread, false).unwrap();
        hs.set_include_length(false);

        // Queue a synthetic outbound message directly.
        let state = hs.tls_mut().engine_mut().get_mut::<EngineState>().unwrap();
        state.pending_out.extend_from_slice(&[0xAA; 40]);
        state.message_len = 40;
        state.first_fragment = true;

        // First fragment carries the length and the more bit.
        let first = engine.emit_request(&mut hs).unwrap();
        assert_eq!(first[0] & FLAG_LENGTH, FLAG_LENGTH);
        assert_eq!(first[0] & FLAG_MORE, FLAG_MORE);
        assert_eq!(&first[1..5], &40u32.to_be_bytes());
        assert_eq!(first.len(), 5 + 16);

        // Later fragments drop the length field when include_length is off.
        let second = engine.emit_request(&mut hs).unwrap();
        assert_eq!(second[0] & FLAG_LENGTH, 0);
        assert_eq!(second[0] & FLAG_MORE, FLAG_MORE);
        assert_eq!(second.len(), 1 + 16);

        let last = engine.emit_request(&mut hs).unwrap();
        assert_eq!(last[0] & FLAG_MORE, 0);
        assert_eq!(last.len(), 1 + 8);

        assert!(matches!(
            engine.emit_request(&mut hs),
            Err(TlsError::NoPendingData)
        ));
    }
}
