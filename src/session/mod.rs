//! Session state machine
//!
//! One [`EapSession`] tracks a single authentication attempt from method
//! start to terminal outcome. The controller is cooperative: it suspends
//! after issuing each outbound packet or asynchronous step, and the
//! surrounding EAP engine resumes it with exactly one event per round trip.
//! A session never has more than one pending continuation, and nothing is
//! shared between sessions except the immutable instance and the thread's
//! crypto context.
//!
//! The per-round decision logic lives in the outcome dispatcher
//! ([`SessionController::on_handshake_done`] internally): it maps the
//! handshake status and the tunnel state into continue / pending / success /
//! fail, with an unrecognized status always failing, never falling through
//! to success.

use crate::attrs::Attrs;
use crate::config::TtlsInstance;
use crate::inner::{InnerOutcome, InnerPipeline};
use crate::policy;
use crate::tls::{
    HandshakeAdapter, HandshakeState, HandshakeStatus, ThreadContext,
};
use crate::tunnel::{OpaqueSlot, TunnelContext};
use bytes::Bytes;
use tracing::{debug, error};

/// Terminal or intermediate result of one session round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The conversation continues; an outbound request may be queued
    Continue,
    /// Nothing to conclude yet; wait for the peer's next packet
    Pending,
    /// Authentication succeeded
    Success,
    /// Authentication failed; the session terminates
    Fail,
}

/// The continuation a suspended session is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumePoint {
    SessionConstructed,
    HandshakeDone,
}

/// Completion event delivered through the resumption channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The underlying TLS session object now exists
    SessionConstructed,
    /// A handshake advance finished with the given status
    HandshakeDone(HandshakeStatus),
}

/// The per-round handler currently installed on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Initial state: the next call initializes the session
    SessionInit,
    /// Steady state: each inbound packet advances the handshake
    HandshakeProcess,
}

/// One inbound request as seen by the method
///
/// Carries the control attributes the outer server attached; the method
/// reads the client-certificate override from here.
#[derive(Debug, Default)]
pub struct Request {
    control: Attrs,
}

impl Request {
    /// A request with no control attributes
    pub fn new() -> Self {
        Request::default()
    }

    /// A request carrying the given control attributes
    pub fn with_control(control: Attrs) -> Self {
        Request { control }
    }

    /// The control attribute list
    pub fn control(&self) -> &Attrs {
        &self.control
    }
}

/// One in-flight authentication attempt
///
/// Owns the handshake state for its lifetime through an opaque slot, the
/// same way the handshake owns the tunnel context: dropping the session
/// cascades the whole chain.
pub struct EapSession {
    tls_method: bool,
    handler: Handler,
    pending: Option<ResumePoint>,
    opaque: OpaqueSlot,
    reply: Option<Bytes>,
}

impl EapSession {
    /// Create a session awaiting initialization
    pub fn new() -> Self {
        EapSession {
            tls_method: false,
            handler: Handler::SessionInit,
            pending: None,
            opaque: OpaqueSlot::empty(),
            reply: None,
        }
    }

    /// Whether the session was marked as requiring a TLS-carrying method
    pub fn is_tls_method(&self) -> bool {
        self.tls_method
    }

    /// The handler the next round trip will run
    pub fn handler(&self) -> Handler {
        self.handler
    }

    /// Whether a continuation is pending
    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }

    /// The session's opaque state slot
    pub fn opaque(&self) -> &OpaqueSlot {
        &self.opaque
    }

    /// Mutable access to the session's opaque state slot
    pub fn opaque_mut(&mut self) -> &mut OpaqueSlot {
        &mut self.opaque
    }

    /// The handshake state, once the session is constructed
    pub fn handshake(&self) -> Option<&HandshakeState> {
        self.opaque.get::<HandshakeState>()
    }

    /// Mutable access to the handshake state
    pub fn handshake_mut(&mut self) -> Option<&mut HandshakeState> {
        self.opaque.get_mut::<HandshakeState>()
    }

    /// Take the outbound EAP payload queued by the last round, if any
    pub fn take_reply(&mut self) -> Option<Bytes> {
        self.reply.take()
    }

    /// Record a continuation to run when the current step completes
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already pending: the engine drives each
    /// session with one inbound packet at a time, so a second suspension is
    /// an internal-consistency fault.
    fn suspend(&mut self, point: ResumePoint) {
        assert!(
            self.pending.is_none(),
            "session already has a pending continuation"
        );
        self.pending = Some(point);
    }
}

impl Default for EapSession {
    fn default() -> Self {
        EapSession::new()
    }
}

/// The top-level TTLS state machine
///
/// Borrows the immutable instance, the thread's crypto context, and the two
/// external collaborators; everything mutable is per-session.
pub struct SessionController<'a, A, P> {
    inst: &'a TtlsInstance,
    thread: &'a ThreadContext,
    adapter: &'a A,
    pipeline: &'a P,
}

impl<'a, A, P> SessionController<'a, A, P>
where
    A: HandshakeAdapter,
    P: InnerPipeline,
{
    /// Wire a controller to its collaborators
    pub fn new(
        inst: &'a TtlsInstance,
        thread: &'a ThreadContext,
        adapter: &'a A,
        pipeline: &'a P,
    ) -> Self {
        SessionController {
            inst,
            thread,
            adapter,
            pipeline,
        }
    }

    /// Run whichever handler is installed on the session
    pub fn process(
        &self,
        sess: &mut EapSession,
        request: &Request,
        inbound: &[u8],
    ) -> Disposition {
        match sess.handler {
            Handler::SessionInit => self.session_init(sess, request),
            Handler::HandshakeProcess => self.handshake_process(sess, request, inbound),
        }
    }

    /// Initialize a new session
    ///
    /// Suspends on session-object construction. When the TLS profile wants
    /// that construction done asynchronously the caller gets `Pending` and
    /// must deliver [`Event::SessionConstructed`] later; otherwise the
    /// construction is immediate and this falls through to the resume.
    pub fn session_init(&self, sess: &mut EapSession, request: &Request) -> Disposition {
        sess.tls_method = true;
        sess.suspend(ResumePoint::SessionConstructed);

        if self.inst.profile().async_session_init() {
            return Disposition::Pending;
        }

        self.resume(sess, request, Event::SessionConstructed)
    }

    /// Advance the handshake with the peer's inbound TLS data
    ///
    /// Suspends on the advance completing, then resumes with its status.
    pub fn handshake_process(
        &self,
        sess: &mut EapSession,
        request: &Request,
        inbound: &[u8],
    ) -> Disposition {
        sess.suspend(ResumePoint::HandshakeDone);

        let hs = sess.opaque.recover_mut::<HandshakeState>();
        let status = self.adapter.advance(hs, inbound);
        hs.set_status(status);

        self.resume(sess, request, Event::HandshakeDone(status))
    }

    /// Deliver a completion event to the session's pending continuation
    ///
    /// # Panics
    ///
    /// Panics if no continuation is pending or the event does not match it;
    /// by construction the engine completes steps in the order they were
    /// issued, so a mismatch is an internal-consistency fault.
    pub fn resume(&self, sess: &mut EapSession, request: &Request, event: Event) -> Disposition {
        let point = sess
            .pending
            .take()
            .expect("resume on a session with no pending continuation");

        match (point, event) {
            (ResumePoint::SessionConstructed, Event::SessionConstructed) => {
                self.on_session_constructed(sess, request)
            }
            (ResumePoint::HandshakeDone, Event::HandshakeDone(status)) => {
                self.on_handshake_done(sess, status)
            }
            (point, event) => {
                panic!("event {:?} does not match pending continuation {:?}", event, point)
            }
        }
    }

    /// Post-construction resume: allocate and start the handshake
    fn on_session_constructed(&self, sess: &mut EapSession, request: &Request) -> Disposition {
        // Resolved exactly once, before the handshake exists, because it
        // decides whether the engine will demand a peer certificate.
        let client_cert = policy::client_cert_required(
            request.control().find_u32(self.inst.attrs().require_client_cert),
            self.inst.config().require_client_cert,
        );

        let mut hs = match self.adapter.allocate(self.thread, client_cert) {
            Ok(hs) => hs,
            Err(e) => {
                error!(error = %e, "failed to allocate TLS session");
                return Disposition::Fail;
            }
        };

        hs.set_include_length(self.inst.config().include_length);

        if let Err(e) = self.adapter.start(&mut hs) {
            // hs is dropped here, releasing the partially-built state.
            error!(error = %e, "failed to start TLS handshake");
            return Disposition::Fail;
        }

        match self.adapter.emit_request(&mut hs) {
            Ok(payload) => sess.reply = Some(payload),
            Err(e) => {
                error!(error = %e, "failed to emit initial request");
                return Disposition::Fail;
            }
        }

        hs.tls_mut()
            .opaque_mut()
            .attach(TunnelContext::new(self.inst.server()));

        sess.opaque.attach(hs);
        sess.handler = Handler::HandshakeProcess;

        Disposition::Continue
    }

    /// The outcome dispatcher: handshake status + tunnel state → result
    fn on_handshake_done(&self, sess: &mut EapSession, status: HandshakeStatus) -> Disposition {
        if status.is_error() {
            error!("[eap-tls process] = {}", status);
        } else {
            debug!("[eap-tls process] = {}", status);
        }

        let hs = sess.opaque.recover_mut::<HandshakeState>();

        match status {
            HandshakeStatus::Invalid | HandshakeStatus::Fail => Disposition::Fail,

            // Established is necessary but not sufficient: a fresh channel
            // still has to carry at least one round of inner authentication.
            HandshakeStatus::Established => {
                if self.adapter.is_resumed(hs.tls()) {
                    debug!("skipping inner authentication due to session resumption");
                    return Disposition::Success;
                }

                let authenticated = hs
                    .tls()
                    .opaque()
                    .get::<TunnelContext>()
                    .is_some_and(TunnelContext::authenticated);
                if authenticated {
                    return Disposition::Success;
                }

                match self.adapter.emit_request(hs) {
                    Ok(payload) => {
                        sess.reply = Some(payload);
                        Disposition::Continue
                    }
                    Err(e) => {
                        error!(error = %e, "failed to emit handshake request");
                        Disposition::Fail
                    }
                }
            }

            // The engine consumed the packet but produced no new information
            // yet; do not advance state.
            HandshakeStatus::Handled => Disposition::Pending,

            // Tunnel is up; hand the decrypted record to the inner pipeline.
            HandshakeStatus::RecordRecvComplete => {
                debug!("session established, processing tunneled record");

                let record = hs.tls_mut().take_record();
                let tunnel = hs.tls_mut().opaque_mut().recover_mut::<TunnelContext>();

                match self.pipeline.process(&record, tunnel) {
                    InnerOutcome::Accept | InnerOutcome::MoreData => Disposition::Continue,
                    InnerOutcome::Reject => Disposition::Fail,
                }
            }

            // An unanticipated status must never be treated as success.
            HandshakeStatus::Unknown(code) => {
                error!(code, "unrecognized handshake status, rejecting session");
                Disposition::Fail
            }
        }
    }
}
