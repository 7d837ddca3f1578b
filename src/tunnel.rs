//! Per-session tunnel state
//!
//! The tunnel context rides on the TLS session as opaque state: the handshake
//! engine carries it without knowing its type, and the session controller
//! recovers it with a checked downcast. A slot holding a value of the wrong
//! type means two owners disagree about the session's layout, which is an
//! internal-consistency fault rather than a recoverable error.

use crate::inner::ServerHandle;
use std::any::Any;

/// A typed slot for state threaded opaquely across a component boundary
///
/// The slot is either empty or holds exactly one value. Recovery is checked:
/// asking for the wrong type panics, because the only way that happens is a
/// bug in whoever attached the value.
#[derive(Default)]
pub struct OpaqueSlot {
    inner: Option<Box<dyn Any + Send>>,
}

impl OpaqueSlot {
    /// Create an empty slot
    pub fn empty() -> Self {
        OpaqueSlot { inner: None }
    }

    /// Attach a value, replacing any previous occupant
    pub fn attach<T: Any + Send>(&mut self, value: T) {
        self.inner = Some(Box::new(value));
    }

    /// Whether a value is attached
    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    /// Borrow the attached value, if any
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a value of a different type.
    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.inner.as_ref().map(|boxed| {
            boxed
                .downcast_ref::<T>()
                .expect("opaque slot holds a value of an unexpected type")
        })
    }

    /// Mutably borrow the attached value, if any
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a value of a different type.
    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.inner.as_mut().map(|boxed| {
            boxed
                .downcast_mut::<T>()
                .expect("opaque slot holds a value of an unexpected type")
        })
    }

    /// Recover the attached value, which must be present
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty or holds a different type.
    pub fn recover<T: Any + Send>(&self) -> &T {
        self.get::<T>().expect("opaque slot is empty")
    }

    /// Mutably recover the attached value, which must be present
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty or holds a different type.
    pub fn recover_mut<T: Any + Send>(&mut self) -> &mut T {
        self.get_mut::<T>().expect("opaque slot is empty")
    }

    /// Detach the attached value, leaving the slot empty
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a value of a different type.
    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        self.inner.take().map(|boxed| {
            *boxed
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("opaque slot holds a value of an unexpected type"))
        })
    }
}

impl std::fmt::Debug for OpaqueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueSlot")
            .field("attached", &self.inner.is_some())
            .finish()
    }
}

/// Tunnel state attached to the TLS session
///
/// Created right after the handshake object is started, destroyed with the
/// TLS session. The `authenticated` flag is monotonic: once the inner
/// pipeline accepts the tunneled credential it stays set for the rest of the
/// session, and there is deliberately no way to clear it.
#[derive(Debug)]
pub struct TunnelContext {
    authenticated: bool,
    server: ServerHandle,
}

impl TunnelContext {
    /// Create a fresh, unauthenticated tunnel context
    pub fn new(server: ServerHandle) -> Self {
        TunnelContext {
            authenticated: false,
            server,
        }
    }

    /// Whether the inner pipeline has accepted the tunneled credential
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Record that the inner pipeline accepted the tunneled credential
    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// The inner virtual-server target this tunnel dispatches to
    pub fn server(&self) -> ServerHandle {
        self.server
    }
}
