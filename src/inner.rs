//! Inner-pipeline boundary
//!
//! Once the TLS tunnel is up, received tunneled records are handed to an
//! inner virtual server for the actual credential evaluation. The record
//! format (Diameter-style AVPs) and the authentication methods themselves
//! live behind this boundary; the core only consumes the classified outcome.

use crate::tunnel::TunnelContext;

/// Handle to a resolved inner virtual server
///
/// Issued by the [`VirtualServerRegistry`] at startup and valid for the
/// process lifetime. Non-owning: dropping sessions never tears down the
/// server it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHandle(usize);

/// Registry of inner virtual servers, populated during initialization
#[derive(Debug, Default)]
pub struct VirtualServerRegistry {
    names: Vec<String>,
}

impl VirtualServerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        VirtualServerRegistry::default()
    }

    /// Register a virtual server by name
    pub fn register(&mut self, name: impl Into<String>) -> ServerHandle {
        let handle = ServerHandle(self.names.len());
        self.names.push(name.into());
        handle
    }

    /// Resolve a virtual server by name
    pub fn find(&self, name: &str) -> Option<ServerHandle> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(ServerHandle)
    }

    /// Name of a previously issued handle
    pub fn name(&self, handle: ServerHandle) -> &str {
        &self.names[handle.0]
    }
}

/// Outcome of processing one tunneled record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerOutcome {
    /// Credential accepted; the pipeline has marked the tunnel authenticated
    Accept,
    /// Credential rejected; a normal authentication failure, not an error
    Reject,
    /// The inner conversation needs more round trips
    MoreData,
}

/// The inner authentication pipeline consumed by the session controller
///
/// Implementations decode the raw tunneled record and run it through the
/// virtual server named by the tunnel context. On [`InnerOutcome::Accept`]
/// the implementation must call [`TunnelContext::mark_authenticated`] before
/// returning, so that the next established round short-circuits to success
/// without another pipeline call.
pub trait InnerPipeline {
    /// Process one decrypted tunneled record
    fn process(&self, record: &[u8], tunnel: &mut TunnelContext) -> InnerOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolution() {
        let mut servers = VirtualServerRegistry::new();
        let inner = servers.register("inner-tunnel");
        let other = servers.register("other");

        assert_eq!(servers.find("inner-tunnel"), Some(inner));
        assert_eq!(servers.find("other"), Some(other));
        assert_eq!(servers.find("missing"), None);
        assert_eq!(servers.name(inner), "inner-tunnel");
    }
}
