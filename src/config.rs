//! Module configuration and instantiation
//!
//! Configuration is parsed by the surrounding server; this module receives
//! the already-typed values, resolves the references they name (TLS profile,
//! inner virtual server, dictionary attributes) and freezes the result into
//! an immutable [`TtlsInstance`] shared read-only by every session.
//! Resolution failures are fatal: the module refuses to instantiate.

use crate::dict::{DictError, Dictionary, WellKnown};
use crate::inner::{ServerHandle, VirtualServerRegistry};
use crate::tls::{ThreadContext, TlsError, TlsProfile, TlsProfileRegistry};
use std::sync::Arc;
use tracing::warn;

/// Configuration errors, all fatal at instantiation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("virtual_server must not be empty")]
    EmptyVirtualServer,

    #[error("unknown virtual server '{0}'")]
    UnknownVirtualServer(String),

    #[error("unknown TLS profile '{0}'")]
    UnknownTlsProfile(String),

    #[error("dictionary error: {0}")]
    Dict(#[from] DictError),

    #[error("TLS profile error: {0}")]
    Tls(#[from] TlsError),
}

/// TTLS submodule configuration values
#[derive(Debug, Clone)]
pub struct TtlsConfig {
    /// Name of the TLS profile to load
    pub tls: String,
    /// Inner virtual server handling tunneled requests; required, non-empty
    pub virtual_server: String,
    /// Emit the TLS length field in every fragment, not just the first
    pub include_length: bool,
    /// Static client-certificate policy, overridable per request
    pub require_client_cert: bool,
}

impl Default for TtlsConfig {
    fn default() -> Self {
        TtlsConfig {
            tls: "default".to_string(),
            virtual_server: String::new(),
            include_length: true,
            require_client_cert: false,
        }
    }
}

impl TtlsConfig {
    /// Note a configuration key that is accepted but no longer does anything
    pub fn deprecated_key(key: &str) {
        warn!(key, "ignoring deprecated configuration item");
    }
}

/// An instantiated TTLS module: immutable, shared by all sessions
pub struct TtlsInstance {
    config: TtlsConfig,
    server: ServerHandle,
    profile: Arc<TlsProfile>,
    attrs: WellKnown,
}

impl TtlsInstance {
    /// Resolve the configuration against the process-wide registries
    pub fn instantiate(
        config: TtlsConfig,
        dict: &Dictionary,
        servers: &VirtualServerRegistry,
        profiles: &TlsProfileRegistry,
    ) -> Result<Self, ConfigError> {
        if config.virtual_server.is_empty() {
            return Err(ConfigError::EmptyVirtualServer);
        }

        let server = servers
            .find(&config.virtual_server)
            .ok_or_else(|| ConfigError::UnknownVirtualServer(config.virtual_server.clone()))?;

        let profile = profiles
            .find(&config.tls)
            .ok_or_else(|| ConfigError::UnknownTlsProfile(config.tls.clone()))?;

        let attrs = WellKnown::load(dict)?;

        Ok(TtlsInstance {
            config,
            server,
            profile,
            attrs,
        })
    }

    /// The configuration values this instance was built from
    pub fn config(&self) -> &TtlsConfig {
        &self.config
    }

    /// The resolved inner virtual server
    pub fn server(&self) -> ServerHandle {
        self.server
    }

    /// The loaded TLS profile
    pub fn profile(&self) -> &TlsProfile {
        &self.profile
    }

    /// Attribute identifiers resolved at instantiation
    pub fn attrs(&self) -> &WellKnown {
        &self.attrs
    }

    /// Build this worker thread's crypto context
    ///
    /// Called once at thread start; failure is fatal for that thread.
    pub fn thread_instantiate(&self) -> Result<ThreadContext, TlsError> {
        self.profile.new_thread_context()
    }
}
