//! Client-certificate policy resolution
//!
//! A per-request override attribute beats the static configuration: any
//! non-zero value forces a client certificate, zero disables the requirement
//! even when the configuration would require one. Without an override the
//! configured default applies.
//!
//! The result must be resolved exactly once per session, before the handshake
//! object is allocated, because it determines whether the TLS engine will
//! request and validate a peer certificate.

/// Resolve whether this session requires a client certificate
pub fn client_cert_required(override_attr: Option<u32>, static_config: bool) -> bool {
    match override_attr {
        Some(value) => value != 0,
        None => static_config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_nonzero_wins() {
        assert!(client_cert_required(Some(5), false));
        assert!(client_cert_required(Some(1), true));
    }

    #[test]
    fn test_override_zero_disables() {
        assert!(!client_cert_required(Some(0), true));
        assert!(!client_cert_required(Some(0), false));
    }

    #[test]
    fn test_static_config_fallback() {
        assert!(client_cert_required(None, true));
        assert!(!client_cert_required(None, false));
    }
}
