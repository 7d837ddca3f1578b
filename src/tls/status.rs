//! Handshake status reporting
//!
//! The status enum is the only window the session controller has into the
//! handshake engine. Engines may report values outside the recognized set;
//! the dispatcher treats those as failures, never as progress.

use std::fmt;

/// Status of a session's TLS handshake after consuming one inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// The engine was driven in a state it cannot make sense of
    Invalid,
    /// The TLS exchange failed (alert, validation error, corrupt record)
    Fail,
    /// The packet was consumed; the exchange needs more round trips
    Handled,
    /// The handshake completed and the channel is fully negotiated
    Established,
    /// A complete application-data record was received and decrypted
    RecordRecvComplete,
    /// A status value this module does not recognize
    Unknown(u8),
}

impl HandshakeStatus {
    /// Status name, matching what the debug log prints
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStatus::Invalid => "invalid",
            HandshakeStatus::Fail => "fail",
            HandshakeStatus::Handled => "handled",
            HandshakeStatus::Established => "established",
            HandshakeStatus::RecordRecvComplete => "record-recv-complete",
            HandshakeStatus::Unknown(_) => "<unknown>",
        }
    }

    /// Whether this status is one of the two explicit error values
    pub fn is_error(&self) -> bool {
        matches!(self, HandshakeStatus::Invalid | HandshakeStatus::Fail)
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStatus::Unknown(code) => write!(f, "<unknown:{}>", code),
            other => f.write_str(other.as_str()),
        }
    }
}
