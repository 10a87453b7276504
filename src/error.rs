// PeerLink error types

use thiserror::Error;

/// Top-level error type for the PeerLink crate.
///
/// Every failure is fatal for the session it occurred on: the handshake
/// machine or record layer that produced it must be discarded and a fresh
/// handshake run over a new connection. Retry policy lives in the caller.
#[derive(Debug, Error)]
pub enum PeerLinkError {
    // ── Protocol errors ─────────────────────────────────────────────────
    #[error("unsupported handshake version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("handshake record must be {expected} bytes, got {got}")]
    BadRecordLength { expected: usize, got: usize },

    // ── Authentication errors ───────────────────────────────────────────
    /// An AEAD tag failed to verify. Deliberately carries no detail about
    /// which checkpoint or record block failed, so the error is not usable
    /// as an oracle by the remote peer.
    #[error("message authentication failed")]
    Authentication,

    // ── Size errors ─────────────────────────────────────────────────────
    #[error("plaintext length {size} exceeds maximum record size {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("input too short: need {need} bytes, have {have}")]
    InputTooShort { need: usize, have: usize },

    // ── State machine errors ────────────────────────────────────────────
    #[error("{op} is not valid in handshake state {state}")]
    InvalidState { op: &'static str, state: &'static str },

    // ── Key material errors ─────────────────────────────────────────────
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    // ── Transport errors ────────────────────────────────────────────────
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, PeerLinkError>;
