// Three-act mutually-authenticating handshake.
//
//   Initiator                           Responder
//     |---- Act One   (50 B) ---->|
//     |<--- Act Two   (50 B) -----|
//     |---- Act Three (66 B) ---->|
//     |===== encrypted records ====|
//
// The initiator must know the responder's static public key in advance; the
// responder learns the initiator's identity only from Act Three's encrypted
// identity block. On completion each side holds two independent directional
// cipher states.

pub mod machine;
pub(crate) mod symmetric;

use std::fmt;

pub use machine::{HandshakeMachine, ACT_ONE_SIZE, ACT_THREE_SIZE, ACT_TWO_SIZE};

/// Which side of the handshake this machine drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// We dialed the connection and know the remote static key up front.
    Initiator,
    /// We accepted the connection; the peer's identity arrives in Act Three.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// Handshake progress. Transitions run in one direction only; any
/// verification or format failure lands in the terminal `Failed` state and
/// the machine must be discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Created,
    ActOneExchanged,
    ActTwoExchanged,
    Complete,
    Failed,
}

impl HandshakeState {
    pub fn label(self) -> &'static str {
        match self {
            HandshakeState::Created => "created",
            HandshakeState::ActOneExchanged => "act-one-exchanged",
            HandshakeState::ActTwoExchanged => "act-two-exchanged",
            HandshakeState::Complete => "complete",
            HandshakeState::Failed => "failed",
        }
    }
}
