// PeerLink — encrypted, mutually-authenticated transport for peer
// connections in a payment-channel network.
//
//   Initiator                           Responder
//     |---- Act One   (50 B) ---->|
//     |<--- Act Two   (50 B) -----|
//     |---- Act Three (66 B) ---->|
//     |===== encrypted records ====|
//
// A `HandshakeMachine` drives the three-act exchange over an
// unauthenticated byte stream: both sides prove possession of their static
// identity keys and derive two directional symmetric keys no observer can
// recover. A `RecordLayer` built from those keys then frames all
// application traffic as authenticated, confidentiality-protected records,
// rotating each direction's key every 1000 messages.
//
// Dialing, retries, message semantics, and key storage are the caller's
// concern; this crate only secures one byte stream.

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod record;

// Re-export key types at crate root for convenience.
pub use crypto::cipher::{CipherState, KEY_ROTATION_INTERVAL, TAG_SIZE};
pub use crypto::keys::{
    EphemeralKeyPair, EphemeralKeyProvider, OsRngProvider, StaticKeyPair, PUBKEY_SIZE,
};
pub use error::{PeerLinkError, Result};
pub use handshake::{HandshakeMachine, HandshakeState, Role};
pub use record::{RecordLayer, RecordReader, RecordWriter, MAX_RECORD_SIZE};

// Callers need the curve types to carry peer identities around.
pub use secp256k1;
