// The handshake state machine: drives the ordered three-act exchange and,
// on success, yields the two directional transport cipher states.

use secp256k1::{PublicKey, SecretKey};
use tracing::debug;

use crate::crypto::cipher::{CipherState, TAG_SIZE};
use crate::crypto::keys::{
    ecdh, EphemeralKeyPair, EphemeralKeyProvider, OsRngProvider, StaticKeyPair, PUBKEY_SIZE,
};
use crate::error::{PeerLinkError, Result};
use crate::handshake::symmetric::SymmetricState;
use crate::handshake::{HandshakeState, Role};
use crate::record::RecordLayer;

/// Act One: 1 version byte + 33-byte ephemeral key + 16-byte tag.
pub const ACT_ONE_SIZE: usize = 1 + PUBKEY_SIZE + TAG_SIZE;

/// Act Two: same shape as Act One, sent by the responder.
pub const ACT_TWO_SIZE: usize = 1 + PUBKEY_SIZE + TAG_SIZE;

/// Act Three: 1 version byte + 49-byte encrypted identity block + 16-byte tag.
pub const ACT_THREE_SIZE: usize = 1 + PUBKEY_SIZE + TAG_SIZE + TAG_SIZE;

/// The only handshake version currently defined.
pub const HANDSHAKE_VERSION: u8 = 0;

/// A single-use handshake session.
///
/// One machine is created per connection attempt and discarded when the
/// connection closes; no state survives across connections. The acts must be
/// driven in protocol order for the machine's role, and any failure is
/// terminal: the machine refuses all further operations.
pub struct HandshakeMachine {
    role: Role,
    state: HandshakeState,
    symmetric: SymmetricState,
    local_static: StaticKeyPair,
    local_ephemeral: Option<EphemeralKeyPair>,
    remote_ephemeral: Option<PublicKey>,
    remote_static: Option<PublicKey>,
    provider: Box<dyn EphemeralKeyProvider>,
    send: Option<CipherState>,
    recv: Option<CipherState>,
}

impl HandshakeMachine {
    /// Create the dialing side. The responder's static identity must be
    /// known in advance; the handshake proves the responder actually holds
    /// the matching private key.
    pub fn initiator(local_static: StaticKeyPair, remote_static: PublicKey) -> Self {
        Self {
            role: Role::Initiator,
            state: HandshakeState::Created,
            symmetric: SymmetricState::new(&remote_static),
            local_static,
            local_ephemeral: None,
            remote_ephemeral: None,
            remote_static: Some(remote_static),
            provider: Box::new(OsRngProvider),
            send: None,
            recv: None,
        }
    }

    /// Create the accepting side. The initiator's identity is unknown until
    /// Act Three authenticates it.
    pub fn responder(local_static: StaticKeyPair) -> Self {
        let symmetric = SymmetricState::new(&local_static.public_key());
        Self {
            role: Role::Responder,
            state: HandshakeState::Created,
            symmetric,
            local_static,
            local_ephemeral: None,
            remote_ephemeral: None,
            remote_static: None,
            provider: Box::new(OsRngProvider),
            send: None,
            recv: None,
        }
    }

    /// Replace the ephemeral key source, e.g. with a fixed-key provider for
    /// deterministic handshake transcripts in tests.
    pub fn with_ephemeral_provider(mut self, provider: Box<dyn EphemeralKeyProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Current progress of the handshake.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// This machine's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The authenticated remote identity. For the responder this is only
    /// available once Act Three has been verified.
    pub fn remote_static(&self) -> Option<PublicKey> {
        self.remote_static
    }

    // ── Act One ─────────────────────────────────────────────────────────

    /// Initiator: produce the 50-byte Act One record.
    pub fn gen_act_one(&mut self) -> Result<[u8; ACT_ONE_SIZE]> {
        self.expect(Role::Initiator, HandshakeState::Created, "gen_act_one")?;
        match self.do_gen_act_one() {
            Ok(act) => {
                self.state = HandshakeState::ActOneExchanged;
                Ok(act)
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_gen_act_one(&mut self) -> Result<[u8; ACT_ONE_SIZE]> {
        let remote_static = self.remote_static_required("gen_act_one")?;
        let ephemeral = self.provider.fresh_ephemeral()?;
        let ephemeral_pub = ephemeral.public_key().serialize();

        self.symmetric.mix_hash(&ephemeral_pub);
        let shared = ecdh(ephemeral.secret_key(), &remote_static);
        self.symmetric.mix_key(&shared);
        let tag = self.symmetric.encrypt_and_hash(&[])?;

        let mut act = [0u8; ACT_ONE_SIZE];
        act[0] = HANDSHAKE_VERSION;
        act[1..1 + PUBKEY_SIZE].copy_from_slice(&ephemeral_pub);
        act[1 + PUBKEY_SIZE..].copy_from_slice(&tag);

        self.local_ephemeral = Some(ephemeral);
        Ok(act)
    }

    /// Responder: verify the 50-byte Act One record (first authentication
    /// checkpoint).
    pub fn recv_act_one(&mut self, act: &[u8]) -> Result<()> {
        self.expect(Role::Responder, HandshakeState::Created, "recv_act_one")?;
        match self.do_recv_act_one(act) {
            Ok(()) => {
                self.state = HandshakeState::ActOneExchanged;
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_recv_act_one(&mut self, act: &[u8]) -> Result<()> {
        let (remote_ephemeral, tag) = parse_key_act(act, ACT_ONE_SIZE)?;

        self.symmetric.mix_hash(&remote_ephemeral.serialize());
        let shared = ecdh(self.local_static.secret_key(), &remote_ephemeral);
        self.symmetric.mix_key(&shared);
        self.symmetric.decrypt_and_hash(tag)?;

        self.remote_ephemeral = Some(remote_ephemeral);
        Ok(())
    }

    // ── Act Two ─────────────────────────────────────────────────────────

    /// Responder: produce the 50-byte Act Two record.
    pub fn gen_act_two(&mut self) -> Result<[u8; ACT_TWO_SIZE]> {
        self.expect(Role::Responder, HandshakeState::ActOneExchanged, "gen_act_two")?;
        match self.do_gen_act_two() {
            Ok(act) => {
                self.state = HandshakeState::ActTwoExchanged;
                Ok(act)
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_gen_act_two(&mut self) -> Result<[u8; ACT_TWO_SIZE]> {
        let remote_ephemeral = self.remote_ephemeral_required("gen_act_two")?;
        let ephemeral = self.provider.fresh_ephemeral()?;
        let ephemeral_pub = ephemeral.public_key().serialize();

        self.symmetric.mix_hash(&ephemeral_pub);
        let shared = ecdh(ephemeral.secret_key(), &remote_ephemeral);
        self.symmetric.mix_key(&shared);
        let tag = self.symmetric.encrypt_and_hash(&[])?;

        let mut act = [0u8; ACT_TWO_SIZE];
        act[0] = HANDSHAKE_VERSION;
        act[1..1 + PUBKEY_SIZE].copy_from_slice(&ephemeral_pub);
        act[1 + PUBKEY_SIZE..].copy_from_slice(&tag);

        self.local_ephemeral = Some(ephemeral);
        Ok(act)
    }

    /// Initiator: verify the 50-byte Act Two record (second authentication
    /// checkpoint).
    pub fn recv_act_two(&mut self, act: &[u8]) -> Result<()> {
        self.expect(Role::Initiator, HandshakeState::ActOneExchanged, "recv_act_two")?;
        match self.do_recv_act_two(act) {
            Ok(()) => {
                self.state = HandshakeState::ActTwoExchanged;
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_recv_act_two(&mut self, act: &[u8]) -> Result<()> {
        let (remote_ephemeral, tag) = parse_key_act(act, ACT_TWO_SIZE)?;
        let ephemeral_secret = self.local_ephemeral_secret("recv_act_two")?;

        self.symmetric.mix_hash(&remote_ephemeral.serialize());
        let shared = ecdh(&ephemeral_secret, &remote_ephemeral);
        self.symmetric.mix_key(&shared);
        self.symmetric.decrypt_and_hash(tag)?;

        self.remote_ephemeral = Some(remote_ephemeral);
        Ok(())
    }

    // ── Act Three ───────────────────────────────────────────────────────

    /// Initiator: produce the 66-byte Act Three record and derive the
    /// directional transport keys.
    pub fn gen_act_three(&mut self) -> Result<[u8; ACT_THREE_SIZE]> {
        self.expect(Role::Initiator, HandshakeState::ActTwoExchanged, "gen_act_three")?;
        match self.do_gen_act_three() {
            Ok(act) => {
                self.state = HandshakeState::Complete;
                debug!(role = %self.role, "handshake complete");
                Ok(act)
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_gen_act_three(&mut self) -> Result<[u8; ACT_THREE_SIZE]> {
        let remote_ephemeral = self.remote_ephemeral_required("gen_act_three")?;

        // The identity block rides under the Act Two temporary key; its
        // nonce is 1 because the Act Two tag consumed nonce 0.
        let identity =
            self.symmetric.encrypt_and_hash(&self.local_static.public_key_bytes())?;

        let shared = ecdh(self.local_static.secret_key(), &remote_ephemeral);
        self.symmetric.mix_key(&shared);
        let tag = self.symmetric.encrypt_and_hash(&[])?;

        let (send, recv) = self.symmetric.split();
        self.send = Some(send);
        self.recv = Some(recv);
        self.local_ephemeral = None;

        let mut act = [0u8; ACT_THREE_SIZE];
        act[0] = HANDSHAKE_VERSION;
        act[1..1 + PUBKEY_SIZE + TAG_SIZE].copy_from_slice(&identity);
        act[1 + PUBKEY_SIZE + TAG_SIZE..].copy_from_slice(&tag);
        Ok(act)
    }

    /// Responder: verify the 66-byte Act Three record (third and fourth
    /// authentication checkpoints), learning the initiator's identity, and
    /// derive the directional transport keys.
    pub fn recv_act_three(&mut self, act: &[u8]) -> Result<()> {
        self.expect(Role::Responder, HandshakeState::ActTwoExchanged, "recv_act_three")?;
        match self.do_recv_act_three(act) {
            Ok(()) => {
                self.state = HandshakeState::Complete;
                debug!(role = %self.role, "handshake complete");
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn do_recv_act_three(&mut self, act: &[u8]) -> Result<()> {
        if act.len() != ACT_THREE_SIZE {
            return Err(PeerLinkError::BadRecordLength {
                expected: ACT_THREE_SIZE,
                got: act.len(),
            });
        }
        if act[0] != HANDSHAKE_VERSION {
            return Err(PeerLinkError::UnsupportedVersion(act[0]));
        }

        let identity_block = &act[1..1 + PUBKEY_SIZE + TAG_SIZE];
        let closing_tag = &act[1 + PUBKEY_SIZE + TAG_SIZE..];

        // This is the point at which the responder first learns who it is
        // talking to.
        let remote_static_bytes = self.symmetric.decrypt_and_hash(identity_block)?;
        let remote_static = PublicKey::from_slice(&remote_static_bytes)
            .map_err(|_| PeerLinkError::InvalidPublicKey)?;

        let ephemeral_secret = self.local_ephemeral_secret("recv_act_three")?;
        let shared = ecdh(&ephemeral_secret, &remote_static);
        self.symmetric.mix_key(&shared);
        self.symmetric.decrypt_and_hash(closing_tag)?;

        // Mirrored key assignment relative to the initiator.
        let (their_send, their_recv) = self.symmetric.split();
        self.send = Some(their_recv);
        self.recv = Some(their_send);
        self.remote_static = Some(remote_static);
        self.local_ephemeral = None;
        Ok(())
    }

    // ── Completion ──────────────────────────────────────────────────────

    /// Consume a completed machine, yielding `(send, recv)` cipher states.
    pub fn into_cipher_states(mut self) -> Result<(CipherState, CipherState)> {
        if self.state != HandshakeState::Complete {
            return Err(PeerLinkError::InvalidState {
                op: "into_cipher_states",
                state: self.state.label(),
            });
        }
        match (self.send.take(), self.recv.take()) {
            (Some(send), Some(recv)) => Ok((send, recv)),
            _ => Err(PeerLinkError::InvalidState {
                op: "into_cipher_states",
                state: self.state.label(),
            }),
        }
    }

    /// Consume a completed machine, yielding a ready record layer.
    pub fn into_record_layer(self) -> Result<RecordLayer> {
        let (send, recv) = self.into_cipher_states()?;
        Ok(RecordLayer::new(send, recv))
    }

    // ── Internal guards ─────────────────────────────────────────────────

    fn expect(&self, role: Role, state: HandshakeState, op: &'static str) -> Result<()> {
        if self.role != role || self.state != state {
            return Err(PeerLinkError::InvalidState {
                op,
                state: self.state.label(),
            });
        }
        Ok(())
    }

    /// Record a terminal failure; the machine accepts no further acts.
    fn fail<T>(&mut self, err: PeerLinkError) -> Result<T> {
        self.state = HandshakeState::Failed;
        Err(err)
    }

    fn remote_static_required(&self, op: &'static str) -> Result<PublicKey> {
        self.remote_static.ok_or(PeerLinkError::InvalidState {
            op,
            state: self.state.label(),
        })
    }

    fn remote_ephemeral_required(&self, op: &'static str) -> Result<PublicKey> {
        self.remote_ephemeral.ok_or(PeerLinkError::InvalidState {
            op,
            state: self.state.label(),
        })
    }

    fn local_ephemeral_secret(&self, op: &'static str) -> Result<SecretKey> {
        self.local_ephemeral
            .as_ref()
            .map(|e| *e.secret_key())
            .ok_or(PeerLinkError::InvalidState {
                op,
                state: self.state.label(),
            })
    }
}

/// Parse a version-prefixed `0x00 ‖ pubkey ‖ tag` act, returning the peer's
/// key and the trailing tag bytes.
fn parse_key_act(act: &[u8], expected_len: usize) -> Result<(PublicKey, &[u8])> {
    if act.len() != expected_len {
        return Err(PeerLinkError::BadRecordLength {
            expected: expected_len,
            got: act.len(),
        });
    }
    if act[0] != HANDSHAKE_VERSION {
        return Err(PeerLinkError::UnsupportedVersion(act[0]));
    }
    let key = PublicKey::from_slice(&act[1..1 + PUBKEY_SIZE])
        .map_err(|_| PeerLinkError::InvalidPublicKey)?;
    Ok((key, &act[1 + PUBKEY_SIZE..]))
}
