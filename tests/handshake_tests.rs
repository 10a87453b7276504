// Integration tests for the three-act handshake: interop vectors,
// tamper rejection, identity checks, and state-machine discipline.

use std::io::Cursor;

use peerlink::handshake::machine::{ACT_ONE_SIZE, ACT_THREE_SIZE, ACT_TWO_SIZE};
use peerlink::{
    EphemeralKeyPair, EphemeralKeyProvider, HandshakeMachine, HandshakeState, PeerLinkError,
    RecordLayer, StaticKeyPair,
};

/// Provider handing out one fixed ephemeral key, for reproducible
/// handshake transcripts.
struct FixedEphemeral([u8; 32]);

impl EphemeralKeyProvider for FixedEphemeral {
    fn fresh_ephemeral(&mut self) -> peerlink::Result<EphemeralKeyPair> {
        EphemeralKeyPair::from_secret_bytes(self.0)
    }
}

/// Drive a full handshake between two machines with random identities and
/// return their record layers.
fn connected_pair() -> (RecordLayer, RecordLayer) {
    let initiator_static = StaticKeyPair::generate();
    let responder_static = StaticKeyPair::generate();

    let mut initiator =
        HandshakeMachine::initiator(initiator_static, responder_static.public_key());
    let mut responder = HandshakeMachine::responder(responder_static);

    let act_one = initiator.gen_act_one().unwrap();
    responder.recv_act_one(&act_one).unwrap();
    let act_two = responder.gen_act_two().unwrap();
    initiator.recv_act_two(&act_two).unwrap();
    let act_three = initiator.gen_act_three().unwrap();
    responder.recv_act_three(&act_three).unwrap();

    (
        initiator.into_record_layer().unwrap(),
        responder.into_record_layer().unwrap(),
    )
}

/// Deterministic machines using the governing specification's fixed keys,
/// so the published act vectors apply.
fn vector_machines() -> (HandshakeMachine, HandshakeMachine) {
    let initiator_static = StaticKeyPair::from_secret_bytes([0x11; 32]).unwrap();
    let responder_static = StaticKeyPair::from_secret_bytes([0x21; 32]).unwrap();

    let initiator =
        HandshakeMachine::initiator(initiator_static, responder_static.public_key())
            .with_ephemeral_provider(Box::new(FixedEphemeral([0x12; 32])));
    let responder = HandshakeMachine::responder(responder_static)
        .with_ephemeral_provider(Box::new(FixedEphemeral([0x22; 32])));
    (initiator, responder)
}

// ── Interop regression vectors ───────────────────────────────────────────

#[test]
fn act_vectors_reproduce() {
    let (mut initiator, mut responder) = vector_machines();

    let act_one = initiator.gen_act_one().unwrap();
    assert_eq!(
        hex::encode(act_one),
        "00036360e856310ce5d294e8be33fc807077dc56ac80d95d9cd4ddbd21325eff\
         73f70df6086551151f58b8afe6c195782c6a"
    );
    responder.recv_act_one(&act_one).unwrap();

    let act_two = responder.gen_act_two().unwrap();
    assert_eq!(
        hex::encode(act_two),
        "0002466d7fcae563e5cb09a0d1870bb580344804617879a14949cf22285f1bae\
         3f276e2470b93aac583c9ef6eafca3f730ae"
    );
    initiator.recv_act_two(&act_two).unwrap();

    let act_three = initiator.gen_act_three().unwrap();
    assert_eq!(
        hex::encode(act_three),
        "00b9e3a702e93e3a9948c2ed6e5fd7590a6e1c3a0344cfc9d5b57357049aa223\
         55361aa02e55a8fc28fef5bd6d71ad0c38228dc68b1c466263b47fdf31e560e1\
         39ba"
    );
    responder.recv_act_three(&act_three).unwrap();

    // The responder learned and authenticated the initiator's identity.
    assert_eq!(
        hex::encode(responder.remote_static().unwrap().serialize()),
        "034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa"
    );
    assert_eq!(initiator.state(), HandshakeState::Complete);
    assert_eq!(responder.state(), HandshakeState::Complete);
}

// ── End-to-end scenario ──────────────────────────────────────────────────

#[test]
fn ping_pong_roundtrip() {
    let (mut initiator, mut responder) = connected_pair();

    let mut wire = Vec::new();
    initiator.write_message(b"ping").unwrap();
    initiator.flush(&mut wire).unwrap();
    assert_eq!(
        responder.read_message(&mut Cursor::new(wire)).unwrap(),
        b"ping"
    );

    let mut wire = Vec::new();
    responder.write_message(b"pong").unwrap();
    responder.flush(&mut wire).unwrap();
    assert_eq!(
        initiator.read_message(&mut Cursor::new(wire)).unwrap(),
        b"pong"
    );
}

#[test]
fn mismatched_responder_identity_never_completes() {
    let initiator_static = StaticKeyPair::generate();
    let responder_static = StaticKeyPair::generate();
    let unrelated = StaticKeyPair::generate();

    // The initiator expects a different responder than the one it reaches.
    let mut initiator = HandshakeMachine::initiator(initiator_static, unrelated.public_key());
    let mut responder = HandshakeMachine::responder(responder_static);

    let act_one = initiator.gen_act_one().unwrap();
    let err = responder.recv_act_one(&act_one).unwrap_err();
    assert!(matches!(err, PeerLinkError::Authentication));
    assert_eq!(responder.state(), HandshakeState::Failed);
}

// ── Tamper rejection ─────────────────────────────────────────────────────

#[test]
fn flipping_any_bit_in_any_act_is_rejected() {
    // Byte 0 is the version byte; every other flipped byte must surface as
    // an authentication or point-encoding failure, never success or panic.
    for index in 0..ACT_ONE_SIZE {
        let (mut initiator, mut responder) = vector_machines();
        let mut act_one = initiator.gen_act_one().unwrap();
        act_one[index] ^= 0x01;
        assert!(responder.recv_act_one(&act_one).is_err(), "byte {index}");
        assert_eq!(responder.state(), HandshakeState::Failed);
    }

    for index in 0..ACT_TWO_SIZE {
        let (mut initiator, mut responder) = vector_machines();
        responder.recv_act_one(&initiator.gen_act_one().unwrap()).unwrap();
        let mut act_two = responder.gen_act_two().unwrap();
        act_two[index] ^= 0x01;
        assert!(initiator.recv_act_two(&act_two).is_err(), "byte {index}");
        assert_eq!(initiator.state(), HandshakeState::Failed);
    }

    for index in 0..ACT_THREE_SIZE {
        let (mut initiator, mut responder) = vector_machines();
        responder.recv_act_one(&initiator.gen_act_one().unwrap()).unwrap();
        initiator.recv_act_two(&responder.gen_act_two().unwrap()).unwrap();
        let mut act_three = initiator.gen_act_three().unwrap();
        act_three[index] ^= 0x01;
        assert!(responder.recv_act_three(&act_three).is_err(), "byte {index}");
        assert_eq!(responder.state(), HandshakeState::Failed);
    }
}

#[test]
fn tampered_tag_is_an_authentication_error() {
    let (mut initiator, mut responder) = vector_machines();
    let mut act_one = initiator.gen_act_one().unwrap();
    act_one[ACT_ONE_SIZE - 1] ^= 0x80;
    assert!(matches!(
        responder.recv_act_one(&act_one).unwrap_err(),
        PeerLinkError::Authentication
    ));
}

#[test]
fn unknown_version_byte_rejected() {
    let (mut initiator, mut responder) = vector_machines();
    let mut act_one = initiator.gen_act_one().unwrap();
    act_one[0] = 0x01;
    assert!(matches!(
        responder.recv_act_one(&act_one).unwrap_err(),
        PeerLinkError::UnsupportedVersion(0x01)
    ));
}

#[test]
fn short_and_oversized_acts_rejected() {
    let (mut initiator, mut responder) = vector_machines();
    let act_one = initiator.gen_act_one().unwrap();

    assert!(matches!(
        responder.recv_act_one(&act_one[..ACT_ONE_SIZE - 1]).unwrap_err(),
        PeerLinkError::BadRecordLength { expected: 50, got: 49 }
    ));
}

#[test]
fn garbage_public_key_rejected() {
    let (_, mut responder) = vector_machines();
    // Valid length and version, but the key bytes are not a curve point.
    let mut act_one = [0u8; ACT_ONE_SIZE];
    act_one[1] = 0x02;
    assert!(matches!(
        responder.recv_act_one(&act_one).unwrap_err(),
        PeerLinkError::InvalidPublicKey
    ));
}

// ── State machine discipline ─────────────────────────────────────────────

#[test]
fn acts_must_run_in_order_for_the_right_role() {
    let (mut initiator, mut responder) = vector_machines();

    // Wrong role.
    assert!(matches!(
        responder.gen_act_one().unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));
    assert!(matches!(
        initiator.gen_act_two().unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));

    // Out of order.
    assert!(matches!(
        initiator.gen_act_three().unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));

    // Repeating a completed act.
    initiator.gen_act_one().unwrap();
    assert!(matches!(
        initiator.gen_act_one().unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));
}

#[test]
fn failed_machine_refuses_further_operations() {
    let (mut initiator, mut responder) = vector_machines();
    let mut act_one = initiator.gen_act_one().unwrap();
    act_one[40] ^= 0xFF;
    assert!(responder.recv_act_one(&act_one).is_err());

    // Even a pristine retry of the same act is refused: the machine is
    // single-use and must be discarded.
    let (mut fresh_initiator, _) = vector_machines();
    let clean_act_one = fresh_initiator.gen_act_one().unwrap();
    assert!(matches!(
        responder.recv_act_one(&clean_act_one).unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));
}

#[test]
fn incomplete_machine_yields_no_cipher_states() {
    let (mut initiator, _) = vector_machines();
    initiator.gen_act_one().unwrap();
    assert!(matches!(
        initiator.into_record_layer().unwrap_err(),
        PeerLinkError::InvalidState { .. }
    ));
}

#[test]
fn responder_identity_unknown_until_act_three() {
    let (mut initiator, mut responder) = vector_machines();
    assert!(responder.remote_static().is_none());

    responder.recv_act_one(&initiator.gen_act_one().unwrap()).unwrap();
    assert!(responder.remote_static().is_none());

    initiator.recv_act_two(&responder.gen_act_two().unwrap()).unwrap();
    responder.recv_act_three(&initiator.gen_act_three().unwrap()).unwrap();
    assert!(responder.remote_static().is_some());
}
