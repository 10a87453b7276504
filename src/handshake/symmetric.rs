// Symmetric handshake state: the running transcript hash and chaining key,
// plus the temporary cipher the current handshake step encrypts under.

use secp256k1::PublicKey;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::cipher::CipherState;
use crate::crypto::kdf;
use crate::error::Result;

/// Protocol identifier seeding the transcript hash and chaining key.
pub const PROTOCOL_NAME: &[u8] = b"Noise_XK_secp256k1_ChaChaPoly_SHA256";

/// Prologue mixed into the transcript before any handshake bytes.
pub const PROLOGUE: &[u8] = b"lightning";

/// Transcript hash `h`, chaining key `ck`, and the temporary cipher state
/// for the current handshake step.
///
/// Both evolve deterministically from the protocol name, the prologue, and
/// every byte exchanged, so any tampering or reordering desynchronizes the
/// two sides and surfaces as a tag failure at the next checkpoint.
pub(crate) struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cipher: CipherState,
}

impl SymmetricState {
    /// Seed `h` and `ck` from the protocol name, then mix the prologue and
    /// the responder's static public key (the pre-message both sides know).
    pub(crate) fn new(responder_static: &PublicKey) -> Self {
        let h: [u8; 32] = Sha256::digest(PROTOCOL_NAME).into();
        let mut state = Self {
            ck: h,
            h,
            cipher: CipherState::empty(),
        };
        state.mix_hash(PROLOGUE);
        state.mix_hash(&responder_static.serialize());
        state
    }

    /// Fold bytes into the transcript: `h = SHA-256(h ‖ data)`.
    pub(crate) fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    /// Fold a DH output into the chaining key and install the derived
    /// temporary key into the step cipher (nonce reset to 0).
    pub(crate) fn mix_key(&mut self, ikm: &[u8; 32]) {
        let (ck, temp) = kdf::derive_pair(&self.ck, ikm);
        self.ck = ck;
        self.cipher.initialize_key(temp);
    }

    /// Encrypt under the step cipher with the transcript hash as associated
    /// data, then fold the ciphertext into the transcript.
    pub(crate) fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let h = self.h;
        let ciphertext = self.cipher.encrypt(&h, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypt under the step cipher with the transcript hash as associated
    /// data; the ciphertext is folded into the transcript only after it
    /// authenticates.
    pub(crate) fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let h = self.h;
        let plaintext = self.cipher.decrypt(&h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Final key derivation: expand the chaining key over empty input into
    /// the two directional transport keys, each seeded with `ck` as its
    /// rotation salt. Wipes the chaining key; the state is spent afterwards.
    pub(crate) fn split(&mut self) -> (CipherState, CipherState) {
        let (k1, k2) = kdf::derive_pair(&self.ck, &[]);
        let first = CipherState::with_salt(self.ck, k1);
        let second = CipherState::with_salt(self.ck, k2);
        self.ck.zeroize();
        (first, second)
    }
}
