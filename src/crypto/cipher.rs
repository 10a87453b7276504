// ChaCha20-Poly1305 cipher state with a counter nonce and automatic
// key rotation every KEY_ROTATION_INTERVAL messages.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::kdf;
use crate::error::{PeerLinkError, Result};

/// Size of a symmetric cipher key.
pub const KEY_SIZE: usize = 32;

/// Size of the Poly1305 authentication tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Number of messages a single key may protect in one direction before a
/// fresh key is derived. Fixed by the governing wire specification; a
/// different value silently breaks interoperability.
pub const KEY_ROTATION_INTERVAL: u64 = 1000;

/// One direction's AEAD state: a 32-byte key, a monotonic nonce counter,
/// and the rotation salt the next key is derived from.
///
/// The nonce is not internally synchronized; callers must serialize all
/// operations on one direction. Rotation is a post-condition of
/// [`encrypt`](Self::encrypt) / [`decrypt`](Self::decrypt), never invoked by
/// the caller, and each direction rotates on its own counter.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherState {
    key: [u8; KEY_SIZE],
    salt: [u8; KEY_SIZE],
    nonce: u64,
    has_key: bool,
}

impl CipherState {
    /// A state with no key installed. Per the Noise convention, encryption
    /// under an empty state is the identity transform; this is only
    /// reachable inside the handshake before the first key derivation.
    pub(crate) fn empty() -> Self {
        Self {
            key: [0u8; KEY_SIZE],
            salt: [0u8; KEY_SIZE],
            nonce: 0,
            has_key: false,
        }
    }

    /// Install a temporary handshake key. The rotation salt stays zero:
    /// handshake keys never live long enough to rotate.
    pub(crate) fn initialize_key(&mut self, key: [u8; KEY_SIZE]) {
        self.key.zeroize();
        self.key = key;
        self.nonce = 0;
        self.has_key = true;
    }

    /// Build a transport cipher whose rotation chain is seeded with the
    /// final handshake chaining key.
    pub(crate) fn with_salt(salt: [u8; KEY_SIZE], key: [u8; KEY_SIZE]) -> Self {
        Self {
            key,
            salt,
            nonce: 0,
            has_key: true,
        }
    }

    /// Current nonce counter value (exposed for tests and diagnostics).
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Authenticated encryption of `plaintext` bound to `ad`, returning
    /// ciphertext with the 16-byte tag appended. Advances the nonce and
    /// rotates the key when the rotation interval is reached.
    pub fn encrypt(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key {
            return Ok(plaintext.to_vec());
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = nonce_bytes(self.nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: ad })
            .map_err(|_| PeerLinkError::Authentication)?;

        self.advance();
        Ok(ciphertext)
    }

    /// Authenticated decryption of `ciphertext` (tag included) bound to
    /// `ad`. The nonce advances only on success, so a failed decryption
    /// leaves the state untouched.
    pub fn decrypt(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key {
            return Ok(ciphertext.to_vec());
        }
        if ciphertext.len() < TAG_SIZE {
            return Err(PeerLinkError::InputTooShort {
                need: TAG_SIZE,
                have: ciphertext.len(),
            });
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = nonce_bytes(self.nonce);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad: ad })
            .map_err(|_| PeerLinkError::Authentication)?;

        self.advance();
        Ok(plaintext)
    }

    fn advance(&mut self) {
        self.nonce += 1;
        if self.nonce == KEY_ROTATION_INTERVAL {
            self.rotate_key();
        }
    }

    /// Derive the next (salt, key) pair from the current ones and reset the
    /// nonce. The outgoing key is wiped.
    fn rotate_key(&mut self) {
        let (salt, key) = kdf::derive_pair(&self.salt, &self.key);
        self.key.zeroize();
        self.key = key;
        self.salt = salt;
        self.nonce = 0;
        trace!("cipher key rotated");
    }
}

/// 96-bit AEAD nonce: 4 zero bytes followed by the 64-bit counter,
/// little-endian, as the wire specification encodes it.
fn nonce_bytes(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&counter.to_le_bytes());
    nonce
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("nonce", &self.nonce)
            .field("has_key", &self.has_key)
            .field("key", &"[redacted]")
            .finish()
    }
}
