// secp256k1 key material: static identity keys, per-handshake ephemerals,
// and the ECDH operation the handshake derives its shared secrets from.

use rand::rngs::OsRng;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::error::{PeerLinkError, Result};

/// Size of a compressed secp256k1 public key on the wire.
pub const PUBKEY_SIZE: usize = 33;

/// Long-lived identity key pair representing a peer's persistent network
/// identity. Owned by the caller and only read by this crate.
#[derive(Clone)]
pub struct StaticKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl StaticKeyPair {
    /// Generate a new identity key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::signing_only();
        let secret = SecretKey::new(&mut OsRng);
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self { secret, public }
    }

    /// Build from existing 32-byte secret key material.
    ///
    /// Rejects scalars outside the curve order (including all-zero bytes).
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| PeerLinkError::KeyGeneration(e.to_string()))?;
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    /// The public half of the identity.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// The compressed 33-byte wire encoding of the public key.
    pub fn public_key_bytes(&self) -> [u8; PUBKEY_SIZE] {
        self.public.serialize()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

/// Single-use key pair generated per handshake attempt. Consumed by the
/// final key derivation and never persisted.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh ephemeral from the OS CSPRNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::signing_only();
        let secret = SecretKey::new(&mut OsRng);
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self { secret, public }
    }

    /// Build from existing secret bytes (deterministic tests).
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| PeerLinkError::KeyGeneration(e.to_string()))?;
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

/// Source of single-use key pairs for the handshake.
///
/// The production implementation draws from the OS CSPRNG; tests inject a
/// provider returning fixed keys so handshake transcripts are reproducible
/// byte for byte.
pub trait EphemeralKeyProvider: Send {
    /// Supply one fresh key pair. Called exactly once per act generated.
    fn fresh_ephemeral(&mut self) -> Result<EphemeralKeyPair>;
}

/// Default [`EphemeralKeyProvider`] backed by the OS CSPRNG.
#[derive(Default)]
pub struct OsRngProvider;

impl EphemeralKeyProvider for OsRngProvider {
    fn fresh_ephemeral(&mut self) -> Result<EphemeralKeyPair> {
        Ok(EphemeralKeyPair::generate())
    }
}

/// secp256k1 ECDH as the wire protocol defines it: SHA-256 of the compressed
/// serialization of the shared point (the libsecp256k1 default hash).
pub(crate) fn ecdh(secret: &SecretKey, public: &PublicKey) -> [u8; 32] {
    SharedSecret::new(public, secret).secret_bytes()
}
