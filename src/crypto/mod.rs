// Cryptographic building blocks: key material, HKDF split, AEAD cipher state.

pub mod cipher;
pub mod kdf;
pub mod keys;
