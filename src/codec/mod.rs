// apitoken: Codec Module
//
// Mints raw service tokens and turns them into salted Argon2id hashes.
// Raw tokens leave this module exactly once, inside a `Zeroizing` buffer.

mod argon;
mod error;

pub use argon::{Argon2Codec, HashParams, SECRET_ALPHABET, SECRET_LEN};
pub use error::CodecError;

use zeroize::Zeroizing;

/// Secret generation and one-way hashing for service tokens.
pub trait TokenCodec: Send + Sync {
    /// Produce a fresh random token. Never derived from any input.
    fn generate_secret(&self) -> Zeroizing<String>;

    /// Hash a raw token with a per-call random salt.
    fn hash(&self, secret: &str) -> Result<String, CodecError>;

    /// True iff `secret` is the input that produced `hash`.
    /// A malformed hash never verifies.
    fn verify(&self, secret: &str, hash: &str) -> bool;
}
