// apitoken: Argon2id Token Codec
//
// Tokens are 32 characters drawn uniformly from the Base62 alphabet using the
// thread-local CSPRNG. Hashes are Argon2id PHC strings with a fresh salt per
// call, so the cost parameters travel with each stored hash and verification
// keeps working after the configured cost changes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use zeroize::Zeroizing;

use super::{CodecError, TokenCodec};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Number of characters in a raw service token (log2(62^32) ≈ 190 bits).
pub const SECRET_LEN: usize = 32;

/// Digits, uppercase and lowercase ASCII letters.
pub const SECRET_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

// OWASP baseline for Argon2id: m=19456 (19 MiB), t=2, p=1.
const DEFAULT_M_COST: u32 = 19_456;
const DEFAULT_T_COST: u32 = 2;
const DEFAULT_P_COST: u32 = 1;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Argon2id cost parameters used for newly created hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_M_COST,
            iterations: DEFAULT_T_COST,
            parallelism: DEFAULT_P_COST,
        }
    }
}

// ─── Codec ───────────────────────────────────────────────────────────────────

/// Production codec: Base62 tokens, Argon2id hashes.
#[derive(Clone)]
pub struct Argon2Codec {
    argon2: Argon2<'static>,
}

impl Argon2Codec {
    /// Build a codec with the given cost. Fails if Argon2 rejects the parameters.
    pub fn new(params: HashParams) -> Result<Self, CodecError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| CodecError::Params(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Codec {
    fn default() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }
}

impl std::fmt::Debug for Argon2Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Codec").finish_non_exhaustive()
    }
}

impl TokenCodec for Argon2Codec {
    fn generate_secret(&self) -> Zeroizing<String> {
        let mut rng = rand::rng();
        let secret: String = (0..SECRET_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SECRET_ALPHABET.len());
                SECRET_ALPHABET[idx] as char
            })
            .collect();
        Zeroizing::new(secret)
    }

    fn hash(&self, secret: &str) -> Result<String, CodecError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CodecError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Stored hash is not a valid PHC string");
                return false;
            }
        };

        // Cost parameters come from the PHC string, not from `self`.
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
