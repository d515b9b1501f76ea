//! Salted password hashing via PBKDF2-HMAC-SHA256 (ring).
//!
//! Hashes are stored as `iterations:base64(salt):base64(hash)` so the
//! iteration count can be raised later without invalidating existing
//! records.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{StoreError, StoreResult};

/// OWASP 2023 recommendation for PBKDF2-HMAC-SHA256.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hashes new passwords with a fixed iteration count and verifies stored
/// hashes with whatever count they were created with.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: NonZeroU32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: NonZeroU32::MIN.saturating_add(DEFAULT_ITERATIONS - 1),
        }
    }
}

impl PasswordHasher {
    /// Create a hasher using `iterations` rounds for new hashes.
    pub fn new(iterations: u32) -> StoreResult<Self> {
        let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
            StoreError::InvalidArgument("pbkdf2 iterations must be non-zero".into())
        })?;
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> StoreResult<String> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| StoreError::InvalidArgument("failed to generate random salt".into()))?;

        let mut hash = [0u8; KEY_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!(
            "{}:{}:{}",
            self.iterations,
            BASE64.encode(salt),
            BASE64.encode(hash)
        ))
    }

    /// Check `password` against a stored hash. Comparison is constant-time.
    pub fn verify(&self, password: &str, stored: &str) -> StoreResult<bool> {
        let mut parts = stored.splitn(3, ':');
        let (Some(iterations), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(StoreError::InvalidArgument("malformed password hash".into()));
        };

        let iterations = iterations
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| StoreError::InvalidArgument("invalid iteration count".into()))?;
        let salt = BASE64
            .decode(salt)
            .map_err(|e| StoreError::InvalidArgument(format!("invalid salt encoding: {e}")))?;
        let expected = BASE64
            .decode(expected)
            .map_err(|e| StoreError::InvalidArgument(format!("invalid hash encoding: {e}")))?;

        Ok(pbkdf2::verify(
            PBKDF2_ALG,
            iterations,
            &salt,
            password.as_bytes(),
            &expected,
        )
        .is_ok())
    }
}
