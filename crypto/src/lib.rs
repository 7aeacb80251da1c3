//! Cryptographic toolkit
//!
//! Small, synchronous primitives for application code:
//! - Symmetric encryption behind one [`Cipher`] contract (AES-CBC, AES-GCM)
//!   with hex/base64 transport via [`EncodedCipher`]
//! - ECDH key agreement on NIST P-256, P-384 and P-521
//! - Argon2id password hashing with self-describing encoded hashes
//! - HMAC over any SHA-2 or SHA-3 hash, hex-encoded
//!
//! Key material is held in [`SecretBytes`] and zeroed on drop. Tag and hash
//! comparisons run in constant time.
//!
//! # Example
//!
//! ```rust
//! use cryptokit::{new_aes_gcm, new_password_hasher, PasswordHashParams};
//!
//! let cipher = new_aes_gcm(b"AES256Key-32Characters1234567890", &[0u8; 12])?;
//! let sealed = cipher.encrypt_to_base64(b"exampleplaintext")?;
//! assert_eq!(cipher.decrypt_from_base64(&sealed)?, b"exampleplaintext");
//!
//! let hasher = new_password_hasher(PasswordHashParams {
//!     memory_kib: 256,
//!     iterations: 2,
//!     parallelism: 2,
//!     salt_length: 8,
//!     key_length: 32,
//! });
//! let encoded = hasher.generate("very_easy_password")?;
//! assert!(hasher.compare("very_easy_password", &encoded)?);
//! # Ok::<(), cryptokit::CryptoError>(())
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)
)]

pub mod aes_cbc;
pub mod aes_gcm;
pub mod config;
pub mod constant_time;
pub mod ecdh;
pub mod encryption;
pub mod error;
pub mod mac;
pub mod memory_security;
pub mod password;

pub use aes_cbc::{normalize_iv, AesCbc};
pub use aes_gcm::AesGcm;
pub use config::{CipherAlgorithm, CryptoConfig, KeyEncoding};
pub use ecdh::{from_key_pair, new_ecdh, Ecdh, KeyExchange, NamedCurve, SharedSecret};
pub use encryption::{Cipher, EncodedCipher};
pub use error::{CryptoError, CryptoResult, ErrorKind};
pub use mac::{hmac, hmac_hex, verify_hmac, HashAlgorithm};
pub use memory_security::SecretBytes;
pub use password::{CostLimits, PasswordHashParams, PasswordHasher};

/// AES-CBC cipher with hex/base64 helpers.
///
/// The key selects AES-128/192/256; IVs shorter than 16 bytes are
/// zero-padded (see [`normalize_iv`]).
pub fn new_aes_cbc(key: &[u8], iv: &[u8]) -> CryptoResult<EncodedCipher<AesCbc>> {
    Ok(EncodedCipher::new(AesCbc::new(key, iv)?))
}

/// AES-GCM cipher bound to `nonce`, with hex/base64 helpers.
pub fn new_aes_gcm(key: &[u8], nonce: &[u8]) -> CryptoResult<EncodedCipher<AesGcm>> {
    Ok(EncodedCipher::new(AesGcm::new(key, nonce)?))
}

/// Argon2id hasher. Parameters are checked on first use.
pub fn new_password_hasher(params: PasswordHashParams) -> PasswordHasher {
    PasswordHasher::new(params)
}
