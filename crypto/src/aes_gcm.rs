use crate::encryption::Cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::memory_security::SecretBytes;
use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, trace};

/// 96-bit nonce (recommended for GCM)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag appended to every ciphertext
pub const TAG_SIZE: usize = 16;

enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl GcmCipher {
    fn encrypt(&self, nonce: &Nonce<U12>, payload: Payload<'_, '_>) -> CryptoResult<Vec<u8>> {
        let sealed = match self {
            GcmCipher::Aes128(c) => c.encrypt(nonce, payload),
            GcmCipher::Aes256(c) => c.encrypt(nonce, payload),
        };
        sealed.map_err(|_| CryptoError::EncryptionFailed("AES-GCM seal failed".to_string()))
    }

    fn decrypt(&self, nonce: &Nonce<U12>, payload: Payload<'_, '_>) -> CryptoResult<Vec<u8>> {
        let opened = match self {
            GcmCipher::Aes128(c) => c.decrypt(nonce, payload),
            GcmCipher::Aes256(c) => c.decrypt(nonce, payload),
        };
        opened.map_err(|_| CryptoError::AuthenticationFailed)
    }
}

fn check_nonce(nonce: &[u8]) -> CryptoResult<()> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonce(nonce.len()));
    }
    Ok(())
}

/// AES-GCM authenticated encryption
///
/// This implementation provides:
/// - AES-128 or AES-256 in Galois/Counter Mode, chosen by key length
/// - 96-bit nonces
/// - 128-bit authentication tags appended to the ciphertext
/// - Key and key schedule zeroization on drop
///
/// The [`Cipher`] impl seals every message under the nonce given at
/// construction. GCM loses both confidentiality and integrity if a nonce
/// is reused under one key, so either build a fresh instance per message
/// (see [`AesGcm::with_random_nonce`]) or pass a fresh nonce to
/// [`AesGcm::seal`] for each call.
pub struct AesGcm {
    cipher: GcmCipher,
    key: SecretBytes,
    nonce: [u8; NONCE_SIZE],
}

impl AesGcm {
    /// Create a cipher bound to `nonce`. The key must be 16 or 32 bytes and
    /// the nonce exactly 12.
    pub fn new(key: &[u8], nonce: &[u8]) -> CryptoResult<Self> {
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }

        let cipher = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(GcmCipher::Aes128),
            32 => Aes256Gcm::new_from_slice(key).map(GcmCipher::Aes256),
            other => return Err(CryptoError::InvalidKeySize(other)),
        }
        .map_err(|_| CryptoError::InvalidKeySize(key.len()))?;

        check_nonce(nonce)?;
        let mut bound = [0u8; NONCE_SIZE];
        bound.copy_from_slice(nonce);

        debug!(key_bits = key.len() * 8, "initialized AES-GCM cipher");

        Ok(Self {
            cipher,
            key: SecretBytes::from(key),
            nonce: bound,
        })
    }

    /// Create a cipher bound to a freshly generated random nonce.
    pub fn with_random_nonce(key: &[u8]) -> CryptoResult<Self> {
        let nonce = Self::generate_nonce()?;
        Self::new(key, &nonce)
    }

    /// Generate a random 96-bit nonce from the operating system RNG
    pub fn generate_nonce() -> CryptoResult<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
        Ok(nonce)
    }

    /// Encrypt under an explicit per-message nonce and associated data.
    ///
    /// Unlike [`Cipher::encrypt`], empty plaintext is sealed normally and
    /// yields a bare authentication tag.
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        check_nonce(nonce)?;
        self.cipher.encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
    }

    /// Decrypt and verify data sealed by [`AesGcm::seal`].
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        check_nonce(nonce)?;
        self.cipher.decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
    }

    pub fn key_len(&self) -> usize {
        self.key.len()
    }
}

impl Cipher for AesGcm {
    /// Empty input passes through as empty output without sealing.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let ciphertext = self.seal(&self.nonce, plaintext, &[])?;
        trace!(
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "AES-GCM encrypt"
        );
        Ok(ciphertext)
    }

    /// Empty input passes through as empty output without opening.
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }

        self.open(&self.nonce, ciphertext, &[])
    }

    fn iv(&self) -> &[u8] {
        &self.nonce
    }

    fn algorithm(&self) -> &str {
        match self.cipher {
            GcmCipher::Aes128(_) => "AES-128-GCM",
            GcmCipher::Aes256(_) => "AES-256-GCM",
        }
    }
}
