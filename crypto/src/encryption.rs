use crate::error::CryptoResult;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Byte-level symmetric cipher.
///
/// Implementations hold their key and IV/nonce for their whole lifetime and
/// take `&self`, so one handle can serve concurrent callers.
pub trait Cipher: Send + Sync {
    /// Encrypt data
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypt data
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// The IV (CBC) or nonce (GCM) bound to this instance
    fn iv(&self) -> &[u8];

    /// Get the encryption algorithm name
    fn algorithm(&self) -> &str;
}

impl<C: Cipher + ?Sized> Cipher for Box<C> {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        (**self).decrypt(ciphertext)
    }

    fn iv(&self) -> &[u8] {
        (**self).iv()
    }

    fn algorithm(&self) -> &str {
        (**self).algorithm()
    }
}

impl<C: Cipher + ?Sized> Cipher for &C {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        (**self).decrypt(ciphertext)
    }

    fn iv(&self) -> &[u8] {
        (**self).iv()
    }

    fn algorithm(&self) -> &str {
        (**self).algorithm()
    }
}

/// Hex and base64 front-end for any [`Cipher`].
///
/// Owns (or borrows, via `&C`) the concrete cipher and only translates
/// between strings and bytes. Malformed input strings fail with
/// [`CryptoError::Encoding`](crate::CryptoError::Encoding) before the
/// cipher is ever called.
///
/// # Example
///
/// ```rust
/// use cryptokit::{AesGcm, EncodedCipher};
///
/// let cipher = EncodedCipher::new(AesGcm::new(&[7u8; 32], &[1u8; 12])?);
/// let sealed = cipher.encrypt_to_base64(b"db-password")?;
/// assert_eq!(cipher.decrypt_from_base64(&sealed)?, b"db-password");
/// # Ok::<(), cryptokit::CryptoError>(())
/// ```
#[derive(Debug)]
pub struct EncodedCipher<C> {
    inner: C,
}

impl<C: Cipher> EncodedCipher<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn encrypt_to_hex(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let out = self.inner.encrypt(plaintext)?;
        Ok(hex::encode(out))
    }

    pub fn decrypt_from_hex(&self, input: &str) -> CryptoResult<Vec<u8>> {
        let ciphertext = hex::decode(input)?;
        self.inner.decrypt(&ciphertext)
    }

    pub fn encrypt_to_base64(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let out = self.inner.encrypt(plaintext)?;
        Ok(BASE64.encode(out))
    }

    pub fn decrypt_from_base64(&self, input: &str) -> CryptoResult<Vec<u8>> {
        let ciphertext = BASE64.decode(input)?;
        self.inner.decrypt(&ciphertext)
    }

    pub fn iv_to_hex(&self) -> String {
        hex::encode(self.inner.iv())
    }

    pub fn iv_to_base64(&self) -> String {
        BASE64.encode(self.inner.iv())
    }
}

impl<C: Cipher> Cipher for EncodedCipher<C> {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.inner.encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.inner.decrypt(ciphertext)
    }

    fn iv(&self) -> &[u8] {
        self.inner.iv()
    }

    fn algorithm(&self) -> &str {
        self.inner.algorithm()
    }
}
