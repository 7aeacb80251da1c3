//! Toolkit configuration module
//!
//! Loads cipher, password hashing, key exchange and MAC settings from the
//! environment and builds ready-to-use handles from them.

use crate::aes_cbc::{AesCbc, BLOCK_SIZE};
use crate::aes_gcm::{AesGcm, NONCE_SIZE};
use crate::ecdh::{new_ecdh, KeyExchange, NamedCurve};
use crate::encryption::{Cipher, EncodedCipher};
use crate::error::{CryptoError, CryptoResult};
use crate::mac::HashAlgorithm;
use crate::memory_security::SecretBytes;
use crate::password::{PasswordHashParams, PasswordHasher};
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Symmetric cipher engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherAlgorithm {
    /// AES-CBC with PKCS#7 padding (legacy, unauthenticated)
    AesCbc,
    /// AES-GCM (recommended)
    #[default]
    AesGcm,
}

impl FromStr for CipherAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aes-cbc" | "aescbc" | "cbc" => Ok(CipherAlgorithm::AesCbc),
            "aes-gcm" | "aesgcm" | "gcm" => Ok(CipherAlgorithm::AesGcm),
            _ => Err(CryptoError::Configuration(format!(
                "Unknown cipher algorithm: {}. Valid options: aes-cbc, aes-gcm",
                s
            ))),
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherAlgorithm::AesCbc => f.write_str("aes-cbc"),
            CipherAlgorithm::AesGcm => f.write_str("aes-gcm"),
        }
    }
}

/// Text encoding of `CIPHER_KEY` and `CIPHER_IV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    #[default]
    Base64,
    Hex,
}

impl KeyEncoding {
    fn decode(self, value: &str) -> CryptoResult<Vec<u8>> {
        match self {
            KeyEncoding::Base64 => Ok(general_purpose::STANDARD.decode(value)?),
            KeyEncoding::Hex => Ok(hex::decode(value)?),
        }
    }
}

impl FromStr for KeyEncoding {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base64" | "b64" => Ok(KeyEncoding::Base64),
            "hex" | "base16" => Ok(KeyEncoding::Hex),
            _ => Err(CryptoError::Configuration(format!(
                "Unknown key encoding: {}. Valid options: base64, hex",
                s
            ))),
        }
    }
}

/// Toolkit configuration
#[derive(Debug)]
pub struct CryptoConfig {
    // === Symmetric Encryption ===
    /// Cipher engine built by [`CryptoConfig::build_cipher`]
    pub cipher_algorithm: CipherAlgorithm,

    /// Cipher key (16/24/32 bytes for CBC, 16/32 bytes for GCM)
    pub cipher_key: Option<SecretBytes>,

    /// CBC IV (up to 16 bytes) or GCM nonce (12 bytes).
    /// Required for CBC; a random nonce is drawn for GCM when absent.
    pub cipher_iv: Option<Vec<u8>>,

    /// Encoding used for key and IV values in the environment
    pub key_encoding: KeyEncoding,

    /// Reject malformed CBC padding instead of passing data through
    pub strict_padding: bool,

    // === Password Hashing ===
    pub password_hash: PasswordHashParams,

    // === Key Exchange ===
    pub curve: NamedCurve,

    // === Message Authentication ===
    pub hmac_algorithm: HashAlgorithm,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cipher_algorithm: CipherAlgorithm::AesGcm,
            cipher_key: None,
            cipher_iv: None,
            key_encoding: KeyEncoding::Base64,
            strict_padding: false,
            password_hash: PasswordHashParams::default(),
            curve: NamedCurve::P256,
            hmac_algorithm: HashAlgorithm::Sha256,
        }
    }
}

fn parse_setting<T>(name: &str, value: &str) -> CryptoResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CryptoError::Configuration(format!("Invalid {}: {}", name, e)))
}

impl CryptoConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> CryptoResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create a configuration from any name -> value source.
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> CryptoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // === Symmetric Encryption ===
        if let Some(algo) = lookup("CIPHER_ALGORITHM") {
            config.cipher_algorithm = algo.parse()?;
        }

        if let Some(encoding) = lookup("CIPHER_KEY_ENCODING") {
            config.key_encoding = encoding.parse()?;
        }

        if let Some(key) = lookup("CIPHER_KEY") {
            let decoded = config.key_encoding.decode(key.trim()).map_err(|e| {
                CryptoError::Configuration(format!("Invalid CIPHER_KEY: {}", e))
            })?;
            config.cipher_key = Some(SecretBytes::new(decoded));
        }

        if let Some(iv) = lookup("CIPHER_IV") {
            config.cipher_iv = Some(config.key_encoding.decode(iv.trim()).map_err(|e| {
                CryptoError::Configuration(format!("Invalid CIPHER_IV: {}", e))
            })?);
        }

        if let Some(strict) = lookup("CIPHER_STRICT_PADDING") {
            config.strict_padding = parse_setting("CIPHER_STRICT_PADDING", &strict)?;
        }

        // === Password Hashing ===
        if let Some(memory) = lookup("PASSWORD_HASH_MEMORY_KIB") {
            config.password_hash.memory_kib = parse_setting("PASSWORD_HASH_MEMORY_KIB", &memory)?;
        }

        if let Some(iterations) = lookup("PASSWORD_HASH_ITERATIONS") {
            config.password_hash.iterations =
                parse_setting("PASSWORD_HASH_ITERATIONS", &iterations)?;
        }

        if let Some(parallelism) = lookup("PASSWORD_HASH_PARALLELISM") {
            config.password_hash.parallelism =
                parse_setting("PASSWORD_HASH_PARALLELISM", &parallelism)?;
        }

        if let Some(salt) = lookup("PASSWORD_HASH_SALT_LENGTH") {
            config.password_hash.salt_length = parse_setting("PASSWORD_HASH_SALT_LENGTH", &salt)?;
        }

        if let Some(key) = lookup("PASSWORD_HASH_KEY_LENGTH") {
            config.password_hash.key_length = parse_setting("PASSWORD_HASH_KEY_LENGTH", &key)?;
        }

        // === Key Exchange & MAC ===
        if let Some(curve) = lookup("ECDH_CURVE") {
            config.curve = curve.parse()?;
        }

        if let Some(alg) = lookup("HMAC_ALGORITHM") {
            config.hmac_algorithm = alg.parse()?;
        }

        // Validate configuration
        config.validate()?;

        debug!(
            cipher = %config.cipher_algorithm,
            curve = %config.curve,
            hmac = %config.hmac_algorithm,
            "loaded crypto configuration"
        );

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CryptoResult<()> {
        let key = self.cipher_key.as_ref().ok_or_else(|| {
            CryptoError::Configuration("CIPHER_KEY is required".to_string())
        })?;

        match self.cipher_algorithm {
            CipherAlgorithm::AesCbc => {
                if !matches!(key.len(), 16 | 24 | 32) {
                    return Err(CryptoError::Configuration(format!(
                        "AES-CBC key must be 16, 24 or 32 bytes, got {} bytes",
                        key.len()
                    )));
                }
                match &self.cipher_iv {
                    None => {
                        return Err(CryptoError::Configuration(
                            "CIPHER_IV is required when using aes-cbc".to_string(),
                        ))
                    }
                    Some(iv) if iv.len() > BLOCK_SIZE => {
                        return Err(CryptoError::Configuration(format!(
                            "AES-CBC IV must be at most {} bytes, got {} bytes",
                            BLOCK_SIZE,
                            iv.len()
                        )))
                    }
                    Some(_) => {}
                }
            }
            CipherAlgorithm::AesGcm => {
                if !matches!(key.len(), 16 | 32) {
                    return Err(CryptoError::Configuration(format!(
                        "AES-GCM key must be 16 or 32 bytes, got {} bytes",
                        key.len()
                    )));
                }
                if let Some(nonce) = &self.cipher_iv {
                    if nonce.len() != NONCE_SIZE {
                        return Err(CryptoError::Configuration(format!(
                            "AES-GCM nonce must be {} bytes, got {} bytes",
                            NONCE_SIZE,
                            nonce.len()
                        )));
                    }
                }
            }
        }

        let params = &self.password_hash;
        if params.memory_kib == 0 || params.iterations == 0 || params.parallelism == 0 {
            return Err(CryptoError::Configuration(
                "Password hash memory, iterations and parallelism must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the configured cipher wrapped in the hex/base64 adapter
    pub fn build_cipher(&self) -> CryptoResult<EncodedCipher<Box<dyn Cipher>>> {
        let key = self.cipher_key.as_ref().ok_or_else(|| {
            CryptoError::Configuration("CIPHER_KEY is required".to_string())
        })?;

        let cipher: Box<dyn Cipher> = match self.cipher_algorithm {
            CipherAlgorithm::AesCbc => {
                warn!("AES-CBC selected: ciphertexts are not authenticated");
                if !self.strict_padding {
                    warn!("lenient CBC padding: malformed padding passes through undetected");
                }
                let iv = self.cipher_iv.as_deref().ok_or_else(|| {
                    CryptoError::Configuration(
                        "CIPHER_IV is required when using aes-cbc".to_string(),
                    )
                })?;
                Box::new(
                    AesCbc::new(key.as_slice(), iv)?.with_strict_padding(self.strict_padding),
                )
            }
            CipherAlgorithm::AesGcm => match self.cipher_iv.as_deref() {
                Some(nonce) => Box::new(AesGcm::new(key.as_slice(), nonce)?),
                None => Box::new(AesGcm::with_random_nonce(key.as_slice())?),
            },
        };

        Ok(EncodedCipher::new(cipher))
    }

    /// Password hasher with the configured cost parameters
    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.password_hash)
    }

    /// Fresh key pair on the configured curve
    pub fn key_exchange(&self) -> CryptoResult<Box<dyn KeyExchange>> {
        new_ecdh(self.curve)
    }
}
