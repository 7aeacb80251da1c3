use std::fmt;
use std::str::FromStr;

use hmac::{
    digest::{core_api::BlockSizeUser, Digest},
    Mac, SimpleHmac,
};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::constant_time::verify_mac;
use crate::error::{CryptoError, CryptoResult};

/// Hash functions selectable for HMAC at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_512,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Sha3_256 => "SHA3-256",
            HashAlgorithm::Sha3_512 => "SHA3-512",
        }
    }

    /// Digest (and therefore MAC tag) length in bytes
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sha-224" | "sha224" => Ok(HashAlgorithm::Sha224),
            "sha-256" | "sha256" => Ok(HashAlgorithm::Sha256),
            "sha-384" | "sha384" => Ok(HashAlgorithm::Sha384),
            "sha-512" | "sha512" => Ok(HashAlgorithm::Sha512),
            "sha3-256" => Ok(HashAlgorithm::Sha3_256),
            "sha3-512" => Ok(HashAlgorithm::Sha3_512),
            _ => Err(CryptoError::UnsupportedAlgorithm(format!(
                "Unknown hash algorithm: {}. Valid options: sha224, sha256, sha384, sha512, sha3-256, sha3-512",
                s
            ))),
        }
    }
}

fn hmac_raw<D>(key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>>
where
    D: Digest + BlockSizeUser,
{
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(format!("HMAC key: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hmac_bytes(algorithm: HashAlgorithm, key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
    match algorithm {
        HashAlgorithm::Sha224 => hmac_raw::<Sha224>(key, message),
        HashAlgorithm::Sha256 => hmac_raw::<Sha256>(key, message),
        HashAlgorithm::Sha384 => hmac_raw::<Sha384>(key, message),
        HashAlgorithm::Sha512 => hmac_raw::<Sha512>(key, message),
        HashAlgorithm::Sha3_256 => hmac_raw::<Sha3_256>(key, message),
        HashAlgorithm::Sha3_512 => hmac_raw::<Sha3_512>(key, message),
    }
}

/// HMAC over `message` with any RustCrypto hash, hex-encoded.
///
/// # Example
///
/// ```rust
/// use cryptokit::mac::hmac_hex;
/// use sha2::Sha256;
///
/// let tag = hmac_hex::<Sha256>(b"secret", b"signature")?;
/// assert_eq!(tag.len(), 64);
/// # Ok::<(), cryptokit::CryptoError>(())
/// ```
pub fn hmac_hex<D>(key: &[u8], message: &[u8]) -> CryptoResult<String>
where
    D: Digest + BlockSizeUser,
{
    Ok(hex::encode(hmac_raw::<D>(key, message)?))
}

/// HMAC with a hash function chosen at runtime, hex-encoded.
pub fn hmac(algorithm: HashAlgorithm, key: &[u8], message: &[u8]) -> CryptoResult<String> {
    Ok(hex::encode(hmac_bytes(algorithm, key, message)?))
}

/// Recompute the HMAC and compare it with `expected_hex` in constant time.
///
/// Hex case is ignored. Undecodable hex or a tag of the wrong length is a
/// mismatch rather than an error.
pub fn verify_hmac(
    algorithm: HashAlgorithm,
    key: &[u8],
    message: &[u8],
    expected_hex: &str,
) -> CryptoResult<bool> {
    let computed = hmac_bytes(algorithm, key, message)?;
    let Ok(expected) = hex::decode(expected_hex) else {
        return Ok(false);
    };
    Ok(verify_mac(&expected, &computed))
}
