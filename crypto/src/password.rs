use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD as B64, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::constant_time::ct_eq;
use crate::error::{CryptoError, CryptoResult};

/// Algorithm identifier in the encoded hash
pub const ALGORITHM_ID: &str = "argon2id";

/// Argon2 version 1.3, written as `v=19`
pub const VERSION: u32 = 0x13;

/// Argon2id cost parameters and output sizes.
///
/// Peak memory per concurrent [`PasswordHasher::generate`] or
/// [`PasswordHasher::compare`] call is roughly `memory_kib` KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHashParams {
    /// Memory cost in KiB (minimum 8 * parallelism)
    pub memory_kib: u32,
    /// Time cost (iterations)
    pub iterations: u32,
    /// Parallelism factor (lanes)
    pub parallelism: u32,
    /// Salt length in bytes (minimum 8)
    pub salt_length: usize,
    /// Derived key length in bytes (minimum 4)
    pub key_length: usize,
}

impl Default for PasswordHashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MiB
            iterations: 2,
            parallelism: 1,
            salt_length: 16,
            key_length: 32,
        }
    }
}

impl PasswordHashParams {
    fn argon2_params(&self) -> CryptoResult<Params> {
        if self.memory_kib == 0 || self.iterations == 0 || self.parallelism == 0 {
            return Err(CryptoError::InvalidParams(
                "memory, iterations and parallelism must be non-zero".to_string(),
            ));
        }

        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_length),
        )
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))
    }

    fn validate(&self) -> CryptoResult<Params> {
        let params = self.argon2_params()?;
        if self.salt_length < MIN_SALT_LEN {
            return Err(CryptoError::InvalidParams(format!(
                "salt length must be at least {} bytes, got {}",
                MIN_SALT_LEN, self.salt_length
            )));
        }
        Ok(params)
    }
}

const MIN_SALT_LEN: usize = 8;

/// Factor between a hasher's own costs and the largest it will run for a
/// stored hash
const COST_HEADROOM: u32 = 8;

/// Largest Argon2id costs [`PasswordHasher::compare`] will run.
///
/// Encoded hashes are untrusted input: without a ceiling, `m=4294967295`
/// asks Argon2 for 4 TiB of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLimits {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl CostLimits {
    /// Eight times the larger of `params` and the defaults, per cost.
    pub fn for_params(params: &PasswordHashParams) -> Self {
        let floor = PasswordHashParams::default();
        Self {
            memory_kib: params.memory_kib.max(floor.memory_kib).saturating_mul(COST_HEADROOM),
            iterations: params.iterations.max(floor.iterations).saturating_mul(COST_HEADROOM),
            parallelism: params.parallelism.max(floor.parallelism).saturating_mul(COST_HEADROOM),
        }
    }

    fn check(&self, params: &PasswordHashParams) -> CryptoResult<()> {
        let exceeded = [
            ("m", params.memory_kib, self.memory_kib),
            ("t", params.iterations, self.iterations),
            ("p", params.parallelism, self.parallelism),
        ]
        .into_iter()
        .find(|&(_, value, limit)| value > limit);

        match exceeded {
            Some((name, value, limit)) => Err(CryptoError::MalformedEncodedHash(format!(
                "{}={} exceeds the limit of {}",
                name, value, limit
            ))),
            None => Ok(()),
        }
    }
}

/// A parsed `$argon2id$v=19$m=..,t=..,p=..$salt$key` string.
struct EncodedHash {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    salt: Vec<u8>,
    key: Zeroizing<Vec<u8>>,
}

impl EncodedHash {
    fn encode(params: &PasswordHashParams, salt: &[u8], key: &[u8]) -> String {
        format!(
            "${}$v={}$m={},t={},p={}${}${}",
            ALGORITHM_ID,
            VERSION,
            params.memory_kib,
            params.iterations,
            params.parallelism,
            B64.encode(salt),
            B64.encode(key)
        )
    }

    fn parse(encoded: &str) -> CryptoResult<Self> {
        let malformed = |msg: &str| CryptoError::MalformedEncodedHash(msg.to_string());

        let parts: Vec<&str> = encoded.split('$').collect();
        let [empty, algorithm, version, costs, salt, key] = parts.as_slice() else {
            return Err(malformed("expected 5 '$'-separated fields"));
        };
        if !empty.is_empty() {
            return Err(malformed("hash must start with '$'"));
        }

        if *algorithm != ALGORITHM_ID {
            return Err(CryptoError::MalformedEncodedHash(format!(
                "unsupported algorithm: {}",
                algorithm
            )));
        }

        let version: u32 = version
            .strip_prefix("v=")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| malformed("invalid version field"))?;
        if version != VERSION {
            return Err(CryptoError::MalformedEncodedHash(format!(
                "unsupported version: {}",
                version
            )));
        }

        let (mut memory_kib, mut iterations, mut parallelism) = (None, None, None);
        for pair in costs.split(',') {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| malformed("invalid parameter field"))?;
            let value: u32 = value
                .parse()
                .map_err(|_| malformed("non-numeric cost parameter"))?;
            match name {
                "m" => memory_kib = Some(value),
                "t" => iterations = Some(value),
                "p" => parallelism = Some(value),
                _ => return Err(malformed("unknown cost parameter")),
            }
        }

        let salt = B64
            .decode(salt)
            .map_err(|e| CryptoError::MalformedEncodedHash(format!("salt: {}", e)))?;
        let key = B64
            .decode(key)
            .map_err(|e| CryptoError::MalformedEncodedHash(format!("key: {}", e)))?;

        Ok(Self {
            memory_kib: memory_kib.ok_or_else(|| malformed("missing m"))?,
            iterations: iterations.ok_or_else(|| malformed("missing t"))?,
            parallelism: parallelism.ok_or_else(|| malformed("missing p"))?,
            salt,
            key: Zeroizing::new(key),
        })
    }

    fn params(&self) -> PasswordHashParams {
        PasswordHashParams {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
            salt_length: self.salt.len(),
            key_length: self.key.len(),
        }
    }
}

fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: Params,
    key_length: usize,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut output = Zeroizing::new(vec![0u8; key_length]);

    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::HashFailed(e.to_string()))?;

    Ok(output)
}

/// Argon2id password hasher producing self-describing encoded hashes.
///
/// # Example
///
/// ```rust
/// use cryptokit::password::{PasswordHasher, PasswordHashParams};
///
/// let hasher = PasswordHasher::new(PasswordHashParams {
///     memory_kib: 256,
///     iterations: 2,
///     parallelism: 2,
///     salt_length: 8,
///     key_length: 32,
/// });
///
/// let encoded = hasher.generate("very_easy_password")?;
/// assert!(hasher.compare("very_easy_password", &encoded)?);
/// # Ok::<(), cryptokit::CryptoError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: PasswordHashParams,
    limits: CostLimits,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PasswordHashParams::default())
    }
}

impl PasswordHasher {
    /// Hasher for `params`, accepting stored hashes up to
    /// [`CostLimits::for_params`].
    pub fn new(params: PasswordHashParams) -> Self {
        Self {
            params,
            limits: CostLimits::for_params(&params),
        }
    }

    /// Replace the ceiling on costs read from encoded hashes.
    pub fn with_cost_limits(mut self, limits: CostLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn params(&self) -> &PasswordHashParams {
        &self.params
    }

    pub fn cost_limits(&self) -> &CostLimits {
        &self.limits
    }

    /// Hash `password` under a fresh random salt.
    ///
    /// Invalid cost parameters are reported here, before any work is done.
    pub fn generate(&self, password: &str) -> CryptoResult<String> {
        let argon2_params = self.params.validate()?;

        let mut salt = vec![0u8; self.params.salt_length];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;

        let key = derive_key(
            password.as_bytes(),
            &salt,
            argon2_params,
            self.params.key_length,
        )?;

        debug!(
            memory_kib = self.params.memory_kib,
            iterations = self.params.iterations,
            parallelism = self.params.parallelism,
            "generated argon2id password hash"
        );

        Ok(EncodedHash::encode(&self.params, &salt, &key))
    }

    /// Check `password` against an encoded hash.
    ///
    /// The salt and cost parameters come from `encoded`, not from this
    /// hasher, so hashes made under older settings keep verifying. Costs
    /// above [`PasswordHasher::cost_limits`] are refused before any memory
    /// is allocated. A wrong password is `Ok(false)`; only an unparseable
    /// or over-limit hash is an error.
    pub fn compare(&self, password: &str, encoded: &str) -> CryptoResult<bool> {
        let stored = EncodedHash::parse(encoded)?;
        let stored_params = stored.params();
        self.limits.check(&stored_params)?;

        let argon2_params = stored_params
            .argon2_params()
            .map_err(|e| CryptoError::MalformedEncodedHash(e.to_string()))?;

        // Argon2 refusing the stored salt means the string was never valid
        let key = derive_key(
            password.as_bytes(),
            &stored.salt,
            argon2_params,
            stored.key.len(),
        )
        .map_err(|e| CryptoError::MalformedEncodedHash(e.to_string()))?;

        let matches = ct_eq(&key, &stored.key);
        trace!(matches, "compared argon2id password hash");
        Ok(matches)
    }

    /// Whether `encoded` was produced with cost parameters or sizes other
    /// than this hasher's, i.e. should be regenerated on next login.
    pub fn needs_rehash(&self, encoded: &str) -> CryptoResult<bool> {
        let stored = EncodedHash::parse(encoded)?;
        Ok(stored.params() != self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn test_params() -> PasswordHashParams {
        PasswordHashParams {
            memory_kib: 256,
            iterations: 2,
            parallelism: 2,
            salt_length: 8,
            key_length: 32,
        }
    }

    #[test]
    fn test_generate_format() {
        let hasher = PasswordHasher::new(test_params());
        let encoded = hasher.generate("very_easy_password").unwrap();

        assert!(encoded.starts_with("$argon2id$v=19$m=256,t=2,p=2$"));
        let parts: Vec<&str> = encoded.split('$').collect();
        assert_eq!(parts.len(), 6);
        assert_eq!(B64.decode(parts[4]).unwrap().len(), 8);
        assert_eq!(B64.decode(parts[5]).unwrap().len(), 32);
    }

    #[test]
    fn test_compare() {
        let hasher = PasswordHasher::new(test_params());
        let encoded = hasher.generate("very_easy_password").unwrap();

        assert!(hasher.compare("very_easy_password", &encoded).unwrap());
        assert!(!hasher.compare("wrong_password", &encoded).unwrap());
    }

    #[test]
    fn test_random_salt() {
        let hasher = PasswordHasher::new(test_params());
        let a = hasher.generate("same").unwrap();
        let b = hasher.generate("same").unwrap();

        assert_ne!(a, b);
        assert!(hasher.compare("same", &a).unwrap());
        assert!(hasher.compare("same", &b).unwrap());
    }

    #[test]
    fn test_compare_uses_encoded_params() {
        let old = PasswordHasher::new(test_params());
        let encoded = old.generate("pw").unwrap();

        let new = PasswordHasher::new(PasswordHashParams {
            memory_kib: 512,
            iterations: 3,
            parallelism: 1,
            salt_length: 16,
            key_length: 64,
        });
        assert!(new.compare("pw", &encoded).unwrap());
        assert!(new.needs_rehash(&encoded).unwrap());
        assert!(!old.needs_rehash(&encoded).unwrap());
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key(b"password", b"somesalt", Params::new(256, 2, 1, Some(32)).unwrap(), 32)
            .unwrap();
        let b = derive_key(b"password", b"somesalt", Params::new(256, 2, 1, Some(32)).unwrap(), 32)
            .unwrap();
        let c = derive_key(b"password", b"othersalt", Params::new(256, 2, 1, Some(32)).unwrap(), 32)
            .unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_zero_memory_fails_at_generate() {
        let hasher = PasswordHasher::new(PasswordHashParams {
            memory_kib: 0,
            ..test_params()
        });
        let err = hasher.generate("pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_invalid_sizes_fail_at_generate() {
        let short_salt = PasswordHasher::new(PasswordHashParams {
            salt_length: 4,
            ..test_params()
        });
        assert!(matches!(short_salt.generate("pw"), Err(CryptoError::InvalidParams(_))));

        let short_key = PasswordHasher::new(PasswordHashParams {
            key_length: 2,
            ..test_params()
        });
        assert!(matches!(short_key.generate("pw"), Err(CryptoError::InvalidParams(_))));

        let starved = PasswordHasher::new(PasswordHashParams {
            memory_kib: 8,
            parallelism: 4,
            ..test_params()
        });
        assert!(matches!(starved.generate("pw"), Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_malformed_encoded_hash() {
        let hasher = PasswordHasher::new(test_params());
        let valid = hasher.generate("pw").unwrap();

        let cases = [
            "".to_string(),
            "plaintext".to_string(),
            valid.replacen("argon2id", "argon2i", 1),
            valid.replacen("v=19", "v=16", 1),
            valid.replacen("m=256", "m=abc", 1),
            valid.replacen("m=256,", "", 1),
            valid.replacen("m=256", "m=0", 1),
            format!("{}$extra", valid),
            format!("{}!", valid),
        ];

        for case in &cases {
            let err = hasher.compare("pw", case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEncodedHash, "{}", case);
        }
    }

    #[test]
    fn test_default_params() {
        let params = PasswordHashParams::default();
        assert_eq!(params.memory_kib, 19456);
        assert_eq!(params.salt_length, 16);
    }

    #[test]
    fn test_compare_refuses_costs_above_limit() {
        let hasher = PasswordHasher::new(test_params());
        let valid = hasher.generate("pw").unwrap();

        for case in [
            valid.replacen("m=256", "m=4294967295", 1),
            valid.replacen("t=2", "t=4294967295", 1),
            valid.replacen("p=2", "p=16777215", 1),
        ] {
            let err = hasher.compare("pw", &case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEncodedHash, "{}", case);
        }
    }

    #[test]
    fn test_cost_limits() {
        let limits = CostLimits::for_params(&test_params());
        assert_eq!(limits.memory_kib, 19456 * 8);
        assert_eq!(limits.iterations, 16);
        assert_eq!(limits.parallelism, 16);

        let huge = CostLimits::for_params(&PasswordHashParams {
            memory_kib: u32::MAX,
            ..test_params()
        });
        assert_eq!(huge.memory_kib, u32::MAX);

        let hasher = PasswordHasher::new(test_params());
        let encoded = hasher.generate("pw").unwrap();
        let strict = PasswordHasher::new(test_params()).with_cost_limits(CostLimits {
            memory_kib: 128,
            iterations: 2,
            parallelism: 2,
        });
        assert_eq!(strict.cost_limits().memory_kib, 128);
        assert!(strict.compare("pw", &encoded).is_err());
        assert!(PasswordHasher::default().compare("pw", &encoded).unwrap());
    }

    #[test]
    fn test_long_salt() {
        let hasher = PasswordHasher::new(PasswordHashParams {
            salt_length: 64,
            ..test_params()
        });
        let encoded = hasher.generate("pw").unwrap();
        let salt = encoded.split('$').nth(4).unwrap();
        assert_eq!(B64.decode(salt).unwrap().len(), 64);
        assert!(hasher.compare("pw", &encoded).unwrap());
    }
}
