//! Elliptic-curve Diffie-Hellman key exchange over the NIST prime curves.
//!
//! Each party generates (or restores) a key pair, publishes the public point
//! in uncompressed SEC1 form and feeds the other party's point into
//! [`KeyExchange::generate_secret`]. Both sides obtain the same X coordinate.
//!
//! ```rust
//! use cryptokit::ecdh::{p256, KeyExchange};
//!
//! let alice = p256()?;
//! let bob = p256()?;
//! let (_, alice_pub) = alice.key_pair();
//! let (_, bob_pub) = bob.key_pair();
//!
//! let s1 = alice.generate_secret(&bob_pub)?;
//! let s2 = bob.generate_secret(&alice_pub)?;
//! assert_eq!(s1.as_bytes(), s2.as_bytes());
//! # Ok::<(), cryptokit::CryptoError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use elliptic_curve::{
    ecdh::diffie_hellman,
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytes, FieldBytesSize, PublicKey, SecretKey,
};
use hkdf::Hkdf;
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::memory_security::SecretBytes;

/// Supported curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamedCurve {
    #[default]
    P256,
    P384,
    P521,
}

impl NamedCurve {
    pub fn name(self) -> &'static str {
        match self {
            NamedCurve::P256 => "P-256",
            NamedCurve::P384 => "P-384",
            NamedCurve::P521 => "P-521",
        }
    }

    /// Length in bytes of a private scalar or shared secret
    pub fn field_size(self) -> usize {
        match self {
            NamedCurve::P256 => 32,
            NamedCurve::P384 => 48,
            NamedCurve::P521 => 66,
        }
    }

    /// Length in bytes of an uncompressed public point (`0x04 || X || Y`)
    pub fn public_key_size(self) -> usize {
        1 + 2 * self.field_size()
    }

    /// Bits of the leading field byte a scalar below the group order can use
    fn scalar_top_byte_mask(self) -> u8 {
        match self {
            NamedCurve::P256 | NamedCurve::P384 => 0xff,
            NamedCurve::P521 => 0x01,
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamedCurve {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p-256" | "p256" | "secp256r1" | "prime256v1" => Ok(NamedCurve::P256),
            "p-384" | "p384" | "secp384r1" => Ok(NamedCurve::P384),
            "p-521" | "p521" | "secp521r1" => Ok(NamedCurve::P521),
            _ => Err(CryptoError::UnsupportedAlgorithm(format!(
                "Unknown curve: {}. Valid options: p-256, p-384, p-521",
                s
            ))),
        }
    }
}

/// Scalar draws before giving up; each rejection has probability below 2^-32
const MAX_SCALAR_ATTEMPTS: usize = 16;

/// Ties a RustCrypto curve type to its [`NamedCurve`] tag.
pub trait EcdhCurve: CurveArithmetic {
    const CURVE: NamedCurve;
}

impl EcdhCurve for NistP256 {
    const CURVE: NamedCurve = NamedCurve::P256;
}

impl EcdhCurve for NistP384 {
    const CURVE: NamedCurve = NamedCurve::P384;
}

impl EcdhCurve for NistP521 {
    const CURVE: NamedCurve = NamedCurve::P521;
}

/// Drop leading zero bytes, leaving the minimal big-endian integer encoding.
fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes.get(start..).unwrap_or_default()
}

/// Raw ECDH output: the X coordinate of the shared point as a minimal
/// big-endian integer, so leading zero bytes are dropped and roughly one
/// secret in 256 is shorter than the field size. Peers that store or hash
/// secrets in this form agree byte for byte; use
/// [`SharedSecret::to_fixed_width`] for the left-padded form.
///
/// This is not uniformly random; run it through a KDF such as
/// [`SharedSecret::derive_key`] before using it as a symmetric key.
#[derive(Debug)]
pub struct SharedSecret {
    bytes: SecretBytes,
    field_size: usize,
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// HKDF-SHA256 over the raw secret.
    pub fn derive_key(
        &self,
        salt: &[u8],
        info: &[u8],
        length: usize,
    ) -> CryptoResult<SecretBytes> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), self.bytes.as_slice());
        let mut okm = SecretBytes::zeroed(length);

        hkdf.expand(info, okm.as_mut_slice()).map_err(|_| {
            CryptoError::InvalidParams(format!("HKDF output length {} too large", length))
        })?;

        Ok(okm)
    }

    /// The secret left-padded with zeros to the curve's field size.
    pub fn to_fixed_width(&self) -> SecretBytes {
        let mut fixed = SecretBytes::zeroed(self.field_size.max(self.bytes.len()));
        let offset = fixed.len() - self.bytes.len();
        if let Some(tail) = fixed.as_mut_slice().get_mut(offset..) {
            tail.copy_from_slice(self.bytes.as_slice());
        }
        fixed
    }

    pub fn into_secret_bytes(self) -> SecretBytes {
        self.bytes
    }
}

/// One side of an ECDH exchange.
pub trait KeyExchange: Send + Sync {
    fn curve(&self) -> NamedCurve;

    /// Private scalar (minimal big-endian integer, leading zeros dropped)
    /// and public point (uncompressed SEC1).
    fn key_pair(&self) -> (SecretBytes, Vec<u8>);

    /// Multiply the peer's public point by our private scalar.
    fn generate_secret(&self, peer_public: &[u8]) -> CryptoResult<SharedSecret>;
}

/// ECDH key pair on curve `C`.
pub struct Ecdh<C: CurveArithmetic> {
    secret: SecretKey<C>,
    public: PublicKey<C>,
}

impl<C> Ecdh<C>
where
    C: EcdhCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    /// Generate a fresh key pair from the operating system RNG.
    ///
    /// Fails with [`CryptoError::RandomSource`] when the RNG does.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = FieldBytes::<C>::default();
        let mask = C::CURVE.scalar_top_byte_mask();

        let mut sampled = None;
        for _ in 0..MAX_SCALAR_ATTEMPTS {
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
            if let Some(top) = bytes.first_mut() {
                *top &= mask;
            }
            // Zero and out-of-range candidates are rejected and redrawn
            if let Ok(secret) = SecretKey::<C>::from_bytes(&bytes) {
                sampled = Some(secret);
                break;
            }
        }
        bytes.as_mut_slice().zeroize();

        let secret = sampled.ok_or_else(|| {
            CryptoError::RandomSource(format!("no valid {} scalar drawn", C::CURVE))
        })?;
        let public = secret.public_key();

        debug!(curve = %C::CURVE, "generated ECDH key pair");

        Ok(Self { secret, public })
    }

    /// Restore a key pair from a big-endian private scalar and an
    /// uncompressed SEC1 public point.
    ///
    /// Scalars shorter than the field size (leading zeros dropped) are
    /// accepted. The point must lie on the curve and must be the one
    /// derived from the scalar.
    pub fn from_key_pair(private: &[u8], public: &[u8]) -> CryptoResult<Self> {
        let invalid = || CryptoError::InvalidKey(format!("not a valid {} scalar", C::CURVE));

        let mut bytes = FieldBytes::<C>::default();
        let offset = bytes.len().checked_sub(private.len()).ok_or_else(invalid)?;
        bytes
            .get_mut(offset..)
            .ok_or_else(invalid)?
            .copy_from_slice(private);
        let secret = SecretKey::<C>::from_bytes(&bytes);
        bytes.as_mut_slice().zeroize();
        let secret = secret.map_err(|_| invalid())?;

        let public = decode_public_key::<C>(public)?;

        let derived = secret.public_key().to_encoded_point(false);
        if derived.as_bytes() != public.to_encoded_point(false).as_bytes() {
            return Err(CryptoError::KeyPairMismatch);
        }

        debug!(curve = %C::CURVE, "restored ECDH key pair");

        Ok(Self { secret, public })
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }
}

fn decode_public_key<C>(bytes: &[u8]) -> CryptoResult<PublicKey<C>>
where
    C: EcdhCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    PublicKey::<C>::from_sec1_bytes(bytes).map_err(|_| {
        CryptoError::InvalidPublicKey(format!(
            "{} bytes are not a {} point",
            bytes.len(),
            C::CURVE
        ))
    })
}

impl<C> KeyExchange for Ecdh<C>
where
    C: EcdhCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    fn curve(&self) -> NamedCurve {
        C::CURVE
    }

    fn key_pair(&self) -> (SecretBytes, Vec<u8>) {
        let mut scalar = self.secret.to_bytes();
        let private = SecretBytes::from(trim_leading_zeros(&scalar));
        scalar.as_mut_slice().zeroize();
        (private, self.public_key_bytes())
    }

    fn generate_secret(&self, peer_public: &[u8]) -> CryptoResult<SharedSecret> {
        let peer = decode_public_key::<C>(peer_public)?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());

        Ok(SharedSecret {
            bytes: SecretBytes::from(trim_leading_zeros(shared.raw_secret_bytes())),
            field_size: C::CURVE.field_size(),
        })
    }
}

/// Generate a key pair on `curve`.
pub fn new_ecdh(curve: NamedCurve) -> CryptoResult<Box<dyn KeyExchange>> {
    Ok(match curve {
        NamedCurve::P256 => Box::new(Ecdh::<NistP256>::generate()?),
        NamedCurve::P384 => Box::new(Ecdh::<NistP384>::generate()?),
        NamedCurve::P521 => Box::new(Ecdh::<NistP521>::generate()?),
    })
}

/// Restore a key pair on `curve` from its marshalled form.
pub fn from_key_pair(
    curve: NamedCurve,
    private: &[u8],
    public: &[u8],
) -> CryptoResult<Box<dyn KeyExchange>> {
    Ok(match curve {
        NamedCurve::P256 => Box::new(Ecdh::<NistP256>::from_key_pair(private, public)?),
        NamedCurve::P384 => Box::new(Ecdh::<NistP384>::from_key_pair(private, public)?),
        NamedCurve::P521 => Box::new(Ecdh::<NistP521>::from_key_pair(private, public)?),
    })
}

/// Generate a P-256 key pair.
pub fn p256() -> CryptoResult<Ecdh<NistP256>> {
    Ecdh::generate()
}

/// Restore a P-256 key pair.
pub fn from_p256(private: &[u8], public: &[u8]) -> CryptoResult<Ecdh<NistP256>> {
    Ecdh::from_key_pair(private, public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_p256_key_pair_sizes() {
        let keyex = p256().unwrap();
        let (private, public) = keyex.key_pair();
        assert!(!private.is_empty() && private.len() <= 32);
        assert_eq!(public.len(), 65);
        assert_eq!(public[0], 0x04);
        assert_eq!(keyex.curve(), NamedCurve::P256);
    }

    #[test]
    fn test_from_key_pair_roundtrip() {
        let key1 = p256().unwrap();
        let (priv1, pub1) = key1.key_pair();

        let key2 = from_p256(priv1.as_slice(), &pub1).unwrap();
        let (priv2, pub2) = key2.key_pair();

        assert_eq!(priv1.as_slice(), priv2.as_slice());
        assert_eq!(pub1, pub2);
    }

    #[test]
    fn test_generate_secret_agreement() {
        let k1 = p256().unwrap();
        let k2 = p256().unwrap();
        let (_, pub1) = k1.key_pair();
        let (_, pub2) = k2.key_pair();

        let secret1 = k1.generate_secret(&pub2).unwrap();
        let secret2 = k2.generate_secret(&pub1).unwrap();

        assert_eq!(secret1.as_bytes(), secret2.as_bytes());
        assert!(secret1.len() <= 32);
        assert_eq!(secret1.to_fixed_width().len(), 32);
    }

    #[test]
    fn test_agreement_on_every_curve() {
        for curve in [NamedCurve::P256, NamedCurve::P384, NamedCurve::P521] {
            let a = new_ecdh(curve).unwrap();
            let b = new_ecdh(curve).unwrap();
            let (_, a_pub) = a.key_pair();
            let (_, b_pub) = b.key_pair();
            assert_eq!(a_pub.len(), curve.public_key_size());

            let s1 = a.generate_secret(&b_pub).unwrap();
            let s2 = b.generate_secret(&a_pub).unwrap();
            assert_eq!(s1.as_bytes(), s2.as_bytes(), "{}", curve);
            assert!(s1.len() <= curve.field_size());
            assert_eq!(s1.to_fixed_width().len(), curve.field_size());
        }
    }

    #[test]
    fn test_restored_pair_derives_same_secret() {
        let a = new_ecdh(NamedCurve::P384).unwrap();
        let b = new_ecdh(NamedCurve::P384).unwrap();
        let (a_priv, a_pub) = a.key_pair();
        let (_, b_pub) = b.key_pair();

        let restored = from_key_pair(NamedCurve::P384, a_priv.as_slice(), &a_pub).unwrap();
        assert_eq!(
            a.generate_secret(&b_pub).unwrap().as_bytes(),
            restored.generate_secret(&b_pub).unwrap().as_bytes()
        );
    }

    #[test]
    fn test_rejects_point_off_curve() {
        let keyex = p256().unwrap();
        let (_, mut public) = keyex.key_pair();
        let last = public.len() - 1;
        public[last] ^= 0x01;

        let err = keyex.generate_secret(&public).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPublicKey(_)));
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_rejects_point_from_other_curve() {
        let p256_key = p256().unwrap();
        let (_, p384_pub) = new_ecdh(NamedCurve::P384).unwrap().key_pair();
        assert!(p256_key.generate_secret(&p384_pub).is_err());
    }

    #[test]
    fn test_rejects_mismatched_pair() {
        let (priv1, _) = p256().unwrap().key_pair();
        let (_, pub2) = p256().unwrap().key_pair();

        let err = from_p256(priv1.as_slice(), &pub2).err().unwrap();
        assert!(matches!(err, CryptoError::KeyPairMismatch));
    }

    #[test]
    fn test_rejects_zero_scalar() {
        let (_, public) = p256().unwrap().key_pair();
        let err = from_p256(&[0u8; 32], &public).err().unwrap();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn test_derive_key_from_shared_secret() {
        let a = p256().unwrap();
        let b = p256().unwrap();
        let (_, a_pub) = a.key_pair();
        let (_, b_pub) = b.key_pair();

        let k1 = a.generate_secret(&b_pub).unwrap().derive_key(b"salt", b"aes-key", 32).unwrap();
        let k2 = b.generate_secret(&a_pub).unwrap().derive_key(b"salt", b"aes-key", 32).unwrap();
        assert!(k1.ct_eq(k2.as_slice()));

        let other = a.generate_secret(&b_pub).unwrap().derive_key(b"salt", b"mac-key", 32).unwrap();
        assert!(!k1.ct_eq(other.as_slice()));
    }

    #[test]
    fn test_curve_from_str() {
        assert_eq!("P-256".parse::<NamedCurve>().unwrap(), NamedCurve::P256);
        assert_eq!("secp384r1".parse::<NamedCurve>().unwrap(), NamedCurve::P384);
        assert_eq!("p521".parse::<NamedCurve>().unwrap(), NamedCurve::P521);
        assert!("curve25519".parse::<NamedCurve>().is_err());
    }

    #[test]
    fn test_generate_on_every_curve() {
        for curve in [NamedCurve::P256, NamedCurve::P384, NamedCurve::P521] {
            let keyex = new_ecdh(curve).unwrap();
            let (private, public) = keyex.key_pair();
            assert_eq!(keyex.curve(), curve);
            assert!(private.as_slice().iter().any(|&b| b != 0));
            assert!(private.len() <= curve.field_size());
            assert_eq!(public.len(), curve.public_key_size());
            assert!(from_key_pair(curve, private.as_slice(), &public).is_ok());
        }
    }

    #[test]
    fn test_shared_secret_drops_leading_zero_bytes() {
        let local = p256().unwrap();
        let (_, local_pub) = local.key_pair();

        // About one exchange in 256 yields an X coordinate with a zero top byte
        let mut found = None;
        for _ in 0..4096 {
            let peer = p256().unwrap();
            let (_, peer_pub) = peer.key_pair();
            let secret = local.generate_secret(&peer_pub).unwrap();
            if secret.to_fixed_width().as_slice()[0] == 0 {
                found = Some((peer, secret));
                break;
            }
        }
        let (peer, secret) = found.expect("no shared secret with a leading zero byte");

        let fixed = secret.to_fixed_width();
        assert!(secret.len() < 32);
        assert_eq!(fixed.len(), 32);
        assert_eq!(secret.as_bytes(), trim_leading_zeros(fixed.as_slice()));
        assert_ne!(secret.as_bytes()[0], 0);

        let from_peer = peer.generate_secret(&local_pub).unwrap();
        assert_eq!(from_peer.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn test_short_private_scalar_restores() {
        let scalar = [0x2au8; 31];
        let padded = {
            let mut bytes = [0u8; 32];
            bytes[1..].copy_from_slice(&scalar);
            bytes
        };
        let secret = SecretKey::<NistP256>::from_slice(&padded).unwrap();
        let public = secret.public_key().to_encoded_point(false);

        let restored = from_p256(&scalar, public.as_bytes()).unwrap();
        let (private, restored_pub) = restored.key_pair();
        assert_eq!(private.as_slice(), &scalar[..]);
        assert_eq!(restored_pub, public.as_bytes());

        assert!(from_p256(&[0x2a; 33], public.as_bytes()).is_err());
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1u8, 0][..]);
        assert_eq!(trim_leading_zeros(&[7]), &[7u8][..]);
        assert!(trim_leading_zeros(&[0, 0]).is_empty());
    }
}
