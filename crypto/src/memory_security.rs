//! Memory hygiene for key material.
//!
//! Keys, exported private scalars and shared secrets are held in
//! [`SecretBytes`], which wipes its heap buffer when dropped and never
//! prints its contents through `Debug`.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Owned secret byte buffer, zeroized on drop.
///
/// No `Clone`: copies of secret material must be explicit
/// (`SecretBytes::from(secret.as_slice())`).
pub struct SecretBytes {
    data: Zeroizing<Vec<u8>>,
}

impl SecretBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Zeroizing::new(data),
        }
    }

    /// Buffer of `size` zero bytes, to be filled in place.
    pub fn zeroed(size: usize) -> Self {
        Self::new(vec![0u8; size])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Constant-time equality; lengths are not treated as secret.
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        self.data.len() == other.len() && bool::from(self.data.as_slice().ct_eq(other))
    }

    /// Wipe and clear the buffer now instead of waiting for drop.
    pub fn zeroize(&mut self) {
        self.data.zeroize();
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl AsRef<[u8]> for SecretBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_bytes_creation() {
        let secret = SecretBytes::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(secret.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(secret.len(), 5);
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_secret_bytes_zeroed() {
        let secret = SecretBytes::zeroed(10);
        assert_eq!(secret.as_slice(), &[0u8; 10]);
    }

    #[test]
    fn test_secret_bytes_zeroize() {
        let mut secret = SecretBytes::new(vec![0xFF; 32]);
        secret.as_mut_slice()[0] = 0x01;
        secret.zeroize();
        // Vec zeroization wipes the bytes and then clears the vector
        assert!(secret.is_empty());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBytes::from(&b"hunter2"[..]);
        let printed = format!("{:?}", secret);
        assert_eq!(printed, "SecretBytes([REDACTED; 7])");
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_ct_eq() {
        let secret = SecretBytes::from(vec![9u8; 16]);
        assert!(secret.ct_eq(&[9u8; 16]));
        assert!(!secret.ct_eq(&[9u8; 15]));
        assert!(!secret.ct_eq(&[8u8; 16]));
    }
}
