//! Constant-time comparisons.
//!
//! Password hashes, MAC tags and other secret-derived values MUST be compared
//! with these helpers, never with `==`, so that comparison time does not leak
//! how many leading bytes matched.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices
///
/// Returns true if slices are equal, false otherwise.
/// Execution time is independent of the slice contents.
///
/// # Example
///
/// ```rust
/// use cryptokit::constant_time::ct_eq;
///
/// assert!(ct_eq(b"secret_tag", b"secret_tag"));
/// assert!(!ct_eq(b"secret_tag", b"secret_tab"));
/// ```
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Constant-time MAC/HMAC verification
pub fn verify_mac(expected_tag: &[u8], computed_tag: &[u8]) -> bool {
    ct_eq(expected_tag, computed_tag)
}
