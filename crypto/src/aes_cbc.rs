use crate::encryption::Cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::memory_security::SecretBytes;
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{
    block_padding::NoPadding, BlockCipher, BlockDecryptMut, BlockEncryptMut, InnerIvInit,
    KeyInit,
};
use tracing::{debug, trace};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Expanded AES key schedule for the three key sizes.
#[derive(Clone)]
enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesBlock {
    fn new(key: &[u8]) -> CryptoResult<Self> {
        let invalid = |_| CryptoError::InvalidKeySize(key.len());
        match key.len() {
            0 => Err(CryptoError::EmptyKey),
            16 => Aes128::new_from_slice(key).map(AesBlock::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(AesBlock::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(AesBlock::Aes256).map_err(invalid),
            other => Err(CryptoError::InvalidKeySize(other)),
        }
    }

    fn encrypt_blocks(&self, iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
        match self {
            AesBlock::Aes128(c) => cbc_encrypt(c, iv, buf),
            AesBlock::Aes192(c) => cbc_encrypt(c, iv, buf),
            AesBlock::Aes256(c) => cbc_encrypt(c, iv, buf),
        }
    }

    fn decrypt_blocks(&self, iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
        match self {
            AesBlock::Aes128(c) => cbc_decrypt(c, iv, buf),
            AesBlock::Aes192(c) => cbc_decrypt(c, iv, buf),
            AesBlock::Aes256(c) => cbc_decrypt(c, iv, buf),
        }
    }
}

fn cbc_encrypt<B>(block: &B, iv: &[u8], buf: &mut [u8]) -> CryptoResult<()>
where
    B: BlockCipher + BlockEncryptMut + Clone,
{
    let len = buf.len();
    cbc::Encryptor::<B>::inner_iv_slice_init(block.clone(), iv)
        .map_err(|_| CryptoError::IvTooLong(iv.len()))?
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| CryptoError::NotMultipleOfBlockSize(len))?;
    Ok(())
}

fn cbc_decrypt<B>(block: &B, iv: &[u8], buf: &mut [u8]) -> CryptoResult<()>
where
    B: BlockCipher + BlockDecryptMut + Clone,
{
    let len = buf.len();
    cbc::Decryptor::<B>::inner_iv_slice_init(block.clone(), iv)
        .map_err(|_| CryptoError::IvTooLong(iv.len()))?
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| CryptoError::NotMultipleOfBlockSize(len))?;
    Ok(())
}

/// Bring an IV to exactly one AES block.
///
/// A full block is used as-is and anything longer is rejected. Shorter IVs
/// are hex-encoded, right-padded with `"00"` pairs to 32 hex digits and
/// decoded again, which is the same as appending zero bytes. Data sealed by
/// older deployments depends on exactly this rule.
pub fn normalize_iv(iv: &[u8]) -> CryptoResult<[u8; BLOCK_SIZE]> {
    if iv.len() > BLOCK_SIZE {
        return Err(CryptoError::IvTooLong(iv.len()));
    }

    let mut iv_hex = hex::encode(iv);
    if iv.len() < BLOCK_SIZE {
        trace!(iv_len = iv.len(), "padding short IV to block size");
        for _ in iv.len()..BLOCK_SIZE {
            iv_hex.push_str("00");
        }
    }

    let mut normalized = [0u8; BLOCK_SIZE];
    hex::decode_to_slice(&iv_hex, &mut normalized)?;
    Ok(normalized)
}

/// Append PKCS#7 padding: `n` bytes of value `n`, 1 <= n <= block size.
fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - data.len() % block_size;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    // pad_len is at most block_size (16)
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip PKCS#7 padding.
///
/// Lenient mode trusts the final byte as the pad length and truncates
/// without looking at the other pad bytes; only lengths that cannot be cut
/// from the buffer are refused. Strict mode also requires the length to fit
/// in one block and every pad byte to carry the pad value.
fn pkcs7_unpad(mut data: Vec<u8>, block_size: usize, strict: bool) -> CryptoResult<Vec<u8>> {
    let pad_len = match data.last() {
        Some(&last) => usize::from(last),
        None => return Err(CryptoError::InvalidPadding("empty plaintext".to_string())),
    };

    if pad_len == 0 || pad_len > data.len() {
        return Err(CryptoError::InvalidPadding(format!(
            "pad length {} does not fit a {} byte buffer",
            pad_len,
            data.len()
        )));
    }

    let keep = data.len() - pad_len;
    if strict {
        let tail_ok = data
            .get(keep..)
            .is_some_and(|tail| tail.iter().all(|&b| usize::from(b) == pad_len));
        if pad_len > block_size || !tail_ok {
            return Err(CryptoError::InvalidPadding(
                "padding bytes do not match the pad length".to_string(),
            ));
        }
    }

    data.truncate(keep);
    Ok(data)
}

/// AES in CBC mode with PKCS#7 padding.
///
/// Key sizes of 16, 24 and 32 bytes select AES-128/192/256. The IV is fixed
/// at construction, so equal plaintexts produce equal ciphertexts; this
/// engine exists to read and write data produced by systems that already
/// made that choice. Prefer [`AesGcm`](crate::AesGcm) for new data.
pub struct AesCbc {
    key: SecretBytes,
    iv: [u8; BLOCK_SIZE],
    block: AesBlock,
    strict_padding: bool,
}

impl AesCbc {
    pub fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        let block = AesBlock::new(key)?;
        let iv = normalize_iv(iv)?;

        debug!(key_bits = key.len() * 8, "initialized AES-CBC cipher");

        Ok(Self {
            key: SecretBytes::from(key),
            iv,
            block,
            strict_padding: false,
        })
    }

    /// Reject decrypted data whose padding bytes are malformed instead of
    /// trusting the final byte.
    pub fn with_strict_padding(mut self, strict: bool) -> Self {
        self.strict_padding = strict;
        self
    }

    pub fn strict_padding(&self) -> bool {
        self.strict_padding
    }

    pub fn key_len(&self) -> usize {
        self.key.len()
    }
}

impl Cipher for AesCbc {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut buf = pkcs7_pad(plaintext, BLOCK_SIZE);
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::NotMultipleOfBlockSize(buf.len()));
        }

        self.block.encrypt_blocks(&self.iv, &mut buf)?;
        trace!(
            plaintext_len = plaintext.len(),
            ciphertext_len = buf.len(),
            "AES-CBC encrypt"
        );
        Ok(buf)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::NotMultipleOfBlockSize(ciphertext.len()));
        }

        let mut buf = ciphertext.to_vec();
        self.block.decrypt_blocks(&self.iv, &mut buf)?;
        pkcs7_unpad(buf, BLOCK_SIZE, self.strict_padding)
    }

    fn iv(&self) -> &[u8] {
        &self.iv
    }

    fn algorithm(&self) -> &str {
        match self.block {
            AesBlock::Aes128(_) => "AES-128-CBC",
            AesBlock::Aes192(_) => "AES-192-CBC",
            AesBlock::Aes256(_) => "AES-256-CBC",
        }
    }
}
