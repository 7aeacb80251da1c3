use thiserror::Error;

/// Coarse classification of a [`CryptoError`].
///
/// Callers that only need to decide how to react (reject input, report a
/// tampered message, fix configuration) can match on this instead of the
/// full variant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad key, IV, nonce or cost parameters, or a failing randomness source.
    Construction,
    /// Ciphertext length is not a multiple of the cipher block size.
    BlockAlignment,
    /// Decrypted data carries an impossible or malformed padding tail.
    Padding,
    /// AEAD tag did not verify.
    Authentication,
    /// Malformed hex or base64 input.
    Encoding,
    /// A stored password hash could not be parsed.
    MalformedEncodedHash,
    /// A primitive failed while processing otherwise valid input.
    Operation,
    /// Invalid or incomplete configuration.
    Configuration,
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key cannot be empty")]
    EmptyKey,

    #[error("Invalid key size: {0} bytes")]
    InvalidKeySize(usize),

    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonce(usize),

    #[error("IV too long: expected at most 16 bytes, got {0}")]
    IvTooLong(usize),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Public key does not belong to the private key")]
    KeyPairMismatch,

    #[error("Randomness source failed: {0}")]
    RandomSource(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Input length {0} is not a multiple of the block size")]
    NotMultipleOfBlockSize(usize),

    #[error("Invalid padding: {0}")]
    InvalidPadding(String),

    #[error("Message authentication failed")]
    AuthenticationFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Hash computation failed: {0}")]
    HashFailed(String),

    #[error("Invalid encoded input: {0}")]
    Encoding(String),

    #[error("Malformed encoded hash: {0}")]
    MalformedEncodedHash(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::EmptyKey
            | CryptoError::InvalidKeySize(_)
            | CryptoError::InvalidNonce(_)
            | CryptoError::IvTooLong(_)
            | CryptoError::InvalidKey(_)
            | CryptoError::InvalidPublicKey(_)
            | CryptoError::KeyPairMismatch
            | CryptoError::RandomSource(_)
            | CryptoError::InvalidParams(_) => ErrorKind::Construction,
            CryptoError::NotMultipleOfBlockSize(_) => ErrorKind::BlockAlignment,
            CryptoError::InvalidPadding(_) => ErrorKind::Padding,
            CryptoError::AuthenticationFailed => ErrorKind::Authentication,
            CryptoError::Encoding(_) => ErrorKind::Encoding,
            CryptoError::MalformedEncodedHash(_) => ErrorKind::MalformedEncodedHash,
            CryptoError::EncryptionFailed(_) | CryptoError::HashFailed(_) => ErrorKind::Operation,
            CryptoError::UnsupportedAlgorithm(_) | CryptoError::Configuration(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::Encoding(format!("hex: {}", err))
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::Encoding(format!("base64: {}", err))
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
