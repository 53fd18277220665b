use thiserror::Error;

/// 全 crate 通用的 Result 别名
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    /// 密钥错误、nonce 错误或密文被篡改
    #[error("authentication failed for chunk {chunk_index}")]
    Authentication { chunk_index: u64 },

    #[error("stream truncated: {0}")]
    Truncated(&'static str),

    #[error("signer failed: {0}")]
    Signer(String),

    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// 构造函数或选项边界处被拒绝的输入
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{what} must be exactly {expected} bytes, got {actual}")]
    WrongLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} must be at least {min} bytes, got {actual}")]
    TooShort {
        what: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("password must be at least {min} bytes")]
    PasswordTooShort { min: usize },

    #[error("signature must be a 0x-prefixed hex string")]
    InvalidSignatureHex,

    #[error("chunk size must be positive and leave room for the authentication tag")]
    InvalidChunkSize,

    #[error("signing message does not contain the file hash challenge")]
    UnboundChallenge,
}

/// 加密文件格式错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("buffer too short for header prefix: {0} bytes")]
    TooShort(usize),

    #[error("invalid magic, not an encrypted file")]
    InvalidMagic,

    #[error("header length {len} exceeds the {available} bytes available")]
    LengthOutOfBounds { len: usize, available: usize },

    #[error("header length {len} exceeds maximum {max}")]
    HeaderTooLarge { len: usize, max: usize },

    #[error("header CBOR decode failed: {0}")]
    Cbor(String),

    #[error("invalid header record: {0}")]
    Shape(&'static str),

    #[error("unsupported header version {0}")]
    UnsupportedVersion(u64),
}
