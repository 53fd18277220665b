//! SHF 流式分块认证文件加密
//!
//! ```text
//! KeySource ──► IKM ──HKDF──► DEK, BaseNonce ──► encrypt_file ──► "SHF" | len | CBOR header | chunks
//!                                                                          │
//!      get_ikm(header) ◄── read header ◄─────────── decrypt_file ◄─────────┘
//! ```
//!
//! 每个 chunk 使用 DEK 做 ChaCha20-Poly1305 加密，
//! nonce 为 `base_nonce` 末 8 字节与大端序号 `i` 异或。

mod decrypt;
mod encrypt;

pub mod crypto;
pub mod error;
pub mod format;
pub mod fs;
pub mod io;
pub mod key_source;

pub use crypto::{Aad, BaseNonce, Dek, Ikm, Info, Nonce, Salt, TAG_SIZE};
pub use decrypt::{DecryptOptions, decrypt_file, peek_header};
pub use encrypt::{EncryptOptions, encrypt_file};
pub use error::{Error, FormatError, Result, ValidationError};
pub use format::{
    DEFAULT_CHUNK_SIZE, EncryptionHeader, IkmMethod, MAX_HEADER_LEN, Progress, ProgressFn,
    StreamSummary, create_encryption_header, read_encryption_header,
};
pub use fs::AtomicFileSink;
pub use io::{ByteSink, ByteSource, MemorySink, ReaderSource, SinkState, StreamSource, WriterSink};
pub use key_source::{
    GeneratedKey, KeySource, MessageSigner, SigningContext, file_hash, generate_encryption_key,
    signing_message,
};
