//! SHF Stream 实现
//!
//! Header 之后，加密文件就是各个 chunk 的直接拼接，没有逐块长度字段：
//!
//! ```text
//! chunk_0 = ChaCha20-Poly1305(DEK, nonce(0), plaintext[0..chunk_size]) || tag
//! chunk_1 = ...
//! chunk_N = final chunk, plaintext length in 0..=chunk_size
//! ```
//!
//! 设计前提与约束：
//! - 除最后一块外，每个 chunk 恰好携带 `chunk_size` 字节明文
//! - 因此解密方按 `chunk_size + TAG_SIZE` 分帧
//! - chunk 严格按序号顺序加密与解密

use tracing::debug;

use crate::crypto::aead::{self, TAG_SIZE};
use crate::crypto::keys::{Aad, BaseNonce, Dek};
use crate::error::{Error, Result, ValidationError};

/// 默认明文 chunk 大小：16 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// 每处理完一个 chunk 传给回调的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 刚写出的 chunk 序号
    pub chunk_index: u64,
    /// 累计处理的明文字节数
    pub bytes_processed: u64,
}

/// 进度回调
pub type ProgressFn = Box<dyn FnMut(Progress) + Send>;

/// 流水线完成后的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: u64,
    pub plaintext_bytes: u64,
}

/// 校验调用方传入的 chunk 大小
///
/// 必须为正，且加上 tag 后不能溢出 `usize`。
pub fn validate_chunk_size(chunk_size: usize) -> Result<usize, ValidationError> {
    if chunk_size == 0 || chunk_size > usize::MAX - TAG_SIZE {
        return Err(ValidationError::InvalidChunkSize);
    }
    Ok(chunk_size)
}

/// 携带 `plaintext_len` 字节明文的 chunk 加密后的长度
pub fn sealed_len(plaintext_len: usize) -> usize {
    plaintext_len + TAG_SIZE
}

/// 加密端：按连续 nonce 逐块加密
pub struct ChunkSealer {
    dek: Dek,
    base_nonce: BaseNonce,
    chunk_index: u64,
}

impl ChunkSealer {
    pub fn new(dek: Dek, base_nonce: BaseNonce) -> Self {
        Self {
            dek,
            base_nonce,
            chunk_index: 0,
        }
    }

    /// 下一个待加密 chunk 的序号
    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.base_nonce.nonce(self.chunk_index);
        let sealed = aead::seal(&self.dek, &nonce, plaintext, &Aad::empty())
            .map_err(|_| Error::Internal("AEAD encrypt failed"))?;

        debug!(
            chunk_index = self.chunk_index,
            plaintext_len = plaintext.len(),
            "sealed chunk"
        );
        self.chunk_index += 1;
        Ok(sealed)
    }
}

/// 解密端：按连续 nonce 逐块解密
pub struct ChunkOpener {
    dek: Dek,
    base_nonce: BaseNonce,
    chunk_index: u64,
}

impl ChunkOpener {
    pub fn new(dek: Dek, base_nonce: BaseNonce) -> Self {
        Self {
            dek,
            base_nonce,
            chunk_index: 0,
        }
    }

    /// 下一个待解密 chunk 的序号，也即已解密的数量
    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    pub fn open(&mut self, sealed: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.base_nonce.nonce(self.chunk_index);
        let plaintext = aead::open(&self.dek, &nonce, sealed, &Aad::empty()).map_err(|_| {
            Error::Authentication {
                chunk_index: self.chunk_index,
            }
        })?;

        debug!(
            chunk_index = self.chunk_index,
            sealed_len = sealed.len(),
            "opened chunk"
        );
        self.chunk_index += 1;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (Dek, BaseNonce) {
        (
            Dek::from_bytes(&[3u8; 32]).unwrap(),
            BaseNonce::from_bytes(&[5u8; 12]).unwrap(),
        )
    }

    #[test]
    fn chunk_size_must_be_positive() {
        assert_eq!(
            validate_chunk_size(0),
            Err(ValidationError::InvalidChunkSize)
        );
        assert_eq!(validate_chunk_size(16), Ok(16));
    }

    #[test]
    fn chunk_size_must_leave_room_for_tag() {
        assert_eq!(
            validate_chunk_size(usize::MAX),
            Err(ValidationError::InvalidChunkSize)
        );
        assert_eq!(
            validate_chunk_size(usize::MAX - TAG_SIZE + 1),
            Err(ValidationError::InvalidChunkSize)
        );
        let largest = usize::MAX - TAG_SIZE;
        assert_eq!(validate_chunk_size(largest), Ok(largest));
        assert_eq!(sealed_len(largest), usize::MAX);
    }

    #[test]
    fn sealer_and_opener_advance_in_lockstep() {
        let (dek, base) = keys();
        let mut sealer = ChunkSealer::new(dek.clone(), base.clone());
        let mut opener = ChunkOpener::new(dek, base);

        let sealed: Vec<Vec<u8>> = [b"one".as_slice(), b"two", b""]
            .iter()
            .map(|p| sealer.seal(p).unwrap())
            .collect();
        assert_eq!(sealer.chunk_index(), 3);
        assert_eq!(sealed[0].len(), sealed_len(3));
        assert_ne!(sealed[0], sealed[1]);

        assert_eq!(opener.open(&sealed[0]).unwrap(), b"one");
        assert_eq!(opener.open(&sealed[1]).unwrap(), b"two");
        assert_eq!(opener.open(&sealed[2]).unwrap(), b"");
    }

    #[test]
    fn reordered_chunks_fail_authentication() {
        let (dek, base) = keys();
        let mut sealer = ChunkSealer::new(dek.clone(), base.clone());
        sealer.seal(b"first").unwrap();
        let second = sealer.seal(b"second").unwrap();

        let mut opener = ChunkOpener::new(dek, base);
        assert!(matches!(
            opener.open(&second),
            Err(Error::Authentication { chunk_index: 0 })
        ));
    }

    #[test]
    fn same_plaintext_seals_differently_per_index() {
        let (dek, base) = keys();
        let mut sealer = ChunkSealer::new(dek, base);
        let a = sealer.seal(&[0xab; 16]).unwrap();
        let b = sealer.seal(&[0xab; 16]).unwrap();
        assert_ne!(a, b);
    }
}
