//! 加密流程实现
//!
//! 加密流程（严格顺序）：
//! 1. 校验选项并编码 Header（失败时不产生任何 I/O）
//! 2. 写入 Header
//! 3. 按 `chunk_size` 切分输入，每块使用其序号对应的 nonce 加密
//! 4. 剩余部分作为最后一个 chunk；空输入也会产生一个仅含 tag 的 chunk
//!
//! 注意：
//! - 任何失败都会先 abort 输出、cancel 输入，再返回错误
//! - 本模块不负责密钥生成与密码输入

use std::fmt;

use bytes::Bytes;
use tracing::info;

use crate::crypto::keys::{BaseNonce, Dek};
use crate::error::Result;
use crate::format::header::{EncryptionHeader, create_encryption_header};
use crate::format::queue::ByteQueue;
use crate::format::stream::{
    ChunkSealer, DEFAULT_CHUNK_SIZE, Progress, ProgressFn, StreamSummary, validate_chunk_size,
};
use crate::io::{self, ByteSink, ByteSource};

pub struct EncryptOptions {
    /// 每个 chunk 的明文字节数，解密时必须使用相同的值
    pub chunk_size: usize,
    pub on_progress: Option<ProgressFn>,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_progress: None,
        }
    }
}

impl EncryptOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, f: impl FnMut(Progress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for EncryptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptOptions")
            .field("chunk_size", &self.chunk_size)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// 将 `source` 加密写入 `sink`：先写 Header，再写各个 chunk
pub async fn encrypt_file<R, W>(
    source: &mut R,
    sink: &mut W,
    dek: &Dek,
    base_nonce: &BaseNonce,
    header: &EncryptionHeader,
    options: EncryptOptions,
) -> Result<StreamSummary>
where
    R: ByteSource,
    W: ByteSink,
{
    let chunk_size = validate_chunk_size(options.chunk_size)?;
    let header_bytes = create_encryption_header(header)?;

    let mut run = EncryptRun {
        sealer: ChunkSealer::new(dek.clone(), base_nonce.clone()),
        chunk_size,
        processed: 0,
        on_progress: options.on_progress,
    };
    let result = run.run(source, sink, header_bytes).await;
    io::settle(source, sink, result).await
}

struct EncryptRun {
    sealer: ChunkSealer,
    chunk_size: usize,
    processed: u64,
    on_progress: Option<ProgressFn>,
}

impl EncryptRun {
    async fn run<R, W>(
        &mut self,
        source: &mut R,
        sink: &mut W,
        header_bytes: Vec<u8>,
    ) -> Result<StreamSummary>
    where
        R: ByteSource,
        W: ByteSink,
    {
        io::send(sink, Bytes::from(header_bytes)).await?;

        let mut queue = ByteQueue::new();
        while let Some(segment) = source.read().await? {
            queue.push(segment);
            while queue.len() >= self.chunk_size {
                let chunk = queue.take(self.chunk_size);
                self.seal_and_send(sink, &chunk).await?;
            }
        }

        if !queue.is_empty() || self.sealer.chunk_index() == 0 {
            let last = queue.take_all();
            self.seal_and_send(sink, &last).await?;
        }

        let summary = StreamSummary {
            chunks: self.sealer.chunk_index(),
            plaintext_bytes: self.processed,
        };
        info!(
            chunks = summary.chunks,
            bytes = summary.plaintext_bytes,
            "encryption finished"
        );
        Ok(summary)
    }

    async fn seal_and_send<W: ByteSink>(&mut self, sink: &mut W, plaintext: &[u8]) -> Result<()> {
        let chunk_index = self.sealer.chunk_index();
        let sealed = self.sealer.seal(plaintext)?;
        io::send(sink, Bytes::from(sealed)).await?;

        self.processed += plaintext.len() as u64;
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(Progress {
                chunk_index,
                bytes_processed: self.processed,
            });
        }
        Ok(())
    }
}
