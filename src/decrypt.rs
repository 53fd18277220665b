//! 解密流程实现
//!
//! 解密流程（严格顺序）：
//! 1. 读取 7 字节前缀，拒绝错误 magic 与超限长度，再读取并校验 CBOR 记录
//! 2. 将 Header 交给调用方解析 IKM，派生 DEK 与 base nonce
//! 3. 每凑满一个 `chunk_size + TAG_SIZE` 就解密并写出
//! 4. 输入结束后，剩余部分作为最后一个 chunk 解密
//!
//! 注意：
//! - tag 校验失败的 chunk 不会写出任何明文
//! - 剩余字节不足以容纳 tag 视为截断，整个流程失败

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tracing::{debug, info};

use crate::crypto::TAG_SIZE;
use crate::crypto::keys::{BaseNonce, Dek, Ikm};
use crate::error::{Error, Result};
use crate::format::header::{self, EncryptionHeader, PREFIX_SIZE};
use crate::format::queue::ByteQueue;
use crate::format::stream::{
    ChunkOpener, DEFAULT_CHUNK_SIZE, Progress, ProgressFn, StreamSummary, sealed_len,
    validate_chunk_size,
};
use crate::io::{self, ByteSink, ByteSource};

pub struct DecryptOptions {
    /// 每个 chunk 的明文字节数，必须与加密时一致
    pub chunk_size: usize,
    pub on_progress: Option<ProgressFn>,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_progress: None,
        }
    }
}

impl DecryptOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, f: impl FnMut(Progress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for DecryptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptOptions")
            .field("chunk_size", &self.chunk_size)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// 将 `source` 解密写入 `sink`
///
/// `get_ikm` 拿到解析后的 Header，按其声明的方式还原加密时的 IKM。
pub async fn decrypt_file<R, W, F, Fut>(
    source: &mut R,
    sink: &mut W,
    get_ikm: F,
    options: DecryptOptions,
) -> Result<StreamSummary>
where
    R: ByteSource,
    W: ByteSink,
    F: FnOnce(EncryptionHeader) -> Fut,
    Fut: Future<Output = Result<Ikm>>,
{
    let chunk_size = validate_chunk_size(options.chunk_size)?;

    let result = run(source, sink, get_ikm, chunk_size, options.on_progress).await;
    io::settle(source, sink, result).await
}

/// 只读取并校验加密流的 Header
///
/// 调用后 source 的位置已越过 Header，解密需使用新的 source。
pub async fn peek_header<R: ByteSource>(source: &mut R) -> Result<EncryptionHeader> {
    read_header(source, &mut ByteQueue::new()).await
}

async fn run<R, W, F, Fut>(
    source: &mut R,
    sink: &mut W,
    get_ikm: F,
    chunk_size: usize,
    mut on_progress: Option<ProgressFn>,
) -> Result<StreamSummary>
where
    R: ByteSource,
    W: ByteSink,
    F: FnOnce(EncryptionHeader) -> Fut,
    Fut: Future<Output = Result<Ikm>>,
{
    let mut queue = ByteQueue::new();
    let header = read_header(source, &mut queue).await?;

    let salt = header.salt.clone();
    let ikm = get_ikm(header).await?;
    let dek = Dek::derive(&ikm, &salt)?;
    let base_nonce = BaseNonce::derive(&ikm, &salt)?;
    drop(ikm);

    let mut opener = ChunkOpener::new(dek, base_nonce);
    let full_chunk = sealed_len(chunk_size);
    let mut processed = 0u64;

    loop {
        while queue.len() >= full_chunk {
            let sealed = queue.take(full_chunk);
            processed +=
                open_and_send(&mut opener, sink, &sealed, processed, &mut on_progress).await?;
        }
        match source.read().await? {
            Some(segment) => queue.push(segment),
            None => break,
        }
    }

    let remainder = queue.len();
    let first_chunk = opener.chunk_index() == 0;
    if remainder == 0 && first_chunk {
        return Err(Error::Truncated("no ciphertext after header"));
    }
    if remainder > 0 {
        if remainder < TAG_SIZE || (remainder == TAG_SIZE && !first_chunk) {
            return Err(Error::Truncated("final chunk too short"));
        }
        let sealed = queue.take_all();
        processed +=
            open_and_send(&mut opener, sink, &sealed, processed, &mut on_progress).await?;
    }

    let summary = StreamSummary {
        chunks: opener.chunk_index(),
        plaintext_bytes: processed,
    };
    info!(
        chunks = summary.chunks,
        bytes = summary.plaintext_bytes,
        "decryption finished"
    );
    Ok(summary)
}

async fn open_and_send<W: ByteSink>(
    opener: &mut ChunkOpener,
    sink: &mut W,
    sealed: &[u8],
    processed_before: u64,
    on_progress: &mut Option<ProgressFn>,
) -> Result<u64> {
    let chunk_index = opener.chunk_index();
    let plaintext = opener.open(sealed)?;
    let len = plaintext.len() as u64;
    io::send(sink, Bytes::from(plaintext)).await?;

    if let Some(on_progress) = on_progress.as_mut() {
        on_progress(Progress {
            chunk_index,
            bytes_processed: processed_before + len,
        });
    }
    Ok(len)
}

async fn read_header<R: ByteSource>(
    source: &mut R,
    queue: &mut ByteQueue,
) -> Result<EncryptionHeader> {
    if !io::fill(source, queue, PREFIX_SIZE).await? {
        return Err(Error::Truncated("input ended inside header prefix"));
    }
    let prefix = queue.take(PREFIX_SIZE);
    let record_len = header::parse_prefix(&prefix)?;

    if !io::fill(source, queue, record_len).await? {
        return Err(Error::Truncated("input ended inside header"));
    }
    let mut buf = Vec::with_capacity(PREFIX_SIZE + record_len);
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(&queue.take(record_len));

    let (header, _) = header::read_encryption_header(&buf)?;
    debug!(method = header.ikm_method.as_str(), record_len, "read header");
    Ok(header)
}
