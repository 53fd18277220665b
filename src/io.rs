//! 加解密流水线与调用方传输层之间的字节流接口
//!
//! 职责范围：
//! - 输入为拉取式：流水线向 `ByteSource` 要下一段数据，未到达时挂起
//! - 输出带背压：每次 `write` 之前先等待 `ByteSink::ready`
//! - 失败时以触发错误 abort 输出、cancel 输入，下游看到的是“被终止的流”，
//!   而不是悄悄变短的流
//!
//! 本模块不关心数据来自文件、网络还是内存。

use std::future::Future;
use std::io;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::{Error, Result};
use crate::format::queue::ByteQueue;

/// `ReaderSource::new` 每次读取的段大小
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// 拉取式输入
pub trait ByteSource {
    /// 下一段数据；输入耗尽后返回 `None`。
    fn read(&mut self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;

    /// 流水线失败后尽力取消输入
    fn cancel(&mut self, reason: &Error) -> impl Future<Output = ()> + Send {
        let _ = reason;
        async {}
    }
}

/// 带背压的输出
pub trait ByteSink {
    /// 目标可以接收下一次写入时完成
    fn ready(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        async { Ok(()) }
    }

    fn write(&mut self, chunk: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// 正常结束输出
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// 流水线失败后终止输出
    fn abort(&mut self, reason: &Error) -> impl Future<Output = ()> + Send {
        let _ = reason;
        async {}
    }
}

/// 基于 `AsyncRead` 的 `ByteSource`
pub struct ReaderSource<R> {
    reader: Option<R>,
    read_size: usize,
}

impl<R> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_read_size(reader, DEFAULT_READ_SIZE)
    }

    pub fn with_read_size(reader: R, read_size: usize) -> Self {
        Self {
            reader: Some(reader),
            read_size: read_size.max(1),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn read(&mut self) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut buf = BytesMut::with_capacity(self.read_size);
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    async fn cancel(&mut self, _reason: &Error) {
        self.reader = None;
    }
}

/// 基于字节段 `Stream` 的 `ByteSource`
pub struct StreamSource<S> {
    stream: Option<S>,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

impl<S> ByteSource for StreamSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
{
    async fn read(&mut self) -> io::Result<Option<Bytes>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Ok(None),
        }
    }

    async fn cancel(&mut self, _reason: &Error) {
        self.stream = None;
    }
}

/// 基于 `AsyncWrite` 的 `ByteSink`；close 时 flush 并 shutdown。
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ByteSink for WriterSink<W> {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.writer.write_all(&chunk).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkState {
    #[default]
    Open,
    Closed,
    Aborted(String),
}

/// 内存输出：记录每次写入的长度以及输出如何结束
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    writes: Vec<usize>,
    state: SinkState,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 按顺序记录的每次写入长度
    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    pub fn state(&self) -> &SinkState {
        &self.state
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.state != SinkState::Open {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write to finished sink",
            ));
        }
        self.writes.push(chunk.len());
        self.data.extend_from_slice(&chunk);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.state = SinkState::Closed;
        Ok(())
    }

    async fn abort(&mut self, reason: &Error) {
        self.state = SinkState::Aborted(reason.to_string());
    }
}

/// 先等待 ready，再写入
pub(crate) async fn send<W: ByteSink>(sink: &mut W, chunk: Bytes) -> Result<()> {
    sink.ready().await?;
    sink.write(chunk).await?;
    Ok(())
}

/// 读取直到 `queue` 至少有 `n` 字节；输入先结束则返回 `false`
pub(crate) async fn fill<R: ByteSource>(
    source: &mut R,
    queue: &mut ByteQueue,
    n: usize,
) -> Result<bool> {
    while queue.len() < n {
        match source.read().await? {
            Some(segment) => queue.push(segment),
            None => return Ok(false),
        }
    }
    Ok(true)
}

/// 收尾：成功则 close 输出；失败（含 close 本身失败）则 abort 输出并 cancel 输入，
/// 最后把原始错误返回给调用方。
pub(crate) async fn settle<R, W, T>(source: &mut R, sink: &mut W, result: Result<T>) -> Result<T>
where
    R: ByteSource,
    W: ByteSink,
{
    let err = match result {
        Ok(value) => match sink.close().await {
            Ok(()) => return Ok(value),
            Err(e) => Error::Io(e),
        },
        Err(err) => err,
    };

    warn!(error = %err, "pipeline failed, aborting streams");
    sink.abort(&err).await;
    source.cancel(&err).await;
    Err(err)
}
