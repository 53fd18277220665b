//! 文件格式：Header 编解码、chunk 分帧与分帧缓冲

pub mod header;
pub mod queue;
pub mod stream;

pub use header::{
    EncryptionHeader, IkmMethod, MAX_HEADER_LEN, create_encryption_header,
    read_encryption_header,
};
pub use queue::ByteQueue;
pub use stream::{
    ChunkOpener, ChunkSealer, DEFAULT_CHUNK_SIZE, Progress, ProgressFn, StreamSummary,
};
