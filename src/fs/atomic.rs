//! 原子文件输出。
//!
//! 数据先写入目标旁边的临时文件：
//! - `close` 落盘并 rename 覆盖目标文件；
//! - `abort`（或未完成就被 drop）删除临时文件。
//!
//! 流水线失败时目标路径上不会出现半截文件。

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Error;
use crate::io::ByteSink;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 以临时文件 + rename 实现的 `ByteSink`。
pub struct AtomicFileSink {
    target: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
    // rename 成功后为 true，此后临时文件已不存在
    committed: bool,
}

impl AtomicFileSink {
    /// 在 `target` 同目录创建临时文件，必要时创建父目录。
    pub async fn create(target: &Path) -> io::Result<Self> {
        let parent = target.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "目标路径没有父目录，无法执行原子写入")
        })?;
        fs::create_dir_all(parent).await?;

        let tmp_path = build_tmp_path(parent, target.file_name());
        let file = File::create(&tmp_path).await?;
        debug!(tmp = %tmp_path.display(), "opened temporary output");

        Ok(Self {
            target: target.to_path_buf(),
            tmp_path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "atomic sink already finished")
        })
    }

    async fn discard_tmp(&mut self) {
        match fs::remove_file(&self.tmp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(tmp = %self.tmp_path.display(), "failed to remove temporary output: {e}")
            }
        }
    }
}

impl ByteSink for AtomicFileSink {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.file()?.write_all(&chunk).await
    }

    async fn close(&mut self) -> io::Result<()> {
        let file = self.file()?;
        file.flush().await?;
        file.sync_all().await?;
        // 先关闭句柄再 rename；失败时临时文件仍由 abort / Drop 清理
        self.file = None;

        if fs::try_exists(&self.target).await? {
            fs::remove_file(&self.target).await?;
        }
        fs::rename(&self.tmp_path, &self.target).await?;
        self.committed = true;
        Ok(())
    }

    async fn abort(&mut self, reason: &Error) {
        if self.committed {
            return;
        }
        self.file = None;
        self.discard_tmp().await;
        debug!(path = %self.target.display(), %reason, "discarded partial output");
    }
}

impl Drop for AtomicFileSink {
    fn drop(&mut self) {
        if !self.committed {
            self.file = None;
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

/// 临时文件名：`.{name}.tmp-{pid}-{纳秒时间戳}-{计数}`
fn build_tmp_path(parent: &Path, file_name: Option<&std::ffi::OsStr>) -> PathBuf {
    let base_name = file_name
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("shf-output");

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(
        ".{base_name}.tmp-{}-{timestamp}-{counter}",
        std::process::id()
    ))
}
