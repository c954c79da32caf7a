//! 打开的流句柄
//!
//! One open file: an fopen-style mode and an in-memory staging buffer that
//! acts as the file's content while the handle is alive. Reads, writes,
//! seeks and cursor queries touch the buffer only; the network round trip
//! happens at flush points (flush, truncate, close-while-dirty), never per
//! write.

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use crate::error::{FsError, FsResult};
use crate::mime;
use crate::s3::StorageClient;

use super::cache::StatCache;
use super::stat::StatRecord;

/// Normalized fopen mode. Binary/text flags are stripped during parsing;
/// anything outside this set is rejected. / 规范化的打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r` — read only, object must exist
    Read,
    /// `r+` — read/write, object must exist
    ReadWrite,
    /// `w` — truncate/create
    Write,
    /// `a` — append, created when missing
    Append,
    /// `a+` — append + read
    AppendRead,
    /// `x` — exclusive create, object must not exist
    Exclusive,
}

impl OpenMode {
    pub fn parse(raw: &str) -> FsResult<Self> {
        // 去掉二进制/文本标志
        let normalized: String = raw.chars().filter(|c| *c != 'b' && *c != 't').collect();
        match normalized.as_str() {
            "r" => Ok(OpenMode::Read),
            "r+" => Ok(OpenMode::ReadWrite),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            "a+" => Ok(OpenMode::AppendRead),
            "x" => Ok(OpenMode::Exclusive),
            _ => Err(FsError::InvalidMode(raw.to_string())),
        }
    }

    pub fn writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    pub fn is_append(self) -> bool {
        matches!(self, OpenMode::Append | OpenMode::AppendRead)
    }

    /// Modes that refuse to open a missing object / 要求对象存在的模式
    pub fn requires_existing(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Modes that refuse to open an existing object / 要求对象不存在的模式
    pub fn requires_absent(self) -> bool {
        matches!(self, OpenMode::Exclusive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadWrite => "r+",
            OpenMode::Write => "w",
            OpenMode::Append => "a",
            OpenMode::AppendRead => "a+",
            OpenMode::Exclusive => "x",
        }
    }
}

/// An open file. Single-owner: operations take `&mut self` and calls on
/// one handle are strictly sequential. / 打开的文件句柄
pub struct FileHandle {
    key: String,
    /// Full path including the scheme, used as the cache key
    path: String,
    mode: OpenMode,
    buffer: Vec<u8>,
    position: usize,
    dirty: bool,
    closed: bool,
    client: Arc<StorageClient>,
    cache: Arc<StatCache>,
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .field("len", &self.buffer.len())
            .finish()
    }
}

impl FileHandle {
    pub(crate) fn new(
        key: String,
        path: String,
        mode: OpenMode,
        buffer: Vec<u8>,
        client: Arc<StorageClient>,
        cache: Arc<StatCache>,
    ) -> Self {
        let position = if mode.is_append() { buffer.len() } else { 0 };
        Self {
            key,
            path,
            mode,
            buffer,
            position,
            dirty: false,
            closed: false,
            client,
            cache,
        }
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Read up to `count` bytes from the buffer at the cursor. Never
    /// performs network I/O. / 从本地缓冲读取
    pub fn read(&mut self, count: usize) -> Vec<u8> {
        if self.position >= self.buffer.len() {
            return Vec::new();
        }
        let end = (self.position + count).min(self.buffer.len());
        let chunk = self.buffer[self.position..end].to_vec();
        self.position = end;
        chunk
    }

    /// Write at the cursor, overwriting and extending the buffer as
    /// needed. Local only; the upload happens at the next flush point.
    /// / 写入本地缓冲
    pub fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }
        // seeking past the end then writing pads the gap with zeroes
        if self.position > self.buffer.len() {
            self.buffer.resize(self.position, 0);
        }
        let overlap = (self.buffer.len() - self.position).min(data.len());
        self.buffer[self.position..self.position + overlap].copy_from_slice(&data[..overlap]);
        self.buffer.extend_from_slice(&data[overlap..]);
        self.position += data.len();
        self.dirty = true;
        Ok(data.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        let target: i64 = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.position as i64 + delta,
            SeekFrom::End(delta) => self.buffer.len() as i64 + delta,
        };
        if target < 0 {
            return Err(FsError::InvalidArgument(format!(
                "seek before start of stream: {}",
                target
            )));
        }
        self.position = target as usize;
        Ok(self.position as u64)
    }

    pub fn tell(&self) -> u64 {
        self.position as u64
    }

    pub fn eof(&self) -> bool {
        self.position >= self.buffer.len()
    }

    /// Stat for the open handle: the buffer length is the size — local
    /// truth wins over whatever the remote currently reports.
    /// / 打开句柄的stat，以本地缓冲长度为准
    pub fn stat(&self) -> StatRecord {
        StatRecord::file(self.buffer.len() as u64, Utc::now().timestamp())
    }

    /// Upload the whole buffer and invalidate the cached stat. On a
    /// read-only handle this is the fail-to-flush signal. / 刷写缓冲
    pub async fn flush(&mut self) -> FsResult<()> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }
        self.upload_buffer().await
    }

    /// Resize the buffer then perform the same full upload as `flush`.
    /// / 截断后立即刷写
    pub async fn truncate(&mut self, new_size: u64) -> FsResult<()> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }
        self.buffer.resize(new_size as usize, 0);
        self.upload_buffer().await
    }

    /// Idempotent; flushes once more only if writes are still staged.
    /// / 关闭句柄（幂等）
    pub async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.dirty && self.mode.writable() {
            self.upload_buffer().await?;
        }
        self.closed = true;
        self.buffer = Vec::new();
        self.position = 0;
        Ok(())
    }

    async fn upload_buffer(&mut self) -> FsResult<()> {
        let content_type = mime::content_type_for(&self.key);
        self.client
            .put(
                &self.key,
                Bytes::copy_from_slice(&self.buffer),
                content_type,
            )
            .await?;
        self.cache.invalidate(&self.path);
        self.dirty = false;
        tracing::debug!("flushed {} bytes to {}", self.buffer.len(), self.path);
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.dirty && !self.closed {
            // can't flush from a sync drop; the staged bytes are lost
            tracing::warn!("handle for {} dropped with unflushed writes", self.path);
        }
    }
}
