//! 目录迭代器
//!
//! A directory cursor over a listing snapshot. Reading an entry strips the
//! listing prefix to yield a bare name and, as a side effect, primes the
//! stat cache with the metadata already present in the listing response —
//! stat calls on just-listed entries then cost nothing.

use std::sync::Arc;

use crate::error::FsResult;
use crate::s3::{ObjectSummary, StorageClient};

use super::cache::StatCache;
use super::stat::StatRecord;

pub struct DirHandle {
    scheme: String,
    prefix: String,
    entries: Vec<ObjectSummary>,
    position: usize,
    client: Arc<StorageClient>,
    cache: Arc<StatCache>,
}

impl DirHandle {
    pub(crate) fn new(
        scheme: String,
        prefix: String,
        entries: Vec<ObjectSummary>,
        client: Arc<StorageClient>,
        cache: Arc<StatCache>,
    ) -> Self {
        Self {
            scheme,
            prefix,
            entries,
            position: 0,
            client,
            cache,
        }
    }

    /// Advance the cursor and return the next bare entry name, or `None`
    /// when the listing is exhausted. / 读取下一个条目
    pub fn read(&mut self) -> Option<String> {
        while self.position < self.entries.len() {
            let entry = self.entries[self.position].clone();
            self.position += 1;

            let name = entry
                .key
                .strip_prefix(&self.prefix)
                .unwrap_or(&entry.key);
            if name.is_empty() {
                // the directory's own marker object
                continue;
            }

            let record = if entry.key.ends_with('/') {
                StatRecord::directory()
            } else {
                StatRecord::file(entry.size, entry.last_modified)
            };
            let full_path = format!(
                "{}://{}",
                self.scheme,
                entry.key.trim_end_matches('/')
            );
            self.cache.set(&full_path, record);

            return Some(name.trim_end_matches('/').to_string());
        }
        None
    }

    /// Re-issue the listing and reset the cursor / 重新列出并重置游标
    pub async fn rewind(&mut self) -> FsResult<()> {
        self.entries = self.client.list_all(&self.prefix).await?;
        self.position = 0;
        Ok(())
    }

    /// Release the cursor / 释放游标
    pub fn close(self) {}
}
