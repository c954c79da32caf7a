//! 虚拟流式文件系统
//!
//! The filesystem state machine: translates POSIX-shaped calls into object
//! operations plus the staging buffer held by each open handle. Directory
//! hierarchy is emulated on the flat key space — a directory is a zero-byte
//! object whose key ends in `/`.
//!
//! Freshness rule: the stat cache accelerates read-only metadata queries
//! only. Existence decisions on the mutation path (open modes, mkdir)
//! always make a live call, so a stale cache can never corrupt a write.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{FsError, FsResult};
use crate::mime;
use crate::s3::StorageClient;

use super::cache::{CacheEntry, StatCache};
use super::dir::DirHandle;
use super::handle::{FileHandle, OpenMode};
use super::stat::StatRecord;

/// Host-agnostic filesystem capability interface. Two configured
/// instances of [`ObjectFs`] (public/private tier) are registered under
/// distinct schemes; the host resolves paths through the registry and
/// calls these methods. / 文件系统能力接口
#[async_trait]
pub trait StreamFilesystem: Send + Sync {
    fn scheme(&self) -> &str;

    async fn open(&self, path: &str, mode: &str) -> FsResult<FileHandle>;

    async fn stat(&self, path: &str) -> FsResult<StatRecord>;

    async fn mkdir(&self, path: &str) -> FsResult<()>;

    async fn rmdir(&self, path: &str) -> FsResult<()>;

    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    async fn unlink(&self, path: &str) -> FsResult<()>;

    async fn open_dir(&self, path: &str) -> FsResult<DirHandle>;

    /// Upload URL for external uploaders / 外部上传者使用的预签名URL
    fn presigned_upload_url(&self, path: &str) -> FsResult<String>;
}

/// The filesystem over one bucket/prefix. Cheap to share: handles keep
/// their own `Arc`s to the client and the execution-scoped cache.
/// / 绑定单个存储桶的文件系统实例
pub struct ObjectFs {
    scheme: String,
    client: Arc<StorageClient>,
    cache: Arc<StatCache>,
}

impl std::fmt::Debug for ObjectFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFs")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl ObjectFs {
    pub fn new(scheme: impl Into<String>, client: Arc<StorageClient>, cache: Arc<StatCache>) -> Self {
        Self {
            scheme: scheme.into(),
            client,
            cache,
        }
    }

    pub fn client(&self) -> &Arc<StorageClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<StatCache> {
        &self.cache
    }

    /// Strip the scheme prefix; a path that does not carry this
    /// filesystem's scheme is a hard error. / 解析路径为对象键
    fn key_for(&self, path: &str) -> FsResult<String> {
        let prefix = format!("{}://", self.scheme);
        match path.strip_prefix(&prefix) {
            Some(rest) => Ok(rest.trim_start_matches('/').to_string()),
            None => Err(FsError::InvalidPath(format!(
                "path {:?} does not belong to scheme {:?}",
                path, self.scheme
            ))),
        }
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}://{}", self.scheme, key.trim_end_matches('/'))
    }

    /// Whether the final path segment carries an extension. Extensionless
    /// paths are assumed to be directories without asking the network —
    /// hosts walk many non-existent directory-like paths per request.
    /// / 末段是否带扩展名
    fn has_extension(key: &str) -> bool {
        let name = key.trim_end_matches('/').rsplit('/').next().unwrap_or(key);
        match name.rsplit_once('.') {
            Some((prefix, extension)) => !prefix.is_empty() && !extension.is_empty(),
            None => false,
        }
    }
}

#[async_trait]
impl StreamFilesystem for ObjectFs {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn open(&self, path: &str, mode: &str) -> FsResult<FileHandle> {
        let key = self.key_for(path)?;
        if key.is_empty() || key.ends_with('/') {
            return Err(FsError::InvalidPath(format!(
                "cannot open {:?} as a file",
                path
            )));
        }
        let mode = OpenMode::parse(mode)?;

        // 模式与存在性校验：互斥创建必须先确认对象不存在
        if mode.requires_absent() && self.client.exists(&key).await {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        // Seed the staging buffer. For read modes a missing object is the
        // caller's error; append tolerates it and starts empty.
        let buffer = if mode.requires_existing() {
            self.client.get(&key).await?.to_vec()
        } else if mode.is_append() {
            match self.client.get(&key).await {
                Ok(body) => body.to_vec(),
                Err(err) if err.is_not_found() => Vec::new(),
                Err(err) => return Err(err),
            }
        } else {
            Vec::new()
        };

        // Write-probe: confirm write permission and path validity up front
        // by uploading the seed content once, before the handle is handed
        // out. Existence state just changed, so the cached stat goes.
        if mode.writable() {
            self.client
                .put(
                    &key,
                    Bytes::from(buffer.clone()),
                    mime::content_type_for(&key),
                )
                .await?;
            self.cache.invalidate(&self.cache_key(&key));
        }

        tracing::debug!("opened {} in mode {}", path, mode.as_str());
        Ok(FileHandle::new(
            key.clone(),
            self.cache_key(&key),
            mode,
            buffer,
            self.client.clone(),
            self.cache.clone(),
        ))
    }

    async fn stat(&self, path: &str) -> FsResult<StatRecord> {
        let key = self.key_for(path)?;
        let cache_key = self.cache_key(&key);

        if let Some(entry) = self.cache.get(&cache_key) {
            return match entry {
                CacheEntry::Found(stat) => Ok(stat),
                CacheEntry::Missing => Err(FsError::NotFound(path.to_string())),
            };
        }

        // Extensionless paths never hit the network: they are reported as
        // directories until proven otherwise.
        if key.is_empty() || key.ends_with('/') || !Self::has_extension(&key) {
            let stat = StatRecord::directory();
            self.cache.set(&cache_key, stat);
            return Ok(stat);
        }

        match self.client.head(&key).await {
            Ok(head) => {
                let stat = StatRecord::file(head.size, head.last_modified);
                self.cache.set(&cache_key, stat);
                Ok(stat)
            }
            Err(err) if err.is_not_found() => {
                self.cache.set_missing(&cache_key);
                Err(err)
            }
            // transient failures are not cached
            Err(err) => Err(err),
        }
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let key = self.key_for(path)?;
        if key.is_empty() {
            return Err(FsError::InvalidPath("cannot create the root".into()));
        }
        let dir_key = format!("{}/", key.trim_end_matches('/'));
        self.cache.invalidate(&self.cache_key(&key));

        if self.client.exists(&dir_key).await {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        self.client.put(&dir_key, Bytes::new(), "").await
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        let key = self.key_for(path)?;
        if key.is_empty() {
            return Err(FsError::InvalidPath("cannot remove the root".into()));
        }
        let dir_key = format!("{}/", key.trim_end_matches('/'));
        self.cache.invalidate(&self.cache_key(&key));

        // The marker object itself counts as one entry, so two results
        // mean real content. Listing two keys is enough to decide.
        let entries = self.client.list(&dir_key, 2).await?;
        if entries.len() > 1 {
            return Err(FsError::NotEmpty(path.to_string()));
        }
        self.client.delete(&dir_key).await
    }

    /// Copy then delete. Not atomic: a failure after the copy leaves both
    /// objects in place and the error surfaces to the caller.
    /// / 复制后删除，非原子
    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from_key = self.key_for(from)?;
        let to_key = self.key_for(to)?;
        self.cache.invalidate(&self.cache_key(&from_key));
        self.cache.invalidate(&self.cache_key(&to_key));

        self.client.copy(&from_key, &to_key).await?;
        self.client.delete(&from_key).await
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        let key = self.key_for(path)?;
        self.cache.invalidate(&self.cache_key(&key));
        self.client.delete(&key).await
    }

    async fn open_dir(&self, path: &str) -> FsResult<DirHandle> {
        let key = self.key_for(path)?;

        // A trailing `*` lists everything under the parent prefix instead
        // of descending into a directory.
        let prefix = if let Some(stem) = key.strip_suffix('*') {
            stem.to_string()
        } else if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key.trim_end_matches('/'))
        };

        let entries = self.client.list_all(&prefix).await?;
        tracing::debug!("opened directory {} ({} entries)", path, entries.len());
        Ok(DirHandle::new(
            self.scheme.clone(),
            prefix,
            entries,
            self.client.clone(),
            self.cache.clone(),
        ))
    }

    fn presigned_upload_url(&self, path: &str) -> FsResult<String> {
        let key = self.key_for(path)?;
        self.client.presigned_upload_url(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::transport::mock::MockTransport;
    use crate::s3::StorageConfig;
    use crate::vfs::stat::{DIR_MODE, FILE_MODE};
    use std::io::SeekFrom;

    fn fixture() -> (Arc<MockTransport>, ObjectFs) {
        let transport = Arc::new(MockTransport::new());
        let client = Arc::new(StorageClient::new(
            StorageConfig {
                bucket: "test-bucket".into(),
                endpoint: "https://objstore.test".into(),
                force_path_style: true,
                access_key_id: "AKID".into(),
                secret_access_key: "secret".into(),
                ..StorageConfig::default()
            },
            transport.clone(),
        ));
        let fs = ObjectFs::new("store", client, Arc::new(StatCache::new()));
        (transport, fs)
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (transport, fs) = fixture();

        let mut handle = fs.open("store://docs/note.txt", "w").await.unwrap();
        handle.write(b"hello stream").unwrap();

        // buffer truth within the same handle
        handle.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(handle.read(64), b"hello stream");

        handle.flush().await.unwrap();
        handle.close().await.unwrap();
        assert_eq!(transport.object("docs/note.txt").unwrap(), b"hello stream");

        // post-flush truth through a fresh handle
        let mut reread = fs.open("store://docs/note.txt", "r").await.unwrap();
        assert_eq!(reread.read(64), b"hello stream");
    }

    #[tokio::test]
    async fn append_on_missing_path_creates_empty_object() {
        let (transport, fs) = fixture();

        let handle = fs.open("store://logs/app.log", "a").await.unwrap();
        assert_eq!(handle.len(), 0);

        // exactly one upload, with an empty body, before any bytes appended
        assert_eq!(transport.count("PUT", "logs/app.log"), 1);
        let put = transport
            .calls()
            .into_iter()
            .find(|c| c.method == "PUT")
            .unwrap();
        assert!(put.body.is_empty());
        assert_eq!(transport.object("logs/app.log").unwrap(), b"");
    }

    #[tokio::test]
    async fn append_seeds_existing_content_and_positions_at_end() {
        let (transport, fs) = fixture();
        transport.insert_object("logs/app.log", b"first\n");

        let mut handle = fs.open("store://logs/app.log", "a").await.unwrap();
        assert_eq!(handle.tell(), 6);
        handle.write(b"second\n").unwrap();
        handle.flush().await.unwrap();
        assert_eq!(transport.object("logs/app.log").unwrap(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn mode_existence_matrix() {
        let (transport, fs) = fixture();
        transport.insert_object("present.txt", b"x");

        // x on an existing key refuses
        let err = fs.open("store://present.txt", "x").await.unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        // r / r+ on a missing key refuse
        assert!(fs.open("store://missing.txt", "r").await.unwrap_err().is_not_found());
        assert!(fs.open("store://missing.txt", "r+").await.unwrap_err().is_not_found());

        // w succeeds regardless of prior existence
        fs.open("store://present.txt", "w").await.unwrap();
        fs.open("store://brand-new.txt", "w").await.unwrap();

        // unsupported mode strings fail fast
        assert!(matches!(
            fs.open("store://present.txt", "w+").await.unwrap_err(),
            FsError::InvalidMode(_)
        ));
    }

    #[tokio::test]
    async fn truncate_uploads_once_at_truncate_time() {
        let (transport, fs) = fixture();

        let mut handle = fs.open("store://data/word.txt", "w").await.unwrap();
        let puts_after_open = transport.count("PUT", "data/word.txt");

        handle.write(b"testing").unwrap();
        assert_eq!(transport.count("PUT", "data/word.txt"), puts_after_open);

        handle.truncate(4).await.unwrap();
        assert_eq!(transport.count("PUT", "data/word.txt"), puts_after_open + 1);
        assert_eq!(transport.object("data/word.txt").unwrap(), b"test");
        assert_eq!(handle.len(), 4);

        // nothing staged, so close uploads nothing further
        handle.close().await.unwrap();
        assert_eq!(transport.count("PUT", "data/word.txt"), puts_after_open + 1);
    }

    #[tokio::test]
    async fn writes_are_local_until_flush() {
        let (transport, fs) = fixture();

        let mut handle = fs.open("store://bulk.bin", "w").await.unwrap();
        let puts_after_open = transport.count("PUT", "bulk.bin");
        for chunk in 0..10 {
            handle.write(format!("chunk-{};", chunk).as_bytes()).unwrap();
        }
        assert_eq!(transport.count("PUT", "bulk.bin"), puts_after_open);

        handle.flush().await.unwrap();
        assert_eq!(transport.count("PUT", "bulk.bin"), puts_after_open + 1);
    }

    #[tokio::test]
    async fn close_flushes_dirty_handle_once() {
        let (transport, fs) = fixture();
        let mut handle = fs.open("store://dirty.txt", "w").await.unwrap();
        handle.write(b"staged").unwrap();
        let puts_before = transport.count("PUT", "dirty.txt");

        handle.close().await.unwrap();
        assert_eq!(transport.count("PUT", "dirty.txt"), puts_before + 1);
        assert_eq!(transport.object("dirty.txt").unwrap(), b"staged");

        // idempotent
        handle.close().await.unwrap();
        assert_eq!(transport.count("PUT", "dirty.txt"), puts_before + 1);
    }

    #[tokio::test]
    async fn flush_on_read_only_handle_fails() {
        let (transport, fs) = fixture();
        transport.insert_object("ro.txt", b"x");
        let mut handle = fs.open("store://ro.txt", "r").await.unwrap();
        assert!(matches!(handle.flush().await, Err(FsError::ReadOnly)));
        assert!(matches!(handle.write(b"y"), Err(FsError::ReadOnly)));
    }

    #[tokio::test]
    async fn rmdir_requires_empty_directory() {
        let (transport, fs) = fixture();
        transport.insert_object("media/2026/", b"");

        // only the marker: removable
        fs.rmdir("store://media/2026").await.unwrap();
        assert!(!transport.contains("media/2026/"));

        // marker plus content: refused
        transport.insert_object("media/2027/", b"");
        transport.insert_object("media/2027/pic.png", b"img");
        let err = fs.rmdir("store://media/2027").await.unwrap_err();
        assert!(matches!(err, FsError::NotEmpty(_)));
        assert!(transport.contains("media/2027/"));
    }

    #[tokio::test]
    async fn rmdir_refuses_root() {
        let (_transport, fs) = fixture();
        assert!(matches!(
            fs.rmdir("store://").await.unwrap_err(),
            FsError::InvalidPath(_)
        ));
    }

    #[tokio::test]
    async fn mkdir_creates_marker_and_rejects_duplicates() {
        let (transport, fs) = fixture();

        fs.mkdir("store://media/2026").await.unwrap();
        assert_eq!(transport.object("media/2026/").unwrap(), b"");

        let err = fs.mkdir("store://media/2026").await.unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn stat_with_extension_is_cached() {
        let (transport, fs) = fixture();
        transport.insert_object("m/photo.jpg", b"0123456789");

        let first = fs.stat("store://m/photo.jpg").await.unwrap();
        let second = fs.stat("store://m/photo.jpg").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size, 10);
        assert_eq!(first.mode(), FILE_MODE);
        assert_eq!(transport.count("HEAD", "m/photo.jpg"), 1);
    }

    #[tokio::test]
    async fn stat_extensionless_path_skips_network() {
        let (transport, fs) = fixture();

        let stat = fs.stat("store://uploads/2026").await.unwrap();
        assert_eq!(stat.mode(), DIR_MODE);
        assert_eq!(stat.size, 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn stat_missing_object_is_negative_cached() {
        let (transport, fs) = fixture();

        assert!(fs.stat("store://nope.png").await.unwrap_err().is_not_found());
        assert!(fs.stat("store://nope.png").await.unwrap_err().is_not_found());
        assert_eq!(transport.count("HEAD", "nope.png"), 1);
    }

    #[tokio::test]
    async fn write_flush_invalidates_cached_stat() {
        let (transport, fs) = fixture();
        transport.insert_object("cached.txt", b"old");

        fs.stat("store://cached.txt").await.unwrap();
        assert_eq!(transport.count("HEAD", "cached.txt"), 1);

        let mut handle = fs.open("store://cached.txt", "w").await.unwrap();
        handle.write(b"new content").unwrap();
        handle.flush().await.unwrap();

        let stat = fs.stat("store://cached.txt").await.unwrap();
        assert_eq!(transport.count("HEAD", "cached.txt"), 2);
        assert_eq!(stat.size, 11);
    }

    #[tokio::test]
    async fn rename_is_not_atomic_on_delete_failure() {
        let (transport, fs) = fixture();
        transport.insert_object("old/name.txt", b"payload");
        transport.fail_once_with_status("DELETE", "old/name.txt", 500);

        let err = fs
            .rename("store://old/name.txt", "store://new/name.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Api { status: 500, .. }));

        // copy already happened; both objects remain
        assert!(transport.contains("old/name.txt"));
        assert_eq!(transport.object("new/name.txt").unwrap(), b"payload");
    }

    #[tokio::test]
    async fn rename_moves_object() {
        let (transport, fs) = fixture();
        transport.insert_object("a.txt", b"body");

        fs.rename("store://a.txt", "store://b.txt").await.unwrap();
        assert!(!transport.contains("a.txt"));
        assert_eq!(transport.object("b.txt").unwrap(), b"body");
    }

    #[tokio::test]
    async fn unlink_deletes_and_propagates_failure() {
        let (transport, fs) = fixture();
        transport.insert_object("gone.txt", b"x");

        fs.unlink("store://gone.txt").await.unwrap();
        assert!(!transport.contains("gone.txt"));

        transport.insert_object("stuck.txt", b"x");
        transport.fail_once_with_status("DELETE", "stuck.txt", 500);
        assert!(fs.unlink("store://stuck.txt").await.is_err());
    }

    #[tokio::test]
    async fn readdir_lists_and_primes_stat_cache() {
        let (transport, fs) = fixture();
        transport.insert_object("album/", b"");
        transport.insert_object("album/one.jpg", b"11111");
        transport.insert_object("album/two.jpg", b"222");

        let mut dir = fs.open_dir("store://album").await.unwrap();
        let mut names = Vec::new();
        while let Some(name) = dir.read() {
            names.push(name);
        }
        assert_eq!(names, vec!["one.jpg", "two.jpg"]);

        // stat on a just-listed entry costs zero network calls
        let calls_before = transport.calls().len();
        let stat = fs.stat("store://album/one.jpg").await.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(transport.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn readdir_rewind_relists() {
        let (transport, fs) = fixture();
        transport.insert_object("d/a.txt", b"1");

        let mut dir = fs.open_dir("store://d").await.unwrap();
        assert_eq!(dir.read().unwrap(), "a.txt");
        assert!(dir.read().is_none());

        transport.insert_object("d/b.txt", b"2");
        dir.rewind().await.unwrap();
        assert_eq!(dir.read().unwrap(), "a.txt");
        assert_eq!(dir.read().unwrap(), "b.txt");
    }

    #[tokio::test]
    async fn wildcard_listing_uses_parent_prefix() {
        let (transport, fs) = fixture();
        transport.insert_object("media/img-1.png", b"1");
        transport.insert_object("media/img-2.png", b"2");
        transport.insert_object("media/other.txt", b"3");

        let mut dir = fs.open_dir("store://media/img*").await.unwrap();
        let mut count = 0;
        while dir.read().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn open_handle_stat_prefers_buffer_length() {
        let (transport, fs) = fixture();
        transport.insert_object("doc.txt", b"0123456789");

        let mut handle = fs.open("store://doc.txt", "r+").await.unwrap();
        handle.seek(SeekFrom::End(0)).unwrap();
        handle.write(b"-tail").unwrap();

        // remote still says 10, the open handle says 15
        assert_eq!(handle.stat().size, 15);
    }

    #[tokio::test]
    async fn foreign_scheme_is_rejected() {
        let (_transport, fs) = fixture();
        assert!(matches!(
            fs.stat("other://a.txt").await.unwrap_err(),
            FsError::InvalidPath(_)
        ));
        assert!(matches!(
            fs.open("/plain/path.txt", "r").await.unwrap_err(),
            FsError::InvalidPath(_)
        ));
    }

    #[tokio::test]
    async fn seek_and_overwrite_in_buffer() {
        let (_transport, fs) = fixture();
        let mut handle = fs.open("store://patch.txt", "w").await.unwrap();
        handle.write(b"abcdef").unwrap();
        handle.seek(SeekFrom::Start(2)).unwrap();
        handle.write(b"XY").unwrap();
        handle.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(handle.read(16), b"abXYef");
        assert!(handle.eof());

        assert!(handle.seek(SeekFrom::Current(-100)).is_err());
    }
}
