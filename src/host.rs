//! 宿主边界适配层
//!
//! The single place where internal errors become host-visible non-fatal
//! results. Host-level filesystem calls must never see an error cross the
//! boundary: the backend can be flaky, and the calling runtime expects a
//! conventional falsy sentinel (`None`, `false`, empty) plus a logged
//! warning carrying the original error text. Nothing below this layer
//! converts errors to sentinels, so every failure is reported exactly
//! once.

use std::sync::Arc;

use crate::error::FsResult;
use crate::registry::FsRegistry;
use crate::vfs::{DirHandle, FileHandle, StatRecord, StreamFilesystem};

/// Convert a result to the warning + falsy contract / 警告加假值转换
fn sink<T>(operation: &str, path: &str, result: FsResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("{}({}) failed: {}", operation, path, err);
            None
        }
    }
}

/// Host-facing filesystem front. One instance per execution context,
/// wrapping the injected provider registry. / 面向宿主的文件系统入口
pub struct HostBridge {
    registry: Arc<FsRegistry>,
}

impl HostBridge {
    pub fn new(registry: Arc<FsRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<FsRegistry> {
        &self.registry
    }

    pub async fn open(&self, path: &str, mode: &str) -> Option<FileHandle> {
        let fs = sink("open", path, self.registry.resolve(path))?;
        sink("open", path, fs.open(path, mode).await)
    }

    pub async fn stat(&self, path: &str) -> Option<StatRecord> {
        let fs = sink("stat", path, self.registry.resolve(path))?;
        sink("stat", path, fs.stat(path).await)
    }

    pub async fn mkdir(&self, path: &str) -> bool {
        let Some(fs) = sink("mkdir", path, self.registry.resolve(path)) else {
            return false;
        };
        sink("mkdir", path, fs.mkdir(path).await).is_some()
    }

    pub async fn rmdir(&self, path: &str) -> bool {
        let Some(fs) = sink("rmdir", path, self.registry.resolve(path)) else {
            return false;
        };
        sink("rmdir", path, fs.rmdir(path).await).is_some()
    }

    pub async fn rename(&self, from: &str, to: &str) -> bool {
        let Some(fs) = sink("rename", from, self.registry.resolve(from)) else {
            return false;
        };
        sink("rename", from, fs.rename(from, to).await).is_some()
    }

    pub async fn unlink(&self, path: &str) -> bool {
        let Some(fs) = sink("unlink", path, self.registry.resolve(path)) else {
            return false;
        };
        sink("unlink", path, fs.unlink(path).await).is_some()
    }

    pub async fn opendir(&self, path: &str) -> Option<DirHandle> {
        let fs = sink("opendir", path, self.registry.resolve(path))?;
        sink("opendir", path, fs.open_dir(path).await)
    }

    pub fn presigned_upload_url(&self, path: &str) -> Option<String> {
        let fs = sink("presign", path, self.registry.resolve(path))?;
        sink("presign", path, fs.presigned_upload_url(path))
    }

    // Handle-level wrappers: same contract, falsy instead of failing.

    pub fn read(&self, handle: &mut FileHandle, count: usize) -> Vec<u8> {
        handle.read(count)
    }

    pub fn write(&self, handle: &mut FileHandle, data: &[u8]) -> usize {
        let result = handle.write(data);
        sink("write", handle.path(), result).unwrap_or(0)
    }

    pub fn seek(&self, handle: &mut FileHandle, pos: std::io::SeekFrom) -> Option<u64> {
        let result = handle.seek(pos);
        sink("seek", handle.path(), result)
    }

    pub async fn flush(&self, handle: &mut FileHandle) -> bool {
        let result = handle.flush().await;
        sink("flush", handle.path(), result).is_some()
    }

    pub async fn truncate(&self, handle: &mut FileHandle, size: u64) -> bool {
        let result = handle.truncate(size).await;
        sink("truncate", handle.path(), result).is_some()
    }

    pub async fn close(&self, handle: &mut FileHandle) -> bool {
        let result = handle.close().await;
        sink("close", handle.path(), result).is_some()
    }

    pub fn readdir(&self, dir: &mut DirHandle) -> Option<String> {
        dir.read()
    }

    pub async fn rewinddir(&self, dir: &mut DirHandle) -> bool {
        sink("rewinddir", "", dir.rewind().await).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::transport::mock::MockTransport;
    use crate::s3::{StorageClient, StorageConfig};
    use crate::vfs::{ObjectFs, StatCache};

    fn bridge() -> (Arc<MockTransport>, HostBridge) {
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
        let fs = Arc::new(ObjectFs::new("store", client, Arc::new(StatCache::new())));
        let mut registry = FsRegistry::new();
        registry.register(fs);
        (transport, HostBridge::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn errors_become_falsy_results() {
        let (_transport, bridge) = bridge();

        // missing object: no panic, no error, just falsy
        assert!(bridge.open("store://missing.txt", "r").await.is_none());
        assert!(bridge.stat("store://missing.png").await.is_none());
        assert!(!bridge.rmdir("store://").await);
        assert!(!bridge.unlink("unknown://x").await);
    }

    #[tokio::test]
    async fn happy_path_passes_through() {
        let (transport, bridge) = bridge();

        let mut handle = bridge.open("store://a.txt", "w").await.unwrap();
        assert_eq!(bridge.write(&mut handle, b"data"), 4);
        assert!(bridge.flush(&mut handle).await);
        assert!(bridge.close(&mut handle).await);
        assert_eq!(transport.object("a.txt").unwrap(), b"data");

        let stat = bridge.stat("store://a.txt").await.unwrap();
        assert_eq!(stat.size, 4);
    }

    #[tokio::test]
    async fn write_on_read_only_handle_is_zero() {
        let (transport, bridge) = bridge();
        transport.insert_object("ro.txt", b"x");
        let mut handle = bridge.open("store://ro.txt", "r").await.unwrap();
        assert_eq!(bridge.write(&mut handle, b"nope"), 0);
        assert!(!bridge.flush(&mut handle).await);
    }
}
