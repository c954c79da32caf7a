pub mod error;
pub mod host;
pub mod mime;
pub mod registry;
pub mod s3;
pub mod vfs;

pub use error::{FsError, FsResult};
pub use host::HostBridge;
pub use registry::{build_tier, build_two_tier, split_scheme, FsRegistry, TierConfig};
pub use s3::{StorageClient, StorageConfig};
pub use vfs::{
    DirHandle, FileHandle, ObjectFs, OpenMode, StatCache, StatRecord, StreamFilesystem,
};
