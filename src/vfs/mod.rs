//! Virtual stream filesystem over the object store
//! / 对象存储之上的虚拟流式文件系统

pub mod cache;
pub mod dir;
pub mod fs;
pub mod handle;
pub mod stat;

pub use cache::{CacheEntry, StatCache};
pub use dir::DirHandle;
pub use fs::{ObjectFs, StreamFilesystem};
pub use handle::{FileHandle, OpenMode};
pub use stat::{FileKind, StatRecord, DIR_MODE, FILE_MODE};
