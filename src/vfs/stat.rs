//! Stat 记录
//!
//! POSIX-shaped metadata for a path. The permission bits are fixed
//! constants: the backing store has no notion of ownership, so everything
//! reads as world-accessible and only the file-type bits vary.

/// Mode bits for a regular file / 普通文件的mode位
pub const FILE_MODE: u32 = 0o100777;
/// Mode bits for a directory / 目录的mode位
pub const DIR_MODE: u32 = 0o040777;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata record for a path. Directories always report size 0; an
/// unknown path defaults to a directory record until a lookup proves
/// otherwise. / 路径元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatRecord {
    pub kind: FileKind,
    pub size: u64,
    /// Unix seconds / Unix时间戳（秒）
    pub mtime: i64,
    pub ctime: i64,
}

impl StatRecord {
    /// The default record for paths not (yet) known to exist
    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            size: 0,
            mtime: 0,
            ctime: 0,
        }
    }

    pub fn file(size: u64, mtime: i64) -> Self {
        Self {
            kind: FileKind::File,
            size,
            mtime,
            ctime: mtime,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn mode(&self) -> u32 {
        match self.kind {
            FileKind::File => FILE_MODE,
            FileKind::Directory => DIR_MODE,
        }
    }

    /// Numeric projection in classic stat() slot order:
    /// `dev, ino, mode, nlink, uid, gid, rdev, size, atime, mtime, ctime,
    /// blksize, blocks`. Hosts that index stat results positionally use
    /// this; everyone else reads the named fields. / 数组形式的stat布局
    pub fn to_stat_array(&self) -> [i64; 13] {
        [
            0,
            0,
            self.mode() as i64,
            0,
            0,
            0,
            0,
            self.size as i64,
            self.mtime,
            self.mtime,
            self.ctime,
            -1,
            -1,
        ]
    }
}
