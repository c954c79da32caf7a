//! Filesystem error taxonomy / 文件系统错误类型
//!
//! Every operation below the host boundary returns `FsError`; the host
//! adapter converts these into warning logs plus falsy sentinels exactly
//! once (see `host.rs`).

use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

/// Error type shared by the storage client and the stream filesystem
/// / 存储客户端与流式文件系统共用的错误类型
#[derive(Debug, Error)]
pub enum FsError {
    /// Object does not exist / 对象不存在
    #[error("object not found: {0}")]
    NotFound(String),

    /// Target already exists (mkdir on existing key, `x` open mode)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Directory contains entries besides its own marker object
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Unsupported fopen-style mode string / 不支持的打开模式
    #[error("invalid open mode: {0:?}")]
    InvalidMode(String),

    /// Path does not belong to this filesystem or is malformed / 路径无效
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Caller passed an out-of-range or inconsistent argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Write-like operation on a handle opened read-only / 只读句柄
    #[error("stream is read-only")]
    ReadOnly,

    /// Connection, TLS or timeout failure below the HTTP layer / 传输层错误
    #[error("transport error: {0}")]
    Transport(String),

    /// The storage API answered with an unexpected status code
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
}

impl FsError {
    /// Whether this error means "the object is absent" as opposed to
    /// "the call failed" / 是否为"对象不存在"
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(FsError::NotFound("a/b".into()).is_not_found());
        assert!(!FsError::ReadOnly.is_not_found());
        assert!(!FsError::Transport("timeout".into()).is_not_found());
    }
}
