//! Error types for mapped-file
//!
//! mapped-file 的错误类型

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// The step that was running when an [`Error`] was raised
///
/// 产生 [`Error`] 时正在执行的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Opening (or creating) the file read-write
    ///
    /// 以读写方式打开（或创建）文件
    OpenForWrite,

    /// Opening the file read-only
    ///
    /// 以只读方式打开文件
    OpenForRead,

    /// Querying the file size
    ///
    /// 查询文件大小
    Stat,

    /// Sparse-extending the file to its minimum size
    ///
    /// 稀疏扩展文件到最小大小
    Extend,

    /// Creating a read-write mapping
    ///
    /// 创建读写映射
    MapReadWrite,

    /// Creating a read-only mapping
    ///
    /// 创建只读映射
    MapReadOnly,

    /// Reading or writing a range of a mapping
    ///
    /// 读写映射中的某个范围
    Access,

    /// Releasing a mapping
    ///
    /// 释放映射
    Unmap,

    /// Forcing dirty pages to stable storage
    ///
    /// 将脏页刷新到持久存储
    Flush,

    /// Closing the descriptor
    ///
    /// 关闭文件描述符
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::OpenForWrite => "opening file for writing",
            Operation::OpenForRead => "opening file for reading",
            Operation::Stat => "querying file size",
            Operation::Extend => "extending file",
            Operation::MapReadWrite => "mapping file read-write",
            Operation::MapReadOnly => "mapping file read-only",
            Operation::Access => "accessing mapped range of",
            Operation::Unmap => "unmapping file",
            Operation::Flush => "flushing file",
            Operation::Close => "closing file",
        };
        f.write_str(name)
    }
}

/// Error type for mapped-file operations
///
/// mapped-file 操作的错误类型
///
/// There is a single error kind: the failing [`Operation`], the path of the file it
/// ran against, and the underlying [`io::Error`]. Disk-full and permission-denied are
/// only told apart by the wrapped OS code.
///
/// 只有一种错误：失败的 [`Operation`]、所操作文件的路径以及底层的 [`io::Error`]。
/// 磁盘已满与权限不足等情况仅通过 OS 错误码区分。
#[derive(Debug, thiserror::Error)]
#[error("error {op} {}: {source}", .path.display())]
pub struct Error {
    op: Operation,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl Error {
    pub(crate) fn new(op: Operation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    /// Error for an operation attempted on a handle whose descriptor is already gone
    pub(crate) fn closed(op: Operation, path: &Path) -> Self {
        Self::new(op, path, io::Error::other("file handle is closed"))
    }

    /// Error for a length or offset that falls outside the file
    pub(crate) fn out_of_bounds(op: Operation, path: &Path, msg: String) -> Self {
        Self::new(op, path, io::Error::new(io::ErrorKind::InvalidInput, msg))
    }

    /// The operation that failed
    ///
    /// 失败的操作
    #[inline]
    pub fn operation(&self) -> Operation {
        self.op
    }

    /// Path of the file the operation ran against
    ///
    /// 操作所针对的文件路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of the wrapped I/O error
    ///
    /// 底层 I/O 错误的类型
    #[inline]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    /// OS error code, if the failure came from a syscall
    ///
    /// 如果失败来自系统调用，返回 OS 错误码
    #[inline]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    /// The wrapped I/O error
    #[inline]
    pub fn io_error(&self) -> &io::Error {
        &self.source
    }
}

/// Convert from Error to io::Error for compatibility
///
/// 从 Error 转换到 io::Error 以保持兼容性
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(err.source.kind(), err)
    }
}

/// Result type alias using our custom Error type
///
/// 使用自定义 Error 类型的 Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
