//! Mapped file manager built on memmap2
//!
//! 基于 memmap2 的内存映射文件管理
//!
//! The lifecycle is strictly linear:
//!
//! 1. [`FileHandle::open_for_write`] / [`FileHandle::open_for_read`]
//! 2. [`FileHandle::map_rw`] / [`FileHandle::map_ro`], then `unmap`, any number of times
//! 3. [`FileHandle::flush`], any number of times
//! 4. [`FileHandle::close`]
//!
//! 生命周期严格线性：打开 → [映射 → 解除映射]* → [刷新]* → 关闭。
//!
//! Handles and mappings own their resources. Dropping either releases it on every exit
//! path, and `close`/`unmap` consume the value so nothing can be released twice.
//!
//! 句柄和映射拥有各自的资源。drop 会在任何退出路径上释放资源，
//! `close`/`unmap` 会消耗值本身，因此不会重复释放。

mod error;
mod handle;
mod mapping;
mod options;
mod sys;

#[cfg(test)]
mod tests;

// Re-export public API
// 重新导出公共 API
pub use error::{Error, Operation, Result};
pub use handle::{DEFAULT_FILE_MODE, FileHandle};
pub use mapping::{ReadOnlyMapping, WritableMapping};
pub use options::{AccessMode, ClosePolicy, CreateOptions, MapOptions};
