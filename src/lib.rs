//! Minimal memory-mapped file manager
//!
//! 最小化的内存映射文件管理库
//!
//! This library covers the storage edge of a data store that keeps its data in a mapped
//! file: create or open the backing file, grow it to a requested size, map it shared
//! (read-only or read-write, optionally pinned in memory), flush dirty pages and release
//! everything again.
//!
//! 本库负责以映射文件为主要存储介质的数据存储的底层部分：创建或打开后备文件、
//! 扩展到所需大小、以共享方式映射（只读或读写，可选锁定内存）、刷新脏页并释放所有资源。
//!
//! # Features
//!
//! - **Sparse growth**: files are extended by writing a single byte at the new end
//! - **Shared mappings**: writes are visible to every mapping of the same file
//! - **Bounds-checked mapping**: lengths past the end of the file are rejected up front
//! - **Structural cleanup**: descriptors and mappings are released on every exit path
//! - **Optional pinning**: `mlock` where available, a silent no-op elsewhere
//!
//! # 特性
//!
//! - **稀疏扩展**：通过在新末尾写入单个字节扩展文件
//! - **共享映射**：写入对同一文件的所有映射可见
//! - **边界检查**：超出文件末尾的映射长度会被提前拒绝
//! - **结构化清理**：描述符和映射在任何退出路径上都会被释放
//! - **可选锁定**：在支持的平台上使用 `mlock`，否则静默忽略
//!
//! # Quick Start
//!
//! ```
//! use mapped_file::FileHandle;
//! use std::num::NonZeroUsize;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("data.bin");
//! let len = NonZeroUsize::new(4096).unwrap();
//!
//! // Create a 4 KiB file and write through a shared mapping
//! // 创建 4 KiB 文件并通过共享映射写入
//! let mut handle = FileHandle::open_for_write(&path, 4096)?;
//! let mut map = handle.map_rw(len, false)?;
//! map[0] = 0xFF;
//! map[4095] = 0xFF;
//! map.unmap()?;
//!
//! // Make it durable before closing
//! // 关闭前确保持久化
//! handle.flush()?;
//! handle.close()?;
//!
//! // Read it back
//! // 读回数据
//! let mut handle = FileHandle::open_for_read(&path)?;
//! let map = handle.map_ro(len, false)?;
//! assert_eq!(map[0], 0xFF);
//! assert!(map[1..4095].iter().all(|&b| b == 0));
//! assert_eq!(map[4095], 0xFF);
//! # Ok(())
//! # }
//! ```
//!
//! # Main Types
//!
//! - [`FileHandle`]: Owning handle over an open descriptor
//! - [`WritableMapping`]: Shared read-write mapping
//! - [`ReadOnlyMapping`]: Shared read-only mapping
//! - [`MapOptions`]: Lock and populate hints for new mappings
//! - [`CreateOptions`]: Sparse extension or preallocation when sizing the file
//! - [`ClosePolicy`]: Whether `close` reports its flush failure
//! - [`Error`]: The single error type, carrying operation, path and OS error
//!
//! # 主要类型
//!
//! - [`FileHandle`]: 持有已打开描述符的句柄
//! - [`WritableMapping`]: 共享读写映射
//! - [`ReadOnlyMapping`]: 共享只读映射
//! - [`MapOptions`]: 新映射的锁定与预读提示
//! - [`CreateOptions`]: 调整文件大小时稀疏扩展或预分配
//! - [`ClosePolicy`]: `close` 是否报告刷新失败
//! - [`Error`]: 唯一的错误类型，包含操作、路径和 OS 错误

mod file;

pub use file::{
    AccessMode, ClosePolicy, CreateOptions, DEFAULT_FILE_MODE, Error, FileHandle, MapOptions,
    Operation, ReadOnlyMapping, Result, WritableMapping,
};
