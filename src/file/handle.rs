//! Owning handle over an open file descriptor
//!
//! 持有已打开文件描述符的句柄

use super::error::{Error, Operation, Result};
use super::mapping::{ReadOnlyMapping, WritableMapping};
use super::options::{AccessMode, ClosePolicy, CreateOptions, MapOptions};
use super::sys;
use memmap2::MmapOptions;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Permission bits used when `open_for_write` creates a file (before umask)
///
/// `open_for_write` 创建文件时使用的权限位（umask 之前）
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Owning reference to an open file descriptor
///
/// 持有已打开文件描述符的引用
///
/// A handle is created by [`open_for_write`](Self::open_for_write) or
/// [`open_for_read`](Self::open_for_read) and released by [`close`](Self::close), or by
/// drop on any other exit path. Mappings created from it stay valid after the handle is
/// closed; the kernel keeps its own reference to the file.
///
/// 句柄由 [`open_for_write`](Self::open_for_write) 或 [`open_for_read`](Self::open_for_read)
/// 创建，由 [`close`](Self::close) 释放，其他退出路径上则在 drop 时释放。
/// 由它创建的映射在句柄关闭后仍然有效，内核持有对文件的引用。
///
/// A failed map or flush closes the descriptor. The value survives but every later
/// map or flush returns an error; check [`is_open`](Self::is_open).
///
/// 映射或刷新失败会关闭描述符。句柄值仍然存在，但之后的映射或刷新都会返回错误；
/// 可通过 [`is_open`](Self::is_open) 检查。
///
/// # Examples
///
/// ```
/// use mapped_file::FileHandle;
/// use std::num::NonZeroUsize;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("data.bin");
/// let mut handle = FileHandle::open_for_write(&path, 4096)?;
/// let len = NonZeroUsize::new(4096).unwrap();
///
/// let mut map = handle.map_rw(len, false)?;
/// map[0] = 0xFF;
/// map.unmap()?;
///
/// handle.flush()?;
/// handle.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileHandle {
    /// `None` once a failed map or flush has released the descriptor
    ///
    /// 映射或刷新失败释放描述符后为 `None`
    file: Option<File>,

    path: PathBuf,

    mode: AccessMode,

    /// Last size observed through a status query
    ///
    /// 最近一次状态查询得到的大小
    size: Option<u64>,
}

impl FileHandle {
    /// Open `path` read-write, creating it if needed, and grow it to `minimum_size`
    ///
    /// 以读写方式打开 `path`（不存在则创建），并扩展到 `minimum_size`
    ///
    /// A smaller file is sparse-extended: a single zero byte is written at offset
    /// `minimum_size - 1`. Bytes in between read as zero, but the filesystem decides
    /// whether they are physically allocated. A file that is already large enough is
    /// left untouched, it is never truncated.
    ///
    /// 较小的文件会被稀疏扩展：在偏移 `minimum_size - 1` 处写入一个零字节。
    /// 中间的字节读取为零，但是否实际分配由文件系统决定。
    /// 已足够大的文件保持不变，不会被截断。
    ///
    /// # Errors
    /// Fails if the file cannot be opened, its size cannot be queried or it cannot be
    /// extended. The descriptor is closed before the error is returned.
    ///
    /// # Errors
    /// 无法打开文件、查询大小或扩展时失败。返回错误前描述符已被关闭。
    #[inline]
    pub fn open_for_write(path: impl AsRef<Path>, minimum_size: u64) -> Result<Self> {
        Self::open_for_write_with(path, minimum_size, &CreateOptions::new())
    }

    /// Same as [`open_for_write`](Self::open_for_write), with control over how the file
    /// is grown
    ///
    /// 与 [`open_for_write`](Self::open_for_write) 相同，但可控制文件的扩展方式
    ///
    /// With [`CreateOptions::preallocate`] the blocks of `[0, minimum_size)` are
    /// reserved, so later writes through a mapping cannot hit an unbacked hole. Existing
    /// content and a larger size are kept. If the platform or filesystem cannot
    /// preallocate, the file is sparse-extended as usual.
    ///
    /// 使用 [`CreateOptions::preallocate`] 时会保留 `[0, minimum_size)` 的所有块，
    /// 之后通过映射的写入不会遇到未分配的空洞。已有内容和更大的大小保持不变。
    /// 平台或文件系统无法预分配时，照常稀疏扩展。
    ///
    /// # Examples
    ///
    /// ```
    /// use mapped_file::{CreateOptions, FileHandle};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let dir = tempfile::tempdir()?;
    /// # let path = dir.path().join("reserved.bin");
    /// let opts = CreateOptions::new().preallocate(true);
    /// let handle = FileHandle::open_for_write_with(&path, 1 << 20, &opts)?;
    /// assert_eq!(handle.size(), Some(1 << 20));
    /// handle.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_for_write_with(
        path: impl AsRef<Path>,
        minimum_size: u64,
        create: &CreateOptions,
    ) -> Result<Self> {
        let path = path.as_ref();

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(DEFAULT_FILE_MODE);
        }

        let mut file = options
            .open(path)
            .map_err(|e| Error::new(Operation::OpenForWrite, path, e))?;

        let current = file
            .metadata()
            .map_err(|e| Error::new(Operation::Stat, path, e))?
            .len();

        let preallocated = if create.wants_preallocate() && minimum_size > 0 {
            let reserved = sys::preallocate(&file, minimum_size)
                .map_err(|e| Error::new(Operation::Extend, path, e))?;
            if reserved {
                debug!(path = %path.display(), size = minimum_size, "preallocated file");
            } else {
                warn!(path = %path.display(), "preallocation not supported, extending sparsely");
            }
            reserved
        } else {
            false
        };

        if current < minimum_size && !preallocated {
            extend_sparse(&mut file, minimum_size)
                .map_err(|e| Error::new(Operation::Extend, path, e))?;
            debug!(path = %path.display(), from = current, to = minimum_size, "extended file");
        }
        let size = current.max(minimum_size);

        debug!(path = %path.display(), size, "opened file for writing");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            mode: AccessMode::ReadWrite,
            size: Some(size),
        })
    }

    /// Open an existing file read-only
    ///
    /// 以只读方式打开已存在的文件
    ///
    /// The file is neither created nor resized.
    ///
    /// 不会创建文件，也不会改变其大小。
    pub fn open_for_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| Error::new(Operation::OpenForRead, path, e))?;

        debug!(path = %path.display(), "opened file for reading");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            mode: AccessMode::ReadOnly,
            size: None,
        })
    }

    /// Map the first `length` bytes read-write
    ///
    /// 以读写方式映射前 `length` 个字节
    ///
    /// Shorthand for [`map_rw_with`](Self::map_rw_with) with only the lock flag set.
    ///
    /// [`map_rw_with`](Self::map_rw_with) 的简写，仅设置锁定标志。
    #[inline]
    pub fn map_rw(&mut self, length: NonZeroUsize, want_lock: bool) -> Result<WritableMapping> {
        self.map_rw_with(length, &MapOptions::new().lock(want_lock))
    }

    /// Map the first `length` bytes read-only
    ///
    /// 以只读方式映射前 `length` 个字节
    #[inline]
    pub fn map_ro(&mut self, length: NonZeroUsize, want_lock: bool) -> Result<ReadOnlyMapping> {
        self.map_ro_with(length, &MapOptions::new().lock(want_lock))
    }

    /// Establish a shared read-write mapping of the first `length` bytes
    ///
    /// 建立前 `length` 个字节的共享读写映射
    ///
    /// Writes through the mapping are visible to every other mapping of the same file,
    /// in this process or another.
    ///
    /// 通过映射的写入对同一文件的所有其他映射可见，无论是否在同一进程中。
    ///
    /// # Errors
    /// - `length` larger than the file: rejected with
    ///   [`InvalidInput`](std::io::ErrorKind::InvalidInput) before anything is mapped;
    ///   the handle stays open
    /// - Status query or mapping failure: the descriptor is closed and the handle can
    ///   no longer be used
    ///
    /// # Errors
    /// - `length` 大于文件：在映射之前以 [`InvalidInput`](std::io::ErrorKind::InvalidInput)
    ///   拒绝，句柄保持打开
    /// - 状态查询或映射失败：描述符被关闭，句柄不可再用
    pub fn map_rw_with(
        &mut self,
        length: NonZeroUsize,
        options: &MapOptions,
    ) -> Result<WritableMapping> {
        let op = Operation::MapReadWrite;
        let file = self.checked_file(op, length)?;

        // Safety: the file may be changed by other mappings or processes while mapped;
        // the caller owns that coordination, as for any shared mapping.
        // Safety: 映射期间文件可能被其他映射或进程修改，这由调用者协调，与任何共享映射相同。
        let mapped = unsafe { build_options(length, options).map_mut(file) };
        let mmap = match mapped {
            Ok(mmap) => mmap,
            Err(e) => return Err(self.invalidate(op, e)),
        };

        let locked = options.wants_lock() && lock_pages(&self.path, &mmap);

        debug!(
            path = %self.path.display(),
            length = length.get(),
            locked,
            "mapped file read-write"
        );

        Ok(WritableMapping::new(mmap, self.path.clone(), locked))
    }

    /// Establish a shared read-only mapping of the first `length` bytes
    ///
    /// 建立前 `length` 个字节的共享只读映射
    ///
    /// Failure handling is the same as [`map_rw_with`](Self::map_rw_with).
    ///
    /// 失败处理与 [`map_rw_with`](Self::map_rw_with) 相同。
    pub fn map_ro_with(
        &mut self,
        length: NonZeroUsize,
        options: &MapOptions,
    ) -> Result<ReadOnlyMapping> {
        let op = Operation::MapReadOnly;
        let file = self.checked_file(op, length)?;

        // Safety: see `map_rw_with`
        let mapped = unsafe { build_options(length, options).map(file) };
        let mmap = match mapped {
            Ok(mmap) => mmap,
            Err(e) => return Err(self.invalidate(op, e)),
        };

        let locked = options.wants_lock() && lock_pages(&self.path, &mmap);

        debug!(
            path = %self.path.display(),
            length = length.get(),
            locked,
            "mapped file read-only"
        );

        Ok(ReadOnlyMapping::new(mmap, self.path.clone(), locked))
    }

    /// Force the file's data (not its metadata) to stable storage
    ///
    /// 将文件数据（不含元数据）刷新到持久存储
    ///
    /// Dirty pages written through shared mappings of this file are included.
    ///
    /// 包括通过该文件共享映射写入的脏页。
    ///
    /// # Errors
    /// On failure the descriptor is closed and the handle can no longer be used.
    ///
    /// # Errors
    /// 失败时描述符被关闭，句柄不可再用。
    pub fn flush(&mut self) -> Result<()> {
        let op = Operation::Flush;
        let Some(file) = self.file.as_ref() else {
            return Err(Error::closed(op, &self.path));
        };

        if let Err(e) = file.sync_data() {
            return Err(self.invalidate(op, e));
        }

        debug!(path = %self.path.display(), "flushed file");
        Ok(())
    }

    /// Flush on a best-effort basis, then close the descriptor
    ///
    /// 尽力刷新，然后关闭描述符
    ///
    /// A flush failure here is only logged. Call [`flush`](Self::flush) first, or use
    /// [`close_with`](Self::close_with) and [`ClosePolicy::StrictFlush`], when
    /// durability has to be confirmed.
    ///
    /// 此处的刷新失败只会记录日志。需要确认持久化时，请先调用 [`flush`](Self::flush)，
    /// 或使用 [`close_with`](Self::close_with) 与 [`ClosePolicy::StrictFlush`]。
    ///
    /// # Errors
    /// Fails only if closing the descriptor fails.
    ///
    /// # Errors
    /// 仅在关闭描述符失败时返回错误。
    #[inline]
    pub fn close(self) -> Result<()> {
        self.close_with(ClosePolicy::BestEffortFlush)
    }

    /// Flush, then close the descriptor, handling the flush as `policy` says
    ///
    /// 刷新后关闭描述符，按 `policy` 处理刷新结果
    ///
    /// Closing a handle that a failed map or flush already released is a no-op.
    ///
    /// 关闭已因映射或刷新失败而释放的句柄不做任何操作。
    pub fn close_with(self, policy: ClosePolicy) -> Result<()> {
        let FileHandle { file, path, .. } = self;
        let Some(file) = file else {
            return Ok(());
        };

        let flushed = file.sync_data();
        let closed = sys::close_file(file);

        debug!(path = %path.display(), "closed file");

        match (flushed, policy) {
            (Err(e), ClosePolicy::StrictFlush) => {
                if let Err(close_err) = closed {
                    warn!(
                        path = %path.display(),
                        error = %close_err,
                        "close failed after flush failure"
                    );
                }
                Err(Error::new(Operation::Flush, path, e))
            }
            (flushed, _) => {
                if let Err(e) = flushed {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "flush before close failed, data may not be durable"
                    );
                }
                closed.map_err(|e| Error::new(Operation::Close, path, e))
            }
        }
    }

    /// Path the handle was opened with
    ///
    /// 打开句柄时使用的路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access mode the descriptor was opened with
    ///
    /// 描述符的打开方式
    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Last file size seen by this handle
    ///
    /// 该句柄最近观察到的文件大小
    ///
    /// Set by `open_for_write` and refreshed by every map call. `None` for a read-only
    /// handle that has not been mapped yet.
    ///
    /// 由 `open_for_write` 设置，每次映射时刷新。尚未映射的只读句柄为 `None`。
    #[inline]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Whether the handle still owns its descriptor
    ///
    /// 句柄是否仍持有描述符
    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Re-stat the descriptor and check that `length` fits in the file
    fn checked_file(&mut self, op: Operation, length: NonZeroUsize) -> Result<&File> {
        let Some(file) = self.file.as_ref() else {
            return Err(Error::closed(op, &self.path));
        };

        let size = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => return Err(self.invalidate(Operation::Stat, e)),
        };
        self.size = Some(size);

        if length.get() as u64 > size {
            return Err(Error::out_of_bounds(
                op,
                &self.path,
                format!("mapping length {} exceeds file size {}", length.get(), size),
            ));
        }

        self.file.as_ref().ok_or_else(|| Error::closed(op, &self.path))
    }

    /// Drop the descriptor after a failure and build the error to return
    fn invalidate(&mut self, op: Operation, err: std::io::Error) -> Error {
        drop(self.file.take());
        debug!(path = %self.path.display(), %op, error = %err, "closed file after failure");
        Error::new(op, &self.path, err)
    }
}

/// Grow `file` to `size` bytes by writing one zero byte at `size - 1`
fn extend_sparse(file: &mut File, size: u64) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(size - 1))?;
    file.write_all(&[0])
}

fn build_options(length: NonZeroUsize, options: &MapOptions) -> MmapOptions {
    let mut builder = MmapOptions::new();
    builder.len(length.get());
    if options.wants_populate() {
        builder.populate();
    }
    builder
}

/// Pin a fresh mapping, downgrading failure to a warning
fn lock_pages(path: &Path, region: &impl Lockable) -> bool {
    match region.pin() {
        Ok(locked) => locked,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "could not lock mapped pages, continuing unlocked"
            );
            false
        }
    }
}

/// Regions that can be pinned in memory; `Ok(false)` where the platform cannot
trait Lockable {
    fn pin(&self) -> std::io::Result<bool>;
}

impl Lockable for memmap2::Mmap {
    #[cfg(unix)]
    fn pin(&self) -> std::io::Result<bool> {
        self.lock().map(|()| true)
    }

    #[cfg(not(unix))]
    fn pin(&self) -> std::io::Result<bool> {
        Ok(false)
    }
}

impl Lockable for memmap2::MmapMut {
    #[cfg(unix)]
    fn pin(&self) -> std::io::Result<bool> {
        self.lock().map(|()| true)
    }

    #[cfg(not(unix))]
    fn pin(&self) -> std::io::Result<bool> {
        Ok(false)
    }
}
