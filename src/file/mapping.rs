//! Shared mappings over a file handle
//!
//! 基于文件句柄的共享映射

use super::error::{Error, Operation, Result};
use super::options::AccessMode;
use super::sys;
use memmap2::{Mmap, MmapMut};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shared read-only mapping of a file prefix
///
/// 文件前缀的共享只读映射
///
/// Created by [`FileHandle::map_ro`](super::FileHandle::map_ro). Dereferences to the
/// mapped bytes. Released by [`unmap`](Self::unmap), or by drop.
///
/// 由 [`FileHandle::map_ro`](super::FileHandle::map_ro) 创建，可解引用为映射的字节。
/// 通过 [`unmap`](Self::unmap) 或 drop 释放。
pub struct ReadOnlyMapping {
    mmap: Mmap,
    path: PathBuf,
    locked: bool,
}

impl ReadOnlyMapping {
    pub(crate) fn new(mmap: Mmap, path: PathBuf, locked: bool) -> Self {
        Self { mmap, path, locked }
    }

    /// Mapped bytes
    ///
    /// 映射的字节
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Mapping length in bytes
    ///
    /// 映射长度（字节）
    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Always `false`: mappings have a non-zero length
    ///
    /// 总是 `false`：映射长度不为零
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Whether the pages were actually pinned in memory
    ///
    /// 页是否确实被锁定在内存中
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Always [`AccessMode::ReadOnly`]
    ///
    /// 总是 [`AccessMode::ReadOnly`]
    #[inline]
    pub fn mode(&self) -> AccessMode {
        AccessMode::ReadOnly
    }

    /// Path of the mapped file
    ///
    /// 被映射文件的路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy bytes starting at `offset` into `buf`
    ///
    /// 从 `offset` 开始复制字节到 `buf`
    ///
    /// # Returns
    /// Number of bytes copied: short near the end, 0 at or past it
    ///
    /// # 返回值
    /// 复制的字节数：接近末尾时较少，到达或超过末尾时为 0
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        read_into(&self.mmap, offset, buf)
    }

    /// Release the mapping
    ///
    /// 释放映射
    ///
    /// # Errors
    /// If the OS refuses to unmap, the state of the address range is unknown and the
    /// mapping should be considered lost.
    ///
    /// # Errors
    /// 如果操作系统拒绝解除映射，该地址范围的状态未知，应视为映射已丢失。
    pub fn unmap(self) -> Result<()> {
        let Self { mmap, path, .. } = self;
        let (ptr, len) = (mmap.as_ptr(), mmap.len());
        sys::unmap_region(mmap, ptr, len).map_err(|e| Error::new(Operation::Unmap, &path, e))?;
        debug!(path = %path.display(), len, "unmapped read-only mapping");
        Ok(())
    }
}

impl Deref for ReadOnlyMapping {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.mmap
    }
}

impl AsRef<[u8]> for ReadOnlyMapping {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}

impl std::fmt::Debug for ReadOnlyMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyMapping")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .field("locked", &self.locked)
            .finish()
    }
}

/// Shared read-write mapping of a file prefix
///
/// 文件前缀的共享读写映射
///
/// Created by [`FileHandle::map_rw`](super::FileHandle::map_rw). Writes land in the
/// page cache and are visible to every other mapping of the file immediately; they reach
/// stable storage on [`flush`](Self::flush) here or on
/// [`FileHandle::flush`](super::FileHandle::flush).
///
/// 由 [`FileHandle::map_rw`](super::FileHandle::map_rw) 创建。写入进入页缓存，
/// 立即对该文件的所有其他映射可见；在此处的 [`flush`](Self::flush) 或
/// [`FileHandle::flush`](super::FileHandle::flush) 时落盘。
///
/// Several mappings may alias the same bytes. Nothing here orders writes between
/// them; that is left to the page cache and to the caller.
///
/// 多个映射可以指向相同的字节。这里不对它们之间的写入排序，这由页缓存和调用者负责。
pub struct WritableMapping {
    mmap: MmapMut,
    path: PathBuf,
    locked: bool,
}

impl WritableMapping {
    pub(crate) fn new(mmap: MmapMut, path: PathBuf, locked: bool) -> Self {
        Self { mmap, path, locked }
    }

    /// Mapped bytes
    ///
    /// 映射的字节
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Mapped bytes, writable
    ///
    /// 可写的映射字节
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Mapping length in bytes
    ///
    /// 映射长度（字节）
    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Always `false`: mappings have a non-zero length
    ///
    /// 总是 `false`：映射长度不为零
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Whether the pages were actually pinned in memory
    ///
    /// 页是否确实被锁定在内存中
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Always [`AccessMode::ReadWrite`]
    ///
    /// 总是 [`AccessMode::ReadWrite`]
    #[inline]
    pub fn mode(&self) -> AccessMode {
        AccessMode::ReadWrite
    }

    /// Path of the mapped file
    ///
    /// 被映射文件的路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `data` into the mapping at `offset`
    ///
    /// 在 `offset` 处将 `data` 复制到映射中
    ///
    /// # Errors
    /// Returns an [`InvalidInput`](std::io::ErrorKind::InvalidInput) error, writing
    /// nothing, if `offset + data.len()` is past the end of the mapping.
    ///
    /// # Errors
    /// 如果 `offset + data.len()` 超出映射末尾，返回
    /// [`InvalidInput`](std::io::ErrorKind::InvalidInput) 错误，不写入任何数据。
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        let start = self.checked_range(Operation::Access, offset, data.len())?;
        self.mmap[start..start + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    /// Copy bytes starting at `offset` into `buf`
    ///
    /// 从 `offset` 开始复制字节到 `buf`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        read_into(&self.mmap, offset, buf)
    }

    /// Fill the whole mapping with `byte`
    ///
    /// 用 `byte` 填充整个映射
    #[inline]
    pub fn fill(&mut self, byte: u8) {
        self.mmap.fill(byte);
    }

    /// Zero the whole mapping
    ///
    /// 清零整个映射
    #[inline]
    pub fn zero(&mut self) {
        self.fill(0)
    }

    /// Write the mapping's dirty pages back and wait for completion (`msync(MS_SYNC)`)
    ///
    /// 将映射的脏页写回并等待完成（`msync(MS_SYNC)`）
    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| Error::new(Operation::Flush, &self.path, e))
    }

    /// Schedule write-back of the dirty pages without waiting (`msync(MS_ASYNC)`)
    ///
    /// 安排脏页写回但不等待（`msync(MS_ASYNC)`）
    pub fn flush_async(&self) -> Result<()> {
        self.mmap
            .flush_async()
            .map_err(|e| Error::new(Operation::Flush, &self.path, e))
    }

    /// Synchronously write back only `[offset, offset + len)`
    ///
    /// 仅同步写回 `[offset, offset + len)`
    ///
    /// # Errors
    /// Ranges past the end of the mapping are rejected with
    /// [`InvalidInput`](std::io::ErrorKind::InvalidInput).
    ///
    /// # Errors
    /// 超出映射末尾的范围会以 [`InvalidInput`](std::io::ErrorKind::InvalidInput) 拒绝。
    pub fn flush_range(&self, offset: u64, len: usize) -> Result<()> {
        let start = self.checked_range(Operation::Flush, offset, len)?;
        self.mmap
            .flush_range(start, len)
            .map_err(|e| Error::new(Operation::Flush, &self.path, e))
    }

    /// Release the mapping
    ///
    /// 释放映射
    ///
    /// Unmapping does not flush. Dirty pages stay in the page cache and reach the disk
    /// on the next [`FileHandle::flush`](super::FileHandle::flush) or OS write-back.
    ///
    /// 解除映射不会刷新。脏页保留在页缓存中，在下一次
    /// [`FileHandle::flush`](super::FileHandle::flush) 或操作系统回写时落盘。
    ///
    /// # Errors
    /// If the OS refuses to unmap, the state of the address range is unknown and the
    /// mapping should be considered lost.
    ///
    /// # Errors
    /// 如果操作系统拒绝解除映射，该地址范围的状态未知，应视为映射已丢失。
    pub fn unmap(self) -> Result<()> {
        let Self { mmap, path, .. } = self;
        let (ptr, len) = (mmap.as_ptr(), mmap.len());
        sys::unmap_region(mmap, ptr, len).map_err(|e| Error::new(Operation::Unmap, &path, e))?;
        debug!(path = %path.display(), len, "unmapped read-write mapping");
        Ok(())
    }

    fn checked_range(&self, op: Operation, offset: u64, len: usize) -> Result<usize> {
        let end = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(len));
        match end {
            Some(end) if end <= self.mmap.len() => Ok(end - len),
            _ => Err(Error::out_of_bounds(
                op,
                &self.path,
                format!(
                    "range at offset {} with length {} exceeds mapping length {}",
                    offset,
                    len,
                    self.mmap.len()
                ),
            )),
        }
    }
}

impl Deref for WritableMapping {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.mmap
    }
}

impl DerefMut for WritableMapping {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl AsRef<[u8]> for WritableMapping {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}

impl AsMut<[u8]> for WritableMapping {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl std::fmt::Debug for WritableMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableMapping")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .field("locked", &self.locked)
            .finish()
    }
}

fn read_into(region: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= region.len() {
        return 0;
    }

    let available = (region.len() - start).min(buf.len());
    buf[..available].copy_from_slice(&region[start..start + available]);
    available
}
