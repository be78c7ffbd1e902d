//! Platform-specific preallocation and release of descriptors and mappings
//!
//! 平台相关的预分配以及描述符与映射释放
//!
//! `std::fs::File` and memmap2 both release on drop and discard the result. On Unix we
//! make the syscalls ourselves so `close` and `unmap` can report failures.
//!
//! `std::fs::File` 和 memmap2 都在 drop 时释放并丢弃结果。在 Unix 上我们自行调用
//! 系统调用，以便 `close` 和 `unmap` 能报告失败。

use std::fs::File;
use std::io;

/// Close a descriptor and report the result of `close(2)`
#[cfg(unix)]
pub(crate) fn close_file(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // Safety: `fd` was just released by `file`, nothing else owns it
    // Safety: `fd` 刚从 `file` 中释放，没有其他所有者
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

/// Unmap a region created at file offset 0 and report the result of `munmap(2)`
///
/// On success the memmap2 value is forgotten so its drop does not unmap again. On
/// failure it is dropped normally, which retries the unmap and ignores the outcome.
#[cfg(unix)]
pub(crate) fn unmap_region<M>(region: M, ptr: *const u8, len: usize) -> io::Result<()> {
    // Safety: `ptr`/`len` describe the whole region owned by `region`. Offset 0 means
    // memmap2 applied no alignment adjustment, so this is exactly the range it mapped.
    // Safety: `ptr`/`len` 描述 `region` 拥有的完整区域。偏移为 0，memmap2 没有做对齐调整，
    // 因此这正是它映射的范围。
    if unsafe { libc::munmap(ptr as *mut libc::c_void, len) } == -1 {
        let err = io::Error::last_os_error();
        drop(region);
        return Err(err);
    }
    std::mem::forget(region);
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn unmap_region<M>(region: M, _ptr: *const u8, _len: usize) -> io::Result<()> {
    drop(region);
    Ok(())
}

/// Reserve the blocks of `[0, len)` with `posix_fallocate(3)`
///
/// Returns `Ok(false)` when the filesystem does not support it.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn preallocate(file: &File, len: u64) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let Ok(len) = libc::off_t::try_from(len) else {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    };
    // Safety: the descriptor is owned by `file` and stays open for the call
    // Safety: 描述符由 `file` 持有，调用期间保持打开
    match unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len) } {
        0 => Ok(true),
        libc::EOPNOTSUPP => Ok(false),
        code => Err(io::Error::from_raw_os_error(code)),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn preallocate(_file: &File, _len: u64) -> io::Result<bool> {
    Ok(false)
}
