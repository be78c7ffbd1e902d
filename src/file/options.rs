//! Access modes and mapping / close configuration
//!
//! 访问模式与映射、关闭配置

/// How a handle or mapping may touch the file
///
/// 句柄或映射对文件的访问方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessMode {
    /// Read only
    ///
    /// 只读
    ReadOnly,

    /// Read and write
    ///
    /// 读写
    ReadWrite,
}

/// Options applied when establishing a mapping
///
/// 建立映射时使用的选项
///
/// Both flags are hints. Where the platform cannot honor them the mapping is still
/// created and the flag is silently dropped (a warning is logged for `lock`).
///
/// 两个标志都只是提示。平台不支持时映射仍会建立，标志被忽略（`lock` 会记录警告）。
///
/// # Examples
///
/// ```
/// use mapped_file::MapOptions;
///
/// let opts = MapOptions::new().lock(true).populate(true);
/// assert!(opts.wants_lock());
/// assert!(opts.wants_populate());
/// assert_eq!(MapOptions::default(), MapOptions::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapOptions {
    lock: bool,
    populate: bool,
}

impl MapOptions {
    /// Default options: no locking, no pre-faulting
    ///
    /// 默认选项：不锁定，不预读
    #[inline]
    pub const fn new() -> Self {
        Self {
            lock: false,
            populate: false,
        }
    }

    /// Pin mapped pages in physical memory
    ///
    /// 将映射页锁定在物理内存中
    #[inline]
    pub const fn lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Pre-fault the whole mapping when it is created (`MAP_POPULATE` on Linux)
    ///
    /// 创建映射时预先加载所有页（Linux 上为 `MAP_POPULATE`）
    #[inline]
    pub const fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Whether pages should be pinned in memory
    ///
    /// 是否需要将页锁定在内存中
    #[inline]
    pub fn wants_lock(&self) -> bool {
        self.lock
    }

    /// Whether the mapping should be pre-faulted
    ///
    /// 是否需要预先加载映射页
    #[inline]
    pub fn wants_populate(&self) -> bool {
        self.populate
    }
}

/// Options applied when `open_for_write` sizes the file
///
/// `open_for_write` 调整文件大小时使用的选项
///
/// By default a short file is sparse-extended, which leaves holes the filesystem may fail
/// to back later (a write into a hole through a mapping then raises `SIGBUS`). With
/// `preallocate` the blocks up to the minimum size are reserved up front
/// (`posix_fallocate` on Linux). Where that is unsupported the file is sparse-extended
/// instead and a warning is logged.
///
/// 默认情况下较短的文件会被稀疏扩展，留下的空洞之后可能无法分配（通过映射写入空洞会触发
/// `SIGBUS`）。启用 `preallocate` 后会预先保留最小大小内的所有块（Linux 上为
/// `posix_fallocate`）。不支持时退回稀疏扩展并记录警告。
///
/// # Examples
///
/// ```
/// use mapped_file::CreateOptions;
///
/// let opts = CreateOptions::new().preallocate(true);
/// assert!(opts.wants_preallocate());
/// assert!(!CreateOptions::default().wants_preallocate());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CreateOptions {
    preallocate: bool,
}

impl CreateOptions {
    /// Default options: sparse extension
    ///
    /// 默认选项：稀疏扩展
    #[inline]
    pub const fn new() -> Self {
        Self { preallocate: false }
    }

    /// Reserve the file's blocks instead of leaving holes
    ///
    /// 预先保留文件块而不是留下空洞
    #[inline]
    pub const fn preallocate(mut self, preallocate: bool) -> Self {
        self.preallocate = preallocate;
        self
    }

    /// Whether blocks should be reserved up front
    ///
    /// 是否需要预先保留文件块
    #[inline]
    pub fn wants_preallocate(&self) -> bool {
        self.preallocate
    }
}

/// What `close` does with the flush it runs before releasing the descriptor
///
/// `close` 在释放描述符之前执行的刷新如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClosePolicy {
    /// Flush, log a failure and carry on closing. Durability problems found here are
    /// not returned; call [`FileHandle::flush`](super::FileHandle::flush) first if
    /// they matter.
    ///
    /// 刷新，失败时仅记录日志并继续关闭。此处发现的持久化问题不会返回；
    /// 如有需要请先调用 [`FileHandle::flush`](super::FileHandle::flush)。
    #[default]
    BestEffortFlush,

    /// Flush and return its failure. The descriptor is closed either way.
    ///
    /// 刷新并返回其失败。无论如何都会关闭描述符。
    StrictFlush,
}
