//! 测试模块

use super::*;
use std::io;
use std::num::NonZeroUsize;
use tempfile::tempdir;

fn len(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

/// open_for_write / open_for_read 测试
#[cfg(test)]
mod open_tests {
    use super::*;

    #[test]
    fn test_open_for_write_creates_zeroed_file() {
        let dir = tempdir().unwrap();

        for size in [0u64, 1, 7, 4096, 10_000] {
            let path = dir.path().join(format!("create_{size}.bin"));

            let handle = FileHandle::open_for_write(&path, size).unwrap();
            assert_eq!(handle.size(), Some(size));
            assert_eq!(handle.mode(), AccessMode::ReadWrite);
            assert!(handle.is_open());
            handle.close().unwrap();

            // 文件大小精确，内容全为 0
            let data = std::fs::read(&path).unwrap();
            assert_eq!(data.len() as u64, size);
            assert!(data.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_open_for_write_never_shrinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_shrink.bin");

        FileHandle::open_for_write(&path, 8192).unwrap().close().unwrap();

        // 第二次使用更小的大小
        let handle = FileHandle::open_for_write(&path, 100).unwrap();
        assert_eq!(handle.size(), Some(8192));
        handle.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
    }

    #[test]
    fn test_open_for_write_keeps_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.bin");
        std::fs::write(&path, b"hello").unwrap();

        // 扩展时保留原有数据，新增部分为 0
        let handle = FileHandle::open_for_write(&path, 16).unwrap();
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[..5], b"hello");
        assert!(data[5..].iter().all(|&b| b == 0));

        // 已足够大时不做任何修改
        let handle = FileHandle::open_for_write(&path, 4).unwrap();
        assert_eq!(handle.size(), Some(16));
        handle.close().unwrap();
        assert_eq!(&std::fs::read(&path).unwrap()[..5], b"hello");
    }

    #[test]
    fn test_open_for_write_missing_directory() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("does_not_exist");
        let path = parent.join("data.bin");

        let err = FileHandle::open_for_write(&path, 4096).unwrap_err();
        assert_eq!(err.operation(), Operation::OpenForWrite);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.path(), path.as_path());
        assert!(err.raw_os_error().is_some());

        // 不会留下任何文件或目录
        assert!(!path.exists());
        assert!(!parent.exists());
    }

    #[test]
    fn test_open_for_write_extend_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.bin");

        // 打开成功，但无法扩展到超出文件偏移范围的大小
        let err = FileHandle::open_for_write(&path, u64::MAX).unwrap_err();
        assert_eq!(err.operation(), Operation::Extend);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.raw_os_error().is_some());
        assert_eq!(err.path(), path.as_path());
        assert!(err.to_string().contains("huge.bin"));
    }

    #[test]
    fn test_open_for_read_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = FileHandle::open_for_read(&path).unwrap_err();
        assert_eq!(err.operation(), Operation::OpenForRead);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("missing.bin"));

        // 只读打开不会创建文件
        assert!(!path.exists());
    }

    #[test]
    fn test_open_for_read_leaves_size_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("read_size.bin");
        std::fs::write(&path, [1u8; 10]).unwrap();

        let handle = FileHandle::open_for_read(&path).unwrap();
        assert_eq!(handle.mode(), AccessMode::ReadOnly);
        assert_eq!(handle.size(), None);
        handle.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
    }

    #[test]
    fn test_preallocate_sizes_and_zeroes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prealloc.bin");
        let opts = CreateOptions::new().preallocate(true);

        let handle = FileHandle::open_for_write_with(&path, 64 * 1024, &opts).unwrap();
        assert_eq!(handle.size(), Some(64 * 1024));
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 64 * 1024);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_preallocate_reserves_blocks() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempdir().unwrap();
        let size = 1024 * 1024;

        // 稀疏扩展只分配最后一个块
        let sparse = dir.path().join("sparse.bin");
        FileHandle::open_for_write(&sparse, size).unwrap().close().unwrap();

        let reserved = dir.path().join("reserved.bin");
        let opts = CreateOptions::new().preallocate(true);
        FileHandle::open_for_write_with(&reserved, size, &opts)
            .unwrap()
            .close()
            .unwrap();

        let meta = std::fs::metadata(&reserved).unwrap();
        assert_eq!(meta.len(), size);
        let sparse_blocks = std::fs::metadata(&sparse).unwrap().blocks();

        // 文件系统不支持预分配时会退回稀疏扩展，此时两者相同
        if meta.blocks() == sparse_blocks && sparse_blocks * 512 < size {
            eprintln!("preallocation not supported on this filesystem, skipping");
            return;
        }
        assert!(meta.blocks() * 512 >= size);
    }

    #[test]
    fn test_preallocate_keeps_larger_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prealloc_keep.bin");
        std::fs::write(&path, [7u8; 8192]).unwrap();

        // 不截断，不修改已有内容
        let opts = CreateOptions::new().preallocate(true);
        let handle = FileHandle::open_for_write_with(&path, 100, &opts).unwrap();
        assert_eq!(handle.size(), Some(8192));
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data, vec![7u8; 8192]);
    }

    #[test]
    fn test_preallocate_extend_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prealloc_huge.bin");

        let opts = CreateOptions::new().preallocate(true);
        let err = FileHandle::open_for_write_with(&path, u64::MAX, &opts).unwrap_err();
        assert_eq!(err.operation(), Operation::Extend);
        assert!(err.raw_os_error().is_some());
        assert_eq!(err.path(), path.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_created_file_is_owner_read_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("mode.bin");
        FileHandle::open_for_write(&path, 1).unwrap().close().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o600, 0o600);
        assert_eq!(mode & !DEFAULT_FILE_MODE & 0o777, 0);
    }
}

/// map_rw / map_ro / unmap 测试
#[cfg(test)]
mod mapping_tests {
    use super::*;

    #[test]
    fn test_durability_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let mut handle = FileHandle::open_for_write(&path, 4096).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);

        let mut map = handle.map_rw(len(4096), false).unwrap();
        assert_eq!(map.len(), 4096);
        map[0] = 0xFF;
        map[4095] = 0xFF;
        map.unmap().unwrap();

        handle.flush().unwrap();
        handle.close().unwrap();

        // 重新只读打开并验证
        let mut handle = FileHandle::open_for_read(&path).unwrap();
        let map = handle.map_ro(len(4096), false).unwrap();
        assert_eq!(map[0], 0xFF);
        assert_eq!(map[4095], 0xFF);
        assert!(map[1..4095].iter().all(|&b| b == 0));
        assert_eq!(handle.size(), Some(4096));

        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_repeated_map_unmap_then_map_rw() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycle.bin");

        let mut handle = FileHandle::open_for_write(&path, 8192).unwrap();

        for _ in 0..64 {
            let map = handle.map_ro(len(8192), false).unwrap();
            assert_eq!(map.mode(), AccessMode::ReadOnly);
            map.unmap().unwrap();
        }

        // 句柄仍然可用
        assert!(handle.is_open());
        let mut map = handle.map_rw(len(8192), false).unwrap();
        map.fill(0x5A);
        map.unmap().unwrap();
        handle.flush().unwrap();
        handle.close().unwrap();

        assert!(std::fs::read(&path).unwrap().iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_partial_prefix_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefix.bin");

        let mut handle = FileHandle::open_for_write(&path, 10_000).unwrap();

        // 只映射文件开头的一部分
        let mut map = handle.map_rw(len(100), false).unwrap();
        assert_eq!(map.len(), 100);
        map.write_at(0, b"prefix").unwrap();
        map.unmap().unwrap();
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 10_000);
        assert_eq!(&data[..6], b"prefix");
    }

    #[test]
    fn test_length_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("too_long.bin");

        let mut handle = FileHandle::open_for_write(&path, 4096).unwrap();

        let err = handle.map_rw(len(4097), false).unwrap_err();
        assert_eq!(err.operation(), Operation::MapReadWrite);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = handle.map_ro(len(1 << 20), false).unwrap_err();
        assert_eq!(err.operation(), Operation::MapReadOnly);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        // 拒绝发生在映射之前，句柄仍然可用
        assert!(handle.is_open());
        let map = handle.map_rw(len(4096), false).unwrap();
        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_empty_file_cannot_be_mapped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");

        let mut handle = FileHandle::open_for_write(&path, 0).unwrap();
        let err = handle.map_ro(len(1), false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        handle.close().unwrap();
    }

    #[test]
    fn test_length_check_sees_external_growth() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grown.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let mut handle = FileHandle::open_for_read(&path).unwrap();
        assert!(handle.map_ro(len(20), false).is_err());
        assert_eq!(handle.size(), Some(10));

        // 文件在外部被扩展后，新的长度可以映射
        FileHandle::open_for_write(&path, 20).unwrap().close().unwrap();
        let map = handle.map_ro(len(20), false).unwrap();
        assert_eq!(handle.size(), Some(20));
        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_map_failure_invalidates_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ro_handle.bin");
        FileHandle::open_for_write(&path, 4096).unwrap().close().unwrap();

        // 只读描述符无法建立读写映射
        let mut handle = FileHandle::open_for_read(&path).unwrap();
        let err = handle.map_rw(len(4096), false).unwrap_err();
        assert_eq!(err.operation(), Operation::MapReadWrite);
        assert!(err.raw_os_error().is_some());
        assert!(!handle.is_open());

        // 之后的操作全部失败
        let err = handle.map_ro(len(4096), false).unwrap_err();
        assert_eq!(err.operation(), Operation::MapReadOnly);
        assert!(err.raw_os_error().is_none());
        assert!(handle.flush().is_err());

        // 关闭已失效的句柄不报错
        handle.close().unwrap();
    }

    #[test]
    fn test_shared_mappings_see_each_other() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.bin");

        let mut writer = FileHandle::open_for_write(&path, 4096).unwrap();
        let mut reader = FileHandle::open_for_read(&path).unwrap();

        let mut rw = writer.map_rw(len(4096), false).unwrap();
        let ro = reader.map_ro(len(4096), false).unwrap();
        let mut rw2 = writer.map_rw(len(4096), false).unwrap();

        // 不需要刷新，写入立即对其他映射可见
        rw.write_at(100, b"shared").unwrap();
        assert_eq!(&ro[100..106], b"shared");
        assert_eq!(&rw2[100..106], b"shared");

        rw2[0] = 7;
        assert_eq!(rw[0], 7);
        assert_eq!(ro[0], 7);

        rw.unmap().unwrap();
        rw2.unmap().unwrap();
        ro.unmap().unwrap();
        writer.close().unwrap();
        reader.close().unwrap();
    }

    #[test]
    fn test_mapping_outlives_closed_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outlive.bin");

        let mut handle = FileHandle::open_for_write(&path, 64).unwrap();
        let mut map = handle.map_rw(len(64), false).unwrap();
        handle.close().unwrap();

        // 描述符关闭后映射仍然有效
        map.write_at(0, b"still mapped").unwrap();
        map.flush().unwrap();
        map.unmap().unwrap();

        assert_eq!(&std::fs::read(&path).unwrap()[..12], b"still mapped");
    }

    #[test]
    fn test_lock_is_best_effort() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.bin");

        let mut handle = FileHandle::open_for_write(&path, 4096).unwrap();

        // 锁定可能因权限或限制失败，但映射总是成功
        let mut map = handle.map_rw(len(4096), true).unwrap();
        map[0] = 1;
        map.unmap().unwrap();

        let map = handle.map_ro(len(4096), true).unwrap();
        assert_eq!(map[0], 1);
        map.unmap().unwrap();

        let map = handle.map_ro(len(4096), false).unwrap();
        assert!(!map.is_locked());
        map.unmap().unwrap();

        handle.close().unwrap();
    }

    #[test]
    fn test_populate_option() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("populate.bin");

        let mut handle = FileHandle::open_for_write(&path, 1 << 16).unwrap();
        let options = MapOptions::new().populate(true);

        let map = handle.map_rw_with(len(1 << 16), &options).unwrap();
        assert!(map.iter().all(|&b| b == 0));
        map.unmap().unwrap();

        let map = handle.map_ro_with(len(1 << 16), &options).unwrap();
        assert_eq!(map.len(), 1 << 16);
        map.unmap().unwrap();

        handle.close().unwrap();
    }

    #[test]
    fn test_drop_releases_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.bin");

        {
            let mut handle = FileHandle::open_for_write(&path, 32).unwrap();
            let mut map = handle.map_rw(len(32), false).unwrap();
            map[31] = 9;
            // map 和 handle 在作用域结束时释放
        }

        assert_eq!(std::fs::read(&path).unwrap()[31], 9);
    }
}

/// 映射读写辅助方法测试
#[cfg(test)]
mod access_tests {
    use super::*;

    #[test]
    fn test_write_at_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bounds.bin");

        let mut handle = FileHandle::open_for_write(&path, 100).unwrap();
        let mut map = handle.map_rw(len(100), false).unwrap();

        // 刚好在边界
        assert_eq!(map.write_at(95, b"hello").unwrap(), 5);

        // 超出边界，不写入任何数据
        let err = map.write_at(96, b"hello").unwrap_err();
        assert_eq!(err.operation(), Operation::Access);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(&map[95..100], b"hello");

        assert!(map.write_at(u64::MAX, b"x").is_err());
        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_read_at_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("read_bounds.bin");

        let mut handle = FileHandle::open_for_write(&path, 100).unwrap();
        let mut map = handle.map_rw(len(100), false).unwrap();
        map.write_at(0, b"hello").unwrap();

        // 正常读取
        let mut buf = [0u8; 5];
        assert_eq!(map.read_at(0, &mut buf), 5);
        assert_eq!(&buf, b"hello");

        // 接近末尾，只返回部分数据
        let mut buf = [0u8; 50];
        assert_eq!(map.read_at(90, &mut buf), 10);

        // 完全超出边界
        assert_eq!(map.read_at(100, &mut buf), 0);
        assert_eq!(map.read_at(u64::MAX, &mut buf), 0);

        map.unmap().unwrap();

        let map = handle.map_ro(len(100), false).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(map.read_at(0, &mut buf), 5);
        assert_eq!(&buf, b"hello");
        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_fill_and_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fill.bin");

        let mut handle = FileHandle::open_for_write(&path, 1000).unwrap();
        let mut map = handle.map_rw(len(1000), false).unwrap();

        map.fill(0xFF);
        map.flush().unwrap();
        assert!(std::fs::read(&path).unwrap().iter().all(|&b| b == 0xFF));

        map.zero();
        map.flush_async().unwrap();
        assert!(map.iter().all(|&b| b == 0));

        map.unmap().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_flush_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flush_range.bin");

        let mut handle = FileHandle::open_for_write(&path, 1000).unwrap();
        let mut map = handle.map_rw(len(1000), false).unwrap();

        map.write_at(0, b"hello").unwrap();
        map.write_at(500, b"world").unwrap();
        map.flush_range(0, 5).unwrap();
        map.flush_range(500, 5).unwrap();

        let err = map.flush_range(998, 5).unwrap_err();
        assert_eq!(err.operation(), Operation::Flush);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        map.unmap().unwrap();
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..5], b"hello");
        assert_eq!(&data[500..505], b"world");
    }
}

/// flush / close 测试
#[cfg(test)]
mod flush_close_tests {
    use super::*;

    #[test]
    fn test_flush_repeatedly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flush.bin");

        let mut handle = FileHandle::open_for_write(&path, 4096).unwrap();
        for i in 0..8u8 {
            let mut map = handle.map_rw(len(4096), false).unwrap();
            map[i as usize] = i + 1;
            map.unmap().unwrap();
            handle.flush().unwrap();
        }
        handle.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_flush_read_only_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flush_ro.bin");
        std::fs::write(&path, [0u8; 16]).unwrap();

        let mut handle = FileHandle::open_for_read(&path).unwrap();
        handle.flush().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_close_with_strict_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strict.bin");

        let mut handle = FileHandle::open_for_write(&path, 128).unwrap();
        let mut map = handle.map_rw(len(128), false).unwrap();
        map.write_at(0, b"durable").unwrap();
        map.unmap().unwrap();

        handle.close_with(ClosePolicy::StrictFlush).unwrap();
        assert_eq!(&std::fs::read(&path).unwrap()[..7], b"durable");
    }

    #[test]
    fn test_close_policy_default() {
        assert_eq!(ClosePolicy::default(), ClosePolicy::BestEffortFlush);
    }

    #[test]
    fn test_error_converts_to_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = FileHandle::open_for_read(&path).unwrap_err();
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.to_string().contains("opening file for reading"));
    }
}
