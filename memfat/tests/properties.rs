use block_dev::RamDisk;
use memfat::volume::{BLOCK_COUNT, BLOCK_SIZE, DIR_ENTRIES, MAX_PATH_LEN};
use memfat::{FatFileSystem, OpenMode};
use vfs::DirEntryType;

fn write_file(fs: &mut FatFileSystem, path: &str, data: &[u8]) {
    let mut file = fs.open(path, OpenMode::Write).unwrap();
    file.write(data, fs).unwrap();
    file.close();
}

fn append_file(fs: &mut FatFileSystem, path: &str, data: &[u8]) {
    let mut file = fs.open(path, OpenMode::Append).unwrap();
    file.write(data, fs).unwrap();
    file.close();
}

fn read_file(fs: &mut FatFileSystem, path: &str) -> Vec<u8> {
    let mut file = fs.open(path, OpenMode::Read).unwrap();
    let mut buf = vec![0; file.len() + 1];
    let read = file.read(&mut buf, fs).unwrap();
    buf.truncate(read);
    buf
}

/// 已占用块与空闲块之和恰为全部块
fn assert_no_leak(fs: &FatFileSystem) {
    assert_eq!(BLOCK_COUNT, fs.verify().unwrap() + fs.free_blocks());
}

#[test]
fn round_trip() {
    let mut fs = FatFileSystem::format("props").unwrap();
    for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 3 * BLOCK_SIZE + 17] {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        write_file(&mut fs, "/data.bin", &data);
        assert_eq!(data, read_file(&mut fs, "/data.bin"), "length {len}");
    }
    assert_no_leak(&fs);
}

#[test]
fn append_after_close() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/f", b"AB");
    append_file(&mut fs, "/f", b"CD");
    assert_eq!(b"ABCD".to_vec(), read_file(&mut fs, "/f"));

    // 追加模式也会创建缺失的文件
    append_file(&mut fs, "/g", b"xyz");
    assert_eq!(b"xyz".to_vec(), read_file(&mut fs, "/g"));
}

#[test]
fn zero_bytes_survive_append() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/f", &[1, 0, 0]);
    append_file(&mut fs, "/f", &[2]);
    assert_eq!(vec![1, 0, 0, 2], read_file(&mut fs, "/f"));
}

#[test]
fn directory_isolation() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/a/b/file1", b"1");
    write_file(&mut fs, "/a/c/file2", b"2");

    assert_eq!(vec!["file1"], fs.listdir("/a/b").unwrap());
    assert_eq!(vec!["file2"], fs.listdir("/a/c").unwrap());
    assert_eq!(vec!["b", "c"], fs.listdir("/a").unwrap());

    let entries = fs.read_dir("/a").unwrap();
    assert!(entries.iter().all(|entry| entry.ty == DirEntryType::Directory));
}

#[test]
fn space_reclamation() {
    let mut fs = FatFileSystem::format("props").unwrap();
    fs.mkdir("/spare").unwrap();
    let k = 5;
    write_file(&mut fs, "/big", &vec![7; k * BLOCK_SIZE]);
    assert_eq!(k as u64, fs.stat("/big").unwrap().blocks);

    // 用单块的空文件填满剩下的空间，每个目录恰好装满一块
    let err = (0..)
        .find_map(|i| {
            let path = format!("/fill{}/f{i}", i / (DIR_ENTRIES - 1));
            fs.open(&path, OpenMode::Write).err()
        })
        .unwrap();
    assert_eq!(vfs::Error::OutOfSpace, err);
    let exhausted = fs.free_blocks();
    assert_no_leak(&fs);

    fs.remove("/big").unwrap();
    assert_eq!(exhausted + k, fs.free_blocks());
    for i in 0..k {
        write_file(&mut fs, &format!("/spare/new{i}"), b"x");
    }
    assert_eq!(exhausted, fs.free_blocks());
    assert_no_leak(&fs);
}

#[test]
fn path_boundary() {
    let mut fs = FatFileSystem::format("props").unwrap();
    let free = fs.free_blocks();

    let long = format!("/{}", "d/".repeat(MAX_PATH_LEN / 2));
    assert_eq!(vfs::Error::PathTooLong, fs.open(&long, OpenMode::Write).unwrap_err());
    assert_eq!(Err(vfs::Error::PathTooLong), fs.mkdir(&long));
    assert_eq!(free, fs.free_blocks());
    assert!(fs.listdir("/").unwrap().is_empty());

    assert_eq!(
        vfs::Error::NotFound,
        fs.open("/missing/deeper", OpenMode::Read).unwrap_err()
    );
    assert_eq!(Err(vfs::Error::NotFound), fs.chdir("/missing/deeper"));
    assert_eq!(Err(vfs::Error::NotFound), fs.listdir("/missing"));
    assert_eq!(Err(vfs::Error::NotFound), fs.remove("/missing/deeper"));
    assert_eq!(Err(vfs::Error::NotFound), fs.rmdir("/missing/deeper"));
    assert!(fs.listdir("/").unwrap().is_empty());
    assert_eq!(free, fs.free_blocks());
}

#[test]
fn names_with_nul_are_rejected() {
    let mut fs = FatFileSystem::format("props").unwrap();
    let free = fs.free_blocks();

    assert_eq!(Err(vfs::Error::InvalidName), fs.mkdir("/a\0"));
    assert_eq!(Err(vfs::Error::InvalidName), fs.mkdir("/a\0"));
    assert_eq!(
        vfs::Error::InvalidName,
        fs.open("/\0hidden", OpenMode::Write).unwrap_err()
    );
    assert_eq!(Err(vfs::Error::InvalidName), fs.remove("/\0hidden"));
    assert!(fs.listdir("/").unwrap().is_empty());
    assert_eq!(free, fs.free_blocks());
}

#[test]
fn failed_lookup_keeps_cwd() {
    let mut fs = FatFileSystem::format("props").unwrap();
    fs.mkdir("/a").unwrap();
    fs.chdir("/a").unwrap();

    assert!(fs.chdir("/nowhere").is_err());
    assert!(fs.open("/nowhere/f", OpenMode::Read).is_err());
    assert_eq!(Ok(String::from("/a")), fs.pwd());
}

#[test]
fn write_reopen_truncates() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/f", b"a much longer first version");
    write_file(&mut fs, "/f", b"short");
    assert_eq!(b"short".to_vec(), read_file(&mut fs, "/f"));
    assert_eq!(5, fs.stat("/f").unwrap().size);
    assert_no_leak(&fs);
}

#[test]
fn read_mode_rejects_writes() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/f", b"data");

    let mut file = fs.open("/f", OpenMode::Read).unwrap();
    assert_eq!(Err(vfs::Error::WriteRejected), file.put_byte(b'x', &mut fs));
    assert_eq!(Err(vfs::Error::WriteRejected), file.write(b"xyz", &mut fs));
    file.close();
    assert_eq!(b"data".to_vec(), read_file(&mut fs, "/f"));
}

#[test]
fn directory_overflow() {
    let mut fs = FatFileSystem::format("props").unwrap();
    fs.mkdir("/many").unwrap();

    // 子目录首块的0号槽位被`..`占用
    let names: Vec<String> = (0..2 * DIR_ENTRIES).map(|i| format!("file{i:02}")).collect();
    for name in &names {
        write_file(&mut fs, &format!("/many/{name}"), name.as_bytes());
    }

    assert_eq!(names, fs.listdir("/many").unwrap());
    assert_eq!(3, fs.stat("/many").unwrap().blocks);
    for name in &names {
        assert_eq!(
            name.as_bytes().to_vec(),
            read_file(&mut fs, &format!("/many/{name}"))
        );
    }
    assert_no_leak(&fs);
}

#[test]
fn directory_errors() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/d/f", b"x");

    assert_eq!(Err(vfs::Error::DirectoryNotEmpty), fs.rmdir("/d"));
    assert_eq!(Err(vfs::Error::NotADirectory), fs.rmdir("/d/f"));
    assert_eq!(Err(vfs::Error::IsADirectory), fs.remove("/d"));
    assert_eq!(
        vfs::Error::IsADirectory,
        fs.open("/d", OpenMode::Read).unwrap_err()
    );
    assert_eq!(Err(vfs::Error::AlreadyExists), fs.mkdir("/d/f"));
    assert_eq!(Err(vfs::Error::NotADirectory), fs.chdir("/d/f"));
    assert_eq!(Err(vfs::Error::NotADirectory), fs.mkdir("/d/f/g"));
    assert_eq!(Err(vfs::Error::Busy), fs.rmdir("/"));

    fs.chdir("/d").unwrap();
    fs.remove("f").unwrap();
    assert_eq!(Err(vfs::Error::Busy), fs.rmdir("/d"));
    assert_eq!(Err(vfs::Error::Busy), fs.rmdir("."));

    fs.chdir("/").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(Err(vfs::Error::NotFound), fs.chdir("/d"));
    assert_no_leak(&fs);
}

#[test]
fn mkdir_is_idempotent() {
    let mut fs = FatFileSystem::format("props").unwrap();
    fs.mkdir("/a/b").unwrap();
    let free = fs.free_blocks();
    fs.mkdir("/a/b").unwrap();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/").unwrap();
    assert_eq!(free, fs.free_blocks());
}

#[test]
fn stat_reports_entry() {
    let mut fs = FatFileSystem::format("props").unwrap();
    write_file(&mut fs, "/dir/f", &[0; 2 * BLOCK_SIZE + 1]);

    let stat = fs.stat("/dir/f").unwrap();
    assert_eq!(DirEntryType::Regular, stat.mode);
    assert_eq!(BLOCK_SIZE as u64, stat.block_size);
    assert_eq!(3, stat.blocks);
    assert_eq!(2 * BLOCK_SIZE as u64 + 1, stat.size);
    assert!(stat.mtime > 0);

    let stat = fs.stat("/dir").unwrap();
    assert_eq!(DirEntryType::Directory, stat.mode);
    assert_eq!(1, stat.blocks);

    // `..`解析到父目录自己的目录项
    fs.mkdir("/dir/sub").unwrap();
    assert_eq!(Ok(stat), fs.stat("/dir/sub/.."));
    fs.chdir("/dir/sub/..").unwrap();
    assert_eq!(Ok(String::from("/dir")), fs.pwd());
}

#[test]
fn save_then_load() {
    let mut fs = FatFileSystem::format("persisted").unwrap();
    write_file(&mut fs, "/docs/readme", b"hello");
    fs.chdir("/docs").unwrap();

    let disk = RamDisk::new(BLOCK_SIZE, BLOCK_COUNT);
    fs.save(&disk).unwrap();

    let image = disk.into_bytes();
    assert_eq!(BLOCK_COUNT * BLOCK_SIZE, image.len());
    assert_eq!(b"persisted\0", &image[..10]);

    let disk = RamDisk::from_bytes(BLOCK_SIZE, image);
    let mut loaded = FatFileSystem::load(&disk).unwrap();
    assert_eq!(Ok(String::from("persisted")), loaded.label());
    assert_eq!(Ok(String::from("/")), loaded.pwd());
    assert_eq!(b"hello".to_vec(), read_file(&mut loaded, "/docs/readme"));
    assert_eq!(fs.free_blocks(), loaded.free_blocks());

    let short = RamDisk::new(BLOCK_SIZE, BLOCK_COUNT / 2);
    assert_eq!(Err(vfs::Error::IncompatibleDevice), fs.save(&short));
}

#[test]
fn chain_integrity() {
    let mut fs = FatFileSystem::format("props").unwrap();
    for i in 0..8 {
        write_file(&mut fs, &format!("/t/{i}"), &vec![i as u8; i * 700]);
    }
    fs.remove("/t/3").unwrap();
    append_file(&mut fs, "/t/5", &[9; 2000]);
    write_file(&mut fs, "/t/6", b"");

    for entry in fs.read_dir("/t").unwrap() {
        let chain = fs
            .fat()
            .chain(memfat::BlockId::new(entry.inode as u16))
            .unwrap();
        assert!(chain.len() <= BLOCK_COUNT);
    }
    assert_no_leak(&fs);
}

#[test]
fn shared_across_threads() {
    let fs = FatFileSystem::format("shared").unwrap().into_shared();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let fs = fs.clone();
            std::thread::spawn(move || {
                let mut fs = fs.lock();
                write_file(&mut fs, &format!("/t{i}/f"), b"thread");
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut fs = fs.lock();
    assert_eq!(4, fs.listdir("/").unwrap().len());
    assert_eq!(b"thread".to_vec(), read_file(&mut fs, "/t2/f"));
}
