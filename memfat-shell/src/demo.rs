//! 依次演示各项操作，每个阶段结束时导出一份磁盘映像

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use memfat::volume::{BLOCK_COUNT, BLOCK_SIZE};
use memfat::{FatFileSystem, OpenMode};

use crate::{BlockFile, fs_error};

pub fn run(out_dir: &Path, label: &str) -> io::Result<()> {
    fs::create_dir_all(out_dir)?;

    let mut fs = FatFileSystem::format(label).map_err(fs_error)?;
    println!("Formatted volume {:?}", fs.label().map_err(fs_error)?);
    save_image(&fs, out_dir, "virtualdiskD3_D1")?;

    big_file(&mut fs, out_dir)?;
    nested_dirs(&mut fs, out_dir)?;

    // 从一个全新的卷开始
    let mut fs = FatFileSystem::format(label).map_err(fs_error)?;
    tear_down(&mut fs, out_dir)
}

/// 写入、追加并读回一个跨越四个块的文件
fn big_file(fs: &mut FatFileSystem, out_dir: &Path) -> io::Result<()> {
    let file = fs.open("testfile.txt", OpenMode::Write).map_err(fs_error)?;
    file.close();

    let text: Vec<u8> = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ"
        .iter()
        .copied()
        .cycle()
        .take(4 * BLOCK_SIZE)
        .collect();
    let mut file = fs.open("testfile.txt", OpenMode::Append).map_err(fs_error)?;
    file.write(&text, fs).map_err(fs_error)?;
    file.close();

    let mut file = fs.open("testfile.txt", OpenMode::Read).map_err(fs_error)?;
    let mut content = Vec::with_capacity(file.len());
    while let Some(byte) = file.get_byte(fs).map_err(fs_error)? {
        content.push(byte);
    }
    file.close();
    println!("{}", String::from_utf8_lossy(&content));

    File::create(out_dir.join("testfileC3_C1_copy.txt"))?.write_all(&content)?;
    save_image(fs, out_dir, "virtualdiskC3_C1")
}

fn nested_dirs(fs: &mut FatFileSystem, out_dir: &Path) -> io::Result<()> {
    fs.mkdir("/myfirstdir/myseconddir/mythirddir")
        .map_err(fs_error)?;
    print_dir(fs, "/myfirstdir/myseconddir")?;
    save_image(fs, out_dir, "virtualdiskB3_B1_a")?;

    let file = fs
        .open("/myfirstdir/myseconddir/testfile.txt", OpenMode::Write)
        .map_err(fs_error)?;
    file.close();
    print_dir(fs, "/myfirstdir/myseconddir")?;
    save_image(fs, out_dir, "virtualdiskB3_B1_b")
}

/// 建起一棵小目录树，再逐项删除
fn tear_down(fs: &mut FatFileSystem, out_dir: &Path) -> io::Result<()> {
    fs.mkdir("/firstdir/seconddir").map_err(fs_error)?;
    write_text(fs, "firstdir/seconddir/testfile1.txt", "First file")?;
    print_dir(fs, "/firstdir/seconddir")?;

    fs.chdir("/firstdir/seconddir").map_err(fs_error)?;
    println!("cwd: {}", fs.pwd().map_err(fs_error)?);
    print_dir(fs, ".")?;

    write_text(fs, "testfile2.txt", "Second file")?;
    fs.mkdir("thirddir").map_err(fs_error)?;
    write_text(fs, "thirddir/testfile3.txt", "Third file")?;
    save_image(fs, out_dir, "virtualdiskA5_A1_a")?;

    fs.remove("testfile1.txt").map_err(fs_error)?;
    fs.remove("testfile2.txt").map_err(fs_error)?;
    save_image(fs, out_dir, "virtualdiskA5_A1_b")?;

    fs.chdir("thirddir").map_err(fs_error)?;
    fs.remove("testfile3.txt").map_err(fs_error)?;
    save_image(fs, out_dir, "virtualdiskA5_A1_c")?;

    fs.chdir("..").map_err(fs_error)?;
    fs.rmdir("thirddir").map_err(fs_error)?;
    fs.chdir("/firstdir").map_err(fs_error)?;
    fs.rmdir("seconddir").map_err(fs_error)?;
    fs.chdir("..").map_err(fs_error)?;
    fs.rmdir("firstdir").map_err(fs_error)?;
    print_dir(fs, "/")?;

    let used = fs.verify().map_err(fs_error)?;
    println!("{used} blocks in use, {} free", fs.free_blocks());
    save_image(fs, out_dir, "virtualdiskA5_A1_d")
}

fn write_text(fs: &mut FatFileSystem, path: &str, text: &str) -> io::Result<()> {
    let mut file = fs.open(path, OpenMode::Write).map_err(fs_error)?;
    file.write(text.as_bytes(), fs).map_err(fs_error)?;
    file.close();
    Ok(())
}

fn print_dir(fs: &FatFileSystem, path: &str) -> io::Result<()> {
    println!("Contents of {path:?}:");
    for name in fs.listdir(path).map_err(fs_error)? {
        println!("\t> {name}");
    }
    Ok(())
}

/// 整个卷原样写入`out_dir/name`
pub fn save_image(fs: &FatFileSystem, out_dir: &Path, name: &str) -> io::Result<()> {
    let fd = File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_dir.join(name))?;
    fd.set_len((BLOCK_COUNT * BLOCK_SIZE) as u64)?;

    fs.save(&BlockFile::new(fd)?).map_err(fs_error)?;
    log::info!("image={name:?}");
    Ok(())
}
