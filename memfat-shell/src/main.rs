mod block_file;
mod cli;
mod demo;

use std::fs::File;
use std::io;
use std::path::Path;

use clap::Parser;
use memfat::FatFileSystem;
use vfs::DirEntryType;

pub use self::{block_file::BlockFile, cli::Cli};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match &cli.load {
        Some(image) => print_image(image),
        None => demo::run(&cli.out_dir, &cli.label),
    }
}

pub fn fs_error(err: vfs::Error) -> io::Error {
    log::error!("{err}");
    io::Error::other(err)
}

fn print_image(image: &Path) -> io::Result<()> {
    let dev = BlockFile::new(File::open(image)?)?;
    let fs = FatFileSystem::load(&dev).map_err(fs_error)?;

    println!("label={:?}", fs.label().map_err(fs_error)?);
    // 成环的目录树会让递归打印停不下来
    let used = fs.verify().map_err(fs_error)?;
    log::debug!("{used} blocks reachable from the root");
    print_tree(&fs, "", 0)?;
    println!("{} blocks free", fs.free_blocks());
    Ok(())
}

fn print_tree(fs: &FatFileSystem, dir: &str, depth: usize) -> io::Result<()> {
    for entry in fs.read_dir(if dir.is_empty() { "/" } else { dir }).map_err(fs_error)? {
        let path = format!("{dir}/{}", entry.name);
        let stat = fs.stat(&path).map_err(fs_error)?;
        let indent = "  ".repeat(depth);
        match entry.ty {
            DirEntryType::Directory => {
                println!("{indent}{}/", entry.name);
                print_tree(fs, &path, depth + 1)?;
            }
            DirEntryType::Regular => {
                println!("{indent}{} ({} bytes, {} blocks)", entry.name, stat.size, stat.blocks);
            }
        }
    }
    Ok(())
}
