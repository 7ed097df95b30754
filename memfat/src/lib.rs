//! 完全在内存中的FAT式文件系统。

mod block;
mod chain;
mod control;
mod file;
mod inode;
mod ops;
mod path;
mod util;
pub mod volume;

pub use self::{
    block::{Block, BlockId, BlockKind, BlockStore, DataBlock},
    chain::{ChainError, FatEntry},
    control::FatFileSystem,
    file::{FatFile, OpenMode},
    inode::Inode,
    path::Path,
};
