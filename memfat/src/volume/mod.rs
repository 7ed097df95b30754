//! 卷的布局
//!
//! 卷标(#0) | 分配表区(#1..=#2) | 根目录(#3) | 数据区
//!
//! 以下常量构成磁盘格式，编译期固定。

pub mod dir;
pub mod fat;
pub mod reserved;

use crate::BlockId;

/// 一个块的字节量
pub const BLOCK_SIZE: usize = 1024;

/// 卷上块的总数
pub const BLOCK_COUNT: usize = 1024;

/// 分配表表项的宽度
pub const FAT_ENTRY_SIZE: usize = 2;

/// 一个块能容纳多少条分配表表项
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;

/// 分配表占用的块数，恰好为每个块各记一项
pub const FAT_BLOCKS: usize = BLOCK_COUNT.div_ceil(FAT_ENTRIES_PER_BLOCK);

/// 目录记录头：是否为目录 + 下一个空闲槽位
pub const DIR_HEADER_SIZE: usize = 8;

pub const DIR_ENTRY_SIZE: usize = 64;

/// 一个目录块的槽位数
pub const DIR_ENTRIES: usize = (BLOCK_SIZE - DIR_HEADER_SIZE) / DIR_ENTRY_SIZE;

/// 名称最长字节数，最后一字节留给`\0`
pub const NAME_MAX_LEN: usize = 47;

pub const MAX_PATH_LEN: usize = 1024;

pub const LABEL_BLOCK: BlockId = BlockId::new(0);

pub const FAT_START: BlockId = BlockId::new(1);

pub const ROOT_BLOCK: BlockId = BlockId::new(1 + FAT_BLOCKS as u16);

const _: () = assert!(FAT_BLOCKS * FAT_ENTRIES_PER_BLOCK >= BLOCK_COUNT);
const _: () = assert!(BLOCK_COUNT <= u16::MAX as usize);
const _: () = assert!(NAME_MAX_LEN + 1 + 16 == DIR_ENTRY_SIZE);
