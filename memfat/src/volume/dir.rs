//! 目录记录：记录头 + 定长的目录项数组。
//!
//! 每个子目录的0号槽位固定为指向父目录的`..`，根目录没有父目录。

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};
use enumflags2::{BitFlags, bitflags};
use vfs::DirEntryType;

use crate::volume::{BLOCK_SIZE, DIR_ENTRIES, NAME_MAX_LEN};
use crate::{BlockId, DataBlock};

const PARENT_NAME: &str = "..";

/// 名称字段的容量，含结尾的`\0`
const NAME_CAP: usize = NAME_MAX_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[bitflags]
#[repr(u8)]
pub enum EntryFlag {
    Directory = 0b01,
    /// 空闲槽位，或被删除后留下的墓碑
    Unused = 0b10,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    #[br(map = |raw: u8| BitFlags::from_bits_truncate(raw))]
    #[bw(map = |attr: &BitFlags<EntryFlag>| attr.bits())]
    attr: BitFlags<EntryFlag>,

    /// 0
    _reserved: u8,

    first_block: u16,

    /// 文件的字节数，目录恒为0
    length: u32,

    /// Unix时间，单位为秒
    mtime: u64,

    name: [u8; NAME_CAP],
}

impl DirEntry {
    pub fn free() -> Self {
        Self {
            attr: EntryFlag::Unused.into(),
            _reserved: 0,
            first_block: 0,
            length: 0,
            mtime: 0,
            name: [0; NAME_CAP],
        }
    }

    /// `name`的长度须已检查过，超出部分会被截掉
    pub fn new(name: &str, first_block: BlockId, ty: DirEntryType, mtime: u64) -> Self {
        debug_assert!(name.len() <= NAME_MAX_LEN);

        let mut entry = Self::free();
        entry.attr = match ty {
            DirEntryType::Directory => EntryFlag::Directory.into(),
            DirEntryType::Regular => BitFlags::empty(),
        };
        entry.first_block = first_block.into();
        entry.mtime = mtime;
        entry
            .name
            .iter_mut()
            .zip(&name.as_bytes()[..name.len().min(NAME_MAX_LEN)])
            .for_each(|(b1, b2)| *b1 = *b2);

        entry
    }

    /// 创建一个指向`pid`的父目录项(..)
    pub fn parent(pid: BlockId, mtime: u64) -> Self {
        Self::new(PARENT_NAME, pid, DirEntryType::Directory, mtime)
    }

    pub fn is_free(&self) -> bool {
        self.attr.contains(EntryFlag::Unused)
    }

    pub fn is_dir(&self) -> bool {
        self.attr.contains(EntryFlag::Directory)
    }

    pub fn kind(&self) -> DirEntryType {
        if self.is_dir() {
            DirEntryType::Directory
        } else {
            DirEntryType::Regular
        }
    }

    fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == b'\0')
            .unwrap_or(NAME_CAP);
        &self.name[..len]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// 只有在用的目录项才会匹配
    pub fn matches(&self, name: &str) -> bool {
        !self.is_free() && self.name_bytes() == name.as_bytes()
    }

    pub fn first_block(&self) -> BlockId {
        BlockId::new(self.first_block)
    }

    pub const fn size(&self) -> usize {
        self.length as usize
    }

    pub fn resize(&mut self, size: usize) {
        self.length = size as u32;
    }

    pub const fn mtime(&self) -> u64 {
        self.mtime
    }

    pub fn touch(&mut self, mtime: u64) {
        self.mtime = mtime;
    }

    pub fn is_relative(&self) -> bool {
        self.name_bytes() == PARENT_NAME.as_bytes()
    }

    /// 只打上空闲标记，名称与块号原样留着，直到槽位被复用
    pub fn tombstone(&mut self) {
        self.attr |= EntryFlag::Unused;
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct DirBlock {
    #[br(map = |raw: u32| raw != 0)]
    #[bw(map = |is_dir: &bool| u32::from(*is_dir))]
    is_dir: bool,

    /// 本块第一个空闲槽位，满时为[`DIR_ENTRIES`]。
    /// 在它之前的槽位都在用。
    next_entry: u32,

    entries: [DirEntry; DIR_ENTRIES],
}

impl Default for DirBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl DirBlock {
    /// 所有槽位空闲的目录记录
    pub fn new() -> Self {
        Self {
            is_dir: true,
            next_entry: 0,
            entries: [DirEntry::free(); DIR_ENTRIES],
        }
    }

    /// 子目录的首块，0号槽位为`..`
    pub fn with_parent(parent: BlockId, mtime: u64) -> Self {
        let mut dir = Self::new();
        dir.put(0, DirEntry::parent(parent, mtime));
        dir
    }

    pub fn decode(raw: &DataBlock) -> Self {
        Self::read(&mut Cursor::new(&raw[..])).expect("a directory record fits in one block")
    }

    pub fn encode(&self) -> DataBlock {
        let mut raw = [0; BLOCK_SIZE];
        self.write(&mut Cursor::new(&mut raw[..]))
            .expect("a directory record fits in one block");
        raw
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn get(&self, nth: usize) -> &DirEntry {
        &self.entries[nth]
    }

    pub fn get_mut(&mut self, nth: usize) -> &mut DirEntry {
        &mut self.entries[nth]
    }

    /// 名称匹配的在用槽位
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.matches(name))
    }

    pub fn free_slot(&self) -> Option<usize> {
        let hint = (self.next_entry as usize).min(DIR_ENTRIES);
        (hint..DIR_ENTRIES).find(|&nth| self.entries[nth].is_free())
    }

    pub fn put(&mut self, nth: usize, entry: DirEntry) {
        self.entries[nth] = entry;
        if nth == self.next_entry as usize {
            let next = (nth + 1..DIR_ENTRIES)
                .find(|&i| self.entries[i].is_free())
                .unwrap_or(DIR_ENTRIES);
            self.next_entry = next as u32;
        }
    }

    pub fn release(&mut self, nth: usize) {
        self.entries[nth].tombstone();
        self.next_entry = self.next_entry.min(nth as u32);
    }
}
