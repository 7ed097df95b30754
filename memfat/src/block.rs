//! 块的抽象
//!
//! 块在内存中一律是[`BLOCK_SIZE`]字节的数组。
//! 同一个块可以被读作数据、分配表段或目录记录，
//! 由调用方通过[`BlockKind`]指明，并经过显式的编解码。

use core::fmt;

use block_dev::BlockDevice;
use derive_more::{From, Into};

use crate::volume::dir::DirBlock;
use crate::volume::fat::FatSegment;
use crate::volume::{BLOCK_COUNT, BLOCK_SIZE};

pub type DataBlock = [u8; BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(u16);

impl BlockId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 越界的块号只可能来自损坏的链或目录项
    pub fn validate(self) -> Result<Self, vfs::Error> {
        if self.index() < BLOCK_COUNT {
            Ok(self)
        } else {
            log::warn!("Block {self} lies outside the volume");
            Err(vfs::Error::MalformedChain {
                block: self.index(),
            })
        }
    }
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.index()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Data,
    Fat,
    Dir,
}

/// 按类型解读后的块
#[derive(Debug, Clone)]
pub enum Block {
    Data(DataBlock),
    Fat(FatSegment),
    Dir(DirBlock),
}

impl Block {
    /// 全部清零；目录记录还会把每个槽位标为空闲
    pub fn init(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Data => Self::Data([0; BLOCK_SIZE]),
            BlockKind::Fat => Self::Fat(FatSegment::zeroed()),
            BlockKind::Dir => Self::Dir(DirBlock::new()),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Data(_) => BlockKind::Data,
            Self::Fat(_) => BlockKind::Fat,
            Self::Dir(_) => BlockKind::Dir,
        }
    }

    pub fn decode(kind: BlockKind, raw: &DataBlock) -> Self {
        match kind {
            BlockKind::Data => Self::Data(*raw),
            BlockKind::Fat => Self::Fat(FatSegment::decode(raw)),
            BlockKind::Dir => Self::Dir(DirBlock::decode(raw)),
        }
    }

    pub fn encode(&self) -> DataBlock {
        match self {
            Self::Data(data) => *data,
            Self::Fat(segment) => segment.encode(),
            Self::Dir(dir) => dir.encode(),
        }
    }
}

/// 整个卷的块阵列
///
/// 没有写回缓冲，写入立刻对后续读取可见。
#[derive(Clone)]
pub struct BlockStore {
    blocks: Vec<DataBlock>,
}

impl fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore {
    pub fn new() -> Self {
        Self {
            blocks: vec![[0; BLOCK_SIZE]; BLOCK_COUNT],
        }
    }

    pub fn read_block(&self, id: BlockId, kind: BlockKind) -> Result<Block, vfs::Error> {
        self.map(id, |raw| Block::decode(kind, raw))
    }

    pub fn write_block(&mut self, block: &Block, id: BlockId) -> Result<(), vfs::Error> {
        let raw = block.encode();
        log::trace!("write {:?} block {id}", block.kind());
        self.map_mut(id, |data| *data = raw)
    }

    #[inline]
    pub fn map<V>(&self, id: BlockId, f: impl FnOnce(&DataBlock) -> V) -> Result<V, vfs::Error> {
        let id = id.validate()?;
        Ok(f(&self.blocks[id.index()]))
    }

    #[inline]
    pub fn map_mut<V>(
        &mut self,
        id: BlockId,
        f: impl FnOnce(&mut DataBlock) -> V,
    ) -> Result<V, vfs::Error> {
        let id = id.validate()?;
        Ok(f(&mut self.blocks[id.index()]))
    }

    pub fn read_data(&self, id: BlockId) -> Result<DataBlock, vfs::Error> {
        self.map(id, |data| *data)
    }

    pub fn write_data(&mut self, id: BlockId, data: &DataBlock) -> Result<(), vfs::Error> {
        self.map_mut(id, |block| block.copy_from_slice(data))
    }

    pub fn read_dir(&self, id: BlockId) -> Result<DirBlock, vfs::Error> {
        self.map(id, DirBlock::decode)
    }

    pub fn write_dir(&mut self, id: BlockId, dir: &DirBlock) -> Result<(), vfs::Error> {
        self.write_block(&Block::Dir(dir.clone()), id)
    }

    #[inline]
    pub fn zeroize(&mut self, id: BlockId) -> Result<(), vfs::Error> {
        self.map_mut(id, |data| data.fill(0))
    }

    /// 原样转储到块设备，没有文件头也没有版本号
    pub fn save(&self, dev: &dyn BlockDevice) -> Result<(), vfs::Error> {
        check_geometry(dev)?;
        for (block_id, data) in self.blocks.iter().enumerate() {
            dev.write_block(block_id, data);
        }
        log::debug!("saved {BLOCK_COUNT} blocks");
        Ok(())
    }

    pub fn load(dev: &dyn BlockDevice) -> Result<Self, vfs::Error> {
        check_geometry(dev)?;
        let mut store = Self::new();
        for (block_id, data) in store.blocks.iter_mut().enumerate() {
            dev.read_block(block_id, data);
        }
        log::debug!("loaded {BLOCK_COUNT} blocks");
        Ok(store)
    }
}

fn check_geometry(dev: &dyn BlockDevice) -> Result<(), vfs::Error> {
    if dev.block_size() != BLOCK_SIZE || dev.num_blocks() < BLOCK_COUNT {
        log::error!(
            "Device geometry {}x{} can't hold the volume",
            dev.num_blocks(),
            dev.block_size()
        );
        return Err(vfs::Error::IncompatibleDevice);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    #[test]
    fn out_of_range_is_malformed() {
        let store = BlockStore::new();
        let id = BlockId::new(BLOCK_COUNT as u16);
        assert_eq!(
            Err(vfs::Error::MalformedChain { block: BLOCK_COUNT }),
            store.read_data(id)
        );
    }

    #[test]
    fn init_dir_marks_slots_free() {
        let Block::Dir(dir) = Block::init(BlockKind::Dir) else {
            panic!("expected a directory record");
        };
        assert!(dir.is_dir());
        assert!(dir.entries().iter().all(|entry| entry.is_free()));
    }

    #[test]
    fn typed_views_share_bytes() {
        let mut store = BlockStore::new();
        let id = BlockId::new(10);
        store.write_block(&Block::init(BlockKind::Dir), id).unwrap();

        let Block::Data(raw) = store.read_block(id, BlockKind::Data).unwrap() else {
            panic!("expected raw bytes");
        };
        // 头部的is_dir字段
        assert_eq!([1u8, 0, 0, 0], raw[..4]);
    }

    #[test]
    fn short_device_is_rejected() {
        let store = BlockStore::new();
        let disk = RamDisk::new(BLOCK_SIZE, BLOCK_COUNT - 1);
        assert_eq!(Err(vfs::Error::IncompatibleDevice), store.save(&disk));
        assert_eq!(
            vfs::Error::IncompatibleDevice,
            BlockStore::load(&disk).unwrap_err()
        );

        let disk = RamDisk::new(512, BLOCK_COUNT * 2);
        assert_eq!(Err(vfs::Error::IncompatibleDevice), store.save(&disk));
    }

    #[test]
    fn save_then_load() {
        let mut store = BlockStore::new();
        store.write_data(BlockId::new(7), &[0xAB; BLOCK_SIZE]).unwrap();

        let disk = RamDisk::new(BLOCK_SIZE, BLOCK_COUNT);
        store.save(&disk).unwrap();
        let loaded = BlockStore::load(&disk).unwrap();
        assert_eq!([0xAB; BLOCK_SIZE], loaded.read_data(BlockId::new(7)).unwrap());
        assert_eq!([0; BLOCK_SIZE], loaded.read_data(BlockId::new(8)).unwrap());
    }
}
