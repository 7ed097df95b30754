//! 分配表区：每个块对应一条表项，表项串起文件与目录的块链。

use core::mem;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};

use crate::volume::{BLOCK_COUNT, BLOCK_SIZE, FAT_BLOCKS, FAT_ENTRIES_PER_BLOCK, FAT_START};
use crate::volume::{LABEL_BLOCK, ROOT_BLOCK};
use crate::{Block, BlockId, BlockStore, ChainError, DataBlock, FatEntry};

/// 分配表的一个块
#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct FatSegment {
    entries: [FatEntry; FAT_ENTRIES_PER_BLOCK],
}

impl FatSegment {
    /// 全零，即全部为[`FatEntry::EOC`]
    pub fn zeroed() -> Self {
        Self {
            entries: [FatEntry::EOC; FAT_ENTRIES_PER_BLOCK],
        }
    }

    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    pub fn decode(raw: &DataBlock) -> Self {
        Self::read(&mut Cursor::new(&raw[..])).expect("a FAT segment spans exactly one block")
    }

    pub fn encode(&self) -> DataBlock {
        let mut raw = [0; BLOCK_SIZE];
        self.write(&mut Cursor::new(&mut raw[..]))
            .expect("a FAT segment spans exactly one block");
        raw
    }
}

/// 内存中的分配表，每次修改后由调用方[`FatArea::persist`]回保留区
#[derive(Debug, Clone)]
pub struct FatArea {
    entries: Vec<FatEntry>,
}

impl Default for FatArea {
    fn default() -> Self {
        Self::new()
    }
}

impl FatArea {
    /// 新卷的分配表：卷标、分配表自身与根目录均已占用
    pub fn new() -> Self {
        let mut entries = vec![FatEntry::FREE; BLOCK_COUNT];
        entries[LABEL_BLOCK.index()] = FatEntry::EOC;

        // 分配表区自成一条链
        let fat_end = FAT_START.index() + FAT_BLOCKS;
        for i in FAT_START.index()..fat_end - 1 {
            entries[i] = BlockId::new(i as u16 + 1).into();
        }
        entries[fat_end - 1] = FatEntry::EOC;

        entries[ROOT_BLOCK.index()] = FatEntry::EOC;

        Self { entries }
    }

    pub fn load(store: &BlockStore) -> Result<Self, vfs::Error> {
        let mut entries = Vec::with_capacity(FAT_BLOCKS * FAT_ENTRIES_PER_BLOCK);
        for i in 0..FAT_BLOCKS {
            let id = BlockId::new(FAT_START.index() as u16 + i as u16);
            let segment = store.map(id, FatSegment::decode)?;
            entries.extend_from_slice(segment.entries());
        }
        entries.truncate(BLOCK_COUNT);

        Ok(Self { entries })
    }

    /// 把整张表写回保留区
    pub fn persist(&self, store: &mut BlockStore) -> Result<(), vfs::Error> {
        for (i, chunk) in self.entries.chunks(FAT_ENTRIES_PER_BLOCK).enumerate() {
            let mut segment = FatSegment::zeroed();
            segment.entries[..chunk.len()].copy_from_slice(chunk);

            let id = BlockId::new(FAT_START.index() as u16 + i as u16);
            store.write_block(&Block::Fat(segment), id)?;
        }
        log::trace!("FAT persisted, {} blocks free", self.free_count());

        Ok(())
    }

    pub fn get(&self, id: BlockId) -> Result<FatEntry, vfs::Error> {
        let id = id.validate()?;
        Ok(self.entries[id.index()])
    }

    /// 获取下一个块编号。
    /// 若`id`指向未分配块，则报错。
    /// `Ok(None)`表示`id`为链表上最后一个块。
    pub fn next(&self, id: BlockId) -> Result<Option<BlockId>, vfs::Error> {
        match self.get(id)?.validate() {
            Ok(next) => next.validate().map(Some),
            Err(ChainError::Eoc) => Ok(None),
            Err(ChainError::Free) => {
                log::warn!("Chain runs into free block {id}");
                Err(vfs::Error::MalformedChain { block: id.index() })
            }
        }
    }

    /// 按编号从小到大寻找空闲块，标为链尾后返回。
    pub fn alloc(&mut self) -> Result<BlockId, vfs::Error> {
        let index = self
            .entries
            .iter()
            .position(|&entry| entry == FatEntry::FREE)
            .ok_or(vfs::Error::OutOfSpace)?;
        self.entries[index] = FatEntry::EOC;

        Ok(BlockId::new(index as u16))
    }

    /// 把`next`接在链尾`tail`之后
    pub fn couple(&mut self, tail: BlockId, next: BlockId) -> Result<(), vfs::Error> {
        let (tail, next) = (tail.validate()?, next.validate()?);
        self.entries[tail.index()] = next.into();
        self.entries[next.index()] = FatEntry::EOC;
        Ok(())
    }

    /// 从`head`出发的整条链。
    ///
    /// 走过的块数不会超过[`BLOCK_COUNT`]，重复访问即视为成环。
    pub fn chain(&self, head: BlockId) -> Result<Vec<BlockId>, vfs::Error> {
        let mut visited = vec![false; BLOCK_COUNT];
        let mut chain = Vec::new();
        let mut current = Some(head);

        while let Some(id) = current {
            let id = id.validate()?;
            if mem::replace(&mut visited[id.index()], true) {
                log::warn!("Chain from {head} loops back to {id}");
                return Err(vfs::Error::MalformedChain { block: id.index() });
            }
            chain.push(id);
            current = self.next(id)?;
        }

        Ok(chain)
    }

    pub fn last(&self, head: BlockId) -> Result<BlockId, vfs::Error> {
        let chain = self.chain(head)?;
        Ok(*chain.last().expect("a chain holds at least its head"))
    }

    /// 移除整个块链表，返回释放的块数。
    ///
    /// 先完整校验，损坏的链不会被释放一半。
    pub fn dealloc(&mut self, head: BlockId) -> Result<usize, vfs::Error> {
        let chain = self.chain(head)?;
        for id in &chain {
            self.entries[id.index()] = FatEntry::FREE;
        }
        Ok(chain.len())
    }

    /// 只保留链首，返回释放的块数
    pub fn truncate(&mut self, head: BlockId) -> Result<usize, vfs::Error> {
        let chain = self.chain(head)?;
        for id in &chain[1..] {
            self.entries[id.index()] = FatEntry::FREE;
        }
        self.entries[head.index()] = FatEntry::EOC;
        Ok(chain.len() - 1)
    }

    pub fn free_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|&&entry| entry == FatEntry::FREE)
            .count()
    }
}
