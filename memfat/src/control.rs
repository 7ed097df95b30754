use std::sync::Arc;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::inode::Inode;
use crate::volume::dir::DirBlock;
use crate::volume::fat::FatArea;
use crate::volume::reserved::VolumeLabel;
use crate::volume::{BLOCK_COUNT, ROOT_BLOCK};
use crate::{Block, BlockId, BlockKind, BlockStore};

/// 一个完整的卷：块阵列、分配表与当前目录。
///
/// 分配表在内存中另有一份，每次改动后立即写回保留区，
/// 所以[`BlockStore`]始终是完整的磁盘映像。
#[derive(Debug, Clone)]
pub struct FatFileSystem {
    store: BlockStore,
    fat: FatArea,
    cwd: Inode,
}

impl FatFileSystem {
    /// 格式化一个全新的卷
    pub fn format(label: &str) -> Result<Self, vfs::Error> {
        let label = VolumeLabel::new(label)?;

        let mut store = BlockStore::new();
        let fat = FatArea::new();
        label.write(&mut store)?;
        fat.persist(&mut store)?;
        store.write_dir(ROOT_BLOCK, &DirBlock::new())?;
        log::debug!("Formatted volume {:?}", label.as_str());

        Ok(Self {
            store,
            fat,
            cwd: Inode::ROOT,
        })
    }

    /// 从块设备读入整个卷，当前目录回到根目录
    pub fn load(dev: &dyn BlockDevice) -> Result<Self, vfs::Error> {
        let store = BlockStore::load(dev)?;
        if !store.read_dir(ROOT_BLOCK)?.is_dir() {
            log::error!("Root block {ROOT_BLOCK} holds no directory record");
            return Err(vfs::Error::NotFormatted);
        }

        let fat = FatArea::load(&store)?;
        if fat.next(ROOT_BLOCK).is_err() {
            log::error!("Root block {ROOT_BLOCK} is marked free");
            return Err(vfs::Error::NotFormatted);
        }

        Ok(Self {
            store,
            fat,
            cwd: Inode::ROOT,
        })
    }

    pub fn save(&self, dev: &dyn BlockDevice) -> Result<(), vfs::Error> {
        self.store.save(dev)
    }

    pub fn label(&self) -> Result<String, vfs::Error> {
        VolumeLabel::read(&self.store).map(|label| label.as_str().to_owned())
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn fat(&self) -> &FatArea {
        &self.fat
    }

    pub fn free_blocks(&self) -> usize {
        self.fat.free_count()
    }

    /// 卷本身不带锁，需要跨线程共享时由调用方包一层
    pub fn into_shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// 检查整棵目录树的块链。
    ///
    /// 每个块至多属于一条链，保留区不属于任何链。
    /// 返回已占用的块数（含保留区），无泄漏时与[`Self::free_blocks`]之和为[`BLOCK_COUNT`]。
    pub fn verify(&self) -> Result<usize, vfs::Error> {
        let mut claimed = vec![false; BLOCK_COUNT];
        claimed[..ROOT_BLOCK.index()].fill(true);

        let mut claim = |head: BlockId| -> Result<Vec<BlockId>, vfs::Error> {
            let chain = self.fat.chain(head)?;
            for id in &chain {
                if claimed[id.index()] {
                    log::warn!("Block {id} is shared by two chains");
                    return Err(vfs::Error::MalformedChain { block: id.index() });
                }
                claimed[id.index()] = true;
            }
            Ok(chain)
        };

        let mut dirs = vec![claim(ROOT_BLOCK)?];
        while let Some(chain) = dirs.pop() {
            for block in chain {
                let dir = self.store.read_dir(block)?;
                for entry in dir.entries() {
                    if entry.is_free() || entry.is_relative() {
                        continue;
                    }
                    let chain = claim(entry.first_block())?;
                    if entry.is_dir() {
                        dirs.push(chain);
                    }
                }
            }
        }

        let used = claimed.iter().filter(|&&used| used).count();
        log::debug!("Verified {used} blocks in use");
        Ok(used)
    }
}

impl FatFileSystem {
    pub(crate) fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    pub(crate) fn cwd(&self) -> Inode {
        self.cwd
    }

    pub(crate) fn set_cwd(&mut self, cwd: Inode) {
        self.cwd = cwd;
    }

    /// 分配一个块并按类型初始化
    pub(crate) fn alloc_block(&mut self, kind: BlockKind) -> Result<BlockId, vfs::Error> {
        let id = self.fat.alloc()?;
        self.store.write_block(&Block::init(kind), id)?;
        self.fat.persist(&mut self.store)?;
        log::debug!("Allocated {kind:?} block {id}");

        Ok(id)
    }

    /// 分配一个块并接到链尾`tail`之后
    pub(crate) fn extend_chain(
        &mut self,
        tail: BlockId,
        kind: BlockKind,
    ) -> Result<BlockId, vfs::Error> {
        let id = self.fat.alloc()?;
        self.fat.couple(tail, id)?;
        self.store.write_block(&Block::init(kind), id)?;
        self.fat.persist(&mut self.store)?;
        log::debug!("Extended chain {tail} -> {id}");

        Ok(id)
    }

    pub(crate) fn dealloc_chain(&mut self, head: BlockId) -> Result<usize, vfs::Error> {
        let freed = self.fat.dealloc(head)?;
        self.fat.persist(&mut self.store)?;
        log::debug!("Freed {freed} blocks from {head}");

        Ok(freed)
    }

    /// 只留下清零的链首
    pub(crate) fn truncate_chain(&mut self, head: BlockId) -> Result<usize, vfs::Error> {
        let freed = self.fat.truncate(head)?;
        self.store.zeroize(head)?;
        self.fat.persist(&mut self.store)?;
        log::debug!("Truncated chain {head}, {freed} blocks freed");

        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;
    use crate::volume::BLOCK_SIZE;

    #[test]
    fn fresh_volume() {
        let fs = FatFileSystem::format("vol").unwrap();
        assert_eq!("vol", fs.label().unwrap());
        assert_eq!(BLOCK_COUNT - 4, fs.free_blocks());
        assert_eq!(Ok(4), fs.verify());
    }

    #[test]
    fn chain_helpers_persist_fat() {
        let mut fs = FatFileSystem::format("vol").unwrap();
        let head = fs.alloc_block(BlockKind::Data).unwrap();
        let next = fs.extend_chain(head, BlockKind::Data).unwrap();

        // 保留区里的分配表与内存中的一致
        let on_disk = FatArea::load(fs.store()).unwrap();
        assert_eq!(Ok(vec![head, next]), on_disk.chain(head));

        assert_eq!(Ok(1), fs.truncate_chain(head));
        assert_eq!(Ok(1), fs.dealloc_chain(head));
        assert_eq!(BLOCK_COUNT - 4, FatArea::load(fs.store()).unwrap().free_count());
    }

    #[test]
    fn blank_device_is_not_formatted() {
        let disk = RamDisk::new(BLOCK_SIZE, BLOCK_COUNT);
        assert_eq!(
            vfs::Error::NotFormatted,
            FatFileSystem::load(&disk).unwrap_err()
        );
    }

    #[test]
    fn shared_volume() {
        let fs = FatFileSystem::format("vol").unwrap().into_shared();
        let free = fs.lock().free_blocks();
        assert_eq!(BLOCK_COUNT - 4, free);
    }
}
