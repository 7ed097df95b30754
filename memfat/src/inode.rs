use vfs::{DirEntryType, Stat};

use crate::util;
use crate::volume::dir::{DirBlock, DirEntry};
use crate::volume::{BLOCK_SIZE, ROOT_BLOCK};
use crate::{BlockId, BlockKind, FatFileSystem};

/// 目录项会指向一个块链表，这就是此文件系统中的inode。
///
/// 为了回写长度与修改时间，[`Inode`]同时记着目录项所在的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    start: BlockId,
    pos: DirEntryPos,
    ty: DirEntryType,
}

impl Inode {
    pub const ROOT: Self = Self {
        start: ROOT_BLOCK,
        pos: DirEntryPos::ROOT,
        ty: DirEntryType::Directory,
    };

    pub fn id(&self) -> u64 {
        self.start.index() as u64
    }

    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn kind(&self) -> DirEntryType {
        self.ty
    }

    pub fn is_dir(&self) -> bool {
        self.ty == DirEntryType::Directory
    }

    pub fn is_root(&self) -> bool {
        self.start == ROOT_BLOCK
    }

    /// 目录
    ///
    /// 搜索当前目录下指定名称的项，`..`也会被找到。
    pub fn find(&self, name: &str, fs: &FatFileSystem) -> Result<Option<Self>, vfs::Error> {
        debug_assert!(self.is_dir());

        for block in fs.fat().chain(self.start)? {
            let dir = fs.store().read_dir(block)?;
            if let Some(nth) = dir.position(name) {
                let pos = DirEntryPos::new(block, nth);
                return Self::from_entry(pos, dir.get(nth)).map(Some);
            }
        }

        Ok(None)
    }

    /// 目录
    ///
    /// 父目录在其上级目录中的目录项，根目录的父目录是自身。
    pub fn parent(&self, fs: &FatFileSystem) -> Result<Self, vfs::Error> {
        debug_assert!(self.is_dir());

        if self.is_root() {
            return Ok(Self::ROOT);
        }

        let malformed = vfs::Error::MalformedChain {
            block: self.start.index(),
        };
        let parent = self.find("..", fs)?.ok_or(malformed)?;
        if parent.is_root() {
            return Ok(Self::ROOT);
        }

        let grandparent = parent.find("..", fs)?.ok_or(malformed)?;
        let grandparent = if grandparent.is_root() {
            Self::ROOT
        } else {
            grandparent
        };
        grandparent.child(parent.start, fs)?.ok_or(malformed)
    }

    /// 目录
    ///
    /// 按目录顺序列出在用的目录项，不含`..`。
    pub fn ls(&self, fs: &FatFileSystem) -> Result<Vec<vfs::DirEntry>, vfs::Error> {
        debug_assert!(self.is_dir());

        let mut buf = Vec::new();
        for block in fs.fat().chain(self.start)? {
            let dir = fs.store().read_dir(block)?;
            buf.extend(
                dir.entries()
                    .iter()
                    .filter(|entry| !entry.is_free() && !entry.is_relative())
                    .map(|entry| vfs::DirEntry {
                        inode: entry.first_block().index() as u64,
                        ty: entry.kind(),
                        name: entry.name(),
                    }),
            );
        }

        Ok(buf)
    }

    /// 目录
    pub fn is_empty_dir(&self, fs: &FatFileSystem) -> Result<bool, vfs::Error> {
        for block in fs.fat().chain(self.start)? {
            let dir = fs.store().read_dir(block)?;
            if dir
                .entries()
                .iter()
                .any(|entry| !entry.is_free() && !entry.is_relative())
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// 目录
    ///
    /// 在当前目录下创建只有一个块的空文件。
    pub fn create_file(&self, name: &str, fs: &mut FatFileSystem) -> Result<Self, vfs::Error> {
        debug_assert!(self.is_dir());

        if self.find(name, fs)?.is_some() {
            return Err(vfs::Error::AlreadyExists);
        }

        let start = fs.alloc_block(BlockKind::Data)?;
        let entry = DirEntry::new(name, start, DirEntryType::Regular, util::now());
        let pos = self.insert_or_free(entry, start, fs)?;

        Ok(Self {
            start,
            pos,
            ty: DirEntryType::Regular,
        })
    }

    /// 目录
    ///
    /// 在当前目录下创建目录。
    pub fn mkdir(&self, name: &str, fs: &mut FatFileSystem) -> Result<Self, vfs::Error> {
        debug_assert!(self.is_dir());

        if self.find(name, fs)?.is_some() {
            return Err(vfs::Error::AlreadyExists);
        }

        let mtime = util::now();
        let start = fs.alloc_block(BlockKind::Dir)?;
        fs.store_mut()
            .write_dir(start, &DirBlock::with_parent(self.start, mtime))?;
        let entry = DirEntry::new(name, start, DirEntryType::Directory, mtime);
        let pos = self.insert_or_free(entry, start, fs)?;

        Ok(Self {
            start,
            pos,
            ty: DirEntryType::Directory,
        })
    }

    /// 目录
    ///
    /// 删除文件并释放整条块链。
    pub fn unlink(&self, name: &str, fs: &mut FatFileSystem) -> Result<(), vfs::Error> {
        debug_assert!(self.is_dir());

        let inode = self.find(name, fs)?.ok_or(vfs::Error::NotFound)?;
        if inode.is_dir() {
            return Err(vfs::Error::IsADirectory);
        }

        fs.dealloc_chain(inode.start)?;
        self.release(inode.pos, fs)
    }

    /// 目录
    ///
    /// 删除空目录。
    pub fn rmdir(&self, name: &str, fs: &mut FatFileSystem) -> Result<(), vfs::Error> {
        debug_assert!(self.is_dir());

        let inode = self.find(name, fs)?.ok_or(vfs::Error::NotFound)?;
        if !inode.is_dir() {
            return Err(vfs::Error::NotADirectory);
        } else if !inode.is_empty_dir(fs)? {
            return Err(vfs::Error::DirectoryNotEmpty);
        }

        fs.dealloc_chain(inode.start)?;
        self.release(inode.pos, fs)
    }

    pub fn stat(&self, fs: &FatFileSystem) -> Result<Stat, vfs::Error> {
        let blocks = fs.fat().chain(self.start)?.len();
        let (size, mtime) = if self.is_root() {
            (0, 0)
        } else {
            self.pos.access(fs, |entry| (entry.size(), entry.mtime()))?
        };

        Ok(Stat {
            mode: self.ty,
            block_size: BLOCK_SIZE as u64,
            blocks: blocks as u64,
            size: size as u64,
            mtime,
        })
    }

    /// 目录项记录的字节数，根目录为0
    pub fn size(&self, fs: &FatFileSystem) -> Result<usize, vfs::Error> {
        if self.is_root() {
            return Ok(0);
        }
        self.pos.access(fs, DirEntry::size)
    }

    /// 修改目录项并写回，根目录没有目录项
    pub fn update<F>(&self, fs: &mut FatFileSystem, f: F) -> Result<(), vfs::Error>
    where
        F: FnOnce(&mut DirEntry),
    {
        if self.is_root() {
            return Ok(());
        }
        self.pos.access_mut(fs, f)
    }
}

impl Inode {
    fn from_entry(pos: DirEntryPos, entry: &DirEntry) -> Result<Self, vfs::Error> {
        Ok(Self {
            start: entry.first_block().validate()?,
            pos,
            ty: entry.kind(),
        })
    }

    /// 首块为`start`的子目录
    fn child(&self, start: BlockId, fs: &FatFileSystem) -> Result<Option<Self>, vfs::Error> {
        for block in fs.fat().chain(self.start)? {
            let dir = fs.store().read_dir(block)?;
            let found = dir.entries().iter().position(|entry| {
                !entry.is_free()
                    && !entry.is_relative()
                    && entry.is_dir()
                    && entry.first_block() == start
            });
            if let Some(nth) = found {
                let pos = DirEntryPos::new(block, nth);
                return Self::from_entry(pos, dir.get(nth)).map(Some);
            }
        }

        Ok(None)
    }

    /// 插入失败时，把刚为`start`分配的链还回去
    fn insert_or_free(
        &self,
        entry: DirEntry,
        start: BlockId,
        fs: &mut FatFileSystem,
    ) -> Result<DirEntryPos, vfs::Error> {
        match self.insert(entry, fs) {
            Ok(pos) => Ok(pos),
            Err(err) => {
                fs.dealloc_chain(start)?;
                Err(err)
            }
        }
    }

    /// 目录
    ///
    /// 依次在链上每个块里找空闲槽位，都满了才延长目录链。
    fn insert(&self, entry: DirEntry, fs: &mut FatFileSystem) -> Result<DirEntryPos, vfs::Error> {
        let chain = fs.fat().chain(self.start)?;
        for &block in &chain {
            let mut dir = fs.store().read_dir(block)?;
            if let Some(nth) = dir.free_slot() {
                dir.put(nth, entry);
                fs.store_mut().write_dir(block, &dir)?;
                log::debug!("Inserted {:?} at ({block}, {nth})", entry.name());
                return Ok(DirEntryPos::new(block, nth));
            }
        }

        let tail = *chain.last().expect("a chain holds at least its head");
        let block = fs.extend_chain(tail, BlockKind::Dir)?;
        let mut dir = DirBlock::new();
        dir.put(0, entry);
        fs.store_mut().write_dir(block, &dir)?;
        log::debug!("Directory {} overflowed into {block}", self.start);

        Ok(DirEntryPos::new(block, 0))
    }

    /// 目录
    ///
    /// 把目录项标为墓碑，块链已由调用方释放。
    fn release(&self, pos: DirEntryPos, fs: &mut FatFileSystem) -> Result<(), vfs::Error> {
        let mut dir = fs.store().read_dir(pos.block)?;
        dir.release(pos.nth);
        fs.store_mut().write_dir(pos.block, &dir)?;
        log::debug!("Released ({}, {})", pos.block, pos.nth);

        Ok(())
    }
}

/// 目录项在目录链上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirEntryPos {
    block: BlockId,
    nth: usize,
}

impl DirEntryPos {
    /// 根目录性质特殊，目录项位置无关紧要，占个位就行。
    const ROOT: Self = DirEntryPos::new(ROOT_BLOCK, 0);

    const fn new(block: BlockId, nth: usize) -> Self {
        Self { block, nth }
    }

    fn access<F, R>(&self, fs: &FatFileSystem, f: F) -> Result<R, vfs::Error>
    where
        F: FnOnce(&DirEntry) -> R,
    {
        let dir = fs.store().read_dir(self.block)?;
        Ok(f(dir.get(self.nth)))
    }

    fn access_mut<F, R>(&self, fs: &mut FatFileSystem, f: F) -> Result<R, vfs::Error>
    where
        F: FnOnce(&mut DirEntry) -> R,
    {
        let mut dir = fs.store().read_dir(self.block)?;
        let ret = f(dir.get_mut(self.nth));
        fs.store_mut().write_dir(self.block, &dir)?;
        Ok(ret)
    }
}
