//! 打开的文件：块链上的字节游标。

use core::fmt;
use core::str::FromStr;

use crate::inode::Inode;
use crate::volume::BLOCK_SIZE;
use crate::{BlockId, BlockKind, DataBlock, FatFileSystem, util};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// 打开即截断
    Write,
    /// 游标从文件末尾开始
    Append,
}

impl OpenMode {
    pub fn writable(self) -> bool {
        self != Self::Read
    }
}

impl FromStr for OpenMode {
    type Err = vfs::Error;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Append),
            _ => Err(vfs::Error::InvalidMode),
        }
    }
}

/// 同一个文件同时只应有一个[`FatFile`]。
///
/// 每写一个字节，当前块都会立刻写回块阵列，
/// 文件变长时目录项的长度与修改时间也一并更新。
pub struct FatFile {
    inode: Inode,
    mode: OpenMode,
    /// 游标所在的块
    block: BlockId,
    /// 块内偏移，等于[`BLOCK_SIZE`]时表示停在块尾
    offset: usize,
    /// 相对文件开头的偏移
    pos: usize,
    size: usize,
    /// 当前块的副本
    buffer: Box<DataBlock>,
}

impl fmt::Debug for FatFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatFile")
            .field("inode", &self.inode)
            .field("mode", &self.mode)
            .field("block", &self.block)
            .field("offset", &self.offset)
            .field("pos", &self.pos)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl FatFile {
    pub fn open(inode: Inode, mode: OpenMode, fs: &mut FatFileSystem) -> Result<Self, vfs::Error> {
        if inode.is_dir() {
            return Err(vfs::Error::IsADirectory);
        }

        if mode == OpenMode::Write {
            fs.truncate_chain(inode.start())?;
            let mtime = util::now();
            inode.update(fs, |entry| {
                entry.resize(0);
                entry.touch(mtime);
            })?;
        }

        let size = inode.size(fs)?;
        let start = inode.start();
        let mut file = Self {
            inode,
            mode,
            block: start,
            offset: 0,
            pos: 0,
            size,
            buffer: Box::new(fs.store().read_data(start)?),
        };
        if mode == OpenMode::Append {
            file.seek_end(fs)?;
        }
        log::debug!("Opened {:?} file at {start}, {size} bytes", mode);

        Ok(file)
    }

    /// 读出下一个字节，到达文件末尾时为`None`
    pub fn get_byte(&mut self, fs: &FatFileSystem) -> Result<Option<u8>, vfs::Error> {
        if self.pos >= self.size {
            return Ok(None);
        }

        if self.offset == BLOCK_SIZE {
            let Some(next) = fs.fat().next(self.block)? else {
                log::warn!("File at {} is shorter than its length", self.inode.start());
                return Ok(None);
            };
            self.load(next, fs)?;
        }

        let byte = self.buffer[self.offset];
        self.offset += 1;
        self.pos += 1;

        Ok(Some(byte))
    }

    /// 在块尾写入时，沿链进入下一块，没有则分配并接到链尾
    pub fn put_byte(&mut self, byte: u8, fs: &mut FatFileSystem) -> Result<(), vfs::Error> {
        if !self.mode.writable() {
            return Err(vfs::Error::WriteRejected);
        }

        if self.offset == BLOCK_SIZE {
            match fs.fat().next(self.block)? {
                Some(next) => self.load(next, fs)?,
                None => {
                    let next = fs.extend_chain(self.block, BlockKind::Data)?;
                    self.block = next;
                    self.offset = 0;
                    self.buffer.fill(0);
                }
            }
        }

        self.buffer[self.offset] = byte;
        self.offset += 1;
        self.pos += 1;
        fs.store_mut().write_data(self.block, &self.buffer)?;

        if self.pos > self.size {
            self.size = self.pos;
            let (size, mtime) = (self.size, util::now());
            self.inode.update(fs, |entry| {
                entry.resize(size);
                entry.touch(mtime);
            })?;
        }

        Ok(())
    }

    /// 返回读到的字节数，少于`buf.len()`说明到了文件末尾
    pub fn read(&mut self, buf: &mut [u8], fs: &FatFileSystem) -> Result<usize, vfs::Error> {
        for (read, slot) in buf.iter_mut().enumerate() {
            match self.get_byte(fs)? {
                Some(byte) => *slot = byte,
                None => return Ok(read),
            }
        }
        Ok(buf.len())
    }

    pub fn write(&mut self, buf: &[u8], fs: &mut FatFileSystem) -> Result<usize, vfs::Error> {
        for &byte in buf {
            self.put_byte(byte, fs)?;
        }
        Ok(buf.len())
    }

    /// 写入在[`Self::put_byte`]时已落盘，这里只是消耗掉游标
    pub fn close(self) {
        log::debug!("Closed file at {}, {} bytes", self.inode.start(), self.size);
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl FatFile {
    fn load(&mut self, block: BlockId, fs: &FatFileSystem) -> Result<(), vfs::Error> {
        *self.buffer = fs.store().read_data(block)?;
        self.block = block;
        self.offset = 0;
        Ok(())
    }

    /// 把游标移到记录的长度处。
    /// 长度恰为整块时停在最后一块的块尾，下次写入再延长链。
    fn seek_end(&mut self, fs: &FatFileSystem) -> Result<(), vfs::Error> {
        if self.size == 0 {
            return Ok(());
        }

        let chain = fs.fat().chain(self.inode.start())?;
        let nth = (self.size - 1) / BLOCK_SIZE;
        let Some(&block) = chain.get(nth) else {
            let last = chain.last().copied().unwrap_or(self.block);
            log::warn!("File at {} is longer than its chain", self.inode.start());
            return Err(vfs::Error::MalformedChain {
                block: last.index(),
            });
        };

        self.load(block, fs)?;
        self.offset = self.size - nth * BLOCK_SIZE;
        self.pos = self.size;
        Ok(())
    }
}
