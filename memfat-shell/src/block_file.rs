use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::BlockDevice;
use memfat::volume::BLOCK_SIZE;
use send_wrapper::SendWrapper;

/// 以宿主机文件充当的块设备，块大小与卷一致
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    num_blocks: usize,
}

impl BlockFile {
    /// 文件末尾不足一块的部分不可访问
    pub fn new(fd: File) -> io::Result<Self> {
        let num_blocks = fd.metadata()?.len() as usize / BLOCK_SIZE;
        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            num_blocks,
        })
    }
}

impl BlockDevice for BlockFile {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64)).expect("seeking error");
        file.read_exact(&mut buf[..BLOCK_SIZE]).expect("not a complete block!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64)).expect("seeking error");
        file.write_all(&buf[..BLOCK_SIZE]).expect("not a complete block!");
    }
}
