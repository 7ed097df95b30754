use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::BlockDevice;

/// 以一段连续内存充当的块设备
#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * num_blocks]),
        }
    }

    /// 由现成的字节镜像构造，末尾不足一块的部分会被丢弃
    pub fn from_bytes(block_size: usize, mut bytes: Vec<u8>) -> Self {
        let whole = bytes.len() / block_size * block_size;
        bytes.truncate(whole);
        Self {
            block_size,
            data: Mutex::new(bytes),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }

    fn range(&self, block_id: usize) -> core::ops::Range<usize> {
        let start = block_id * self.block_size;
        start..start + self.block_size
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        assert!(block_id < self.num_blocks(), "block {block_id} out of range");
        let data = self.data.lock();
        buf[..self.block_size].copy_from_slice(&data[self.range(block_id)]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        assert!(block_id < self.num_blocks(), "block {block_id} out of range");
        let range = self.range(block_id);
        self.data.lock()[range].copy_from_slice(&buf[..self.block_size]);
    }
}
