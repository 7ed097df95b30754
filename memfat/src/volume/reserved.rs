//! 保留区：0号块存放卷标。

use crate::volume::{LABEL_BLOCK, NAME_MAX_LEN};
use crate::BlockStore;

/// 以`\0`结尾的UTF-8字符串，格式化时写入一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLabel(String);

impl VolumeLabel {
    pub fn new(label: &str) -> Result<Self, vfs::Error> {
        if label.len() > NAME_MAX_LEN {
            return Err(vfs::Error::NameTooLong);
        }
        Ok(Self(label.to_owned()))
    }

    pub fn read(store: &BlockStore) -> Result<Self, vfs::Error> {
        store.map(LABEL_BLOCK, |data| {
            let len = data[..NAME_MAX_LEN]
                .iter()
                .position(|&b| b == b'\0')
                .unwrap_or(NAME_MAX_LEN);
            Self(String::from_utf8_lossy(&data[..len]).into_owned())
        })
    }

    pub fn write(&self, store: &mut BlockStore) -> Result<(), vfs::Error> {
        store.map_mut(LABEL_BLOCK, |data| {
            data.fill(0);
            data[..self.0.len()].copy_from_slice(self.0.as_bytes());
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
