use binrw::binrw;

use crate::BlockId;

/// 分配表表项：空闲、链尾，或者后继块的编号
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FatEntry(u16);

#[derive(Debug, PartialEq, Eq)]
pub enum ChainError {
    Free,
    Eoc,
}

impl From<BlockId> for FatEntry {
    fn from(id: BlockId) -> Self {
        Self(id.into())
    }
}

impl FatEntry {
    /// 未分配
    pub const FREE: Self = Self(0xFFFF);

    /// 链上最后一个块。0号块是卷标，永远不会成为后继，故可复用0。
    pub const EOC: Self = Self(0);

    /// 取出后继块编号
    pub fn validate(self) -> Result<BlockId, ChainError> {
        match self {
            Self::FREE => Err(ChainError::Free),
            Self::EOC => Err(ChainError::Eoc),
            Self(raw) => Ok(BlockId::new(raw)),
        }
    }
}
