use thiserror::Error;

/// 文件系统操作的统一错误
///
/// 查找失败与容量耗尽属于可恢复的结果，不会破坏已有状态；
/// [`Error::MalformedChain`] 表示磁盘结构已损坏，操作会被中止。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("path is too long")]
    PathTooLong,
    #[error("name is too long")]
    NameTooLong,
    /// 名称中含有`\0`
    #[error("invalid name")]
    InvalidName,
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("no free block left on the volume")]
    OutOfSpace,
    /// 向只读打开的文件写入
    #[error("write rejected: file is open for reading")]
    WriteRejected,
    /// 分配表链指向空闲块、越界或成环
    #[error("malformed block chain at block {block}")]
    MalformedChain { block: usize },
    #[error("is a directory")]
    IsADirectory,
    #[error("not a directory")]
    NotADirectory,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("resource busy")]
    Busy,
    #[error("invalid open mode")]
    InvalidMode,
    /// 块设备的块大小或块数与卷不匹配
    #[error("block device is incompatible with the volume geometry")]
    IncompatibleDevice,
    #[error("volume is not formatted")]
    NotFormatted,
}
