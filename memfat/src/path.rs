//! 路径解析
//!
//! 以`/`开头的是绝对路径，从根目录出发，否则从当前目录出发。
//! 解析过程只用局部游标，当前目录不会被改动。

use crate::inode::Inode;
use crate::volume::{MAX_PATH_LEN, NAME_MAX_LEN};
use crate::FatFileSystem;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<'a> {
    absolute: bool,
    /// 非空的路径段，`.`与`..`原样保留
    components: Vec<&'a str>,
}

impl<'a> Path<'a> {
    pub fn parse(path: &'a str) -> Result<Self, vfs::Error> {
        if path.len() > MAX_PATH_LEN {
            log::warn!("Path of {} bytes exceeds {MAX_PATH_LEN}", path.len());
            return Err(vfs::Error::PathTooLong);
        }

        let components: Vec<_> = path
            .split(SEPARATOR)
            .filter(|cmp| !cmp.is_empty())
            .collect();
        if components.iter().any(|cmp| cmp.len() > NAME_MAX_LEN) {
            return Err(vfs::Error::NameTooLong);
        }
        // 目录项的名称以`\0`结尾
        if components.iter().any(|cmp| cmp.contains('\0')) {
            return Err(vfs::Error::InvalidName);
        }

        Ok(Self {
            absolute: path.starts_with(SEPARATOR),
            components,
        })
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn components(&self) -> &[&'a str] {
        &self.components
    }

    /// 目标名称与其所在目录的路径段，路径指向起点本身时为`None`
    pub fn split_last(&self) -> Option<(&'a str, &[&'a str])> {
        self.components
            .split_last()
            .map(|(last, parents)| (*last, parents))
    }
}

impl FatFileSystem {
    pub(crate) fn origin(&self, path: &Path) -> Inode {
        if path.is_absolute() {
            Inode::ROOT
        } else {
            self.cwd()
        }
    }

    /// 走一步：`.`停在原地，`..`回到父目录，根目录的父目录是自身
    pub(crate) fn step(&self, dir: Inode, name: &str) -> Result<Option<Inode>, vfs::Error> {
        match name {
            "." => Ok(Some(dir)),
            ".." => dir.parent(self).map(Some),
            _ => dir.find(name, self),
        }
    }

    /// 查找模式：每一段都必须存在且为目录
    pub(crate) fn lookup_dir(&self, from: Inode, components: &[&str]) -> Result<Inode, vfs::Error> {
        let mut dir = from;
        for &name in components {
            let next = self.step(dir, name)?.ok_or(vfs::Error::NotFound)?;
            if !next.is_dir() {
                log::error!("Middle segment {name:?} isn't a directory");
                return Err(vfs::Error::NotADirectory);
            }
            dir = next;
        }
        Ok(dir)
    }

    /// 创建模式：缺失的目录逐级创建
    pub(crate) fn create_dir_all(
        &mut self,
        from: Inode,
        components: &[&str],
    ) -> Result<Inode, vfs::Error> {
        let mut dir = from;
        for &name in components {
            dir = match self.step(dir, name)? {
                Some(next) if next.is_dir() => next,
                Some(_) => {
                    log::error!("Middle segment {name:?} isn't a directory");
                    return Err(vfs::Error::NotADirectory);
                }
                None => dir.mkdir(name, self)?,
            };
        }
        Ok(dir)
    }

    /// 查找路径所指的文件或目录
    pub(crate) fn lookup(&self, path: &Path) -> Result<Inode, vfs::Error> {
        let origin = self.origin(path);
        match path.split_last() {
            None => Ok(origin),
            Some((name, parents)) => {
                let dir = self.lookup_dir(origin, parents)?;
                self.step(dir, name)?.ok_or(vfs::Error::NotFound)
            }
        }
    }
}
