//! 面向路径的文件与目录操作

use vfs::Stat;

use crate::file::{FatFile, OpenMode};
use crate::path::Path;
use crate::volume::BLOCK_COUNT;
use crate::FatFileSystem;

/// 不能被删除的路径段
fn is_relative(name: &str) -> bool {
    matches!(name, "." | "..")
}

impl FatFileSystem {
    /// 读模式要求文件已存在；写与追加模式会创建缺失的目录和文件
    pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<FatFile, vfs::Error> {
        let path = Path::parse(path)?;
        let origin = self.origin(&path);
        let Some((name, parents)) = path.split_last() else {
            return Err(vfs::Error::IsADirectory);
        };

        let inode = if mode.writable() {
            let dir = self.create_dir_all(origin, parents)?;
            match self.step(dir, name)? {
                Some(inode) => inode,
                None => dir.create_file(name, self)?,
            }
        } else {
            let dir = self.lookup_dir(origin, parents)?;
            self.step(dir, name)?.ok_or(vfs::Error::NotFound)?
        };

        FatFile::open(inode, mode, self)
    }

    /// 逐级创建目录，已存在的目录不算错误
    pub fn mkdir(&mut self, path: &str) -> Result<(), vfs::Error> {
        let path = Path::parse(path)?;
        let origin = self.origin(&path);
        let Some((name, parents)) = path.split_last() else {
            return Ok(());
        };

        let dir = self.create_dir_all(origin, parents)?;
        match self.step(dir, name)? {
            Some(inode) if inode.is_dir() => Ok(()),
            Some(_) => Err(vfs::Error::AlreadyExists),
            None => dir.mkdir(name, self).map(|_| ()),
        }
    }

    /// 删除空目录。根目录与当前目录不能删除。
    pub fn rmdir(&mut self, path: &str) -> Result<(), vfs::Error> {
        let path = Path::parse(path)?;
        let origin = self.origin(&path);
        let Some((name, parents)) = path.split_last() else {
            return Err(vfs::Error::Busy);
        };
        if is_relative(name) {
            return Err(vfs::Error::Busy);
        }

        let dir = self.lookup_dir(origin, parents)?;
        let target = self.step(dir, name)?.ok_or(vfs::Error::NotFound)?;
        if target.is_dir() && target.start() == self.cwd().start() {
            log::error!("Can't remove the current directory");
            return Err(vfs::Error::Busy);
        }

        dir.rmdir(name, self)
    }

    pub fn chdir(&mut self, path: &str) -> Result<(), vfs::Error> {
        let path = Path::parse(path)?;
        let inode = self.lookup(&path)?;
        if !inode.is_dir() {
            return Err(vfs::Error::NotADirectory);
        }

        log::debug!("cwd -> {}", inode.start());
        self.set_cwd(inode);
        Ok(())
    }

    /// 目录中在用项的名称，按目录顺序排列
    pub fn listdir(&self, path: &str) -> Result<Vec<String>, vfs::Error> {
        let entries = self.read_dir(path)?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<vfs::DirEntry>, vfs::Error> {
        let path = Path::parse(path)?;
        let inode = self.lookup(&path)?;
        if !inode.is_dir() {
            return Err(vfs::Error::NotADirectory);
        }

        inode.ls(self)
    }

    /// 删除文件并回收整条块链
    pub fn remove(&mut self, path: &str) -> Result<(), vfs::Error> {
        let path = Path::parse(path)?;
        let origin = self.origin(&path);
        let Some((name, parents)) = path.split_last() else {
            return Err(vfs::Error::IsADirectory);
        };
        if is_relative(name) {
            return Err(vfs::Error::IsADirectory);
        }

        let dir = self.lookup_dir(origin, parents)?;
        dir.unlink(name, self)
    }

    pub fn stat(&self, path: &str) -> Result<Stat, vfs::Error> {
        let path = Path::parse(path)?;
        self.lookup(&path)?.stat(self)
    }

    /// 沿`..`逐级回溯，拼出当前目录的绝对路径
    pub fn pwd(&self) -> Result<String, vfs::Error> {
        let mut names = Vec::new();
        let mut dir = self.cwd();

        while !dir.is_root() {
            if names.len() >= BLOCK_COUNT {
                return Err(vfs::Error::MalformedChain {
                    block: dir.start().index(),
                });
            }

            let malformed = vfs::Error::MalformedChain {
                block: dir.start().index(),
            };
            let parent = dir.parent(self)?;
            let name = parent
                .ls(self)?
                .into_iter()
                .find(|entry| entry.inode == dir.id() && entry.ty == vfs::DirEntryType::Directory)
                .ok_or(malformed)?
                .name;

            names.push(name);
            dir = parent;
        }

        if names.is_empty() {
            return Ok(String::from("/"));
        }
        Ok(names.iter().rev().fold(String::new(), |path, name| path + "/" + name))
    }
}
