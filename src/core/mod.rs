use std::collections::HashMap;
use std::time::SystemTime;

use crate::vfs::{Fd, Stats, WatchEvent, Watcher};

mod error;
pub mod utils;

pub use error::{FsError, FsResult};

/// Path-level filesystem operations.
///
/// Paths may be absolute or relative; relative paths are resolved against the configured root.
pub trait FsBackend {
    fn exists(&self, path: &str) -> bool;
    /// Follows one symlink hop.
    fn stat(&self, path: &str) -> FsResult<Stats>;
    fn lstat(&self, path: &str) -> FsResult<Stats>;
    fn mkdir(&mut self, path: &str, mode: Option<u32>) -> FsResult<()>;
    fn rmdir(&mut self, path: &str) -> FsResult<()>;
    fn unlink(&mut self, path: &str) -> FsResult<()>;
    fn rename(&mut self, old_path: &str, new_path: &str) -> FsResult<()>;
    fn link(&mut self, src_path: &str, dst_path: &str) -> FsResult<()>;
    fn symlink(&mut self, src_path: &str, dst_path: &str) -> FsResult<()>;
    fn readlink(&self, path: &str) -> FsResult<String>;
    fn realpath(&self, path: &str, cache: Option<&HashMap<String, String>>) -> FsResult<String>;
    fn readdir(&self, path: &str) -> FsResult<Vec<String>>;
    fn truncate(&mut self, path: &str, len: u64) -> FsResult<()>;
    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()>;
    fn lchown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()>;
    fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()>;
    fn lchmod(&mut self, path: &str, mode: u32) -> FsResult<()>;
    fn utimes(&mut self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()>;
    fn read_file(&mut self, path: &str, flags: Option<&str>) -> FsResult<Vec<u8>>;
    fn write_file(&mut self, path: &str, data: &[u8], options: WriteFileOptions) -> FsResult<()>;
    fn append_file(&mut self, path: &str, data: &[u8], options: WriteFileOptions)
    -> FsResult<()>;
    fn watch<F>(&self, path: &str, listener: F) -> FsResult<Watcher>
    where
        F: FnMut(WatchEvent, &str) + 'static;
}

/// Descriptor-level filesystem operations.
pub trait FdBackend {
    fn open(&mut self, path: &str, flags: &str, mode: Option<u32>) -> FsResult<Fd>;
    fn close(&mut self, fd: Fd) -> FsResult<()>;
    fn fstat(&self, fd: Fd) -> FsResult<Stats>;
    /// Copies `content[position..position + length]` into `buffer[offset..]`.
    fn read(
        &mut self,
        fd: Fd,
        buffer: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> FsResult<usize>;
    /// Writes `buffer[offset..offset + length]`. Without `position` the content is replaced,
    /// with it the bytes are spliced in.
    fn write(
        &mut self,
        fd: Fd,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> FsResult<usize>;
    fn ftruncate(&mut self, fd: Fd, len: u64) -> FsResult<()>;
    fn fchown(&mut self, fd: Fd, uid: u32, gid: u32) -> FsResult<()>;
    fn fchmod(&mut self, fd: Fd, mode: u32) -> FsResult<()>;
    fn futimes(&mut self, fd: Fd, atime: SystemTime, mtime: SystemTime) -> FsResult<()>;
    fn fsync(&self, fd: Fd) -> FsResult<()>;
}

/// Options of `write_file` / `append_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileOptions {
    pub mode: u32,
    pub flags: String,
}

impl Default for WriteFileOptions {
    fn default() -> Self {
        Self {
            mode: 0o666,
            flags: "w".to_string(),
        }
    }
}
