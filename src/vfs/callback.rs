//! Callback calling convention.
//!
//! Every method runs the direct operation and hands its result to `done` before returning. No
//! error escapes: failures arrive as the `Err` side of the result.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::core::{FdBackend, FsBackend, FsResult, WriteFileOptions};
use crate::vfs::{Fd, MockFs, Stats, WatchEvent, Watcher};

/// Borrowed view of a [`MockFs`] exposing completion-callback variants of its operations.
///
/// ```
/// use mockfs::{FsOptions, MockFs, TreeContent};
///
/// let mut fs = MockFs::new([("/a.txt", TreeContent::file("x"))], FsOptions::posix()).unwrap();
/// fs.callback().stat("/a.txt", |result| assert!(result.unwrap().is_file()));
/// fs.callback().stat("/missing", |result| assert!(result.is_err()));
/// ```
pub struct Callbacks<'a> {
    fs: &'a mut MockFs,
}

impl<'a> Callbacks<'a> {
    pub(crate) fn new(fs: &'a mut MockFs) -> Self {
        Self { fs }
    }

    /// `done` receives a plain `bool`; this operation cannot fail.
    pub fn exists(&self, path: &str, done: impl FnOnce(bool)) {
        done(self.fs.exists(path))
    }

    pub fn stat(&self, path: &str, done: impl FnOnce(FsResult<Stats>)) {
        done(self.fs.stat(path))
    }

    pub fn lstat(&self, path: &str, done: impl FnOnce(FsResult<Stats>)) {
        done(self.fs.lstat(path))
    }

    pub fn fstat(&self, fd: Fd, done: impl FnOnce(FsResult<Stats>)) {
        done(self.fs.fstat(fd))
    }

    pub fn mkdir(&mut self, path: &str, mode: Option<u32>, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.mkdir(path, mode))
    }

    pub fn rmdir(&mut self, path: &str, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.rmdir(path))
    }

    pub fn unlink(&mut self, path: &str, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.unlink(path))
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.rename(old_path, new_path))
    }

    pub fn link(&mut self, src_path: &str, dst_path: &str, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.link(src_path, dst_path))
    }

    pub fn symlink(&mut self, src_path: &str, dst_path: &str, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.symlink(src_path, dst_path))
    }

    pub fn readlink(&self, path: &str, done: impl FnOnce(FsResult<String>)) {
        done(self.fs.readlink(path))
    }

    pub fn realpath(
        &self,
        path: &str,
        cache: Option<&HashMap<String, String>>,
        done: impl FnOnce(FsResult<String>),
    ) {
        done(self.fs.realpath(path, cache))
    }

    pub fn readdir(&self, path: &str, done: impl FnOnce(FsResult<Vec<String>>)) {
        done(self.fs.readdir(path))
    }

    pub fn truncate(&mut self, path: &str, len: u64, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.truncate(path, len))
    }

    pub fn ftruncate(&mut self, fd: Fd, len: u64, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.ftruncate(fd, len))
    }

    pub fn chown(&mut self, path: &str, uid: u32, gid: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.chown(path, uid, gid))
    }

    pub fn fchown(&mut self, fd: Fd, uid: u32, gid: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.fchown(fd, uid, gid))
    }

    pub fn lchown(&mut self, path: &str, uid: u32, gid: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.lchown(path, uid, gid))
    }

    pub fn chmod(&mut self, path: &str, mode: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.chmod(path, mode))
    }

    pub fn fchmod(&mut self, fd: Fd, mode: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.fchmod(fd, mode))
    }

    pub fn lchmod(&mut self, path: &str, mode: u32, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.lchmod(path, mode))
    }

    pub fn utimes(
        &mut self,
        path: &str,
        atime: SystemTime,
        mtime: SystemTime,
        done: impl FnOnce(FsResult<()>),
    ) {
        done(self.fs.utimes(path, atime, mtime))
    }

    pub fn futimes(
        &mut self,
        fd: Fd,
        atime: SystemTime,
        mtime: SystemTime,
        done: impl FnOnce(FsResult<()>),
    ) {
        done(self.fs.futimes(fd, atime, mtime))
    }

    pub fn fsync(&self, fd: Fd, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.fsync(fd))
    }

    pub fn open(
        &mut self,
        path: &str,
        flags: &str,
        mode: Option<u32>,
        done: impl FnOnce(FsResult<Fd>),
    ) {
        done(self.fs.open(path, flags, mode))
    }

    pub fn close(&mut self, fd: Fd, done: impl FnOnce(FsResult<()>)) {
        done(self.fs.close(fd))
    }

    /// `done` also gets the buffer back, filled up to the returned count.
    pub fn read(
        &mut self,
        fd: Fd,
        buffer: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
        done: impl FnOnce(FsResult<usize>, &[u8]),
    ) {
        let result = self.fs.read(fd, buffer, offset, length, position);
        done(result, buffer)
    }

    pub fn write(
        &mut self,
        fd: Fd,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
        done: impl FnOnce(FsResult<usize>),
    ) {
        done(self.fs.write(fd, buffer, offset, length, position))
    }

    pub fn read_file(
        &mut self,
        path: &str,
        flags: Option<&str>,
        done: impl FnOnce(FsResult<Vec<u8>>),
    ) {
        done(self.fs.read_file(path, flags))
    }

    pub fn write_file(
        &mut self,
        path: &str,
        data: &[u8],
        options: WriteFileOptions,
        done: impl FnOnce(FsResult<()>),
    ) {
        done(self.fs.write_file(path, data, options))
    }

    pub fn append_file(
        &mut self,
        path: &str,
        data: &[u8],
        options: WriteFileOptions,
        done: impl FnOnce(FsResult<()>),
    ) {
        done(self.fs.append_file(path, data, options))
    }

    pub fn watch<F>(&self, path: &str, listener: F, done: impl FnOnce(FsResult<Watcher>))
    where
        F: FnMut(WatchEvent, &str) + 'static,
    {
        done(self.fs.watch(path, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsOptions;
    use crate::core::FsError;
    use crate::vfs::TreeContent;

    fn setup_test_vfs() -> MockFs {
        MockFs::new(
            [("/var/www/index.php", TreeContent::file("hello"))],
            FsOptions::posix(),
        )
        .unwrap()
    }

    #[test]
    fn test_success_is_delivered_before_return() {
        let mut fs = setup_test_vfs();
        let mut called = false;

        fs.callback().mkdir("/home", None, |result| {
            assert!(result.is_ok());
            called = true;
        });

        assert!(called);
        assert!(fs.exists("/home"));
    }

    #[test]
    fn test_failure_is_delivered_not_raised() {
        let mut fs = setup_test_vfs();
        let mut error = None;

        fs.callback().open("/missing", "r", None, |result| error = result.err());

        assert_eq!(error, Some(FsError::NotFound("/missing".to_string())));
    }

    #[test]
    fn test_exists_gets_a_bool() {
        let mut fs = setup_test_vfs();
        let mut seen = Vec::new();
        let callbacks = fs.callback();
        callbacks.exists("/var/www", |exists| seen.push(exists));
        callbacks.exists("/nope", |exists| seen.push(exists));
        assert_eq!(seen, vec![true, false]);
    }

    #[test]
    fn test_descriptor_round() {
        let mut fs = setup_test_vfs();
        let mut callbacks = fs.callback();
        let mut fd = None;
        callbacks.open("/var/www/index.php", "r", None, |result| fd = result.ok());
        let fd = fd.unwrap();

        let mut buffer = [0; 5];
        let mut content = Vec::new();
        callbacks.read(fd, &mut buffer, 0, 5, None, |result, buffer| {
            assert_eq!(result, Ok(5));
            content.extend_from_slice(buffer);
        });
        assert_eq!(content, b"hello");

        callbacks.close(fd, |result| assert!(result.is_ok()));
        callbacks.close(fd, |result| {
            assert_eq!(result, Err(FsError::FdNotFound(fd)));
        });
    }

    #[test]
    fn test_read_file_and_readdir() {
        let mut fs = setup_test_vfs();
        let mut callbacks = fs.callback();

        callbacks.write_file("/var/www/b.php", b"b", WriteFileOptions::default(), |r| {
            assert!(r.is_ok())
        });
        callbacks.readdir("/var/www", |result| {
            assert_eq!(result, Ok(vec!["index.php".to_string(), "b.php".to_string()]))
        });
        callbacks.read_file("/var/www/b.php", None, |result| {
            assert_eq!(result.as_deref(), Ok(&b"b"[..]))
        });
    }
}
