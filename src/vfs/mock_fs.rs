//! This module provides an in-memory mock filesystem that emulates both POSIX and Windows path
//! rules.

use std::collections::HashMap;
use std::time::SystemTime;

use anyhow::Context;
use tracing::debug;

use crate::config::FsOptions;
use crate::core::utils::{self, Dialect};
use crate::core::{FdBackend, FsBackend, FsError, FsResult, WriteFileOptions};
use crate::vfs::callback::Callbacks;
use crate::vfs::descriptor::{DescriptorTable, Fd, OpenFlags};
use crate::vfs::namespace::{EntryRef, Namespace};
use crate::vfs::scheduler::TaskQueue;
use crate::vfs::stream::{ReadStream, ReadStreamOptions, WriteStream, WriteStreamOptions};
use crate::vfs::{SetAttributes, Stats, TreeContent, WatchEvent, Watcher};

/// An in-memory filesystem keyed by canonical path strings.
///
/// `MockFs` is meant to stand in for the real filesystem in tests: it is deterministic, never
/// touches the host and behaves the same on every platform for a given dialect.
///
/// ### Internal state
///
/// * `options` — construction options: dialect, root and extra drives.
/// * `namespace` — canonical path → node map (files, directories, symlinks). Hard links are
///   several keys sharing one node, so they share content and metadata.
/// * `descriptors` — open handles; handle numbers grow monotonically and are never reused.
/// * `tasks` — deferred stream events, run by [`MockFs::run_pending`].
///
/// ### Invariants
///
/// 1. **Canonical keys**: every key is normalized for the dialect.
/// 2. **Parent consistency**: for any entry `/a/b/c`, the entries `/a/b`, `/a` and `/` exist.
/// 3. **Root existence**: the configured root and the extra drives always exist.
///
/// ### Path resolution
///
/// Relative paths resolve against the root (or the separator when the root is disabled).
/// Symlinks are followed exactly one hop, and only by the operations documented to follow them.
///
/// ### Thread Safety
///
/// Nodes are shared through `Rc`, so `MockFs` is neither `Send` nor `Sync`. Everything happens
/// on the calling thread.
///
/// ### Example
///
/// ```
/// use mockfs::{FdBackend, FsBackend, FsOptions, MockFs, TreeContent};
///
/// let mut fs = MockFs::new(
///     [("var/www", TreeContent::dir([("index.php", TreeContent::file("<?php"))]))],
///     FsOptions::posix(),
/// )
/// .unwrap();
///
/// assert!(fs.exists("/var/www/index.php"));
/// assert_eq!(fs.read_file_to_string("/var/www/index.php").unwrap(), "<?php");
///
/// let fd = fs.open("/var/www/index.php", "r+", None).unwrap();
/// fs.write(fd, b" echo 1;", 0, 8, Some(5)).unwrap();
/// fs.close(fd).unwrap();
/// ```
pub struct MockFs {
    options: FsOptions,
    namespace: Namespace,
    drives: Vec<String>,
    descriptors: DescriptorTable,
    tasks: TaskQueue,
}

impl MockFs {
    /// Creates a filesystem holding `tree`.
    ///
    /// Tree keys that are not under the root are placed under it. Fails if the options are
    /// invalid (e.g. `drives` without `windows`) or a hard link names a missing source.
    pub fn new<I, K>(tree: I, options: FsOptions) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, TreeContent)>,
        K: Into<String>,
    {
        options.validate()?;

        let dialect = options.dialect();
        let root = options.root_key();
        let drives = options.drive_keys();
        let mut namespace = Namespace::new(dialect, root.clone());

        if let Some(root) = &root {
            namespace.add_path(root, TreeContent::empty_dir(), None, true)?;
        }
        for drive in &drives {
            namespace.add_path(drive, TreeContent::empty_dir(), None, true)?;
        }
        for (key, content) in tree {
            let key = key.into();
            namespace
                .add_path(&key, content, None, false)
                .with_context(|| format!("invalid tree entry '{key}'"))?;
        }
        namespace.expand_paths();

        debug!(?dialect, root = ?root, entries = namespace.len(), "mock filesystem created");

        Ok(Self {
            options,
            namespace,
            drives,
            descriptors: DescriptorTable::new(),
            tasks: TaskQueue::new(),
        })
    }

    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    pub fn dialect(&self) -> Dialect {
        self.namespace.dialect()
    }

    /// Canonical root key, `None` when the root is disabled.
    pub fn root(&self) -> Option<&str> {
        self.namespace.root()
    }

    /// Every stored path in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.namespace.keys()
    }

    pub fn has_fd(&self, fd: Fd) -> bool {
        self.descriptors.has(fd)
    }

    /// Callback calling convention over the same operations.
    pub fn callback(&mut self) -> Callbacks<'_> {
        Callbacks::new(self)
    }

    pub(crate) fn tasks(&self) -> TaskQueue {
        self.tasks.clone()
    }

    /// Runs one turn of deferred stream events. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        self.tasks.run_pending()
    }

    /// Runs deferred stream events until none are left.
    pub fn run_until_idle(&self) -> usize {
        self.tasks.run_until_idle()
    }

    pub fn create_read_stream(&mut self, path: &str, options: ReadStreamOptions) -> ReadStream {
        ReadStream::open(self, path, options)
    }

    pub fn create_write_stream(&mut self, path: &str, options: WriteStreamOptions) -> WriteStream {
        WriteStream::open(self, path, options)
    }

    /// Reads the whole file as UTF-8 (lossy).
    pub fn read_file_to_string(&mut self, path: &str) -> FsResult<String> {
        let data = self.read_file(path, None)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub fn watch_file(&self, _path: &str) -> FsResult<()> {
        Err(FsError::NotImplemented("watch_file"))
    }

    pub fn unwatch_file(&self, _path: &str) -> FsResult<()> {
        Err(FsError::NotImplemented("unwatch_file"))
    }

    /// Canonical key of `path`, without following symlinks.
    fn to_key(&self, path: &str) -> String {
        let dialect = self.dialect();
        let absolute = utils::is_absolute(dialect, path)
            || (dialect == Dialect::Windows && utils::has_device(path));
        if absolute {
            return self.namespace.canonical(path);
        }
        let base = self.root().unwrap_or(dialect.separator_str());
        self.namespace
            .canonical(&utils::join_paths(dialect, &[base, path]))
    }

    /// Canonical key of `path` after one symlink hop.
    fn to_source_key(&self, path: &str) -> String {
        let key = self.to_key(path);
        self.namespace.resolve_link_target(&key)
    }

    fn entry(&self, key: &str) -> FsResult<EntryRef> {
        self.namespace
            .get(key)
            .ok_or_else(|| FsError::NotFound(key.to_string()))
    }

    fn existing_key(&self, path: &str) -> FsResult<String> {
        let key = self.to_key(path);
        if !self.namespace.contains(&key) {
            return Err(FsError::NotFound(key));
        }
        Ok(key)
    }

    fn is_root_key(&self, key: &str) -> bool {
        self.root() == Some(key)
            || self.drives.iter().any(|drive| drive == key)
            || utils::is_virtual_root(self.dialect(), key)
    }

    fn set_attributes(&self, key: &str, attributes: SetAttributes) -> FsResult<()> {
        let entry = self.entry(key)?;
        entry.borrow_mut().stats_mut().apply_attributes(attributes);
        Ok(())
    }

    fn set_symlink_attributes(&self, path: &str, attributes: SetAttributes) -> FsResult<()> {
        let key = self.existing_key(path)?;
        let entry = self.entry(&key)?;
        if !entry.borrow().is_symlink() {
            return Err(FsError::NotSymlink(key));
        }
        entry.borrow_mut().stats_mut().apply_attributes(attributes);
        Ok(())
    }

    fn descriptor_path(&self, fd: Fd) -> FsResult<String> {
        Ok(self.descriptors.get(fd)?.path.clone())
    }
}

impl FsBackend for MockFs {
    /// Checks if `path` is stored. Symlinks are not followed.
    fn exists(&self, path: &str) -> bool {
        self.namespace.contains(&self.to_key(path))
    }

    /// Returns a snapshot of the metadata, following one symlink hop.
    fn stat(&self, path: &str) -> FsResult<Stats> {
        let key = self.to_source_key(path);
        let entry = self.entry(&key)?;
        let stats = entry.borrow().stats().clone();
        Ok(stats)
    }

    /// Like [`FsBackend::stat`], but describes a symlink itself.
    fn lstat(&self, path: &str) -> FsResult<Stats> {
        let key = self.existing_key(path)?;
        let entry = self.entry(&key)?;
        let stats = entry.borrow().stats().clone();
        Ok(stats)
    }

    /// Creates a directory (mode `0o777` by default) and any missing parents.
    fn mkdir(&mut self, path: &str, mode: Option<u32>) -> FsResult<()> {
        let key = self.to_key(path);
        if self.namespace.contains(&key) {
            return Err(FsError::AlreadyExists(key));
        }
        self.namespace.create_directory(&key, mode.unwrap_or(0o777));
        self.namespace.expand_path(&key);
        debug!(path = %key, "mkdir");
        Ok(())
    }

    /// Removes an empty directory. The root and the drives can't be removed.
    fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let key = self.existing_key(path)?;
        if !self.entry(&key)?.borrow().is_dir() {
            return Err(FsError::NotDirectory(key));
        }
        if self.is_root_key(&key) {
            return Err(FsError::Busy(key));
        }
        if self.namespace.has_descendants(&key) {
            return Err(FsError::DirectoryNotEmpty(key));
        }
        self.namespace.remove(&key);
        debug!(path = %key, "rmdir");
        Ok(())
    }

    /// Removes a file or a symlink (never its target).
    fn unlink(&mut self, path: &str) -> FsResult<()> {
        let key = self.existing_key(path)?;
        if self.entry(&key)?.borrow().is_dir() {
            return Err(FsError::NotFile(key));
        }
        self.namespace.remove(&key);
        debug!(path = %key, "unlink");
        Ok(())
    }

    /// Moves a node (and everything below it) to a new path.
    ///
    /// Metadata travels with the node; its watchers receive `rename` with the new path.
    fn rename(&mut self, old_path: &str, new_path: &str) -> FsResult<()> {
        let old_key = self.existing_key(old_path)?;
        let new_key = self.to_key(new_path);
        if self.is_root_key(&old_key) {
            return Err(FsError::Busy(old_key));
        }
        self.namespace.rename(&old_key, &new_key)?;
        self.namespace.expand_path(&new_key);
        debug!(from = %old_key, to = %new_key, "rename");
        Ok(())
    }

    /// Creates a hard link: `dst_path` becomes another name of the node at `src_path`.
    fn link(&mut self, src_path: &str, dst_path: &str) -> FsResult<()> {
        let src_key = self.existing_key(src_path)?;
        let dst_key = self.to_key(dst_path);
        if self.namespace.contains(&dst_key) {
            return Err(FsError::AlreadyExists(dst_key));
        }
        self.namespace.link(&src_key, &dst_key)?;
        self.namespace.expand_path(&dst_key);
        debug!(src = %src_key, dst = %dst_key, "link");
        Ok(())
    }

    /// Creates `dst_path` as a symlink storing the canonical form of `src_path`.
    fn symlink(&mut self, src_path: &str, dst_path: &str) -> FsResult<()> {
        let src_key = self.existing_key(src_path)?;
        let dst_key = self.to_key(dst_path);
        if self.namespace.contains(&dst_key) {
            return Err(FsError::AlreadyExists(dst_key));
        }
        self.namespace.create_symlink(&dst_key, src_key.clone());
        self.namespace.expand_path(&dst_key);
        debug!(src = %src_key, dst = %dst_key, "symlink");
        Ok(())
    }

    /// Returns the stored target of a symlink, or the canonical path of anything else.
    fn readlink(&self, path: &str) -> FsResult<String> {
        let key = self.existing_key(path)?;
        Ok(self.namespace.resolve_link_target(&key))
    }

    /// Returns the canonical form of an existing path. `cache` entries win over resolution.
    fn realpath(&self, path: &str, cache: Option<&HashMap<String, String>>) -> FsResult<String> {
        if let Some(cached) = cache.and_then(|cache| cache.get(path)) {
            return Ok(cached.clone());
        }
        self.existing_key(path)
    }

    /// Names of the direct children of a directory, in insertion order.
    fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        let key = self.to_source_key(path);
        if !self.entry(&key)?.borrow().is_dir() {
            return Err(FsError::NotDirectory(key));
        }
        Ok(self.namespace.children(&key))
    }

    /// Keeps the first `len` bytes. A longer `len` leaves the content as is.
    fn truncate(&mut self, path: &str, len: u64) -> FsResult<()> {
        let key = self.to_source_key(path);
        if !self.namespace.contains(&key) {
            return Err(FsError::NotFound(key));
        }
        let fd = self.open(path, "w", None)?;
        let result = match self.fstat(fd) {
            Ok(stats) if stats.is_file() => self.ftruncate(fd, len),
            Ok(_) => Err(FsError::NotFile(key)),
            Err(err) => Err(err),
        };
        self.close(fd)?;
        result
    }

    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        let key = self.to_source_key(path);
        self.set_attributes(&key, SetAttributes::owner(uid, gid))
    }

    /// Changes the owner of a symlink itself; fails `NotSymlink` for anything else.
    fn lchown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.set_symlink_attributes(path, SetAttributes::owner(uid, gid))
    }

    fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let key = self.to_source_key(path);
        self.set_attributes(&key, SetAttributes::mode(mode))
    }

    fn lchmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        self.set_symlink_attributes(path, SetAttributes::mode(mode))
    }

    fn utimes(&mut self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let key = self.to_source_key(path);
        self.set_attributes(&key, SetAttributes::times(atime, mtime))
    }

    /// Reads a whole file. `flags` defaults to `r`.
    fn read_file(&mut self, path: &str, flags: Option<&str>) -> FsResult<Vec<u8>> {
        let fd = self.open(path, flags.unwrap_or("r"), None)?;
        let result = self.fstat(fd).and_then(|stats| {
            let mut buffer = vec![0; stats.size as usize];
            let length = buffer.len();
            let read = self.read(fd, &mut buffer, 0, length, None)?;
            buffer.truncate(read);
            Ok(buffer)
        });
        self.close(fd)?;
        result
    }

    /// Replaces the content of a file, creating it (and its parents) if needed.
    fn write_file(&mut self, path: &str, data: &[u8], options: WriteFileOptions) -> FsResult<()> {
        let key = self.to_source_key(path);
        let fd = self.open(path, &options.flags, Some(options.mode))?;
        let result = self.write(fd, data, 0, data.len(), None);
        self.close(fd)?;
        result?;
        self.namespace.expand_path(&key);
        Ok(())
    }

    /// Writes `data` after the current end of the file.
    fn append_file(
        &mut self,
        path: &str,
        data: &[u8],
        options: WriteFileOptions,
    ) -> FsResult<()> {
        let fd = self.open(path, &options.flags, Some(options.mode))?;
        let result = self
            .fstat(fd)
            .and_then(|stats| self.write(fd, data, 0, data.len(), Some(stats.size)));
        self.close(fd)?;
        result.map(|_| ())
    }

    /// Subscribes `listener` to the metadata of `path` (one symlink hop).
    ///
    /// Content changes arrive as `change`, attribute changes as `change` or `rename`, always
    /// with the current path of the watched node.
    fn watch<F>(&self, path: &str, listener: F) -> FsResult<Watcher>
    where
        F: FnMut(WatchEvent, &str) + 'static,
    {
        let key = self.existing_key(path)?;
        let source = self.namespace.resolve_link_target(&key);
        let entry = self.entry(&source)?;
        let watcher = Watcher::attach(entry.borrow().stats(), listener);
        Ok(watcher)
    }
}

impl FdBackend for MockFs {
    /// Opens `path` (one symlink hop) with the given flags.
    ///
    /// Missing files are created (mode `0o666` by default) unless the flags require an existing
    /// one. Opening never truncates.
    fn open(&mut self, path: &str, flags: &str, mode: Option<u32>) -> FsResult<Fd> {
        let flags: OpenFlags = flags.parse()?;
        let key = self.to_source_key(path);
        let exists = self.namespace.contains(&key);

        if flags.must_exist && !exists {
            return Err(FsError::NotFound(key));
        }
        if flags.exclusive && exists {
            return Err(FsError::AlreadyExists(key));
        }
        if flags.creates() && !exists {
            self.namespace
                .create_file(&key, mode.unwrap_or(0o666), Vec::new());
            self.namespace.expand_path(&key);
        }

        let fd = self.descriptors.allocate(key.clone(), flags);
        debug!(%fd, path = %key, "open");
        Ok(fd)
    }

    fn close(&mut self, fd: Fd) -> FsResult<()> {
        let descriptor = self.descriptors.close(fd)?;
        debug!(%fd, path = %descriptor.path, "close");
        Ok(())
    }

    fn fstat(&self, fd: Fd) -> FsResult<Stats> {
        let path = self.descriptor_path(fd)?;
        let entry = self.entry(&path)?;
        let stats = entry.borrow().stats().clone();
        Ok(stats)
    }

    /// Copies `content[position..position + length]` into `buffer[offset..]` and returns the
    /// number of bytes copied. `position` defaults to 0.
    fn read(
        &mut self,
        fd: Fd,
        buffer: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> FsResult<usize> {
        let path = self.descriptors.readable(fd)?.path.clone();
        let entry = self.entry(&path)?;
        let mut node = entry.borrow_mut();
        let content = node.content().ok_or_else(|| FsError::NotFile(path.clone()))?;

        let start = position.unwrap_or(0).min(content.len() as u64) as usize;
        let end = start.saturating_add(length).min(content.len());
        let offset = offset.min(buffer.len());
        let target = &mut buffer[offset..];
        let count = (end - start).min(target.len());
        target[..count].copy_from_slice(&content[start..start + count]);

        node.stats_mut().touch_access();
        Ok(count)
    }

    /// Writes `buffer[offset..offset + length]`.
    ///
    /// Without `position` the content is replaced (or appended to, for the `a` flags family);
    /// with it the bytes are spliced in at that position.
    fn write(
        &mut self,
        fd: Fd,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> FsResult<usize> {
        let descriptor = self.descriptors.writable(fd)?;
        let path = descriptor.path.clone();
        let append = descriptor.flags.append;
        let entry = self.entry(&path)?;
        let mut node = entry.borrow_mut();
        let old = node.content().ok_or_else(|| FsError::NotFile(path.clone()))?;

        let start = offset.min(buffer.len());
        let end = offset.saturating_add(length).min(buffer.len());
        let slice = &buffer[start..end];

        let position = match position {
            None if append => Some(old.len() as u64),
            position => position,
        };
        let data = match position {
            None => slice.to_vec(),
            Some(position) => {
                let at = position.min(old.len() as u64) as usize;
                let mut data = Vec::with_capacity(old.len() + slice.len());
                data.extend_from_slice(&old[..at]);
                data.extend_from_slice(slice);
                data.extend_from_slice(&old[at..]);
                data
            }
        };

        node.set_content(data);
        node.stats_mut().touch_content();
        Ok(slice.len())
    }

    /// Keeps the first `len` bytes; needs a descriptor open for writing.
    fn ftruncate(&mut self, fd: Fd, len: u64) -> FsResult<()> {
        let path = self.descriptors.writable(fd)?.path.clone();
        let entry = self.entry(&path)?;
        let mut node = entry.borrow_mut();
        let mut data = node
            .content()
            .ok_or_else(|| FsError::NotFile(path.clone()))?
            .to_vec();
        if (data.len() as u64) > len {
            data.truncate(len as usize);
        }
        node.set_content(data);
        node.stats_mut().touch_content();
        Ok(())
    }

    fn fchown(&mut self, fd: Fd, uid: u32, gid: u32) -> FsResult<()> {
        let path = self.descriptor_path(fd)?;
        self.set_attributes(&path, SetAttributes::owner(uid, gid))
    }

    fn fchmod(&mut self, fd: Fd, mode: u32) -> FsResult<()> {
        let path = self.descriptor_path(fd)?;
        self.set_attributes(&path, SetAttributes::mode(mode))
    }

    fn futimes(&mut self, fd: Fd, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let path = self.descriptor_path(fd)?;
        self.set_attributes(&path, SetAttributes::times(atime, mtime))
    }

    /// Nothing to flush; only checks the handle.
    fn fsync(&self, fd: Fd) -> FsResult<()> {
        self.descriptors.get(fd).map(|_| ())
    }
}
