//! Per-node metadata record and its change notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use crate::core::{FsError, FsResult};
use crate::vfs::{EntryType, WatchEvent};

/// What a metadata mutation reports to its observers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Content changed (mtime + ctime bumped).
    Modified,
    /// Attributes changed (ctime bumped); carries the event name to republish.
    ModifiedAttributes(WatchEvent),
}

type Observer = Box<dyn FnMut(Notification, &str)>;

/// Observers of one metadata record, called in registration order.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(u64, Observer)>,
    dispatching: bool,
    removed: Vec<u64>,
}

impl ObserverList {
    fn add(&mut self, observer: Observer) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        match self.entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => drop(self.entries.remove(index)),
            // the list is being dispatched right now, drop the entry afterwards
            None if self.dispatching && id < self.next_id => self.removed.push(id),
            None => {}
        }
    }

    fn dispatch(list: &Rc<RefCell<Self>>, notification: Notification, path: &str) {
        let mut entries = {
            let mut list = list.borrow_mut();
            list.dispatching = true;
            std::mem::take(&mut list.entries)
        };
        for (id, observer) in entries.iter_mut() {
            if list.borrow().removed.contains(id) {
                continue;
            }
            observer(notification, path);
        }

        let mut list = list.borrow_mut();
        list.dispatching = false;
        let removed = std::mem::take(&mut list.removed);
        entries.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::replace(&mut list.entries, entries);
        list.entries.extend(added);
    }
}

/// Partial attribute update for [`Stats::apply_attributes`]. Only `Some` fields are assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAttributes {
    pub dev: Option<u64>,
    pub ino: Option<u64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub rdev: Option<u64>,
    pub size: Option<u64>,
    pub blksize: Option<u64>,
    pub blocks: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
    pub ctime: Option<SystemTime>,
}

impl SetAttributes {
    pub fn owner(uid: u32, gid: u32) -> Self {
        Self {
            uid: Some(uid),
            gid: Some(gid),
            ..Default::default()
        }
    }

    pub fn mode(mode: u32) -> Self {
        Self {
            mode: Some(mode),
            ..Default::default()
        }
    }

    pub fn times(atime: SystemTime, mtime: SystemTime) -> Self {
        Self {
            atime: Some(atime),
            mtime: Some(mtime),
            ..Default::default()
        }
    }
}

/// Metadata of one node.
///
/// Hard links share a single record, so a mutation through any alias is seen (and notified)
/// through all of them. The data fields are public; mutating them directly on a snapshot returned
/// by `stat()` has no effect on the filesystem.
pub struct Stats {
    path: String,
    entry_type: EntryType,
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    observers: Rc<RefCell<ObserverList>>,
}

impl Stats {
    pub fn new(path: impl Into<String>, entry_type: EntryType, ino: u64, mode: u32) -> Self {
        let now = SystemTime::now();
        Self {
            path: path.into(),
            entry_type,
            dev: 0,
            ino,
            mode,
            uid: 100,
            gid: 100,
            rdev: 0,
            size: 0,
            blksize: 0,
            blocks: 1,
            atime: now,
            mtime: now,
            ctime: now,
            observers: Rc::new(RefCell::new(ObserverList::default())),
        }
    }

    /// Canonical path this record was last registered under.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Content changed.
    pub fn touch_content(&mut self) {
        let now = SystemTime::now();
        self.mtime = now;
        self.ctime = now;
        self.notify(Notification::Modified);
    }

    /// Attributes changed; `event` is republished to watchers (`Change` or `Rename`).
    pub fn touch_attributes(&mut self, event: WatchEvent) {
        self.ctime = SystemTime::now();
        self.notify(Notification::ModifiedAttributes(event));
    }

    /// Content was read. Never notifies.
    pub fn touch_access(&mut self) {
        self.atime = SystemTime::now();
    }

    pub fn apply_attributes(&mut self, attributes: SetAttributes) {
        let SetAttributes {
            dev,
            ino,
            mode,
            uid,
            gid,
            rdev,
            size,
            blksize,
            blocks,
            atime,
            mtime,
            ctime,
        } = attributes;

        if let Some(dev) = dev {
            self.dev = dev;
        }
        if let Some(ino) = ino {
            self.ino = ino;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(uid) = uid {
            self.uid = uid;
        }
        if let Some(gid) = gid {
            self.gid = gid;
        }
        if let Some(rdev) = rdev {
            self.rdev = rdev;
        }
        if let Some(size) = size {
            self.size = size;
        }
        if let Some(blksize) = blksize {
            self.blksize = blksize;
        }
        if let Some(blocks) = blocks {
            self.blocks = blocks;
        }
        if let Some(atime) = atime {
            self.atime = atime;
        }
        if let Some(mtime) = mtime {
            self.mtime = mtime;
        }
        if let Some(ctime) = ctime {
            self.ctime = ctime;
        }

        self.touch_attributes(WatchEvent::Change);
    }

    pub(crate) fn set_content_len(&mut self, len: u64) {
        self.size = len;
        self.blksize = len;
    }

    pub(crate) fn subscribe<F>(&self, observer: F) -> (Weak<RefCell<ObserverList>>, u64)
    where
        F: FnMut(Notification, &str) + 'static,
    {
        let id = self.observers.borrow_mut().add(Box::new(observer));
        (Rc::downgrade(&self.observers), id)
    }

    fn notify(&self, notification: Notification) {
        ObserverList::dispatch(&self.observers, notification, &self.path);
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.entry_type == EntryType::Symlink
    }

    pub fn is_block_device(&self) -> FsResult<bool> {
        Err(FsError::NotImplemented("is_block_device"))
    }

    pub fn is_character_device(&self) -> FsResult<bool> {
        Err(FsError::NotImplemented("is_character_device"))
    }

    pub fn is_fifo(&self) -> FsResult<bool> {
        Err(FsError::NotImplemented("is_fifo"))
    }

    pub fn is_socket(&self) -> FsResult<bool> {
        Err(FsError::NotImplemented("is_socket"))
    }
}

/// Copies the data fields only: the clone has its own, empty observer list.
impl Clone for Stats {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            entry_type: self.entry_type,
            dev: self.dev,
            ino: self.ino,
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            rdev: self.rdev,
            size: self.size,
            blksize: self.blksize,
            blocks: self.blocks,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            observers: Rc::new(RefCell::new(ObserverList::default())),
        }
    }
}

impl fmt::Debug for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stats")
            .field("path", &self.path)
            .field("entry_type", &self.entry_type)
            .field("dev", &self.dev)
            .field("ino", &self.ino)
            .field("mode", &self.mode)
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("size", &self.size)
            .field("blksize", &self.blksize)
            .field("blocks", &self.blocks)
            .field("atime", &self.atime)
            .field("mtime", &self.mtime)
            .field("ctime", &self.ctime)
            .finish_non_exhaustive()
    }
}
