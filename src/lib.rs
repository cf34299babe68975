//! An in-memory mock filesystem for Rust tests.
//! Emulates a hierarchical filesystem of files, directories and symlinks without touching the
//! disk, with POSIX or Windows path rules.
//!
//! ### Overview
//!
//! `mockfs` keeps every node in a map keyed by canonical path strings. It exposes path-level
//! operations through the `FsBackend` trait and descriptor-level ones through `FdBackend`, both
//! implemented by `MockFs`.
//!
//! **Key ideas**:
//! - **Determinism**: no host I/O; the same calls give the same keys, handles and errors on every platform.
//! - **Dialects**: POSIX paths, or Windows paths with drive letters and UNC roots.
//! - **Observability**: watchers receive `change` / `rename` events from node metadata.
//! - **Two conventions**: direct calls return `FsResult`, `MockFs::callback()` hands results to completions.
//! - **Clarity**: every error message names the canonical path or descriptor involved.
//!
//! ```
//! use mockfs::{FsBackend, FsOptions, MockFs, TreeContent};
//!
//! let mut fs = MockFs::new(
//!     [("Users\\john\\notes.txt", TreeContent::file("todo"))],
//!     FsOptions::windows(),
//! )
//! .unwrap();
//!
//! assert_eq!(fs.readdir("C:/Users").unwrap(), vec!["john"]);
//! fs.rename("c:\\Users\\john\\notes.txt", "c:\\notes.txt").unwrap();
//! assert!(fs.exists("c:\\notes.txt"));
//! ```

mod config;
mod core;
mod vfs;

pub use crate::config::{FsOptions, RootDir};
pub use crate::core::utils::{self, Dialect};
pub use crate::core::{FdBackend, FsBackend, FsError, FsResult, WriteFileOptions};
pub use crate::vfs::{
    Callbacks, Entry, EntryType, Fd, MockFs, Notification, OpenFlags, ReadStream,
    ReadStreamOptions, SetAttributes, Stats, StreamEvent, TaskQueue, Tree, TreeContent,
    WatchEvent, Watcher, WriteStream, WriteStreamOptions,
};
