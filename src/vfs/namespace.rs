//! Path-keyed node storage and its mutation algebra.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::core::utils::{self, Dialect};
use crate::core::{FsError, FsResult};
use crate::vfs::{Entry, TreeContent, WatchEvent};

/// Shared handle to a node. Hard links are several keys holding the same handle.
pub type EntryRef = Rc<RefCell<Entry>>;

/// Mapping canonical path → node.
///
/// ### Invariants
///
/// 1. Keys are canonical: normalized for the dialect, device roots without a trailing separator.
/// 2. One entry per key; iteration follows insertion order.
/// 3. After every structural mutation made through the facade, each ancestor of a stored key is
///    stored too (see [`Namespace::expand_path`]).
/// 4. The configured root, if any, is always present.
pub struct Namespace {
    dialect: Dialect,
    root: Option<String>,
    entries: HashMap<String, EntryRef>,
    order: Vec<String>,
    next_ino: u64,
}

impl Namespace {
    /// `root` must already be canonical. It is not inserted here, see [`Namespace::add_path`].
    pub fn new(dialect: Dialect, root: Option<String>) -> Self {
        Self {
            dialect,
            root,
            entries: HashMap::new(),
            order: Vec::new(),
            next_ino: 1,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Normalizes `path` into a key.
    pub fn canonical(&self, path: &str) -> String {
        utils::to_key(self.dialect, utils::normalize(self.dialect, path))
    }

    /// Key of a tree-literal path: paths not already under the root are placed under it.
    fn tree_key(&self, path: &str) -> String {
        let key = self.canonical(path);
        match &self.root {
            Some(root) if !key.starts_with(root.as_str()) => {
                self.canonical(&utils::join_paths(self.dialect, &[root, path]))
            }
            Some(_) => key,
            None if utils::is_absolute(self.dialect, path) => key,
            None => self.canonical(&utils::join_paths(
                self.dialect,
                &[self.dialect.separator_str(), path],
            )),
        }
    }

    /// Inserts a tree-literal entry (recursively for directories).
    ///
    /// With `is_root` the path names a root or drive and always becomes an empty directory.
    /// Hard links fail with `NotFound` when their source is absent.
    pub fn add_path(
        &mut self,
        path: &str,
        content: TreeContent,
        mode: Option<u32>,
        is_root: bool,
    ) -> FsResult<()> {
        if is_root {
            let key = self.canonical(path);
            self.create_directory(&key, mode.unwrap_or(0o777));
            return Ok(());
        }

        let key = self.tree_key(path);
        match content {
            TreeContent::File(data) => {
                self.create_file(&key, mode.unwrap_or(0o666), data);
            }
            TreeContent::Directory(children) => {
                self.create_directory(&key, mode.unwrap_or(0o777));
                for (name, child) in children {
                    let child_path = utils::join_paths(self.dialect, &[&key, &name]);
                    self.add_path(&child_path, child, None, false)?;
                }
            }
            TreeContent::HardLink(source) => {
                let source = self.tree_key(&source);
                self.link(&source, &key)?;
            }
            TreeContent::SymLink(target) => {
                let target = self.tree_key(&target);
                self.create_symlink(&key, target);
            }
        }
        Ok(())
    }

    fn next_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    /// Stores `entry` under `key`, replacing any previous entry in place.
    pub fn insert(&mut self, key: &str, entry: EntryRef) -> EntryRef {
        if self.entries.insert(key.to_string(), Rc::clone(&entry)).is_none() {
            self.order.push(key.to_string());
        }
        entry
    }

    pub fn create_file(&mut self, key: &str, mode: u32, data: Vec<u8>) -> EntryRef {
        let ino = self.next_ino();
        self.insert(key, Rc::new(RefCell::new(Entry::file(key, ino, mode, data))))
    }

    pub fn create_directory(&mut self, key: &str, mode: u32) -> EntryRef {
        let ino = self.next_ino();
        self.insert(key, Rc::new(RefCell::new(Entry::directory(key, ino, mode))))
    }

    pub fn create_symlink(&mut self, key: &str, target: String) -> EntryRef {
        let ino = self.next_ino();
        self.insert(key, Rc::new(RefCell::new(Entry::symlink(key, ino, target))))
    }

    /// Makes `dst` another name of the node at `src`.
    pub fn link(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let entry = self
            .get(src)
            .ok_or_else(|| FsError::NotFound(src.to_string()))?;
        self.insert(dst, entry);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<EntryRef> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Creates every missing ancestor of `key` as a directory.
    pub fn expand_path(&mut self, key: &str) {
        let mut current = utils::parent(self.dialect, key);
        while let Some(parent) = current {
            if !self.contains(&parent) {
                trace!(path = %parent, "expanding missing ancestor");
                self.create_directory(&parent, 0o777);
            }
            current = utils::parent(self.dialect, &parent);
        }
    }

    pub fn expand_paths(&mut self) {
        let keys: Vec<String> = self.order.clone();
        for key in keys {
            self.expand_path(&key);
        }
    }

    /// True iff some key lies strictly below `key`.
    pub fn has_descendants(&self, key: &str) -> bool {
        let prefix = utils::descendant_prefix(self.dialect, key);
        self.order
            .iter()
            .any(|found| found.len() > prefix.len() && found.starts_with(&prefix))
    }

    /// Names of the direct children of `key`, in insertion order.
    pub fn children(&self, key: &str) -> Vec<String> {
        let prefix = utils::descendant_prefix(self.dialect, key);
        let sep = self.dialect.separator();
        self.order
            .iter()
            .filter(|found| found.as_str() != key)
            .filter_map(|found| found.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains(sep))
            .map(str::to_string)
            .collect()
    }

    /// Deletes the single entry at `key`. Callers check for descendants beforehand.
    pub fn remove(&mut self, key: &str) -> Option<EntryRef> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|found| found != key);
        Some(removed)
    }

    /// Moves the node at `old` (and everything below it) to `new`, keeping its metadata, then
    /// raises a `rename` attribute notification on the moved node.
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
        if !self.contains(old) {
            return Err(FsError::NotFound(old.to_string()));
        }
        if self.contains(new) {
            return Err(FsError::AlreadyExists(new.to_string()));
        }

        let old_prefix = utils::descendant_prefix(self.dialect, old);
        let new_prefix = utils::descendant_prefix(self.dialect, new);
        let descendants: Vec<String> = self
            .order
            .iter()
            .filter(|found| found.starts_with(&old_prefix) && found.len() > old_prefix.len())
            .cloned()
            .collect();

        let entry = self.move_key(old, new.to_string());
        for descendant in descendants {
            let moved = format!("{new_prefix}{}", &descendant[old_prefix.len()..]);
            self.move_key(&descendant, moved);
        }

        if let Some(entry) = entry {
            entry
                .borrow_mut()
                .stats_mut()
                .touch_attributes(WatchEvent::Rename);
        }
        Ok(())
    }

    fn move_key(&mut self, from: &str, to: String) -> Option<EntryRef> {
        let entry = self.remove(from)?;
        entry.borrow_mut().stats_mut().set_path(to.clone());
        self.insert(&to, Rc::clone(&entry));
        Some(entry)
    }

    /// If `key` is a symlink, its stored target verbatim (exactly one hop, even when the target is
    /// itself a link); otherwise `key` unchanged.
    pub fn resolve_link_target(&self, key: &str) -> String {
        self.entries
            .get(key)
            .and_then(|entry| entry.borrow().link_target().map(str::to_string))
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix() -> Namespace {
        let mut ns = Namespace::new(Dialect::Posix, Some("/".to_string()));
        ns.add_path("/", TreeContent::empty_dir(), None, true).unwrap();
        ns
    }

    fn keys(ns: &Namespace) -> Vec<&str> {
        let mut keys: Vec<_> = ns.keys().collect();
        keys.sort();
        keys
    }

    mod add_path {
        use super::*;

        #[test]
        fn test_add_nested_tree() -> FsResult<()> {
            let mut ns = posix();
            ns.add_path(
                "var",
                TreeContent::dir([("www", TreeContent::dir([("index.php", TreeContent::file("x"))]))]),
                None,
                false,
            )?;

            assert_eq!(keys(&ns), vec!["/", "/var", "/var/www", "/var/www/index.php"]);
            assert!(ns.get("/var/www/index.php").unwrap().borrow().is_file());
            assert!(ns.get("/var/www").unwrap().borrow().is_dir());
            Ok(())
        }

        #[test]
        fn test_add_hard_link_shares_node() -> FsResult<()> {
            let mut ns = posix();
            ns.add_path("/a", TreeContent::file("data"), None, false)?;
            ns.add_path("/b", TreeContent::hard_link("/a"), None, false)?;

            let a = ns.get("/a").unwrap();
            let b = ns.get("/b").unwrap();
            assert!(Rc::ptr_eq(&a, &b));
            Ok(())
        }

        #[test]
        fn test_add_hard_link_missing_source() {
            let mut ns = posix();
            let result = ns.add_path("/b", TreeContent::hard_link("/missing"), None, false);
            assert_eq!(result, Err(FsError::NotFound("/missing".to_string())));
        }

        #[test]
        fn test_add_symlink_stores_target_only() -> FsResult<()> {
            let mut ns = posix();
            ns.add_path("/a", TreeContent::file("data"), None, false)?;
            ns.add_path("/l", TreeContent::symlink("/a"), None, false)?;

            let link = ns.get("/l").unwrap();
            assert!(link.borrow().is_symlink());
            assert_eq!(link.borrow().content(), None);
            assert_eq!(ns.resolve_link_target("/l"), "/a");
            Ok(())
        }

        #[test]
        fn test_windows_keys_under_root() -> FsResult<()> {
            let mut ns = Namespace::new(Dialect::Windows, Some("c:".to_string()));
            ns.add_path("c:", TreeContent::empty_dir(), None, true)?;
            ns.add_path("xampp\\htdocs\\index.php", TreeContent::file(""), None, false)?;
            ns.add_path("C:\\Users", TreeContent::empty_dir(), None, false)?;
            ns.expand_paths();

            assert_eq!(
                keys(&ns),
                vec!["c:", "c:\\Users", "c:\\xampp", "c:\\xampp\\htdocs", "c:\\xampp\\htdocs\\index.php"]
            );
            Ok(())
        }
    }

    mod expand {
        use super::*;

        #[test]
        fn test_expand_creates_ancestors() {
            let mut ns = posix();
            ns.create_file("/a/b/c/file.txt", 0o666, Vec::new());
            ns.expand_path("/a/b/c/file.txt");

            for key in ["/a", "/a/b", "/a/b/c"] {
                assert!(ns.get(key).unwrap().borrow().is_dir(), "{key} must be a directory");
            }
        }

        #[test]
        fn test_every_parent_is_stored() {
            let mut ns = Namespace::new(Dialect::Windows, None);
            ns.create_file("x:\\xampp\\htdocs\\index.php", 0o666, Vec::new());
            ns.create_directory("\\\\srv\\share\\dir", 0o777);
            ns.expand_paths();

            for key in ns.keys() {
                if let Some(parent) = utils::parent(Dialect::Windows, key) {
                    assert!(ns.contains(&parent), "missing parent of {key}");
                }
            }
            assert!(ns.contains("x:"));
            assert!(ns.contains("\\\\srv\\share"));
        }
    }

    mod structure {
        use super::*;

        fn setup() -> Namespace {
            let mut ns = posix();
            ns.create_directory("/var", 0o777);
            ns.create_directory("/var/www", 0o777);
            ns.create_file("/var/www/index.php", 0o666, b"x".to_vec());
            ns.create_directory("/var/www-old", 0o777);
            ns.create_file("/var/www/project/a.php", 0o666, Vec::new());
            ns.expand_paths();
            ns
        }

        #[test]
        fn test_has_descendants() {
            let ns = setup();
            assert!(ns.has_descendants("/"));
            assert!(ns.has_descendants("/var/www"));
            assert!(!ns.has_descendants("/var/www-old"));
            assert!(!ns.has_descendants("/var/www/index.php"));
        }

        #[test]
        fn test_children_in_insertion_order() {
            let ns = setup();
            assert_eq!(ns.children("/"), vec!["var"]);
            assert_eq!(ns.children("/var"), vec!["www", "www-old"]);
            assert_eq!(ns.children("/var/www"), vec!["index.php", "project"]);
        }

        #[test]
        fn test_remove_single_entry() {
            let mut ns = setup();
            assert!(ns.remove("/var/www-old").is_some());
            assert!(!ns.contains("/var/www-old"));
            assert!(ns.remove("/var/www-old").is_none());
        }

        #[test]
        fn test_rename_moves_node_and_descendants() -> FsResult<()> {
            let mut ns = setup();
            let ino = ns.get("/var/www").unwrap().borrow().stats().ino;

            ns.rename("/var/www", "/var/site")?;

            assert!(!ns.contains("/var/www"));
            assert!(!ns.contains("/var/www/index.php"));
            let moved = ns.get("/var/site").unwrap();
            assert_eq!(moved.borrow().stats().ino, ino);
            assert_eq!(moved.borrow().stats().path(), "/var/site");
            assert_eq!(
                ns.get("/var/site/index.php").unwrap().borrow().stats().path(),
                "/var/site/index.php"
            );
            assert!(ns.contains("/var/site/project/a.php"));
            Ok(())
        }

        #[test]
        fn test_rename_errors() {
            let mut ns = setup();
            assert_eq!(
                ns.rename("/nope", "/x"),
                Err(FsError::NotFound("/nope".to_string()))
            );
            assert_eq!(
                ns.rename("/var/www", "/var/www-old"),
                Err(FsError::AlreadyExists("/var/www-old".to_string()))
            );
        }

        #[test]
        fn test_resolve_link_is_one_hop() {
            let mut ns = setup();
            ns.create_symlink("/first", "/second".to_string());
            ns.create_symlink("/second", "/var/www/index.php".to_string());

            assert_eq!(ns.resolve_link_target("/first"), "/second");
            assert_eq!(ns.resolve_link_target("/var/www"), "/var/www");
            assert_eq!(ns.resolve_link_target("/missing"), "/missing");
        }
    }
}
