use crate::vfs::Stats;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    File(Vec<u8>),
    Directory,
    Symlink(String),
}

/// One namespace node. Directory membership is structural (derived from key prefixes), so a
/// directory owns no content.
#[derive(Debug)]
pub struct Entry {
    content: Content,
    stats: Stats,
}

impl Entry {
    pub fn file(path: &str, ino: u64, mode: u32, data: Vec<u8>) -> Entry {
        let mut stats = Stats::new(path, EntryType::File, ino, mode);
        stats.set_content_len(data.len() as u64);
        Entry {
            content: Content::File(data),
            stats,
        }
    }

    pub fn directory(path: &str, ino: u64, mode: u32) -> Entry {
        Entry {
            content: Content::Directory,
            stats: Stats::new(path, EntryType::Directory, ino, mode),
        }
    }

    /// A symlink stores the target path only, never its content.
    pub fn symlink(path: &str, ino: u64, target: String) -> Entry {
        Entry {
            content: Content::Symlink(target),
            stats: Stats::new(path, EntryType::Symlink, ino, 0o777),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.stats.entry_type()
    }

    pub fn is_file(&self) -> bool {
        self.entry_type() == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type() == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type() == EntryType::Symlink
    }

    /// File bytes; `None` for directories and symlinks.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.content {
            Content::File(data) => Some(data),
            _ => None,
        }
    }

    /// Replaces the file bytes and the recorded size. Does not notify.
    /// Has no effect on directories and symlinks.
    pub fn set_content(&mut self, data: Vec<u8>) {
        if let Content::File(current) = &mut self.content {
            self.stats.set_content_len(data.len() as u64);
            *current = data;
        }
    }

    pub fn link_target(&self) -> Option<&str> {
        match &self.content {
            Content::Symlink(target) => Some(target),
            _ => None,
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }
}

/// Initial content of a mock filesystem, one variant per kind of tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeContent {
    File(Vec<u8>),
    /// Children in insertion order; names may contain separators.
    Directory(Vec<(String, TreeContent)>),
    /// The key becomes another name for the node at this source path.
    HardLink(String),
    /// The key becomes a symlink storing this target path.
    SymLink(String),
}

impl TreeContent {
    pub fn file(data: impl Into<Vec<u8>>) -> Self {
        TreeContent::File(data.into())
    }

    pub fn dir<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, TreeContent)>,
        K: Into<String>,
    {
        TreeContent::Directory(
            children
                .into_iter()
                .map(|(name, content)| (name.into(), content))
                .collect(),
        )
    }

    pub fn empty_dir() -> Self {
        TreeContent::Directory(Vec::new())
    }

    pub fn hard_link(source: impl Into<String>) -> Self {
        TreeContent::HardLink(source.into())
    }

    pub fn symlink(target: impl Into<String>) -> Self {
        TreeContent::SymLink(target.into())
    }
}

/// A whole initial tree: top-level keys with their content, in insertion order.
pub type Tree = Vec<(String, TreeContent)>;
