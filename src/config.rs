//! Construction options of [`MockFs`](crate::MockFs).

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::core::utils::{self, Dialect};

/// Root directory of the mock filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RootRepr")]
pub enum RootDir {
    /// `/` for POSIX, `c:` for Windows.
    #[default]
    Default,
    /// No root entry is created. Relative paths resolve against the separator.
    Disabled,
    Path(String),
}

/// `root: false | true | "path"` in serialized options.
#[derive(Deserialize)]
#[serde(untagged)]
enum RootRepr {
    Flag(bool),
    Path(String),
}

impl From<RootRepr> for RootDir {
    fn from(repr: RootRepr) -> Self {
        match repr {
            RootRepr::Flag(true) => RootDir::Default,
            RootRepr::Flag(false) => RootDir::Disabled,
            RootRepr::Path(path) => RootDir::Path(path),
        }
    }
}

/// Options recognized at construction.
///
/// ```
/// use mockfs::{FsOptions, RootDir};
///
/// let options: FsOptions = FsOptions::windows().with_drives(["d:", "z:"]);
/// assert!(options.validate().is_ok());
/// assert_eq!(options.root, RootDir::Default);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FsOptions {
    /// Selects the Windows dialect (drives, UNC roots, `\` separator).
    pub windows: bool,
    pub root: RootDir,
    /// Additional drive roots, Windows only.
    pub drives: Vec<String>,
}

impl FsOptions {
    pub fn posix() -> Self {
        Self::default()
    }

    pub fn windows() -> Self {
        Self {
            windows: true,
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = RootDir::Path(root.into());
        self
    }

    pub fn without_root(mut self) -> Self {
        self.root = RootDir::Disabled;
        self
    }

    pub fn with_drives<I, S>(mut self, drives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drives = drives.into_iter().map(Into::into).collect();
        self
    }

    pub fn dialect(&self) -> Dialect {
        if self.windows {
            Dialect::Windows
        } else {
            Dialect::Posix
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.drives.is_empty() && !self.windows {
            return Err(anyhow!("drives are only supported with the windows option"));
        }
        if let RootDir::Path(root) = &self.root {
            if root.is_empty() {
                return Err(anyhow!("root path must not be empty"));
            }
            if !utils::is_absolute(self.dialect(), root) && !self.is_drive(root) {
                return Err(anyhow!("root path must be an absolute: {root}"));
            }
        }
        Ok(())
    }

    fn is_drive(&self, path: &str) -> bool {
        self.windows && utils::is_virtual_root(Dialect::Windows, &utils::normalize_drive(path))
    }

    /// Canonical key of the root, `None` when disabled.
    pub fn root_key(&self) -> Option<String> {
        let dialect = self.dialect();
        match &self.root {
            RootDir::Disabled => None,
            RootDir::Default => Some(dialect.default_root().to_string()),
            RootDir::Path(path) => Some(self.device_key(path)),
        }
    }

    /// Canonical keys of the extra drives.
    pub fn drive_keys(&self) -> Vec<String> {
        self.drives.iter().map(|drive| self.device_key(drive)).collect()
    }

    fn device_key(&self, path: &str) -> String {
        let dialect = self.dialect();
        let normalized = match dialect {
            Dialect::Posix => utils::normalize_posix(path),
            Dialect::Windows => utils::normalize_drive(path),
        };
        utils::to_key(dialect, normalized)
    }
}
