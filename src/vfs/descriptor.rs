//! Open-descriptor registry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::core::{FsError, FsResult};

/// Handle of an open file. Values are never reused within one filesystem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fd(pub u64);

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed open mode (`r`, `r+`, `rs`, `rs+`, `w`, `wx`, `w+`, `wx+`, `a`, `ax`, `a+`, `ax+`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OpenFlags {
    pub readable: bool,
    pub writable: bool,
    /// Opening fails with `NotFound` if the file is absent.
    pub must_exist: bool,
    /// Opening fails with `AlreadyExists` if the file is present.
    pub exclusive: bool,
    /// Writes without an explicit position go to the end of the file.
    pub append: bool,
}

impl OpenFlags {
    pub const READ: OpenFlags = OpenFlags {
        readable: true,
        writable: false,
        must_exist: true,
        exclusive: false,
        append: false,
    };

    pub const WRITE: OpenFlags = OpenFlags {
        readable: false,
        writable: true,
        must_exist: false,
        exclusive: false,
        append: false,
    };

    pub fn creates(&self) -> bool {
        !self.must_exist
    }
}

impl FromStr for OpenFlags {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let read_write = |readable, writable, must_exist, exclusive, append| OpenFlags {
            readable,
            writable,
            must_exist,
            exclusive,
            append,
        };
        let flags = match s {
            "r" | "rs" => OpenFlags::READ,
            "r+" | "rs+" => read_write(true, true, true, false, false),
            "w" => OpenFlags::WRITE,
            "wx" | "xw" => read_write(false, true, false, true, false),
            "w+" => read_write(true, true, false, false, false),
            "wx+" | "xw+" => read_write(true, true, false, true, false),
            "a" => read_write(false, true, false, false, true),
            "ax" | "xa" => read_write(false, true, false, true, true),
            "a+" => read_write(true, true, false, false, true),
            "ax+" | "xa+" => read_write(true, true, false, true, true),
            other => return Err(FsError::InvalidFlags(other.to_string())),
        };
        Ok(flags)
    }
}

/// One open file: the canonical path it was opened on and its mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub path: String,
    pub flags: OpenFlags,
}

/// Handle → descriptor registry with a monotonic handle counter.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    next: u64,
    open: BTreeMap<Fd, Descriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an already validated open and returns its new handle.
    pub fn allocate(&mut self, path: String, flags: OpenFlags) -> Fd {
        let fd = Fd(self.next);
        self.next += 1;
        trace!(%fd, path = %path, "descriptor allocated");
        self.open.insert(fd, Descriptor { path, flags });
        fd
    }

    pub fn close(&mut self, fd: Fd) -> FsResult<Descriptor> {
        self.open.remove(&fd).ok_or(FsError::FdNotFound(fd))
    }

    pub fn has(&self, fd: Fd) -> bool {
        self.open.contains_key(&fd)
    }

    pub fn get(&self, fd: Fd) -> FsResult<&Descriptor> {
        self.open.get(&fd).ok_or(FsError::FdNotFound(fd))
    }

    /// Descriptor of `fd`, which must be open for reading.
    pub fn readable(&self, fd: Fd) -> FsResult<&Descriptor> {
        let descriptor = self.get(fd)?;
        if !descriptor.flags.readable {
            return Err(FsError::NotReadable(descriptor.path.clone()));
        }
        Ok(descriptor)
    }

    /// Descriptor of `fd`, which must be open for writing.
    pub fn writable(&self, fd: Fd) -> FsResult<&Descriptor> {
        let descriptor = self.get(fd)?;
        if !descriptor.flags.writable {
            return Err(FsError::NotWritable(descriptor.path.clone()));
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod flags {
        use super::*;

        #[test]
        fn test_parse_known_flags() -> FsResult<()> {
            let r: OpenFlags = "r".parse()?;
            assert!(r.readable && !r.writable && r.must_exist);

            let rw: OpenFlags = "rs+".parse()?;
            assert!(rw.readable && rw.writable && rw.must_exist);

            let wx: OpenFlags = "wx+".parse()?;
            assert!(wx.readable && wx.writable && wx.exclusive && wx.creates());

            let a: OpenFlags = "a".parse()?;
            assert!(!a.readable && a.writable && a.append && a.creates());

            let w: OpenFlags = "w".parse()?;
            assert!(!w.readable && w.writable && !w.exclusive && !w.append);
            Ok(())
        }

        #[test]
        fn test_parse_unknown_flags() {
            let result = "rw".parse::<OpenFlags>();
            assert_eq!(result, Err(FsError::InvalidFlags("rw".to_string())));
        }
    }

    mod table {
        use super::*;

        #[test]
        fn test_handles_are_never_reused() -> FsResult<()> {
            let mut table = DescriptorTable::new();
            let first = table.allocate("/a".into(), OpenFlags::READ);
            let second = table.allocate("/b".into(), OpenFlags::READ);
            assert_eq!((first, second), (Fd(0), Fd(1)));

            table.close(first)?;
            assert!(!table.has(first));
            let third = table.allocate("/c".into(), OpenFlags::READ);
            assert_eq!(third, Fd(2));
            assert!(table.has(second) && table.has(third));
            Ok(())
        }

        #[test]
        fn test_close_unknown_handle() {
            let mut table = DescriptorTable::new();
            let err = table.close(Fd(7)).unwrap_err();
            assert_eq!(err, FsError::FdNotFound(Fd(7)));
            assert!(err.to_string().contains("7"));
        }

        #[test]
        fn test_mode_checks() {
            let mut table = DescriptorTable::new();
            let read = table.allocate("/a".into(), OpenFlags::READ);
            let write = table.allocate("/a".into(), OpenFlags::WRITE);

            assert!(table.readable(read).is_ok());
            assert_eq!(
                table.writable(read).unwrap_err(),
                FsError::NotWritable("/a".to_string())
            );
            assert!(table.writable(write).is_ok());
            assert_eq!(
                table.readable(write).unwrap_err(),
                FsError::NotReadable("/a".to_string())
            );
            assert_eq!(table.readable(Fd(9)).unwrap_err(), FsError::FdNotFound(Fd(9)));
        }
    }
}
