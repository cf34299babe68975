//! Error taxonomy of the mock filesystem.

use std::io;

use crate::vfs::Fd;

/// Every failure of a filesystem operation.
///
/// All of them are precondition failures raised before any mutation happens, so an operation
/// either applies completely or leaves the filesystem untouched. Messages always carry the
/// canonical path or the descriptor number involved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("File or directory '{0}' does not exist.")]
    NotFound(String),
    #[error("File or directory '{0}' already exists.")]
    AlreadyExists(String),
    #[error("Path '{0}' is not a file.")]
    NotFile(String),
    #[error("Path '{0}' is not a directory.")]
    NotDirectory(String),
    #[error("Path '{0}' is not a symbolic link.")]
    NotSymlink(String),
    #[error("Directory '{0}' is not empty.")]
    DirectoryNotEmpty(String),
    #[error("File descriptor {0} does not exist.")]
    FdNotFound(Fd),
    #[error("File '{0}' is not open for reading.")]
    NotReadable(String),
    #[error("File '{0}' is not open for writing.")]
    NotWritable(String),
    #[error("Method '{0}' is not implemented.")]
    NotImplemented(&'static str),
    #[error("Path '{0}' is a root directory and cannot be removed.")]
    Busy(String),
    #[error("Unknown file open flags '{0}'.")]
    InvalidFlags(String),
}

impl FsError {
    /// The closest `std::io::ErrorKind` for this failure.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::NotFile(_) => io::ErrorKind::IsADirectory,
            FsError::NotDirectory(_) => io::ErrorKind::NotADirectory,
            FsError::NotSymlink(_) | FsError::InvalidFlags(_) => io::ErrorKind::InvalidInput,
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::FdNotFound(_) | FsError::NotReadable(_) | FsError::NotWritable(_) => {
                io::ErrorKind::PermissionDenied
            }
            FsError::NotImplemented(_) => io::ErrorKind::Unsupported,
            FsError::Busy(_) => io::ErrorKind::ResourceBusy,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

pub type FsResult<T> = Result<T, FsError>;
