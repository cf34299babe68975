//! Read and write streams over descriptors.
//!
//! All I/O happens synchronously when the stream is created (read) or written to (write). Only
//! the events are deferred: they fire when the filesystem's task queue is run, the way a platform
//! stream reports `open` on the next turn.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::{FdBackend, FsError, FsResult};
use crate::vfs::scheduler::TaskQueue;
use crate::vfs::{Fd, MockFs};

/// Event emitted by a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open(Fd),
    /// The whole requested range, as a single chunk.
    Data(Vec<u8>),
    End,
    /// The write stream ended and its descriptor is closed.
    Finish,
    Error(FsError),
}

type Listener = Box<dyn FnMut(&StreamEvent)>;

/// Listeners of one stream, shared with the deferred emit tasks.
#[derive(Clone, Default)]
struct Emitter {
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl Emitter {
    fn subscribe(&self, listener: Listener) {
        self.listeners.borrow_mut().push(listener);
    }

    fn dispatch(&self, event: &StreamEvent) {
        let mut listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners.iter_mut() {
            listener(event);
        }
        let mut current = self.listeners.borrow_mut();
        let added = std::mem::replace(&mut *current, listeners);
        current.extend(added);
    }

    fn defer(&self, tasks: &TaskQueue, event: StreamEvent) {
        let emitter = self.clone();
        tasks.defer(move || emitter.dispatch(&event));
    }
}

/// Options of [`MockFs::create_read_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStreamOptions {
    pub flags: String,
    /// Read from an already open descriptor instead of opening the path.
    pub fd: Option<Fd>,
    /// Mode of a file created by the open.
    pub mode: u32,
    /// Close the descriptor once the content has been read.
    pub auto_close: bool,
    /// First byte of the range (inclusive).
    pub start: Option<u64>,
    /// End of the range (exclusive).
    pub end: Option<u64>,
}

impl Default for ReadStreamOptions {
    fn default() -> Self {
        Self {
            flags: "r".to_string(),
            fd: None,
            mode: 0o666,
            auto_close: true,
            start: None,
            end: None,
        }
    }
}

/// Stream of a file's content, read up front.
pub struct ReadStream {
    fd: Option<Fd>,
    emitter: Emitter,
}

impl ReadStream {
    pub(crate) fn open(fs: &mut MockFs, path: &str, options: ReadStreamOptions) -> Self {
        let tasks = fs.tasks();
        let emitter = Emitter::default();

        match Self::read_all(fs, path, &options) {
            Ok((fd, data)) => {
                debug!(%fd, path, bytes = data.len(), "read stream opened");
                emitter.defer(&tasks, StreamEvent::Open(fd));
                emitter.defer(&tasks, StreamEvent::Data(data));
                emitter.defer(&tasks, StreamEvent::End);
                Self {
                    fd: Some(fd),
                    emitter,
                }
            }
            Err(err) => {
                debug!(path, error = %err, "read stream failed");
                emitter.defer(&tasks, StreamEvent::Error(err));
                Self { fd: None, emitter }
            }
        }
    }

    fn read_all(
        fs: &mut MockFs,
        path: &str,
        options: &ReadStreamOptions,
    ) -> FsResult<(Fd, Vec<u8>)> {
        let fd = match options.fd {
            Some(fd) => fd,
            None => fs.open(path, &options.flags, Some(options.mode))?,
        };

        let result = fs.fstat(fd).and_then(|stats| {
            let mut buffer = vec![0; stats.size as usize];
            let length = buffer.len();
            let read = fs.read(fd, &mut buffer, 0, length, Some(0))?;
            buffer.truncate(read);
            Ok(buffer)
        });

        let opened_here = options.fd.is_none();
        if (options.auto_close || (result.is_err() && opened_here)) && fs.has_fd(fd) {
            fs.close(fd)?;
        }

        let data = result?;
        if options.start.is_none() && options.end.is_none() {
            return Ok((fd, data));
        }
        let len = data.len() as u64;
        let start = options.start.unwrap_or(0).min(len) as usize;
        let end = options.end.unwrap_or(len).clamp(start as u64, len) as usize;
        Ok((fd, data[start..end].to_vec()))
    }

    /// Descriptor the content was read from; `None` if the stream failed to open.
    pub fn fd(&self) -> Option<Fd> {
        self.fd
    }

    pub fn on_event<F>(&self, listener: F)
    where
        F: FnMut(&StreamEvent) + 'static,
    {
        self.emitter.subscribe(Box::new(listener));
    }
}

impl fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStream").field("fd", &self.fd).finish()
    }
}

/// Options of [`MockFs::create_write_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStreamOptions {
    pub flags: String,
    pub mode: u32,
    /// Position of the first write.
    pub start: u64,
}

impl Default for WriteStreamOptions {
    fn default() -> Self {
        Self {
            flags: "w".to_string(),
            mode: 0o666,
            start: 0,
        }
    }
}

/// Stream writing chunks at an advancing position.
///
/// Each chunk is spliced in at the cursor (see [`FdBackend::write`]). The first failure is
/// reported once as [`StreamEvent::Error`] and sticks: later writes fail with it and `end` emits
/// no [`StreamEvent::Finish`].
pub struct WriteStream {
    path: String,
    fd: Option<Fd>,
    position: u64,
    error: Option<FsError>,
    ended: bool,
    emitter: Emitter,
    tasks: TaskQueue,
}

impl WriteStream {
    pub(crate) fn open(fs: &mut MockFs, path: &str, options: WriteStreamOptions) -> Self {
        let tasks = fs.tasks();
        let emitter = Emitter::default();

        let (fd, error) = match fs.open(path, &options.flags, Some(options.mode)) {
            Ok(fd) => {
                debug!(%fd, path, "write stream opened");
                emitter.defer(&tasks, StreamEvent::Open(fd));
                (Some(fd), None)
            }
            Err(err) => {
                debug!(path, error = %err, "write stream failed");
                emitter.defer(&tasks, StreamEvent::Error(err.clone()));
                (None, Some(err))
            }
        };

        Self {
            path: path.to_string(),
            fd,
            position: options.start,
            error,
            ended: false,
            emitter,
            tasks,
        }
    }

    /// Writes `chunk` at the cursor and advances it.
    pub fn write(&mut self, fs: &mut MockFs, chunk: &[u8]) -> FsResult<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(fd) = self.fd.filter(|_| !self.ended) else {
            return Err(FsError::NotWritable(self.path.clone()));
        };

        match fs.write(fd, chunk, 0, chunk.len(), Some(self.position)) {
            Ok(written) => {
                self.position += written as u64;
                Ok(())
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Closes the descriptor. `Finish` follows unless the stream failed.
    pub fn end(&mut self, fs: &mut MockFs) -> FsResult<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        if let Some(fd) = self.fd {
            if let Err(err) = fs.close(fd) {
                self.fail(err.clone());
                return Err(err);
            }
            debug!(%fd, bytes = self.position, "write stream finished");
        }
        if self.error.is_none() {
            self.emitter.defer(&self.tasks, StreamEvent::Finish);
        }
        Ok(())
    }

    fn fail(&mut self, err: FsError) {
        if self.error.is_none() {
            self.emitter.defer(&self.tasks, StreamEvent::Error(err.clone()));
            self.error = Some(err);
        }
    }

    pub fn fd(&self) -> Option<Fd> {
        self.fd
    }

    /// Position of the next write.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn on_event<F>(&self, listener: F)
    where
        F: FnMut(&StreamEvent) + 'static,
    {
        self.emitter.subscribe(Box::new(listener));
    }
}

impl fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteStream")
            .field("path", &self.path)
            .field("fd", &self.fd)
            .field("position", &self.position)
            .field("error", &self.error)
            .field("ended", &self.ended)
            .finish()
    }
}
