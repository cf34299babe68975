mod callback;
mod descriptor;
mod entry;
mod mock_fs;
mod namespace;
mod scheduler;
mod stats;
mod stream;
mod watcher;

pub use callback::Callbacks;
pub use descriptor::{Fd, OpenFlags};
pub use entry::{Entry, EntryType, Tree, TreeContent};
pub use mock_fs::MockFs;
pub use scheduler::TaskQueue;
pub use stats::{Notification, SetAttributes, Stats};
pub use stream::{ReadStream, ReadStreamOptions, StreamEvent, WriteStream, WriteStreamOptions};
pub use watcher::{WatchEvent, Watcher};
