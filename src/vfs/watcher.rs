use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use crate::vfs::stats::{Notification, ObserverList, Stats};

/// Event name delivered to watch listeners.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    Change,
    Rename,
}

impl WatchEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchEvent::Change => "change",
            WatchEvent::Rename => "rename",
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One watch subscription. Closing it detaches only this listener.
///
/// Dropping a `Watcher` without calling [`Watcher::close`] keeps the listener attached for as
/// long as the watched node lives.
pub struct Watcher {
    observers: Weak<RefCell<ObserverList>>,
    id: u64,
}

impl Watcher {
    /// Binds `listener` to the metadata record `stats`.
    ///
    /// Content changes arrive as `(Change, path)`, attribute changes as `(event, path)` where
    /// `path` is the path the record is currently registered under.
    pub(crate) fn attach<F>(stats: &Stats, mut listener: F) -> Self
    where
        F: FnMut(WatchEvent, &str) + 'static,
    {
        let (observers, id) = stats.subscribe(move |notification, path| match notification {
            Notification::Modified => listener(WatchEvent::Change, path),
            Notification::ModifiedAttributes(event) => listener(event, path),
        });
        Self { observers, id }
    }

    pub fn close(&self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.borrow_mut().remove(self.id);
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::EntryType;
    use std::rc::Rc;

    #[test]
    fn test_republishes_notifications() {
        let mut stats = Stats::new("/var/www/index.php", EntryType::File, 1, 0o666);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _watcher = Watcher::attach(&stats, move |event, path| {
            sink.borrow_mut().push((event.as_str(), path.to_string()))
        });

        stats.touch_content();
        stats.touch_attributes(WatchEvent::Change);
        stats.set_path("/var/www/default.php");
        stats.touch_attributes(WatchEvent::Rename);

        assert_eq!(
            *seen.borrow(),
            vec![
                ("change", "/var/www/index.php".to_string()),
                ("change", "/var/www/index.php".to_string()),
                ("rename", "/var/www/default.php".to_string()),
            ]
        );
    }

    #[test]
    fn test_close_detaches_only_one_listener() {
        let mut stats = Stats::new("/a", EntryType::File, 1, 0o666);
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&first);
        let watcher = Watcher::attach(&stats, move |_, _| *counter.borrow_mut() += 1);
        let counter = Rc::clone(&second);
        let _other = Watcher::attach(&stats, move |_, _| *counter.borrow_mut() += 1);

        watcher.close();
        stats.touch_content();

        assert_eq!(*first.borrow(), 0);
        assert_eq!(*second.borrow(), 1);
    }
}
