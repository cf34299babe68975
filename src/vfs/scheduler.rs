//! Cooperative queue of deferred tasks.
//!
//! Nothing runs in the background: tasks run only when the owner ticks the queue with
//! [`TaskQueue::run_pending`] or drains it with [`TaskQueue::run_until_idle`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// FIFO of deferred closures. Clones share the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` for the next turn.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Runs one turn: every task queued before the call, in order. Tasks deferred while the turn
    /// runs wait for the next one. Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    /// Runs turns until the queue stays empty.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("pending", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_order_on_tick() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.defer(move || log.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_nested_defer_waits_for_next_turn() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_log = Rc::clone(&log);
        queue.defer(move || {
            inner_log.borrow_mut().push("outer");
            let log = Rc::clone(&inner_log);
            inner_queue.defer(move || log.borrow_mut().push("inner"));
        });

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_run_until_idle() {
        let queue = TaskQueue::new();
        let inner = queue.clone();
        queue.defer(move || inner.defer(|| {}));

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(queue.run_until_idle(), 0);
    }
}
