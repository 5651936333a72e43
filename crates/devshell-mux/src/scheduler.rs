use std::time::Duration;

/// A deferred unit of work
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks after a delay on the same logical thread as the caller.
///
/// Tasks may outlive the tab that scheduled them; every task re-checks that
/// its tab still exists before acting.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: Task);
}
