use std::time::Duration;

use devshell_mux::{Scheduler, Task};
use gloo_timers::future::TimeoutFuture;

/// Runs deferred multiplexer work on the browser's timer queue
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        // The timer callback is released once the future resolves; the task
        // itself checks whether it is still relevant
        let millis = timeout_millis(delay);
        wasm_bindgen_futures::spawn_local(async move {
            TimeoutFuture::new(millis).await;
            task();
        });
    }
}

fn timeout_millis(delay: Duration) -> u32 {
    u32::try_from(delay.as_millis()).unwrap_or(u32::MAX)
}
