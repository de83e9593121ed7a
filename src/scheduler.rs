//! Tick-based deferred execution.
//!
//! The host runs on a fixed tick; a few actor behaviours (the delayed listing
//! removal) are expressed in ticks rather than wall time. [`TickScheduler`]
//! keeps a queue of `(due tick, task)` pairs and runs them when [`tick`] is
//! called, either manually (tests, embedding hosts) or from a Tokio interval
//! started with [`TickScheduler::spawn_driver`].
//!
//! [`tick`]: TickScheduler::tick

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Scheduled {
    due: u64,
    task: Task,
}

#[derive(Default)]
pub struct TickScheduler {
    current: AtomicU64,
    queue: Mutex<Vec<Scheduled>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tick(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run `task` once `ticks` further ticks have elapsed. `0` runs it on
    /// the next tick.
    pub fn run_later<F>(&self, ticks: u32, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let due = self.current_tick() + u64::from(ticks.max(1));
        self.queue.lock().push(Scheduled {
            due,
            task: Box::new(task),
        });
    }

    /// Advance one tick and run everything that became due, in submission
    /// order. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let due: Vec<Scheduled> = {
            let mut queue = self.queue.lock();
            let (due, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|s| s.due <= now);
            *queue = rest;
            due
        };
        // Tasks run without the queue lock so they may schedule more work.
        let ran = due.len();
        for scheduled in due {
            (scheduled.task)();
        }
        ran
    }

    /// Drive [`tick`](Self::tick) at `tick_rate_hz` until the task is
    /// aborted.
    #[cfg(feature = "runtime")]
    pub fn spawn_driver(self: Arc<Self>, tick_rate_hz: f32) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs_f32(1.0 / tick_rate_hz.max(1.0));
            let mut timer = tokio::time::interval(interval);
            log::debug!("scheduler driver ticking at {:.0}Hz", tick_rate_hz);
            loop {
                timer.tick().await;
                self.tick();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn task_runs_exactly_after_delay() {
        let scheduler = TickScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        scheduler.run_later(2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(scheduler.tick(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_may_reschedule_from_inside_a_tick() {
        let scheduler = Arc::new(TickScheduler::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (scheduler.clone(), hits.clone());
        scheduler.run_later(1, move || {
            let counter = counter.clone();
            inner.run_later(1, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        scheduler.tick();
        assert_eq!(scheduler.pending(), 1);
        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
