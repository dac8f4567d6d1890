//! Keyed cancel-and-reschedule timers.
//!
//! Scheduling a task under a key aborts whatever was scheduled under that key
//! before, including a task whose delay already elapsed and is awaiting I/O.
//! Every task also receives a [`Ticket`]; a task should check it against a
//! [`TicketProbe`] before publishing results, which closes the gap where an
//! abort lands after the task's last await point.

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use tokio::{runtime::Handle, task::AbortHandle};
use tracing::debug;

use crate::util::lock;

/// Sequence number issued for one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

struct Slot {
    ticket: Ticket,
    handle: AbortHandle,
}

struct SchedulerState<K> {
    next: u64,
    slots: HashMap<K, Slot>,
}

impl<K> Default for SchedulerState<K> {
    fn default() -> Self {
        Self {
            next: 0,
            slots: HashMap::new(),
        }
    }
}

pub struct Scheduler<K> {
    runtime: Handle,
    state: Arc<Mutex<SchedulerState<K>>>,
}

impl<K> Drop for Scheduler<K> {
    fn drop(&mut self) {
        for (_, slot) in lock(&self.state).slots.drain() {
            slot.handle.abort();
        }
    }
}

impl<K> Scheduler<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Runs `task` after `delay`, superseding the task pending under `key`.
    pub fn schedule<F, Fut>(&self, key: K, delay: Duration, task: F) -> ScheduledTask<K>
    where
        F: FnOnce(Ticket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = lock(&self.state);
        state.next += 1;
        let ticket = Ticket(state.next);

        let weak = Arc::downgrade(&self.state);
        let slot_key = key.clone();
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task(ticket).await;
            release(&weak, &slot_key, ticket);
        });
        let handle = join.abort_handle();

        if let Some(previous) = state.slots.insert(
            key.clone(),
            Slot {
                ticket,
                handle: handle.clone(),
            },
        ) {
            debug!(?key, superseded = previous.ticket.0, "cancelling superseded task");
            previous.handle.abort();
        }

        ScheduledTask {
            key,
            ticket,
            handle,
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn cancel(&self, key: &K) {
        if let Some(slot) = lock(&self.state).slots.remove(key) {
            slot.handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        let slots: Vec<Slot> = lock(&self.state).slots.drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            slot.handle.abort();
        }
    }

    /// True while `ticket` is the most recent task issued for `key`.
    pub fn is_latest(&self, key: &K, ticket: Ticket) -> bool {
        lock(&self.state)
            .slots
            .get(key)
            .is_some_and(|slot| slot.ticket == ticket)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.state).slots.contains_key(key)
    }

    /// Detached view answering [`Scheduler::is_latest`] for one key; safe to
    /// move into the scheduled task itself.
    pub fn probe(&self, key: K) -> TicketProbe<K> {
        TicketProbe {
            key,
            state: Arc::downgrade(&self.state),
        }
    }
}

pub struct TicketProbe<K> {
    key: K,
    state: Weak<Mutex<SchedulerState<K>>>,
}

impl<K: Eq + Hash> TicketProbe<K> {
    /// False once a newer task was scheduled or the scheduler is gone.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        lock(&state)
            .slots
            .get(&self.key)
            .is_some_and(|slot| slot.ticket == ticket)
    }
}

fn release<K: Eq + Hash>(state: &Weak<Mutex<SchedulerState<K>>>, key: &K, ticket: Ticket) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = lock(&state);
    if state.slots.get(key).is_some_and(|slot| slot.ticket == ticket) {
        state.slots.remove(key);
    }
}

/// Handle to one scheduled task.
pub struct ScheduledTask<K> {
    key: K,
    ticket: Ticket,
    handle: AbortHandle,
    state: Weak<Mutex<SchedulerState<K>>>,
}

impl<K: Eq + Hash> ScheduledTask<K> {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn cancel(self) {
        self.handle.abort();
        release(&self.state, &self.key, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn rescheduling_supersedes_pending_task() {
        let scheduler: Scheduler<&'static str> = Scheduler::new(Handle::current());
        let runs = Arc::new(Mutex::new(Vec::new()));
        for draft in ["a", "ab", "abc"] {
            let runs = Arc::clone(&runs);
            scheduler.schedule("slug", Duration::from_millis(500), move |_| async move {
                runs.lock().unwrap().push(draft);
            });
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*runs.lock().unwrap(), vec!["abc"]);
        assert!(!scheduler.is_pending(&"slug"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent_and_cancellable() {
        let scheduler: Scheduler<u8> = Scheduler::new(Handle::current());
        let runs = Arc::new(AtomicUsize::new(0));
        let first = {
            let runs = Arc::clone(&runs);
            scheduler.schedule(1, Duration::from_millis(10), move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };
        {
            let runs = Arc::clone(&runs);
            scheduler.schedule(2, Duration::from_millis(10), move |_| async move {
                runs.fetch_add(10, Ordering::SeqCst);
            });
        }
        first.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn tickets_increase_and_track_latest() {
        let scheduler: Scheduler<u8> = Scheduler::new(Handle::current());
        let first = scheduler.schedule(1, Duration::from_secs(1), |_| async {});
        let second = scheduler.schedule(1, Duration::from_secs(1), |_| async {});
        assert!(second.ticket() > first.ticket());
        assert!(!scheduler.is_latest(&1, first.ticket()));
        assert!(scheduler.is_latest(&1, second.ticket()));
        let probe = scheduler.probe(1);
        assert!(probe.is_current(second.ticket()));
        scheduler.cancel_all();
        assert!(!scheduler.is_pending(&1));
        assert!(!probe.is_current(second.ticket()));
    }
}
