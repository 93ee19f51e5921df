//! Deferred work for the assistant session.
//!
//! The session never touches platform timers directly. It asks a [`Scheduler`]
//! to run a job once after a delay or repeatedly on a period, and cancels by
//! [`TimerId`]. [`TokioScheduler`] drives real time; [`ManualScheduler`] keeps a
//! virtual clock that only moves when told to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

pub type Job = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingJob = Box<dyn FnMut() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,
}

pub trait Scheduler: Send + Sync {
    /// Wall-clock instant used to stamp new messages.
    fn now(&self) -> OffsetDateTime;

    fn schedule_once(&self, delay: Duration, job: Job) -> TimerId;

    /// First run happens one full `period` after scheduling.
    fn schedule_every(&self, period: Duration, job: RepeatingJob) -> TimerId;

    /// Unknown or already finished timers are ignored.
    fn cancel(&self, id: TimerId);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================
// Tokio-backed scheduler
// ============================================

pub struct TokioScheduler {
    handle: Handle,
    counter: AtomicU64,
    tasks: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling thread.
    pub fn try_current() -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            counter: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn next_id(&self) -> TimerId {
        TimerId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of timers that have neither fired (one-shot) nor been cancelled.
    pub fn active(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn schedule_once(&self, delay: Duration, job: Job) -> TimerId {
        let id = self.next_id();
        let tasks = Arc::clone(&self.tasks);
        // Hold the map while spawning so the task cannot remove its entry
        // before it has been inserted.
        let mut guard = lock(&self.tasks);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&tasks).remove(&id);
            job();
        });
        guard.insert(id, task.abort_handle());
        id
    }

    fn schedule_every(&self, period: Duration, mut job: RepeatingJob) -> TimerId {
        let id = self.next_id();
        let start = tokio::time::Instant::now() + period;
        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                job();
            }
        });
        lock(&self.tasks).insert(id, task.abort_handle());
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(task) = lock(&self.tasks).remove(&id) {
            task.abort();
        }
    }
}

// ============================================
// Virtual-time scheduler
// ============================================

enum PendingJob {
    Once(Job),
    Every { period: Duration, job: RepeatingJob },
}

struct ManualState {
    elapsed: Duration,
    next_id: u64,
    next_seq: u64,
    // keyed by (due, scheduling sequence) so equal due times run in order
    queue: BTreeMap<(Duration, u64), (TimerId, PendingJob)>,
    live: HashSet<TimerId>,
}

impl ManualState {
    fn push(&mut self, due: Duration, id: TimerId, job: PendingJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due, seq), (id, job));
    }
}

/// Scheduler whose clock only moves through [`ManualScheduler::advance`].
pub struct ManualScheduler {
    epoch: OffsetDateTime,
    state: Mutex<ManualState>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(OffsetDateTime::UNIX_EPOCH)
    }
}

impl ManualScheduler {
    pub fn new(epoch: OffsetDateTime) -> Self {
        Self {
            epoch,
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                next_id: 1,
                next_seq: 0,
                queue: BTreeMap::new(),
                live: HashSet::new(),
            }),
        }
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed
    }

    /// Timers scheduled and not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Move the clock forward, running every job that comes due on the way.
    /// Jobs run without the scheduler lock held, so they may schedule or
    /// cancel other timers, including themselves.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.state).elapsed + by;
        loop {
            let next = {
                let mut state = lock(&self.state);
                let due = match state.queue.first_key_value() {
                    Some((&(due, _), _)) if due <= target => due,
                    _ => break,
                };
                state.elapsed = due;
                state.queue.pop_first().map(|(_, entry)| (due, entry))
            };
            let Some((due, (id, job))) = next else { break };

            match job {
                PendingJob::Once(job) => {
                    lock(&self.state).live.remove(&id);
                    job();
                }
                PendingJob::Every { period, mut job } => {
                    job();
                    let mut state = lock(&self.state);
                    if state.live.contains(&id) {
                        state.push(due + period, id, PendingJob::Every { period, job });
                    }
                }
            }
        }
        let mut state = lock(&self.state);
        if state.elapsed < target {
            state.elapsed = target;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> OffsetDateTime {
        self.epoch + lock(&self.state).elapsed
    }

    fn schedule_once(&self, delay: Duration, job: Job) -> TimerId {
        let mut state = lock(&self.state);
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let due = state.elapsed + delay;
        state.live.insert(id);
        state.push(due, id, PendingJob::Once(job));
        id
    }

    fn schedule_every(&self, period: Duration, job: RepeatingJob) -> TimerId {
        // a zero period would never let `advance` make progress
        let period = period.max(Duration::from_nanos(1));
        let mut state = lock(&self.state);
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let due = state.elapsed + period;
        state.live.insert(id);
        state.push(due, id, PendingJob::Every { period, job });
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut state = lock(&self.state);
        if state.live.remove(&id) {
            state.queue.retain(|_, (queued, _)| *queued != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let hits = Arc::new(AtomicUsize::new(0));
        let read = {
            let hits = Arc::clone(&hits);
            move || hits.load(Ordering::SeqCst)
        };
        (hits, read)
    }

    #[test]
    fn test_manual_once_fires_at_delay() {
        let scheduler = ManualScheduler::default();
        let (hits, read) = counter();
        scheduler.schedule_once(
            Duration::from_millis(800),
            Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.advance(Duration::from_millis(799));
        assert_eq!(read(), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(read(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_every_repeats_until_cancelled() {
        let scheduler = ManualScheduler::default();
        let (hits, read) = counter();
        let id = scheduler.schedule_every(
            Duration::from_secs(30),
            Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.advance(Duration::from_secs(95));
        assert_eq!(read(), 3);
        scheduler.cancel(id);
        scheduler.advance(Duration::from_secs(300));
        assert_eq!(read(), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_runs_jobs_in_due_order() {
        let scheduler = ManualScheduler::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, delay) in [("late", 20), ("early", 10), ("tied", 10)] {
            let order = Arc::clone(&order);
            scheduler.schedule_once(
                Duration::from_millis(delay),
                Box::new(move || order.lock().unwrap().push(label)),
            );
        }
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*order.lock().unwrap(), vec!["early", "tied", "late"]);
    }

    #[test]
    fn test_manual_clock_tracks_epoch() {
        let scheduler = ManualScheduler::default();
        scheduler.advance(Duration::from_secs(90));
        assert_eq!(scheduler.elapsed(), Duration::from_secs(90));
        assert_eq!(
            scheduler.now(),
            OffsetDateTime::UNIX_EPOCH + Duration::from_secs(90)
        );
    }

    #[test]
    fn test_job_may_schedule_follow_up() {
        let scheduler = Arc::new(ManualScheduler::default());
        let (hits, read) = counter();
        let inner = Arc::clone(&scheduler);
        scheduler.schedule_once(
            Duration::from_millis(10),
            Box::new(move || {
                inner.schedule_once(
                    Duration::from_millis(10),
                    Box::new(move || {
                        hits.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );
        scheduler.advance(Duration::from_millis(20));
        assert_eq!(read(), 1);
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        assert!(matches!(
            TokioScheduler::try_current(),
            Err(SchedulerError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_once_and_cancel() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let (fired, read_fired) = counter();
        let (dropped, read_dropped) = counter();

        scheduler.schedule_once(
            Duration::from_millis(800),
            Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let cancelled = scheduler.schedule_once(
            Duration::from_millis(800),
            Box::new(move || {
                dropped.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.cancel(cancelled);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(read_fired(), 1);
        assert_eq!(read_dropped(), 0);
        assert_eq!(scheduler.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_every_ticks_on_period() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let (hits, read) = counter();
        let id = scheduler.schedule_every(
            Duration::from_secs(30),
            Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(read(), 0);
        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(read(), 3);

        scheduler.cancel(id);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(read(), 3);
    }
}
