//! Thread pools used to parallelize compilation and symbol extraction.
//!
//! Two distinct disciplines, intentionally kept as two named types rather
//! than one configurable queue:
//!
//! - [`WorkQueue`]: bounded fan-out. A single producer pushes tasks to N
//!   persistent workers, and blocks whenever a previously pushed task has
//!   not yet been picked up (effective queue depth of one). This bounds
//!   memory and concurrent subprocess count at roughly N.
//! - [`BackgroundQueue`]: a cancelable single-worker queue for long-running
//!   restartable work. Pushes never block; [`BackgroundQueue::stop_and_wait`]
//!   discards whatever is still queued so a newer request supersedes an
//!   older one instead of queueing behind it.
//!
//! Both use one mutex plus condition variables, so exactly one thread
//! mutates the underlying deque at a time.

use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Number of worker threads to use for hardware-bound work.
pub fn num_hardware_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

struct WaitQueueInner<T> {
    items: VecDeque<T>,
    quit: bool,
}

struct WaitQueueState<T> {
    inner: Mutex<WaitQueueInner<T>>,
    // Producer pushed an item, or wants consumers to re-check the queue.
    pushed: Condvar,
    // A consumer popped an item.
    popped: Condvar,
}

impl<T> WaitQueueState<T> {
    fn new() -> Self {
        WaitQueueState {
            inner: Mutex::new(WaitQueueInner {
                items: VecDeque::new(),
                quit: false,
            }),
            pushed: Condvar::new(),
            popped: Condvar::new(),
        }
    }

    /// Waits until the queue slot is free before depositing the item.
    fn wait_push(&self, item: T) {
        let mut inner = self.inner.lock();
        while !inner.items.is_empty() && !inner.quit {
            self.popped.wait(&mut inner);
        }
        inner.items.push_back(item);
        self.pushed.notify_one();
    }

    /// Waits until an item is available or the queue is closed. After close,
    /// remaining items are still drained before `None` is returned.
    fn wait_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.quit {
            self.pushed.wait(&mut inner);
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.popped.notify_one();
        }
        item
    }

    fn quit_pops(&self) {
        let mut inner = self.inner.lock();
        inner.quit = true;
        self.pushed.notify_all();
        self.popped.notify_all();
    }

    fn reset(&self) {
        self.inner.lock().quit = false;
    }
}

/// Bounded producer/N-consumer work queue.
///
/// `setup` starts the pool, `add_task` feeds it with backpressure, and
/// `wait_for_completion` drains and joins. The queue is re-entrant: calling
/// `setup` again after `wait_for_completion` starts a fresh pool.
pub struct WorkQueue<T: Send + 'static> {
    state: Arc<WaitQueueState<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new() -> Self {
        WorkQueue {
            state: Arc::new(WaitQueueState::new()),
            workers: Vec::new(),
        }
    }

    /// Start `num_threads` persistent workers, each looping pop/process until
    /// the queue is closed. Does nothing if workers are already running.
    pub fn setup<F>(&mut self, num_threads: usize, process_item: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if !self.workers.is_empty() {
            return;
        }
        self.state.reset();
        let process_item = Arc::new(process_item);
        for _ in 0..num_threads.max(1) {
            let state = self.state.clone();
            let process_item = process_item.clone();
            self.workers.push(thread::spawn(move || {
                while let Some(item) = state.wait_pop() {
                    process_item(item);
                }
            }));
        }
    }

    /// Blocks while a previously pushed task has not yet been dequeued.
    pub fn add_task(&self, item: T) {
        self.state.wait_push(item);
    }

    /// Close the queue, wake all waiters, drain remaining items, and join
    /// the workers. Safe to call with an empty queue or no workers.
    pub fn wait_for_completion(&mut self) {
        self.state.quit_pops();
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.join() {
                tracing::error!("Worker thread panicked: {:?}", e);
            }
        }
    }
}

impl<T: Send + 'static> Drop for WorkQueue<T> {
    fn drop(&mut self) {
        self.wait_for_completion();
    }
}

struct BackgroundInner<T> {
    items: VecDeque<T>,
    quit: bool,
    working: bool,
}

struct BackgroundState<T> {
    inner: Mutex<BackgroundInner<T>>,
    pushed: Condvar,
    idle: Condvar,
}

/// Cancelable single-consumer background queue.
///
/// The worker thread is spawned lazily on the first push. Cancellation is
/// cooperative: the stop flag is observed between items, so cancellation
/// latency is bounded by one item's processing time.
pub struct BackgroundQueue<T: Send + 'static> {
    state: Arc<BackgroundState<T>>,
    worker: Option<JoinHandle<()>>,
    process_item: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T: Send + 'static> BackgroundQueue<T> {
    pub fn new<F>(process_item: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        BackgroundQueue {
            state: Arc::new(BackgroundState {
                inner: Mutex::new(BackgroundInner {
                    items: VecDeque::new(),
                    quit: false,
                    working: false,
                }),
                pushed: Condvar::new(),
                idle: Condvar::new(),
            }),
            worker: None,
            process_item: Arc::new(process_item),
        }
    }

    /// Non-blocking push. Spawns the worker if it is not running.
    pub fn add_task(&mut self, item: T) {
        {
            let mut inner = self.state.inner.lock();
            inner.quit = false;
            inner.items.push_back(item);
            self.state.pushed.notify_one();
        }
        if self.worker.is_none() {
            let state = self.state.clone();
            let process_item = self.process_item.clone();
            self.worker = Some(thread::spawn(move || loop {
                let item = {
                    let mut inner = state.inner.lock();
                    while inner.items.is_empty() && !inner.quit {
                        state.pushed.wait(&mut inner);
                    }
                    if inner.quit && inner.items.is_empty() {
                        break;
                    }
                    let item = inner.items.pop_front();
                    inner.working = item.is_some();
                    item
                };
                if let Some(item) = item {
                    process_item(item);
                    let mut inner = state.inner.lock();
                    inner.working = false;
                    state.idle.notify_all();
                }
            }));
        }
    }

    pub fn is_busy(&self) -> bool {
        let inner = self.state.inner.lock();
        !inner.items.is_empty() || inner.working
    }

    /// Drain remaining items, then stop the worker and join it.
    pub fn wait_for_completion(&mut self) {
        {
            let mut inner = self.state.inner.lock();
            inner.quit = true;
            self.state.pushed.notify_all();
        }
        self.join_worker();
    }

    /// Cancel: discard all queued items without processing them, then stop
    /// the worker after its current item (if any) finishes.
    pub fn stop_and_wait(&mut self) {
        {
            let mut inner = self.state.inner.lock();
            inner.items.clear();
            inner.quit = true;
            self.state.pushed.notify_all();
        }
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.join() {
                tracing::error!("Background worker panicked: {:?}", e);
            }
        }
    }
}

impl<T: Send + 'static> Drop for BackgroundQueue<T> {
    fn drop(&mut self) {
        self.stop_and_wait();
    }
}
