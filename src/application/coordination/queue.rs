//! Keyed FIFO task queue - one task at a time per key

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::task::TaskTracker;

use super::panic_message;
use crate::application::errors::BotError;

/// Result of a queued task. Errors are logged and swallowed by the queue.
pub type TaskResult = Result<(), BotError>;

type QueuedTask = BoxFuture<'static, TaskResult>;

/// Composite key of a queue: a queue name plus an id inside that queue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub name: String,
    pub id: String,
}

impl QueueKey {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.id)
    }
}

/// Serializes async tasks registered under the same [`QueueKey`].
///
/// Tasks under one key run strictly in arrival order, one at a time,
/// including tasks enqueued while an earlier one is still running. Different
/// keys drain concurrently. A key's record lives exactly as long as its
/// drain loop, so an enqueue either joins a running drain or starts one.
#[derive(Clone)]
pub struct KeyedAsyncQueue {
    queues: Arc<Mutex<HashMap<QueueKey, VecDeque<QueuedTask>>>>,
    tracker: TaskTracker,
}

impl KeyedAsyncQueue {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueueKey, VecDeque<QueuedTask>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `task` to the queue `name/id`; starts draining if the key was idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue<F>(&self, name: impl Into<String>, id: impl Into<String>, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let key = QueueKey::new(name, id);
        let start_drain = match self.lock().entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push_back(task.boxed());
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::from([task.boxed()]));
                true
            }
        };

        if start_drain {
            tracing::trace!(queue = %key, "Starting queue drain");
            let this = self.clone();
            self.tracker.spawn(async move { this.drain(key).await });
        }
    }

    async fn drain(self, key: QueueKey) {
        loop {
            let next = {
                let mut queues = self.lock();
                let Some(tasks) = queues.get_mut(&key) else {
                    return;
                };
                match tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        queues.remove(&key);
                        return;
                    }
                }
            };

            match AssertUnwindSafe(next).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(queue = %key, "Queued task failed: {}", e),
                Err(panic) => {
                    tracing::error!(queue = %key, "Queued task panicked: {}", panic_message(panic.as_ref()))
                }
            }
        }
    }

    /// Number of tasks waiting behind the running one for `name/id`
    pub fn pending(&self, name: &str, id: &str) -> usize {
        self.lock()
            .get(&QueueKey::new(name, id))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Whether a drain loop currently owns `name/id`
    pub fn is_active(&self, name: &str, id: &str) -> bool {
        self.lock().contains_key(&QueueKey::new(name, id))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait until every drain loop started so far has finished
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for KeyedAsyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_same_key_runs_in_arrival_order() {
        let queue = KeyedAsyncQueue::new();
        let log: Log = Arc::default();
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let l = log.clone();
        queue.enqueue("status", "guild", async move {
            push(&l, "t1 start");
            let _ = started_tx.send(());
            let _ = release_rx.await;
            push(&l, "t1 end");
            Ok(())
        });

        started_rx.await.unwrap();
        for name in ["t2", "t3"] {
            let l = log.clone();
            queue.enqueue("status", "guild", async move {
                push(&l, name);
                Ok(())
            });
        }
        assert_eq!(queue.pending("status", "guild"), 2);

        release_tx.send(()).unwrap();
        queue.wait_idle().await;

        assert_eq!(entries(&log), vec!["t1 start", "t1 end", "t2", "t3"]);
        assert!(!queue.is_active("status", "guild"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let queue = KeyedAsyncQueue::new();
        let log: Log = Arc::default();
        let (tx, rx) = oneshot::channel::<()>();

        let l = log.clone();
        queue.enqueue("status", "k", async move {
            let _ = rx.await;
            push(&l, "k");
            Ok(())
        });
        let l = log.clone();
        queue.enqueue("status", "l", async move {
            push(&l, "l");
            let _ = tx.send(());
            Ok(())
        });

        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .expect("queues for different keys must drain independently");
        assert_eq!(entries(&log), vec!["l", "k"]);
    }

    async fn explode() -> TaskResult {
        panic!("task blew up")
    }

    #[tokio::test]
    async fn test_failing_tasks_do_not_stall_draining() {
        let queue = KeyedAsyncQueue::new();
        let log: Log = Arc::default();

        queue.enqueue("status", "guild", async { Err(BotError::Internal("boom".to_string())) });
        queue.enqueue("status", "guild", explode());
        let l = log.clone();
        queue.enqueue("status", "guild", async move {
            push(&l, "survivor");
            Ok(())
        });

        queue.wait_idle().await;
        assert_eq!(entries(&log), vec!["survivor"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_task_enqueued_from_running_task_runs_after_it() {
        let queue = KeyedAsyncQueue::new();
        let log: Log = Arc::default();

        let inner_queue = queue.clone();
        let l = log.clone();
        queue.enqueue("status", "guild", async move {
            let l2 = l.clone();
            inner_queue.enqueue("status", "guild", async move {
                push(&l2, "second");
                Ok(())
            });
            tokio::task::yield_now().await;
            push(&l, "first");
            Ok(())
        });

        queue.wait_idle().await;
        assert_eq!(entries(&log), vec!["first", "second"]);
    }
}
