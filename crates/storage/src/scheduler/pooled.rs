use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

use super::{EvictionScheduler, Job, JobHandle, due_after, run_job};

/// Job na fila: (deadline, id) ordena a fila e identifica o job no cancel.
struct QueuedJob {
    handle: JobHandle,
    job: Job,
}

impl QueuedJob {
    fn run(self) {
        if !self.handle.try_start() {
            return;
        }
        run_job(&self.handle, self.job);
    }
}

/// Estado compartilhado entre o scheduler e seus workers.
struct PoolShared {
    queue: Mutex<BTreeMap<(Instant, u64), QueuedJob>>,
    notify: Notify,
    shutdown: AtomicBool,
}

/// Pool fixo de workers que consomem uma fila de jobs ordenada por deadline.
///
/// O uso de recursos não depende do número de chaves vivas. Sob churn alto os
/// jobs apenas esperam na fila (sem limite de tamanho), trocando latência de
/// eviction por memória e threads limitadas.
pub struct PooledScheduler {
    shared: Arc<PoolShared>,
    workers: usize,
    next_id: AtomicU64,
}

impl PooledScheduler {
    /// Cria o pool e sobe `workers` tasks (no mínimo uma).
    ///
    /// # Panics
    ///
    /// Panics fora de um runtime Tokio.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(BTreeMap::new()),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        });

        for worker in 0..workers {
            let shared = shared.clone();
            tokio::spawn(async move {
                run_worker(worker, shared).await;
            });
        }
        debug!(workers, "pool de eviction iniciado");

        Self {
            shared,
            workers,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl EvictionScheduler for PooledScheduler {
    fn schedule(&self, delay: Duration, job: Job) -> JobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = JobHandle::new(id, due_after(delay));
        let key = (handle.due(), id);

        let is_head = {
            let mut queue = self.shared.queue.lock();
            queue.insert(
                key,
                QueuedJob {
                    handle: handle.clone(),
                    job,
                },
            );
            queue.first_key_value().map(|(k, _)| *k) == Some(key)
        };

        // Só acorda os workers se o próximo deadline mudou
        if is_head {
            self.shared.notify.notify_waiters();
        }
        handle
    }

    fn cancel(&self, handle: &JobHandle) -> bool {
        if !handle.try_cancel() {
            return false;
        }
        self.shared
            .queue
            .lock()
            .remove(&(handle.due(), handle.id()));
        trace!(job = handle.id(), "job do pool cancelado");
        true
    }

    fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }
}

impl Drop for PooledScheduler {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.queue.lock().clear();
        self.shared.notify.notify_waiters();
    }
}

/// Loop de um worker: espera o deadline do topo da fila e executa o job.
async fn run_worker(worker: usize, shared: Arc<PoolShared>) {
    loop {
        // Registrar interesse antes de olhar a fila para não perder um notify
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let now = Instant::now();
        let (ready, next_due) = {
            let mut queue = shared.queue.lock();
            match queue.first_entry() {
                Some(entry) if entry.key().0 <= now => (Some(entry.remove()), None),
                Some(entry) => (None, Some(entry.key().0)),
                None => (None, None),
            }
        };

        if let Some(job) = ready {
            job.run();
            tokio::task::yield_now().await;
            continue;
        }

        match next_due {
            Some(when) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(when) => {}
                    _ = notified.as_mut() => {}
                }
            }
            None => notified.await,
        }
    }
    debug!(worker, "worker de eviction encerrado");
}
