use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::time::Duration;
use tracing::trace;

use super::{EvictionScheduler, Job, JobHandle, due_after, run_job};

/// Mantém o contador de pendentes correto mesmo se a task for descartada sem
/// rodar (shutdown do runtime): o drop cancela o job se ele ainda estiver
/// pendente.
struct PendingGuard {
    handle: JobHandle,
    pending: Arc<AtomicUsize>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.handle.try_cancel() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Uma task dedicada por job: dorme até o deadline e executa o corpo.
///
/// Simples, mas o custo cresce com o número de chaves vivas: cada chave mantém
/// uma task suspensa. Para muitas chaves prefira [`super::PooledScheduler`].
#[derive(Debug, Default)]
pub struct DedicatedScheduler {
    next_id: AtomicU64,
    pending: Arc<AtomicUsize>,
}

impl DedicatedScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionScheduler for DedicatedScheduler {
    /// # Panics
    ///
    /// Panics fora de um runtime Tokio.
    fn schedule(&self, delay: Duration, job: Job) -> JobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handle = JobHandle::new(id, due_after(delay));

        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard {
            handle: handle.clone(),
            pending: self.pending.clone(),
        };

        let task = tokio::spawn(async move {
            let guard = guard;
            tokio::time::sleep_until(guard.handle.due()).await;
            if !guard.handle.try_start() {
                return;
            }
            guard.pending.fetch_sub(1, Ordering::AcqRel);
            run_job(&guard.handle, job);
        });

        handle.set_abort(task.abort_handle());
        handle
    }

    fn cancel(&self, handle: &JobHandle) -> bool {
        if !handle.try_cancel() {
            return false;
        }
        self.pending.fetch_sub(1, Ordering::AcqRel);
        // Libera a task suspensa em vez de esperar o sleep acabar
        handle.abort();
        trace!(job = handle.id(), "job dedicado cancelado");
        true
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
