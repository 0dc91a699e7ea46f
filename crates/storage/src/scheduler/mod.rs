//! Abstração de agendamento dos jobs de eviction.
//!
//! Um scheduler executa um callback não antes de um atraso pedido e devolve um
//! [`JobHandle`] que permite cancelar o job enquanto ele ainda não começou.
//! O cancelamento é sempre best-effort: quem agenda não pode assumir que ele
//! venceu a corrida contra a execução.

mod dedicated;
mod pooled;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::warn;

pub use dedicated::DedicatedScheduler;
pub use pooled::PooledScheduler;

/// Corpo de um job agendado.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Contrato comum aos backends de eviction.
pub trait EvictionScheduler: Send + Sync + 'static {
    /// Agenda `job` para rodar depois de `delay`.
    fn schedule(&self, delay: Duration, job: Job) -> JobHandle;

    /// Impede a execução do job. Retorna `false` se ele já começou, já
    /// terminou ou já tinha sido cancelado.
    fn cancel(&self, handle: &JobHandle) -> bool;

    /// Jobs agendados que ainda não rodaram nem foram cancelados.
    fn pending(&self) -> usize;
}

/// Estado de um job agendado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Pending = 0,
    Running = 1,
    Done = 2,
    Cancelled = 3,
}

impl JobState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => JobState::Pending,
            1 => JobState::Running,
            2 => JobState::Done,
            3 => JobState::Cancelled,
            other => unreachable!("estado de job inválido: {other}"),
        }
    }
}

/// Handle de um job agendado.
///
/// Clones compartilham o mesmo estado: a transição `Pending -> Running` feita
/// pelo worker e a `Pending -> Cancelled` feita por `cancel` são exclusivas,
/// então no máximo uma delas vence.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: u64,
    due: Instant,
    state: Arc<AtomicU8>,
    abort: Option<AbortHandle>,
}

impl JobHandle {
    pub fn new(id: u64, due: Instant) -> Self {
        Self {
            id,
            due,
            state: Arc::new(AtomicU8::new(JobState::Pending as u8)),
            abort: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Instante a partir do qual o job pode rodar.
    pub fn due(&self) -> Instant {
        self.due
    }

    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Marca o job como em execução. Só o primeiro chamador recebe `true`,
    /// e nunca depois de um cancelamento bem-sucedido.
    pub fn try_start(&self) -> bool {
        self.transition(JobState::Pending, JobState::Running)
    }

    /// Marca o job como cancelado se ele ainda não começou.
    pub fn try_cancel(&self) -> bool {
        self.transition(JobState::Pending, JobState::Cancelled)
    }

    pub fn finish(&self) {
        self.state.store(JobState::Done as u8, Ordering::Release);
    }

    pub(crate) fn set_abort(&mut self, abort: AbortHandle) {
        self.abort = Some(abort);
    }

    pub(crate) fn abort(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    fn transition(&self, from: JobState, to: JobState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Executa o corpo de um job já iniciado. Um pânico no corpo é registrado e o
/// handle termina como `Done` do mesmo jeito, sem derrubar o worker.
pub(crate) fn run_job(handle: &JobHandle, job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        warn!(job = handle.id(), "job de eviction entrou em pânico: {message}");
    }
    handle.finish();
}

/// Deadline para `delay` a partir de agora, saturando em vez de estourar.
pub(crate) fn due_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explode() {
        panic!("job com falha");
    }

    #[tokio::test]
    async fn start_and_cancel_are_exclusive() {
        let handle = JobHandle::new(1, Instant::now());
        assert!(handle.try_start());
        assert!(!handle.try_cancel());
        assert_eq!(handle.state(), JobState::Running);
        handle.finish();
        assert_eq!(handle.state(), JobState::Done);
    }

    #[tokio::test]
    async fn cancel_blocks_start() {
        let handle = JobHandle::new(1, Instant::now());
        let clone = handle.clone();
        assert!(clone.try_cancel());
        assert!(!handle.try_start());
        assert!(!handle.try_cancel());
        assert_eq!(handle.state(), JobState::Cancelled);
    }

    #[tokio::test]
    async fn panicking_job_still_finishes() {
        let handle = JobHandle::new(7, Instant::now());
        assert!(handle.try_start());
        run_job(&handle, Box::new(explode));
        assert_eq!(handle.state(), JobState::Done);
    }

    #[test]
    fn state_bytes_round_trip() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Done,
            JobState::Cancelled,
        ] {
            assert_eq!(JobState::from_u8(state as u8), state);
        }
    }

    #[tokio::test]
    async fn due_after_saturates() {
        let due = due_after(Duration::MAX);
        assert!(due > Instant::now());
    }
}
