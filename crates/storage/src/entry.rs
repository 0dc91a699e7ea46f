use tokio::time::Instant;

use crate::scheduler::JobHandle;

/// Entrada no store: valor + deadline + job de eviction da geração atual.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub value: V,
    pub deadline: Instant,
    pub generation: u64,
    pub handle: JobHandle,
}

impl<V> Entry<V> {
    pub fn new(value: V, deadline: Instant, generation: u64, handle: JobHandle) -> Self {
        Self {
            value,
            deadline,
            generation,
            handle,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}
