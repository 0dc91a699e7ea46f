use std::sync::Arc;

use tokio::time::Duration;

use ttlkv_common::{ConfigError, DEFAULT_POOL_WORKERS, DEFAULT_TTL};

use crate::scheduler::{DedicatedScheduler, EvictionScheduler, PooledScheduler};

/// Estratégia de eviction ativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Uma task suspensa por chave viva.
    Dedicated,
    /// Pool fixo de workers compartilhado por todas as chaves.
    Pooled { workers: usize },
}

impl Default for SchedulerKind {
    fn default() -> Self {
        SchedulerKind::Pooled {
            workers: DEFAULT_POOL_WORKERS,
        }
    }
}

impl SchedulerKind {
    /// # Panics
    ///
    /// Panics fora de um runtime Tokio no caso `Pooled`.
    pub(crate) fn build(self) -> Arc<dyn EvictionScheduler> {
        match self {
            SchedulerKind::Dedicated => Arc::new(DedicatedScheduler::new()),
            SchedulerKind::Pooled { workers } => Arc::new(PooledScheduler::new(workers)),
        }
    }
}

/// Configuração do store.
///
/// ```rust
/// use std::time::Duration;
/// use ttlkv_storage::{SchedulerKind, StoreConfig};
///
/// let config = StoreConfig::default()
///     .with_default_ttl(Duration::from_secs(5))
///     .with_scheduler(SchedulerKind::Pooled { workers: 4 });
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// TTL usado por `put` quando o chamador não informa um (padrão: 15s).
    pub default_ttl: Duration,
    /// Backend de eviction (padrão: pool com 12 workers).
    pub scheduler: SchedulerKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            scheduler: SchedulerKind::default(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidDefaultTtl(self.default_ttl));
        }
        if let SchedulerKind::Pooled { workers: 0 } = self.scheduler {
            return Err(ConfigError::EmptyPool);
        }
        Ok(())
    }
}
