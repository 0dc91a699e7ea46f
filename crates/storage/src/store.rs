use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

use ttlkv_common::{ConfigError, StoreError};

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::scheduler::{EvictionScheduler, JobHandle};

/// Estado compartilhado entre os handles do store e os jobs de eviction.
struct StoreInner<K, V> {
    data: DashMap<K, Entry<V>>,
    scheduler: Arc<dyn EvictionScheduler>,
    next_generation: AtomicU64,
    default_ttl: Duration,
}

/// Handle para o store in-memory com TTL por entrada.
///
/// Cada `put` agenda um job de eviction ativa para a geração escrita. Leituras
/// (`get`, `keys`, `values`, `entries`) aplicam a checagem lazy de expiração,
/// então uma entrada nunca é visível depois do deadline, mesmo que o job ainda
/// não tenha rodado.
///
/// `len`, `is_empty`, `contains_key` e `contains_value` olham a tabela física:
/// uma linha vencida continua contando até o job removê-la.
pub struct Store<K, V> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Store com a configuração padrão (TTL de 15s, pool de 12 workers).
    ///
    /// # Panics
    ///
    /// Panics fora de um runtime Tokio.
    pub fn new() -> Self {
        let config = StoreConfig::default();
        Self::build(config.default_ttl, config.scheduler.build())
    }

    /// # Panics
    ///
    /// Panics fora de um runtime Tokio quando o scheduler é `Pooled`.
    pub fn with_config(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config.default_ttl, config.scheduler.build()))
    }

    /// Store com um backend de eviction fornecido pelo chamador.
    pub fn with_scheduler(
        default_ttl: Duration,
        scheduler: Arc<dyn EvictionScheduler>,
    ) -> Result<Self, ConfigError> {
        if default_ttl.is_zero() {
            return Err(ConfigError::InvalidDefaultTtl(default_ttl));
        }
        Ok(Self::build(default_ttl, scheduler))
    }

    fn build(default_ttl: Duration, scheduler: Arc<dyn EvictionScheduler>) -> Self {
        Store {
            inner: Arc::new(StoreInner {
                data: DashMap::new(),
                scheduler,
                next_generation: AtomicU64::new(0),
                default_ttl,
            }),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    // --- Escrita ---

    /// `put` com o TTL padrão do store.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, StoreError> {
        self.put_with_ttl(key, value, self.inner.default_ttl)
    }

    /// Instala `value` com deadline `agora + ttl` e agenda sua eviction.
    ///
    /// Se a chave já existia, o job anterior é cancelado (best-effort) e o
    /// valor anterior é devolvido, mesmo que já tenha vencido mas ainda não
    /// tenha sido purgado.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<Option<V>, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }

        // Geração e deadline são calculados com o shard travado, então as
        // escritas numa mesma chave ficam totalmente ordenadas.
        match self.inner.data.entry(key) {
            MapEntry::Occupied(mut slot) => {
                let (generation, deadline) = self.stamp(ttl)?;
                let handle = self.schedule_eviction(slot.key().clone(), generation, ttl);
                let old = slot.insert(Entry::new(value, deadline, generation, handle));
                self.inner.scheduler.cancel(&old.handle);
                Ok(Some(old.value))
            }
            MapEntry::Vacant(slot) => {
                let (generation, deadline) = self.stamp(ttl)?;
                let handle = self.schedule_eviction(slot.key().clone(), generation, ttl);
                slot.insert(Entry::new(value, deadline, generation, handle));
                Ok(None)
            }
        }
    }

    /// `put` com o TTL padrão para cada par. Não é atômico entre chaves.
    pub fn put_all<I>(&self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all_with_ttl(entries, self.inner.default_ttl)
    }

    pub fn put_all_with_ttl<I>(&self, entries: I, ttl: Duration) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }
        for (key, value) in entries {
            self.put_with_ttl(key, value, ttl)?;
        }
        Ok(())
    }

    /// Cancela o job da chave e remove a linha. Devolve o valor anterior.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (_, entry) = self.inner.data.remove(key)?;
        self.inner.scheduler.cancel(&entry.handle);
        Some(entry.value)
    }

    /// Cancela todos os jobs pendentes e esvazia a tabela.
    pub fn clear(&self) {
        let scheduler = &self.inner.scheduler;
        self.inner.data.retain(|_, entry| {
            scheduler.cancel(&entry.handle);
            false
        });
    }

    // --- Leitura (visibilidade lógica) ---

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.inner.data.get(key)?;
        if entry.is_expired() {
            trace!(key = ?entry.key(), "leitura de chave vencida ainda não purgada");
            return None;
        }
        Some(entry.value.clone())
    }

    /// Tempo de vida restante de uma entrada viva.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.inner.data.get(key)?;
        entry
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Snapshot das chaves vivas neste instante.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.inner
            .data
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot dos valores vivos neste instante.
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.inner
            .data
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Snapshot dos pares vivos neste instante.
    pub fn entries(&self) -> Vec<(K, V)> {
        let now = Instant::now();
        self.inner
            .data
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| (entry.key().clone(), entry.value.clone()))
            .collect()
    }

    // --- Presença física ---

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.data.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.inner.data.iter().any(|entry| entry.value == *value)
    }

    /// Jobs de eviction agendados que ainda não rodaram nem foram cancelados.
    pub fn pending_evictions(&self) -> usize {
        self.inner.scheduler.pending()
    }

    // --- Eviction ativa ---

    fn stamp(&self, ttl: Duration) -> Result<(u64, Instant), StoreError> {
        let deadline = Instant::now()
            .checked_add(ttl)
            .ok_or(StoreError::TtlOverflow(ttl))?;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        Ok((generation, deadline))
    }

    fn schedule_eviction(&self, key: K, generation: u64, ttl: Duration) -> JobHandle {
        let store = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(
            ttl,
            Box::new(move || evict(&store, &key, generation)),
        )
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Corpo do job: só remove a linha se ela ainda for da geração agendada.
fn evict<K, V>(store: &Weak<StoreInner<K, V>>, key: &K, generation: u64)
where
    K: Eq + Hash + Debug,
{
    let Some(inner) = store.upgrade() else {
        return;
    };

    match inner
        .data
        .remove_if(key, |_, entry| entry.generation == generation)
    {
        Some(_) => debug!("chave expirada removida: {key:?} (geração {generation})"),
        None => debug!("job obsoleto ignorado: {key:?} (geração {generation})"),
    }
}
