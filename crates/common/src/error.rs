use std::time::Duration;

/// Erros de operações sobre o store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("TTL inválido: {0:?} (deve ser maior que zero)")]
    InvalidTtl(Duration),
    #[error("TTL fora do intervalo representável: {0:?}")]
    TtlOverflow(Duration),
}

/// Erros de validação da configuração do store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TTL padrão inválido: {0:?}")]
    InvalidDefaultTtl(Duration),
    #[error("pool de eviction precisa de pelo menos um worker")]
    EmptyPool,
}

/// Erro top-level do ttlkv.
#[derive(Debug, thiserror::Error)]
pub enum TtlkvError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias.
pub type TtlkvResult<T> = Result<T, TtlkvError>;
