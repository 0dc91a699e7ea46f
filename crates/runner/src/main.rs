use std::io::{self, BufRead};

use clap::Parser;
use tokio::time::Duration;
use tracing::{info, warn};

use ttlkv_common::{DEFAULT_POOL_WORKERS, DEFAULT_TTL, TtlkvResult};
use ttlkv_storage::{SchedulerKind, Store, StoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Dedicated,
    Pooled,
}

#[derive(Parser, Debug)]
#[command(name = "ttlkv-runner", about = "ttlkv — carga de teste do store com TTL")]
struct Args {
    /// Número de chaves inseridas (lido do stdin se omitido)
    #[arg(long)]
    keys: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_TTL.as_millis() as u64)]
    ttl_ms: u64,
    #[arg(long, default_value_t = 5)]
    rounds: u32,
    #[arg(long, default_value_t = 5_000)]
    interval_ms: u64,
    #[arg(long, default_value = "pooled", value_parser = parse_strategy)]
    scheduler: Strategy,
    #[arg(long, default_value_t = DEFAULT_POOL_WORKERS)]
    workers: usize,
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    match s.to_lowercase().as_str() {
        "dedicated" => Ok(Strategy::Dedicated),
        "pooled" => Ok(Strategy::Pooled),
        _ => Err(format!("valor inválido: '{s}'. Use: dedicated, pooled")),
    }
}

fn build_store(args: &Args) -> TtlkvResult<Store<u64, String>> {
    let scheduler = match args.scheduler {
        Strategy::Dedicated => SchedulerKind::Dedicated,
        Strategy::Pooled => SchedulerKind::Pooled {
            workers: args.workers,
        },
    };
    let config = StoreConfig::default()
        .with_default_ttl(Duration::from_millis(args.ttl_ms))
        .with_scheduler(scheduler);
    Ok(Store::with_config(config)?)
}

fn load(store: &Store<u64, String>, keys: u64) -> TtlkvResult<()> {
    store.put_all((0..keys).map(|i| (i, format!("Value{i}"))))?;
    Ok(())
}

/// Lê o número de chaves do stdin.
fn prompt_keys() -> anyhow::Result<u64> {
    warn!("informe o número de chaves a inserir:");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().parse()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttlkv_runner=info,ttlkv_storage=info".into()),
        )
        .init();

    let args = Args::parse();
    let store = build_store(&args)?;
    let keys = match args.keys {
        Some(n) => n,
        None => prompt_keys()?,
    };

    load(&store, keys)?;
    info!(
        keys,
        ttl_ms = args.ttl_ms,
        scheduler = ?args.scheduler,
        "chaves carregadas"
    );

    for round in 0..args.rounds {
        for key in 0..keys {
            match store.get(&key) {
                Some(value) => info!(round, key, value = %value, "leitura"),
                None => info!(round, key, "chave ausente"),
            }
        }
        info!(
            round,
            physical = store.len(),
            live = store.keys().len(),
            pending = store.pending_evictions(),
            "fim da rodada"
        );
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    info!("encerrando runner");
    Ok(())
}
