#![forbid(unsafe_code)]

mod error;

use std::time::Duration;

pub use error::*;

/// TTL aplicado quando o chamador não informa um.
pub const DEFAULT_TTL: Duration = Duration::from_millis(15_000);
/// Número de workers do scheduler em pool.
pub const DEFAULT_POOL_WORKERS: usize = 12;
