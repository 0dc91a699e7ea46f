#![forbid(unsafe_code)]

mod config;
mod entry;
pub mod scheduler;
mod store;

pub use config::{SchedulerKind, StoreConfig};
pub use scheduler::{
    DedicatedScheduler, EvictionScheduler, Job, JobHandle, JobState, PooledScheduler,
};
pub use store::Store;
