//! Export pipeline: dedup ledger, youtube-dl invocation, worker pool

pub mod invoke;
pub mod ledger;
pub mod pool;

pub use invoke::{Invoke, InvokeError, Outcome, YoutubeDl};
pub use pool::{ExportStats, WorkerPool, DEFAULT_POOL_SIZE};
