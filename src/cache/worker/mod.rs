//! Background sweep worker
//!
//! One named OS thread per worker, driven by a crossbeam channel. The thread
//! sleeps in `recv_timeout` for the configured interval, sweeps on timeout or
//! on `RunNow`, and leaves its loop on `Shutdown`. The worker joins its thread
//! when stopped or dropped.

pub mod manager;
pub mod types;

pub use manager::SweepWorker;
pub use types::{SweepCommand, SweepStats, SweepStatsSnapshot, SweepTarget};
