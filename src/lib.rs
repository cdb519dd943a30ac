//! Stashbox - embeddable in-process object cache
//!
//! A policy-driven cache with a two-level container hierarchy, loans on
//! cached values, pluggable eviction and per-key undo/redo history.
//!
//! # Features
//!
//! - **Container hierarchy**: domain, cache master and typed data cache, each
//!   created atomically and replaced when its lifetime runs out
//! - **Loans**: shared and exclusive checkouts, checked without waiting
//! - **Eviction**: LRU and LFU strategies restoring soft resource limits
//! - **Hard limits**: writes beyond a hard bound are rejected up front
//! - **History**: bounded undo/redo per key
//! - **Observers**: lifecycle notifications for masters, caches and objects
//! - **Background sweep**: a named worker thread expiring idle masters

pub mod cache;
pub mod prelude;
mod stashbox;
pub mod telemetry;

pub use prelude::*;
pub use stashbox::{Stashbox, StashboxBuilder};
