//! Cache engine
//!
//! Domain registry → cache factory → cache master → data cache → object root.
//! Each level owns the next; handles and ids are plain lookup keys.

pub mod access;
pub mod config;
pub mod data;
pub mod eviction;
pub mod factory;
pub mod master;
pub mod object;
pub mod observer;
pub mod policy;
pub mod traits;
pub mod types;
pub mod worker;
