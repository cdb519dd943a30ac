//! Access tracking state machine

pub mod tracker;

pub use tracker::{AccessCount, AccessStatus, AccessTime, AccessTracker, ObjectState};
