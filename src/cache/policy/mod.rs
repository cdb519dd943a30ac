//! Policy evaluation

pub mod checker;

pub use checker::PolicyChecker;
