//! Object roots and the loan/reservation subsystem

pub mod loan;
pub mod memento;
pub mod root;

pub use loan::{LoanSnapshot, LoanStatus, Loaned, Release};
pub use memento::Memento;
pub use root::{ObjectRoot, WriteOutcome};
