//! Reservation levels and loan policies
//!
//! Compatibility between loans:
//!
//! | outstanding \ requested | None | SharedRead | ExclusiveWrite |
//! |-------------------------|------|------------|----------------|
//! | nothing                 | ok   | ok         | ok             |
//! | None / SharedRead       | ok   | ok         | rejected       |
//! | ExclusiveWrite          | rejected | rejected | rejected     |

use serde::{Deserialize, Serialize};

/// Exclusivity level of a loan, ordered from least to most strict
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Reservation {
    /// Plain hold without exclusivity
    #[default]
    None,
    /// Many readers may hold the value at once
    SharedRead,
    /// Sole holder; conflicts with every other loan
    ExclusiveWrite,
}

impl Reservation {
    /// Whether a loan at `self` may be granted while at least one loan at
    /// `outstanding` is held
    #[inline]
    pub fn is_compatible_with(self, outstanding: Reservation) -> bool {
        self != Reservation::ExclusiveWrite && outstanding != Reservation::ExclusiveWrite
    }
}

/// What happens to a value when its last loan is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanReturnPolicy {
    #[default]
    KeepOnNoLoan,
    RemoveOnNoLoan,
}

/// Terms of a single loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoanPolicy {
    pub reservation: Reservation,
    /// With `ExclusiveWrite`, forbids overwrite and removal while loaned
    pub immutable: bool,
    pub return_policy: LoanReturnPolicy,
}

impl LoanPolicy {
    pub const fn new(reservation: Reservation) -> Self {
        Self {
            reservation,
            immutable: false,
            return_policy: LoanReturnPolicy::KeepOnNoLoan,
        }
    }

    pub const fn shared_read() -> Self {
        Self::new(Reservation::SharedRead)
    }

    pub const fn exclusive_write() -> Self {
        Self::new(Reservation::ExclusiveWrite)
    }

    /// Mark the loan immutable
    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Remove the value when this loan is the last one returned
    pub const fn remove_on_no_loan(mut self) -> Self {
        self.return_policy = LoanReturnPolicy::RemoveOnNoLoan;
        self
    }

    /// Whether this loan locks the value against overwrite and removal
    #[inline]
    pub fn is_locking(&self) -> bool {
        self.immutable && self.reservation == Reservation::ExclusiveWrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_matrix() {
        use Reservation::{ExclusiveWrite, SharedRead};
        let plain = Reservation::None;
        assert!(SharedRead.is_compatible_with(SharedRead));
        assert!(plain.is_compatible_with(SharedRead));
        assert!(SharedRead.is_compatible_with(plain));
        assert!(!ExclusiveWrite.is_compatible_with(plain));
        assert!(!ExclusiveWrite.is_compatible_with(SharedRead));
        assert!(!plain.is_compatible_with(ExclusiveWrite));
        assert!(!SharedRead.is_compatible_with(ExclusiveWrite));
        assert!(plain < SharedRead && SharedRead < ExclusiveWrite);
    }

    #[test]
    fn test_locking_only_when_exclusive_and_immutable() {
        assert!(LoanPolicy::exclusive_write().immutable().is_locking());
        assert!(!LoanPolicy::exclusive_write().is_locking());
        assert!(!LoanPolicy::shared_read().immutable().is_locking());
    }
}
