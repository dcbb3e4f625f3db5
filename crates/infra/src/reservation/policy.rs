//! Target-amount policies checked before any lock is taken.

use stockhold_core::Money;

pub trait AmountPolicy: Send + Sync {
    /// `Err` carries the operator-facing reason.
    fn check(&self, amount: Money) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAny;

impl AmountPolicy for AcceptAny {
    fn check(&self, amount: Money) -> Result<(), String> {
        if amount.is_positive() {
            Ok(())
        } else {
            Err(format!("amount {amount} must be positive"))
        }
    }
}

/// Whole-unit part of the amount must end in a given digit (e.g. 298.00 ends in 8).
#[derive(Debug, Clone, Copy)]
pub struct TrailingDigit(pub u8);

impl AmountPolicy for TrailingDigit {
    fn check(&self, amount: Money) -> Result<(), String> {
        AcceptAny.check(amount)?;
        let digit = (amount.minor() / 100) % 10;
        if digit == i64::from(self.0) {
            Ok(())
        } else {
            Err(format!("amount {amount} must end in {}", self.0))
        }
    }
}
