//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Two
/// `Money` amounts of 500 paise are the same value; two products with the same
/// name are still different entities.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A non-negative amount of Indian rupees, stored in paise (1/100 INR).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    pub const fn paise(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_mul(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Sum an iterator of amounts, failing on overflow.
    pub fn sum<I: IntoIterator<Item = Money>>(amounts: I) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "₹{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_rupees_and_paise() {
        assert_eq!(Money::from_paise(129_950).to_string(), "₹1299.50");
        assert_eq!(Money::from_paise(7).to_string(), "₹0.07");
        assert_eq!(Money::ZERO.to_string(), "₹0.00");
    }

    #[test]
    fn checked_mul_overflows_into_validation_error() {
        let err = Money::from_paise(u64::MAX).checked_mul(2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #[test]
        fn sum_matches_u64_sum_for_small_amounts(amounts in proptest::collection::vec(0u64..1_000_000, 0..50)) {
            let expected: u64 = amounts.iter().sum();
            let total = Money::sum(amounts.into_iter().map(Money::from_paise)).unwrap();
            prop_assert_eq!(total.paise(), expected);
        }
    }
}
