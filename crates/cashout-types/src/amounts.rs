//! Credit amounts split by account class.
//!
//! All amounts are expressed in millicents. The three account classes are
//! tracked independently by the bank, so every transfer carries one value per
//! class rather than a single total.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credit category tracked independently by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
	Cashable,
	Promotional,
	NonCashable,
}

impl AccountClass {
	/// All classes in canonical order.
	pub const ALL: [AccountClass; 3] = [
		AccountClass::Cashable,
		AccountClass::Promotional,
		AccountClass::NonCashable,
	];
}

impl fmt::Display for AccountClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Cashable => write!(f, "cashable"),
			Self::Promotional => write!(f, "promotional"),
			Self::NonCashable => write!(f, "non_cashable"),
		}
	}
}

/// Per-class credit amounts in millicents. Missing classes deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Amounts {
	pub cashable: u64,
	pub promotional: u64,
	pub non_cashable: u64,
}

impl Amounts {
	pub const ZERO: Amounts = Amounts {
		cashable: 0,
		promotional: 0,
		non_cashable: 0,
	};

	pub fn new(cashable: u64, promotional: u64, non_cashable: u64) -> Self {
		Self {
			cashable,
			promotional,
			non_cashable,
		}
	}

	/// Amounts holding `amount` in a single class and zero elsewhere.
	pub fn single(class: AccountClass, amount: u64) -> Self {
		let mut amounts = Self::ZERO;
		*amounts.get_mut(class) = amount;
		amounts
	}

	pub fn get(&self, class: AccountClass) -> u64 {
		match class {
			AccountClass::Cashable => self.cashable,
			AccountClass::Promotional => self.promotional,
			AccountClass::NonCashable => self.non_cashable,
		}
	}

	pub fn get_mut(&mut self, class: AccountClass) -> &mut u64 {
		match class {
			AccountClass::Cashable => &mut self.cashable,
			AccountClass::Promotional => &mut self.promotional,
			AccountClass::NonCashable => &mut self.non_cashable,
		}
	}

	/// Sum over all classes, saturating at `u64::MAX`.
	pub fn total(&self) -> u64 {
		self.cashable
			.saturating_add(self.promotional)
			.saturating_add(self.non_cashable)
	}

	/// True when every class is zero.
	pub fn is_zero(&self) -> bool {
		self.cashable == 0 && self.promotional == 0 && self.non_cashable == 0
	}

	/// Class-wise subtraction clamped at zero.
	pub fn saturating_sub(&self, other: &Amounts) -> Amounts {
		Amounts {
			cashable: self.cashable.saturating_sub(other.cashable),
			promotional: self.promotional.saturating_sub(other.promotional),
			non_cashable: self.non_cashable.saturating_sub(other.non_cashable),
		}
	}

	/// Class-wise addition clamped at `u64::MAX`.
	pub fn saturating_add(&self, other: &Amounts) -> Amounts {
		Amounts {
			cashable: self.cashable.saturating_add(other.cashable),
			promotional: self.promotional.saturating_add(other.promotional),
			non_cashable: self.non_cashable.saturating_add(other.non_cashable),
		}
	}

	/// Class-wise minimum.
	pub fn min(&self, other: &Amounts) -> Amounts {
		Amounts {
			cashable: self.cashable.min(other.cashable),
			promotional: self.promotional.min(other.promotional),
			non_cashable: self.non_cashable.min(other.non_cashable),
		}
	}

	/// True when any class of `self` is larger than the same class of `other`.
	pub fn exceeds(&self, other: &Amounts) -> bool {
		AccountClass::ALL
			.iter()
			.any(|class| self.get(*class) > other.get(*class))
	}
}

impl fmt::Display for Amounts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"({}, {}, {})",
			self.cashable, self.promotional, self.non_cashable
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_single_class() {
		let amounts = Amounts::single(AccountClass::Promotional, 250);
		assert_eq!(amounts, Amounts::new(0, 250, 0));
		assert_eq!(amounts.total(), 250);
		assert!(!amounts.is_zero());
	}

	#[test]
	fn test_saturating_sub_clamps_each_class() {
		let remaining = Amounts::new(500, 100, 0);
		let moved = Amounts::new(300, 150, 10);
		assert_eq!(remaining.saturating_sub(&moved), Amounts::new(200, 0, 0));
	}

	#[test]
	fn test_exceeds() {
		let requested = Amounts::new(500, 0, 0);
		assert!(Amounts::new(501, 0, 0).exceeds(&requested));
		assert!(Amounts::new(0, 1, 0).exceeds(&requested));
		assert!(!Amounts::new(500, 0, 0).exceeds(&requested));
	}

	#[test]
	fn test_total_saturates() {
		let amounts = Amounts::new(u64::MAX, 1, 1);
		assert_eq!(amounts.total(), u64::MAX);
	}
}
