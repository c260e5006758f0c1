//! In-process bank ledger.

use crate::{BankError, BankInterface};
use async_trait::async_trait;
use cashout_types::{AccountClass, Amounts, TransactionId};
use tokio::sync::Mutex;
use tracing::debug;

/// In-process ledger of per-class balances bounded by a credit limit.
pub struct MemoryBank {
	balances: Mutex<Amounts>,
	limit: u64,
}

impl MemoryBank {
	pub fn new(limit: u64) -> Self {
		Self::with_balances(limit, Amounts::ZERO)
	}

	/// Starts with `balances` already credited, without checking `limit`.
	pub fn with_balances(limit: u64, balances: Amounts) -> Self {
		Self {
			balances: Mutex::new(balances),
			limit,
		}
	}
}

#[async_trait]
impl BankInterface for MemoryBank {
	async fn balance(&self, class: AccountClass) -> Result<u64, BankError> {
		Ok(self.balances.lock().await.get(class))
	}

	async fn balances(&self) -> Result<Amounts, BankError> {
		Ok(*self.balances.lock().await)
	}

	async fn limit(&self) -> Result<u64, BankError> {
		Ok(self.limit)
	}

	async fn deposit(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
	) -> Result<(), BankError> {
		let mut balances = self.balances.lock().await;
		let updated = balances.saturating_add(&amounts);
		if updated.total() > self.limit {
			return Err(BankError::LimitExceeded {
				total: updated.total(),
				limit: self.limit,
			});
		}
		*balances = updated;
		debug!("Deposited {} under {}", amounts, transaction_id);
		Ok(())
	}

	async fn withdraw(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
	) -> Result<Amounts, BankError> {
		let mut balances = self.balances.lock().await;
		let taken = amounts.min(&balances);
		*balances = balances.saturating_sub(&taken);
		debug!("Withdrew {} of requested {} under {}", taken, amounts, transaction_id);
		Ok(taken)
	}
}
