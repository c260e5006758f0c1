//! Contracts of the collaborators the transfer-out engine consumes: the bank
//! ledger, the transaction coordinator that hands out admission tickets, and
//! the money-laundering threshold gate. Local in-process implementations are
//! provided for standalone deployments and tests.

use async_trait::async_trait;
use cashout_types::{AccountClass, Amounts, TransactionId};
use thiserror::Error;

pub mod coordinator;
pub mod gate;

pub mod implementations {
	pub mod memory;
}

pub use coordinator::{LocalTransactionCoordinator, TransactionCoordinator};
pub use gate::{LaunderingGate, ThresholdGate};

/// Errors raised by bank ledger operations.
#[derive(Debug, Error)]
pub enum BankError {
	#[error("Credit limit exceeded: balance would reach {total}, limit is {limit}")]
	LimitExceeded { total: u64, limit: u64 },
	#[error("Bank unavailable: {0}")]
	Unavailable(String),
}

/// Per-class credit ledger of the machine.
///
/// The orchestrator only reads it; settlement providers are the only
/// components that withdraw.
#[async_trait]
pub trait BankInterface: Send + Sync {
	async fn balance(&self, class: AccountClass) -> Result<u64, BankError>;

	async fn balances(&self) -> Result<Amounts, BankError>;

	/// Configured credit limit.
	async fn limit(&self) -> Result<u64, BankError>;

	async fn deposit(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
	) -> Result<(), BankError>;

	/// Withdraws up to `amounts` per class and returns what was actually taken.
	async fn withdraw(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
	) -> Result<Amounts, BankError>;
}
