//! Settlement provider contract.
//!
//! Every channel that can take credit off the machine (voucher printer,
//! handpay, wallet transfer, bonus payout) implements [`ProviderInterface`].
//! The orchestrator walks an ordered [`ProviderRegistry`] of them and never
//! knows which concrete channel it is talking to.

use async_trait::async_trait;
use cashout_bank::{BankError, BankInterface};
use cashout_types::{
	Amounts, ConfigSchema, ProviderResult, ProviderType, TraceId, TransactionId,
	TransactionRecord, TransferReason,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod registry;

pub mod implementations {
	pub mod ledger;
}

pub use registry::{ProviderFilter, ProviderRegistry, RegisteredProvider};

/// Errors that can occur while a provider moves credit.
#[derive(Debug, Error)]
pub enum ProviderError {
	/// The outcome is unknown; the transfer must be resumed after a restart.
	#[error("Recoverable provider fault: {0}")]
	Recoverable(String),
	#[error("Provider fault: {0}")]
	Fatal(String),
	#[error("Provider type {0} is already registered")]
	Duplicate(ProviderType),
	#[error("Unknown provider implementation: {0}")]
	UnknownImplementation(String),
	#[error("Invalid provider configuration: {0}")]
	Config(String),
}

impl ProviderError {
	pub fn is_recoverable(&self) -> bool {
		matches!(self, ProviderError::Recoverable(_))
	}
}

impl From<BankError> for ProviderError {
	fn from(e: BankError) -> Self {
		match e {
			BankError::Unavailable(_) => ProviderError::Recoverable(e.to_string()),
			BankError::LimitExceeded { .. } => ProviderError::Fatal(e.to_string()),
		}
	}
}

/// What one provider is asked to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
	pub transaction_id: TransactionId,
	/// Remaining per-class amounts; any class may be zero.
	pub amounts: Amounts,
	pub associated_transactions: Vec<u64>,
	pub reason: TransferReason,
	pub trace_id: TraceId,
}

/// A settlement channel that moves credit off the machine.
///
/// Business refusals are `Ok` results with `success == false`; errors are
/// reserved for faults.
#[async_trait]
pub trait ProviderInterface: Send + Sync {
	fn provider_type(&self) -> ProviderType;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Moves up to the instructed amounts. Called at most once per admitted
	/// transfer. Business failures are `Ok` with `success == false`.
	async fn transfer(
		&self,
		instruction: &TransferInstruction,
		cancellation: CancellationToken,
	) -> Result<ProviderResult, ProviderError>;

	/// Whether this provider holds unresolved state for the transfer.
	/// Only consulted after a restart.
	async fn can_recover(&self, transaction_id: TransactionId) -> bool;

	/// Drives an interrupted transfer to completion; `Ok(true)` once resolved.
	async fn recover(
		&self,
		record: &TransactionRecord,
		cancellation: CancellationToken,
	) -> Result<bool, ProviderError>;
}

/// Builds the implementation named in configuration.
pub fn create_provider(
	implementation: &str,
	provider_type: ProviderType,
	config: &toml::Value,
	bank: Arc<dyn BankInterface>,
) -> Result<Arc<dyn ProviderInterface>, ProviderError> {
	match implementation {
		"ledger" => implementations::ledger::create_provider(provider_type, config, bank),
		other => Err(ProviderError::UnknownImplementation(other.to_string())),
	}
}
