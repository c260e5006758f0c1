use cashout_bank::BankError;
use cashout_providers::ProviderError;
use cashout_storage::StorageError;
use thiserror::Error;

/// Synchronous rejection of a transfer request. No state is created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
	#[error("A transfer is already in progress")]
	Busy,
	#[error("No credit to transfer")]
	NoBalance,
	#[error("Insufficient balance for the requested amount")]
	InsufficientBalance,
	#[error("Requested amount must be greater than zero")]
	InvalidAmount,
	#[error("Reason not accepted by this entry point")]
	InvalidReason,
	#[error("Transaction ticket denied")]
	TicketDenied,
	#[error("Pending queue is full")]
	QueueFull,
	#[error("No settlement providers available")]
	NoProviders,
	#[error("Orchestrator is shut down")]
	ShutDown,
	#[error("Bank error: {0}")]
	Bank(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Errors from building the orchestrator and from recovery.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),
	#[error("Bank error: {0}")]
	Bank(#[from] BankError),
}
