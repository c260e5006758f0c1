//! Durable holder of the single in-flight transaction record.

use cashout_storage::{StorageError, StorageService};
use cashout_types::TransactionRecord;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const NAMESPACE: &str = "transfer";
const CURRENT: &str = "current";

/// The record of the transfer in flight, if any, plus the cancellation
/// handle of the worker driving it.
///
/// Lives inside the orchestrator's state mutex; the cached copy always
/// mirrors what was last persisted successfully.
pub struct RecordStore {
	storage: StorageService,
	current: Option<TransactionRecord>,
	cancellation: Option<CancellationToken>,
}

impl RecordStore {
	pub fn new(storage: StorageService) -> Self {
		Self {
			storage,
			current: None,
			cancellation: None,
		}
	}

	/// Reads the persisted record into memory. Called once at startup.
	pub async fn load(&mut self) -> Result<Option<&TransactionRecord>, StorageError> {
		self.current = self.storage.retrieve_optional(NAMESPACE, CURRENT).await?;
		if let Some(record) = &self.current {
			debug!(
				"Loaded record {} for trace {}",
				record.transaction_id, record.trace_id
			);
		}
		Ok(self.current.as_ref())
	}

	/// The in-memory copy of the persisted record.
	pub fn current(&self) -> Option<&TransactionRecord> {
		self.current.as_ref()
	}

	/// Persists `record` and only then makes it current.
	pub async fn set(&mut self, record: TransactionRecord) -> Result<(), StorageError> {
		self.storage.store(NAMESPACE, CURRENT, &record).await?;
		self.current = Some(record);
		Ok(())
	}

	/// Removes the persisted record and drops the cancellation handle.
	pub async fn clear(&mut self) -> Result<(), StorageError> {
		self.storage.remove(NAMESPACE, CURRENT).await?;
		self.current = None;
		self.cancellation = None;
		Ok(())
	}

	pub fn attach_cancellation(&mut self, token: CancellationToken) {
		self.cancellation = Some(token);
	}

	pub fn detach_cancellation(&mut self) -> Option<CancellationToken> {
		self.cancellation.take()
	}

	/// Handle of the live worker; `None` when no worker runs.
	pub fn cancellation(&self) -> Option<&CancellationToken> {
		self.cancellation.as_ref()
	}
}
