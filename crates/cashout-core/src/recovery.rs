//! Resumption of transfers interrupted by a crash or a provider fault.

use crate::orchestrator::{TransferOrchestrator, TransferPhase};
use crate::CoreError;
use cashout_providers::RegisteredProvider;
use cashout_types::{Amounts, TraceId, TransactionId, TransactionRecord, TransferEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a [`RecoveryCoordinator::recover`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
	/// A worker already drives this transfer; nothing new was launched.
	AlreadyRunning(TraceId),
	/// A recovery worker was launched.
	Started(TraceId),
	/// No matching record, or no provider holds state for it.
	NothingToRecover,
}

/// Brings a persisted transfer back under a worker after a restart or a
/// recoverable provider fault.
#[derive(Clone)]
pub struct RecoveryCoordinator {
	orchestrator: TransferOrchestrator,
}

impl RecoveryCoordinator {
	pub fn new(orchestrator: TransferOrchestrator) -> Self {
		Self { orchestrator }
	}

	/// Loads the persisted record. A self-initiated transfer is relaunched
	/// right away when auto recovery is enabled; anything else waits for
	/// [`recover`](Self::recover). Returns the trace id of a relaunched
	/// transfer.
	pub async fn on_startup(&self) -> Result<Option<TraceId>, CoreError> {
		let mut state = self.orchestrator.state().lock().await;
		if state.records.cancellation().is_some() {
			debug!("Transfer worker already running, skipping startup recovery");
			return Ok(None);
		}

		let Some(record) = state.records.load().await?.cloned() else {
			info!("No interrupted transfer found");
			return Ok(None);
		};

		if record.is_owned && self.orchestrator.config().auto_recover {
			info!(
				transaction_id = %record.transaction_id,
				trace_id = %record.trace_id,
				remaining = ?record.remaining,
				"Resuming interrupted transfer"
			);
			let cancellation = self.orchestrator.worker_token();
			state.records.attach_cancellation(cancellation.clone());
			state.phase = TransferPhase::Admitted;
			self.orchestrator.launch_transfer(
				record.transaction_id,
				record.resume_request(),
				cancellation,
			);
			return Ok(Some(record.trace_id));
		}

		state.phase = TransferPhase::SuspendedForRecovery;
		info!(
			transaction_id = %record.transaction_id,
			trace_id = %record.trace_id,
			"Interrupted transfer waiting for explicit recovery"
		);
		Ok(None)
	}

	/// Resumes the suspended transfer, optionally only if it carries
	/// `transaction_id`. Safe to call repeatedly: a live worker is reported,
	/// never duplicated.
	pub async fn recover(
		&self,
		transaction_id: Option<TransactionId>,
	) -> Result<RecoveryOutcome, CoreError> {
		let (record, cancellation) = {
			let mut state = self.orchestrator.state().lock().await;
			let Some(record) = state.records.current().cloned() else {
				return Ok(RecoveryOutcome::NothingToRecover);
			};
			if transaction_id.is_some_and(|id| id != record.transaction_id) {
				return Ok(RecoveryOutcome::NothingToRecover);
			}
			if state.records.cancellation().is_some() {
				return Ok(RecoveryOutcome::AlreadyRunning(record.trace_id));
			}

			// claim the slot before letting go of the lock
			let cancellation = self.orchestrator.worker_token();
			state.records.attach_cancellation(cancellation.clone());
			state.phase = TransferPhase::InFlight;
			(record, cancellation)
		};

		let handpay_forced = self.orchestrator.gate().threshold_reached();
		let mut recoverable = Vec::new();
		for entry in self
			.orchestrator
			.registry()
			.recovery_candidates(handpay_forced)
		{
			if entry.provider.can_recover(record.transaction_id).await {
				recoverable.push(entry);
			}
		}

		if recoverable.is_empty() {
			return self.discard(&record).await;
		}

		info!(
			transaction_id = %record.transaction_id,
			trace_id = %record.trace_id,
			providers = recoverable.len(),
			"Recovering interrupted transfer"
		);
		let trace_id = record.trace_id.clone();
		launch_recovery(self.orchestrator.clone(), record, recoverable, cancellation);
		Ok(RecoveryOutcome::Started(trace_id))
	}

	/// No provider knows the transfer. The record is dropped and the caller
	/// reconciles on its own.
	async fn discard(&self, record: &TransactionRecord) -> Result<RecoveryOutcome, CoreError> {
		let mut state = self.orchestrator.state().lock().await;
		state.records.detach_cancellation();
		if let Err(e) = state.records.clear().await {
			state.phase = TransferPhase::SuspendedForRecovery;
			return Err(e.into());
		}
		warn!(
			transaction_id = %record.transaction_id,
			trace_id = %record.trace_id,
			"No provider can recover transfer, record discarded"
		);
		if record.is_owned {
			self.orchestrator
				.coordinator()
				.abandon(&record.transaction_id);
		}
		state.phase = TransferPhase::Idle;
		self.orchestrator.drain_pending(&mut state).await;
		Ok(RecoveryOutcome::NothingToRecover)
	}
}

fn launch_recovery(
	orchestrator: TransferOrchestrator,
	record: TransactionRecord,
	providers: Vec<RegisteredProvider>,
	cancellation: CancellationToken,
) {
	tokio::spawn(async move {
		run_recovery(orchestrator, record, providers, cancellation).await;
	});
}

async fn run_recovery(
	orchestrator: TransferOrchestrator,
	record: TransactionRecord,
	providers: Vec<RegisteredProvider>,
	cancellation: CancellationToken,
) {
	let mut resolved = false;
	for entry in providers {
		if cancellation.is_cancelled() {
			info!(trace_id = %record.trace_id, "Recovery cancelled");
			break;
		}
		match entry.provider.recover(&record, cancellation.clone()).await {
			Ok(true) => {
				info!(provider = %entry.provider_type, trace_id = %record.trace_id, "Transfer recovered");
				resolved = true;
				break;
			}
			Ok(false) => debug!(provider = %entry.provider_type, "Provider could not resolve transfer"),
			Err(e) => warn!(provider = %entry.provider_type, error = %e, "Recovery attempt failed"),
		}
	}

	let mut state = orchestrator.state().lock().await;
	if resolved {
		let event = TransferEvent::Completed {
			transferred: Amounts::ZERO,
			pending: false,
			trace_id: record.trace_id.clone(),
		};
		orchestrator
			.settle(&mut state, record.transaction_id, record.is_owned, event)
			.await;
	} else {
		state.records.detach_cancellation();
		state.phase = TransferPhase::SuspendedForRecovery;
		warn!(
			transaction_id = %record.transaction_id,
			trace_id = %record.trace_id,
			"Transfer still unresolved, record kept"
		);
	}
}
