//! Transfer-out orchestration.
//!
//! The orchestrator admits one transfer at a time, persists a record of it,
//! and hands it to a worker task that walks the ordered provider chain.
//! Every piece of shared state lives behind a single async mutex. The lock
//! is held for admission checks, record persistence and the completion
//! step, never while a provider is working.

use crate::event_bus::EventBus;
use crate::queue::{PendingEntry, PendingQueue};
use crate::record::RecordStore;
use crate::AdmissionError;
use cashout_bank::{BankInterface, LaunderingGate, TransactionCoordinator};
use cashout_config::OrchestratorConfig;
use cashout_providers::{ProviderFilter, ProviderRegistry, TransferInstruction};
use cashout_storage::{StorageError, StorageService};
use cashout_types::{
	AccountClass, Amounts, AuditContext, AuditSnapshot, ProviderType, TraceId, TransactionId,
	TransactionRecord, TransferEvent, TransferReason, TransferRequest,
};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Acceptance of a request. The outcome arrives later on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
	/// A worker was launched under this ticket.
	Started { transaction_id: TransactionId },
	/// Queued behind the active transfer at this 1-based position.
	Deferred { position: usize },
}

/// Lifecycle of the orchestrator's single transfer slot.
///
/// `Completed` and `Failed` report the last outcome until the next
/// admission; [`TransferOrchestrator::in_progress`] is the authoritative
/// busy flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferPhase {
	#[default]
	Idle,
	Admitted,
	InFlight,
	Completed,
	Failed,
	/// A record is kept after a fault whose outcome is unknown. Only the
	/// recovery coordinator moves it forward.
	SuspendedForRecovery,
}

pub(crate) struct TransferState {
	pub(crate) records: RecordStore,
	pub(crate) queue: PendingQueue,
	pub(crate) phase: TransferPhase,
}

enum Outcome {
	Completed(Amounts),
	Failed(Amounts),
	Suspended,
}

struct Shared {
	config: OrchestratorConfig,
	state: Mutex<TransferState>,
	registry: ProviderRegistry,
	bank: Arc<dyn BankInterface>,
	coordinator: Arc<dyn TransactionCoordinator>,
	gate: Arc<dyn LaunderingGate>,
	events: EventBus,
	audit: AuditContext,
	/// Parent of every worker token; cancelled once by `shutdown`.
	disposal: CancellationToken,
}

/// Cheap to clone; every clone drives the same transfer slot.
#[derive(Clone)]
pub struct TransferOrchestrator {
	shared: Arc<Shared>,
}

impl TransferOrchestrator {
	pub fn new(
		config: OrchestratorConfig,
		storage: StorageService,
		registry: ProviderRegistry,
		bank: Arc<dyn BankInterface>,
		coordinator: Arc<dyn TransactionCoordinator>,
		gate: Arc<dyn LaunderingGate>,
	) -> Self {
		let state = TransferState {
			records: RecordStore::new(storage),
			queue: PendingQueue::new(config.max_pending),
			phase: TransferPhase::Idle,
		};
		let events = EventBus::new(config.event_capacity);

		Self {
			shared: Arc::new(Shared {
				config,
				state: Mutex::new(state),
				registry,
				bank,
				coordinator,
				gate,
				events,
				audit: AuditContext::new(),
				disposal: CancellationToken::new(),
			}),
		}
	}

	/// Self-initiated transfer of the whole balance.
	pub async fn transfer_out(
		&self,
		reason: TransferReason,
		trace_id: TraceId,
	) -> Result<Admission, AdmissionError> {
		self.admit_owned(TransferRequest::whole_balance(reason, trace_id))
			.await
	}

	/// Self-initiated transfer of `amount` from a single account class.
	pub async fn transfer_out_class(
		&self,
		class: AccountClass,
		amount: u64,
		reason: TransferReason,
		trace_id: TraceId,
	) -> Result<Admission, AdmissionError> {
		if amount == 0 {
			return Err(AdmissionError::InvalidAmount);
		}
		let mut request = TransferRequest::whole_balance(reason, trace_id);
		request.amounts = Some(Amounts::single(class, amount));
		self.admit_owned(request).await
	}

	/// Self-initiated transfer of the whole balance through one provider type.
	pub async fn transfer_out_with(
		&self,
		provider_type: ProviderType,
		reason: TransferReason,
		trace_id: TraceId,
	) -> Result<Admission, AdmissionError> {
		let mut request = TransferRequest::whole_balance(reason, trace_id);
		request.restrict_to = Some(provider_type);
		self.admit_owned(request).await
	}

	/// Transfer under a ticket held by an external coordinator. Queued when
	/// another transfer is active.
	pub async fn transfer_out_external(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
		associated_transactions: Vec<u64>,
		reason: TransferReason,
		trace_id: TraceId,
	) -> Result<Admission, AdmissionError> {
		let request = TransferRequest {
			amounts: Some(amounts),
			reason,
			associated_transactions,
			trace_id,
			is_owned: false,
			restrict_to: None,
			start_from: None,
		};
		self.admit_external(transaction_id, request).await
	}

	/// Externally-coordinated payout of a win or bonus that resumes the
	/// provider walk at `start_from`.
	pub async fn transfer_out_continuation(
		&self,
		transaction_id: TransactionId,
		amounts: Amounts,
		associated_transactions: Vec<u64>,
		reason: TransferReason,
		start_from: ProviderType,
		trace_id: TraceId,
	) -> Result<Admission, AdmissionError> {
		if !reason.allows_continuation() {
			return Err(AdmissionError::InvalidReason);
		}
		let request = TransferRequest {
			amounts: Some(amounts),
			reason,
			associated_transactions,
			trace_id,
			is_owned: false,
			restrict_to: None,
			start_from: Some(start_from),
		};
		self.admit_external(transaction_id, request).await
	}

	/// Receives every transfer event published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
		self.shared.events.subscribe()
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.shared.events
	}

	/// Returns the orchestrator configuration.
	pub fn config(&self) -> &OrchestratorConfig {
		&self.shared.config
	}

	/// Providers in configured order.
	pub fn registry(&self) -> &ProviderRegistry {
		&self.shared.registry
	}

	/// True while a transaction record exists, running or suspended.
	pub async fn in_progress(&self) -> bool {
		self.shared.state.lock().await.records.current().is_some()
	}

	/// Trace id of the transfer holding the slot.
	pub async fn current_trace_id(&self) -> Option<TraceId> {
		let state = self.shared.state.lock().await;
		state.records.current().map(|record| record.trace_id.clone())
	}

	/// Snapshot of the in-progress record, including its checkpoint.
	pub async fn current_record(&self) -> Option<TransactionRecord> {
		self.shared.state.lock().await.records.current().cloned()
	}

	/// Number of deferred requests waiting for the slot.
	pub async fn pending_count(&self) -> usize {
		self.shared.state.lock().await.queue.len()
	}

	/// Current lifecycle phase of the transfer slot.
	pub async fn phase(&self) -> TransferPhase {
		self.shared.state.lock().await.phase
	}

	/// Settlement reference and provider of the current or last transfer.
	pub fn audit_context(&self) -> AuditSnapshot {
		self.shared.audit.snapshot()
	}

	/// Stops the active worker before its next provider call. Returns false
	/// when no worker is running.
	pub async fn cancel(&self) -> bool {
		let state = self.shared.state.lock().await;
		match state.records.cancellation() {
			Some(token) => {
				info!("Cancelling active transfer");
				token.cancel();
				true
			}
			None => false,
		}
	}

	/// Disposes of the orchestrator. The active worker stops before its next
	/// provider call and its record stays persisted for restart recovery.
	/// Queued requests are dropped and new ones rejected. Returns the number
	/// of dropped requests.
	pub async fn shutdown(&self) -> usize {
		let mut state = self.shared.state.lock().await;
		self.shared.disposal.cancel();
		let dropped = state.queue.clear();
		info!(dropped, "Transfer orchestrator shut down");
		dropped
	}

	/// Trace ids of every request still waiting for an outcome: an
	/// externally-coordinated record with no live worker, then the queue.
	pub async fn recover_all(&self) -> Vec<TraceId> {
		let state = self.shared.state.lock().await;
		let mut traces = Vec::new();
		if let Some(record) = state.records.current() {
			if !record.is_owned && state.records.cancellation().is_none() {
				traces.push(record.trace_id.clone());
			}
		}
		traces.extend(state.queue.trace_ids());
		traces
	}

	pub(crate) fn state(&self) -> &Mutex<TransferState> {
		&self.shared.state
	}

	pub(crate) fn coordinator(&self) -> &Arc<dyn TransactionCoordinator> {
		&self.shared.coordinator
	}

	pub(crate) fn gate(&self) -> &Arc<dyn LaunderingGate> {
		&self.shared.gate
	}

	/// Cancellation handle for a new worker. Cancelled by `cancel` for this
	/// worker alone, or by `shutdown` for all of them.
	pub(crate) fn worker_token(&self) -> CancellationToken {
		self.shared.disposal.child_token()
	}

	fn is_shut_down(&self) -> bool {
		self.shared.disposal.is_cancelled()
	}

	async fn admit_owned(&self, request: TransferRequest) -> Result<Admission, AdmissionError> {
		let mut state = self.shared.state.lock().await;
		if self.is_shut_down() {
			return Err(AdmissionError::ShutDown);
		}
		if state.records.current().is_some() {
			return Err(AdmissionError::Busy);
		}
		self.admit_locked(&mut state, request, None).await
	}

	async fn admit_external(
		&self,
		transaction_id: TransactionId,
		request: TransferRequest,
	) -> Result<Admission, AdmissionError> {
		if request.amounts.is_some_and(|amounts| amounts.is_zero()) {
			return Err(AdmissionError::InvalidAmount);
		}

		let mut state = self.shared.state.lock().await;
		if self.is_shut_down() {
			return Err(AdmissionError::ShutDown);
		}
		if state.records.current().is_some() {
			let trace_id = request.trace_id.clone();
			let position = state.queue.push(PendingEntry {
				transaction_id,
				request,
			})?;
			info!(%trace_id, position, "Transfer in progress, request deferred");
			return Ok(Admission::Deferred { position });
		}
		self.admit_locked(&mut state, request, Some(transaction_id))
			.await
	}

	/// Validates, takes the ticket, persists the record and launches the
	/// worker. `ticket` is the externally supplied transaction id, if any.
	async fn admit_locked(
		&self,
		state: &mut TransferState,
		request: TransferRequest,
		ticket: Option<TransactionId>,
	) -> Result<Admission, AdmissionError> {
		let shared = &self.shared;

		if shared.registry.permitted().is_empty() && !shared.gate.threshold_reached() {
			return Err(AdmissionError::NoProviders);
		}

		self.check_balance(&request).await?;

		let transaction_id = match ticket {
			None => shared
				.coordinator
				.try_request(&shared.config.requestor_id)
				.ok_or(AdmissionError::TicketDenied)?,
			Some(transaction_id) => {
				if !shared.coordinator.verify(&transaction_id) {
					return Err(AdmissionError::TicketDenied);
				}
				transaction_id
			}
		};

		let record = TransactionRecord::new(transaction_id, &request);
		if let Err(e) = state.records.set(record).await {
			error!(%transaction_id, error = %e, "Failed to persist transaction record");
			if request.is_owned {
				shared.coordinator.release(&transaction_id);
			}
			return Err(AdmissionError::Storage(e.to_string()));
		}

		let cancellation = self.worker_token();
		state.records.attach_cancellation(cancellation.clone());
		state.phase = TransferPhase::Admitted;

		info!(
			%transaction_id,
			trace_id = %request.trace_id,
			reason = %request.reason,
			owned = request.is_owned,
			"Transfer admitted"
		);
		self.launch_transfer(transaction_id, request, cancellation);
		Ok(Admission::Started { transaction_id })
	}

	async fn check_balance(&self, request: &TransferRequest) -> Result<(), AdmissionError> {
		if !request.reason.affects_balance() {
			return Ok(());
		}
		let balances = self
			.shared
			.bank
			.balances()
			.await
			.map_err(|e| AdmissionError::Bank(e.to_string()))?;

		match request.amounts {
			None if balances.is_zero() => Err(AdmissionError::NoBalance),
			Some(amounts) if amounts.exceeds(&balances) => Err(AdmissionError::InsufficientBalance),
			_ => Ok(()),
		}
	}

	pub(crate) fn launch_transfer(
		&self,
		transaction_id: TransactionId,
		request: TransferRequest,
		cancellation: CancellationToken,
	) {
		let orchestrator = self.clone();
		tokio::spawn(async move {
			orchestrator
				.run_transfer(transaction_id, request, cancellation)
				.await;
		});
	}

	async fn run_transfer(
		&self,
		transaction_id: TransactionId,
		request: TransferRequest,
		cancellation: CancellationToken,
	) {
		let requested = match self.resolve_amounts(&request).await {
			Ok(amounts) => amounts,
			Err(e) => {
				warn!(
					%transaction_id,
					trace_id = %request.trace_id,
					error = %e,
					"Could not read balances, suspending transfer"
				);
				self.finish(transaction_id, &request, Outcome::Suspended)
					.await;
				return;
			}
		};
		if let Err(e) = self.checkpoint(transaction_id, requested).await {
			error!(%transaction_id, error = %e, "Failed to checkpoint transfer, suspending");
			self.finish(transaction_id, &request, Outcome::Suspended)
				.await;
			return;
		}

		self.shared
			.events
			.publish(TransferEvent::Started {
				requested,
				trace_id: request.trace_id.clone(),
			})
			.ok();
		self.shared.audit.reset();

		let outcome = self
			.fan_out(transaction_id, &request, requested, &cancellation)
			.await;
		self.finish(transaction_id, &request, outcome).await;
	}

	/// Amounts the worker will move. Balance-spending transfers never ask for
	/// more than the bank holds right now.
	async fn resolve_amounts(
		&self,
		request: &TransferRequest,
	) -> Result<Amounts, cashout_bank::BankError> {
		match request.amounts {
			Some(amounts) if request.reason.affects_balance() => {
				Ok(amounts.min(&self.shared.bank.balances().await?))
			}
			Some(amounts) => Ok(amounts),
			None => self.shared.bank.balances().await,
		}
	}

	/// Persists what is left to move. A restart resumes from here, so the
	/// worker must not call another provider unless this succeeded.
	async fn checkpoint(
		&self,
		transaction_id: TransactionId,
		remaining: Amounts,
	) -> Result<(), StorageError> {
		let mut state = self.shared.state.lock().await;
		state.phase = TransferPhase::InFlight;

		let Some(mut record) = state.records.current().cloned() else {
			return Ok(());
		};
		if record.transaction_id != transaction_id {
			return Ok(());
		}
		record.remaining = Some(remaining);
		state.records.set(record).await
	}

	async fn fan_out(
		&self,
		transaction_id: TransactionId,
		request: &TransferRequest,
		requested: Amounts,
		cancellation: &CancellationToken,
	) -> Outcome {
		let trace_id = &request.trace_id;
		if requested.is_zero() {
			info!(%transaction_id, %trace_id, "Nothing to transfer");
			return Outcome::Completed(Amounts::ZERO);
		}

		let filter = ProviderFilter {
			handpay_only: self.shared.gate.threshold_reached(),
			restrict_to: request.restrict_to.clone(),
			start_from: request.start_from.clone(),
		};
		if filter.handpay_only {
			warn!(%trace_id, "Laundering threshold reached, transfer restricted to handpay");
		}

		let mut remaining = requested;
		for entry in self.shared.registry.select(&filter) {
			if cancellation.is_cancelled() {
				info!(%transaction_id, %trace_id, "Transfer cancelled before {}", entry.provider_type);
				break;
			}

			let instruction = TransferInstruction {
				transaction_id,
				amounts: remaining,
				associated_transactions: request.associated_transactions.clone(),
				reason: request.reason,
				trace_id: trace_id.clone(),
			};

			match entry
				.provider
				.transfer(&instruction, cancellation.clone())
				.await
			{
				Ok(result) if result.success => {
					if result.transferred.exceeds(&remaining) {
						warn!(
							provider = %entry.provider_type,
							moved = %result.transferred,
							%remaining,
							"Provider moved more than requested"
						);
					}
					remaining = remaining.saturating_sub(&result.transferred);
					self.shared
						.audit
						.record(entry.provider_type.clone(), result.reference.clone());

					debug!(
						provider = %entry.provider_type,
						moved = %result.transferred,
						%remaining,
						"Provider step complete"
					);
					if remaining.is_zero() {
						return Outcome::Completed(requested);
					}
					if let Err(e) = self.checkpoint(transaction_id, remaining).await {
						error!(
							%transaction_id,
							%remaining,
							error = %e,
							"Failed to checkpoint transfer, suspending"
						);
						return Outcome::Suspended;
					}
					if result.partial {
						info!(
							provider = %entry.provider_type,
							%remaining,
							"Provider took over the remainder, stopping"
						);
						break;
					}
				}
				Ok(_) => {
					debug!(provider = %entry.provider_type, "Provider declined, trying next");
				}
				Err(e) if e.is_recoverable() => {
					error!(
						%transaction_id,
						provider = %entry.provider_type,
						error = %e,
						"Transfer interrupted"
					);
					return Outcome::Suspended;
				}
				Err(e) => {
					error!(
						%transaction_id,
						provider = %entry.provider_type,
						error = %e,
						"Transfer aborted"
					);
					break;
				}
			}
		}

		// disposal interrupts, it never decides the outcome
		if self.is_shut_down() {
			info!(%transaction_id, %trace_id, "Shutting down, transfer left for recovery");
			return Outcome::Suspended;
		}
		Outcome::Failed(remaining)
	}

	async fn finish(&self, transaction_id: TransactionId, request: &TransferRequest, outcome: Outcome) {
		let mut state = self.shared.state.lock().await;
		let trace_id = request.trace_id.clone();

		let event = match outcome {
			Outcome::Suspended => {
				state.records.detach_cancellation();
				state.phase = TransferPhase::SuspendedForRecovery;
				warn!(%transaction_id, %trace_id, "Transfer suspended, record kept for recovery");
				return;
			}
			Outcome::Completed(transferred) => TransferEvent::Completed {
				transferred,
				pending: false,
				trace_id,
			},
			Outcome::Failed(remaining) => TransferEvent::Failed {
				remaining,
				trace_id,
			},
		};

		self.settle(&mut state, transaction_id, request.is_owned, event)
			.await;
	}

	/// Terminal step shared by transfer and recovery workers: clears the
	/// record, hands back a self-held ticket, publishes the outcome and
	/// serves the next queued request.
	pub(crate) async fn settle(
		&self,
		state: &mut TransferState,
		transaction_id: TransactionId,
		is_owned: bool,
		mut event: TransferEvent,
	) {
		state.records.detach_cancellation();
		let cleared = match state.records.clear().await {
			Ok(()) => true,
			Err(e) => {
				error!(
					%transaction_id,
					error = %e,
					"Failed to clear transaction record, it will be recovered at restart"
				);
				false
			}
		};
		if cleared && is_owned {
			self.shared.coordinator.release(&transaction_id);
		}

		state.phase = match event {
			TransferEvent::Completed { .. } => TransferPhase::Completed,
			_ => TransferPhase::Failed,
		};
		if let TransferEvent::Completed { pending, .. } = &mut event {
			*pending = !state.queue.is_empty();
		}

		info!(%transaction_id, "Transfer finished: {:?}", event);
		self.shared.events.publish(event).ok();

		if state.records.current().is_none() {
			self.drain_pending(state).await;
		}
	}

	/// Serves queued requests in order until one is admitted. A request
	/// that no longer passes admission is reported as failed.
	pub(crate) async fn drain_pending(&self, state: &mut TransferState) {
		while let Some(entry) = state.queue.pop() {
			let trace_id = entry.trace_id().clone();
			let remaining = entry.request.amounts.unwrap_or_default();

			match self
				.admit_locked(state, entry.request, Some(entry.transaction_id))
				.await
			{
				Ok(_) => {
					debug!(%trace_id, "Deferred request admitted");
					return;
				}
				Err(e) => {
					warn!(%trace_id, error = %e, "Deferred request rejected");
					self.shared
						.events
						.publish(TransferEvent::Failed {
							remaining,
							trace_id,
						})
						.ok();
				}
			}
		}
	}
}
