//! Wiring of the engine for a standalone machine.

use anyhow::{bail, Context, Result};
use cashout_bank::implementations::memory::MemoryBank;
use cashout_bank::{BankInterface, LocalTransactionCoordinator, ThresholdGate};
use cashout_config::Config;
use cashout_core::{
	OrchestratorBuilder, RecoveryCoordinator, TransferOrchestrator, TransferPhase,
};
use cashout_providers::implementations::ledger;
use cashout_storage::implementations::{file, memory};
use cashout_types::{TraceId, TransactionId, TransferEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// A configured orchestrator and its recovery coordinator.
pub struct CashoutService {
	pub orchestrator: TransferOrchestrator,
	pub recovery: RecoveryCoordinator,
}

impl CashoutService {
	/// Builds the orchestrator over an in-process bank seeded with the
	/// configured opening balances.
	pub async fn build(config: Config) -> Result<Self> {
		let bank = Arc::new(MemoryBank::new(config.bank.limit));
		let gate = Arc::new(ThresholdGate::new(config.laundering.threshold));

		let initial = config.bank.initial;
		if !initial.is_zero() {
			bank.deposit(TransactionId::new(), initial)
				.await
				.context("Failed to seed opening balances")?;
			gate.record_money_in(initial.total());
			info!("Opening balances: {}", initial);
		}

		let orchestrator = OrchestratorBuilder::new(config)
			.with_storage_factory("file", file::create_storage)
			.with_storage_factory("memory", |c| Ok(memory::create_storage(c)))
			.with_provider_factory("ledger", ledger::create_provider)
			.with_bank(bank)
			.with_coordinator(Arc::new(LocalTransactionCoordinator::new()))
			.with_gate(gate)
			.build()
			.context("Failed to build orchestrator")?;
		let recovery = RecoveryCoordinator::new(orchestrator.clone());

		Ok(Self {
			orchestrator,
			recovery,
		})
	}

	/// Runs startup recovery and reports what is left for callers.
	pub async fn startup(&self) -> Result<()> {
		if let Some(trace_id) = self
			.recovery
			.on_startup()
			.await
			.context("Startup recovery failed")?
		{
			info!("Resumed interrupted transfer {}", trace_id);
		}

		let waiting = self.orchestrator.recover_all().await;
		if !waiting.is_empty() {
			warn!(
				"Transfers awaiting explicit recovery: {}",
				waiting
					.iter()
					.map(TraceId::as_str)
					.collect::<Vec<_>>()
					.join(", ")
			);
		}
		Ok(())
	}

	/// Waits for the terminal event of `trace_id`. `None` means the
	/// transfer was suspended for recovery instead.
	pub async fn wait_for_outcome(
		&self,
		events: &mut broadcast::Receiver<TransferEvent>,
		trace_id: &TraceId,
	) -> Result<Option<TransferEvent>> {
		let mut poll = tokio::time::interval(Duration::from_millis(200));
		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) if event.is_terminal() && event.trace_id() == trace_id => {
						return Ok(Some(event));
					}
					Ok(_) => {}
					Err(RecvError::Lagged(skipped)) => warn!("Event stream lagged by {}", skipped),
					Err(RecvError::Closed) => bail!("Event bus closed"),
				},
				_ = poll.tick() => {
					let suspended =
						self.orchestrator.phase().await == TransferPhase::SuspendedForRecovery;
					if suspended
						&& self.orchestrator.current_trace_id().await.as_ref() == Some(trace_id)
					{
						return Ok(None);
					}
				}
			}
		}
	}
}

/// Logs every event until the bus closes.
pub async fn log_events(mut events: broadcast::Receiver<TransferEvent>) {
	loop {
		match events.recv().await {
			Ok(TransferEvent::Started {
				requested,
				trace_id,
			}) => info!("Transfer {} started for {}", trace_id, requested),
			Ok(TransferEvent::Completed {
				transferred,
				pending,
				trace_id,
			}) => info!(
				"Transfer {} completed: moved {} (pending: {})",
				trace_id, transferred, pending
			),
			Ok(TransferEvent::Failed {
				remaining,
				trace_id,
			}) => warn!("Transfer {} failed with {} unmet", trace_id, remaining),
			Err(RecvError::Lagged(skipped)) => warn!("Event log lagged by {}", skipped),
			Err(RecvError::Closed) => break,
		}
	}
}
