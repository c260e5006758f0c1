//! Scripted collaborators shared by the orchestrator and recovery tests.

use crate::{TransferOrchestrator, TransferPhase};
use async_trait::async_trait;
use cashout_bank::{BankInterface, ThresholdGate, TransactionCoordinator};
use cashout_config::OrchestratorConfig;
use cashout_providers::{ProviderError, ProviderInterface, ProviderRegistry, TransferInstruction};
use cashout_storage::implementations::memory::MemoryStorage;
use cashout_storage::{StorageError, StorageInterface, StorageService};
use cashout_types::{
	Amounts, ConfigSchema, ProviderResult, ProviderType, Schema, TransactionId, TransactionRecord,
	TransferEvent, ValidationError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;

/// What a mock provider answers to `transfer`.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
	/// Moves everything it is asked for.
	Succeed,
	/// Reports moving exactly these amounts.
	Move(Amounts),
	Partial(Amounts),
	Decline,
	Recoverable,
	Fatal,
}

pub struct MockProvider {
	provider_type: ProviderType,
	behavior: Behavior,
	hold: Option<Arc<Semaphore>>,
	can_recover: bool,
	resolves: bool,
	recover_hold: Option<Arc<Semaphore>>,
	transfer_calls: AtomicUsize,
	recover_calls: AtomicUsize,
	last_amounts: Mutex<Option<Amounts>>,
}

impl MockProvider {
	pub fn new(provider_type: ProviderType, behavior: Behavior) -> Self {
		Self {
			provider_type,
			behavior,
			hold: None,
			can_recover: false,
			resolves: false,
			recover_hold: None,
			transfer_calls: AtomicUsize::new(0),
			recover_calls: AtomicUsize::new(0),
			last_amounts: Mutex::new(None),
		}
	}

	/// Each `transfer` waits for one permit before answering.
	pub fn held(mut self, hold: Arc<Semaphore>) -> Self {
		self.hold = Some(hold);
		self
	}

	/// Claims unresolved state for every transaction; `recover` answers
	/// `resolves`.
	pub fn recoverable(mut self, resolves: bool) -> Self {
		self.can_recover = true;
		self.resolves = resolves;
		self
	}

	/// Each `recover` waits for one permit before answering.
	pub fn recover_held(mut self, hold: Arc<Semaphore>) -> Self {
		self.recover_hold = Some(hold);
		self
	}

	pub fn transfer_calls(&self) -> usize {
		self.transfer_calls.load(Ordering::SeqCst)
	}

	pub fn recover_calls(&self) -> usize {
		self.recover_calls.load(Ordering::SeqCst)
	}

	pub fn last_amounts(&self) -> Option<Amounts> {
		*self.last_amounts.lock().unwrap()
	}
}

async fn wait_for_permit(hold: &Option<Arc<Semaphore>>) {
	if let Some(hold) = hold {
		if let Ok(permit) = hold.acquire().await {
			permit.forget();
		}
	}
}

struct MockSchema;

impl ConfigSchema for MockSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::default().validate(config)
	}
}

#[async_trait]
impl ProviderInterface for MockProvider {
	fn provider_type(&self) -> ProviderType {
		self.provider_type.clone()
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockSchema)
	}

	async fn transfer(
		&self,
		instruction: &TransferInstruction,
		_cancellation: CancellationToken,
	) -> Result<ProviderResult, ProviderError> {
		self.transfer_calls.fetch_add(1, Ordering::SeqCst);
		*self.last_amounts.lock().unwrap() = Some(instruction.amounts);
		wait_for_permit(&self.hold).await;

		let reference = format!("{}-ref", self.provider_type);
		match self.behavior {
			Behavior::Succeed => {
				Ok(ProviderResult::success(instruction.amounts).with_reference(reference))
			}
			Behavior::Move(amounts) => Ok(ProviderResult::success(amounts).with_reference(reference)),
			Behavior::Partial(amounts) => {
				Ok(ProviderResult::partial(amounts).with_reference(reference))
			}
			Behavior::Decline => Ok(ProviderResult::failed()),
			Behavior::Recoverable => Err(ProviderError::Recoverable("link lost".to_string())),
			Behavior::Fatal => Err(ProviderError::Fatal("printer jammed".to_string())),
		}
	}

	async fn can_recover(&self, _transaction_id: TransactionId) -> bool {
		self.can_recover
	}

	async fn recover(
		&self,
		_record: &TransactionRecord,
		_cancellation: CancellationToken,
	) -> Result<bool, ProviderError> {
		self.recover_calls.fetch_add(1, Ordering::SeqCst);
		wait_for_permit(&self.recover_hold).await;
		Ok(self.resolves)
	}
}

/// Coordinator that grants and verifies on demand and counts hand-backs.
pub struct MockCoordinator {
	grant: AtomicBool,
	valid: AtomicBool,
	requests: AtomicUsize,
	releases: AtomicUsize,
	abandons: AtomicUsize,
}

impl MockCoordinator {
	pub fn new() -> Self {
		Self {
			grant: AtomicBool::new(true),
			valid: AtomicBool::new(true),
			requests: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
			abandons: AtomicUsize::new(0),
		}
	}

	pub fn set_grant(&self, grant: bool) {
		self.grant.store(grant, Ordering::SeqCst);
	}

	pub fn set_valid(&self, valid: bool) {
		self.valid.store(valid, Ordering::SeqCst);
	}

	pub fn requests(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}

	pub fn releases(&self) -> usize {
		self.releases.load(Ordering::SeqCst)
	}

	pub fn abandons(&self) -> usize {
		self.abandons.load(Ordering::SeqCst)
	}
}

impl TransactionCoordinator for MockCoordinator {
	fn try_request(&self, _requestor: &str) -> Option<TransactionId> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		self.grant
			.load(Ordering::SeqCst)
			.then(TransactionId::new)
	}

	fn verify(&self, _transaction_id: &TransactionId) -> bool {
		self.valid.load(Ordering::SeqCst)
	}

	fn release(&self, _transaction_id: &TransactionId) {
		self.releases.fetch_add(1, Ordering::SeqCst);
	}

	fn abandon(&self, _transaction_id: &TransactionId) {
		self.abandons.fetch_add(1, Ordering::SeqCst);
	}
}

/// Memory storage whose writes start failing after a fixed number succeeded.
pub struct FlakyStorage {
	inner: MemoryStorage,
	writes_left: AtomicUsize,
}

impl FlakyStorage {
	pub fn new(successful_writes: usize) -> Self {
		Self {
			inner: MemoryStorage::new(),
			writes_left: AtomicUsize::new(successful_writes),
		}
	}
}

#[async_trait]
impl StorageInterface for FlakyStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}

	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let granted = self
			.writes_left
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok();
		if !granted {
			return Err(StorageError::Backend("disk full".to_string()));
		}
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}
}

pub struct Harness {
	pub orchestrator: TransferOrchestrator,
	pub events: broadcast::Receiver<TransferEvent>,
	pub coordinator: Arc<MockCoordinator>,
	pub gate: Arc<ThresholdGate>,
}

pub fn entry(provider: &Arc<MockProvider>, permitted: bool) -> (Arc<dyn ProviderInterface>, bool) {
	let provider: Arc<dyn ProviderInterface> = provider.clone();
	(provider, permitted)
}

pub fn harness(
	bank: Arc<dyn BankInterface>,
	storage: StorageService,
	providers: Vec<(Arc<dyn ProviderInterface>, bool)>,
	config: OrchestratorConfig,
) -> Harness {
	let mut registry = ProviderRegistry::new();
	for (provider, permitted) in providers {
		registry
			.register(provider.provider_type(), permitted, provider)
			.unwrap();
	}
	let coordinator = Arc::new(MockCoordinator::new());
	let gate = Arc::new(ThresholdGate::new(None));
	let orchestrator = TransferOrchestrator::new(
		config,
		storage,
		registry,
		bank,
		coordinator.clone(),
		gate.clone(),
	);
	let events = orchestrator.subscribe();
	Harness {
		orchestrator,
		events,
		coordinator,
		gate,
	}
}

pub async fn next_event(events: &mut broadcast::Receiver<TransferEvent>) -> TransferEvent {
	tokio::time::timeout(Duration::from_secs(5), events.recv())
		.await
		.expect("timed out waiting for event")
		.expect("event bus closed")
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.expect("condition not reached");
}

pub async fn wait_for_phase(orchestrator: &TransferOrchestrator, phase: TransferPhase) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while orchestrator.phase().await != phase {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.expect("phase not reached");
}
