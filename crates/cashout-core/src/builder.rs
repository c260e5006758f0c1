//! Assembles an orchestrator from configuration.

use crate::{CoreError, TransferOrchestrator};
use cashout_bank::{
	BankInterface, LaunderingGate, LocalTransactionCoordinator, ThresholdGate,
	TransactionCoordinator,
};
use cashout_config::Config;
use cashout_providers::{ProviderError, ProviderInterface, ProviderRegistry};
use cashout_storage::{StorageError, StorageInterface, StorageService};
use cashout_types::ProviderType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

type StorageFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send>;
type ProviderFactory = Box<
	dyn Fn(
			ProviderType,
			&toml::Value,
			Arc<dyn BankInterface>,
		) -> Result<Arc<dyn ProviderInterface>, ProviderError>
		+ Send,
>;

/// Builds a [`TransferOrchestrator`] from [`Config`].
///
/// Storage backends and provider implementations are looked up by the
/// names used in configuration, so a deployment only needs to register the
/// factories it ships with.
pub struct OrchestratorBuilder {
	config: Config,
	storage_factories: HashMap<String, StorageFactory>,
	provider_factories: HashMap<String, ProviderFactory>,
	bank: Option<Arc<dyn BankInterface>>,
	coordinator: Option<Arc<dyn TransactionCoordinator>>,
	gate: Option<Arc<dyn LaunderingGate>>,
}

impl OrchestratorBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factories: HashMap::new(),
			provider_factories: HashMap::new(),
			bank: None,
			coordinator: None,
			gate: None,
		}
	}

	/// Registers the factory for the storage backend called `name`.
	pub fn with_storage_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send + 'static,
	{
		self.storage_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Registers the factory for the provider implementation called `name`.
	pub fn with_provider_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(
				ProviderType,
				&toml::Value,
				Arc<dyn BankInterface>,
			) -> Result<Arc<dyn ProviderInterface>, ProviderError>
			+ Send
			+ 'static,
	{
		self.provider_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Bank ledger shared by the orchestrator and every provider. Required.
	pub fn with_bank(mut self, bank: Arc<dyn BankInterface>) -> Self {
		self.bank = Some(bank);
		self
	}

	/// Defaults to a [`LocalTransactionCoordinator`].
	pub fn with_coordinator(mut self, coordinator: Arc<dyn TransactionCoordinator>) -> Self {
		self.coordinator = Some(coordinator);
		self
	}

	/// Defaults to a [`ThresholdGate`] over `laundering.threshold`.
	pub fn with_gate(mut self, gate: Arc<dyn LaunderingGate>) -> Self {
		self.gate = Some(gate);
		self
	}

	/// Creates storage and providers from configuration and wires the
	/// orchestrator.
	pub fn build(self) -> Result<TransferOrchestrator, CoreError> {
		let bank = self
			.bank
			.ok_or_else(|| CoreError::Config("Bank not provided".into()))?;

		let storage_factory = self
			.storage_factories
			.get(&self.config.storage.backend)
			.ok_or_else(|| {
				CoreError::Config(format!(
					"No factory for storage backend '{}'",
					self.config.storage.backend
				))
			})?;
		let storage = StorageService::new(storage_factory(&self.config.storage.config)?);

		let mut registry = ProviderRegistry::new();
		for provider_config in &self.config.providers {
			let factory = self
				.provider_factories
				.get(&provider_config.implementation)
				.ok_or_else(|| {
					CoreError::Provider(ProviderError::UnknownImplementation(
						provider_config.implementation.clone(),
					))
				})?;
			let provider_type = provider_config.provider_type();
			let provider = factory(provider_type.clone(), &provider_config.config, bank.clone())?;
			registry.register(provider_type.clone(), provider_config.permitted, provider)?;
			info!(
				"Registered {} provider ({}, permitted: {})",
				provider_type, provider_config.implementation, provider_config.permitted
			);
		}

		if registry.is_empty() {
			return Err(CoreError::Config("No settlement providers configured".into()));
		}

		let coordinator: Arc<dyn TransactionCoordinator> = match self.coordinator {
			Some(coordinator) => coordinator,
			None => Arc::new(LocalTransactionCoordinator::new()),
		};
		let gate: Arc<dyn LaunderingGate> = match self.gate {
			Some(gate) => gate,
			None => Arc::new(ThresholdGate::new(self.config.laundering.threshold)),
		};

		Ok(TransferOrchestrator::new(
			self.config.orchestrator,
			storage,
			registry,
			bank,
			coordinator,
			gate,
		))
	}
}
