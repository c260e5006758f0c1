//! Configuration types.

use cashout_types::{Amounts, ProviderType};
use serde::{Deserialize, Serialize};

/// Top-level configuration of the cash-out service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub service: ServiceConfig,
	#[serde(default)]
	pub orchestrator: OrchestratorConfig,
	pub storage: StorageConfig,
	#[serde(default)]
	pub bank: BankConfig,
	#[serde(default)]
	pub laundering: LaunderingConfig,
	/// Settlement providers in fan-out order.
	pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			name: default_name(),
			log_level: default_log_level(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
	/// Name used when requesting admission tickets.
	#[serde(default = "default_name")]
	pub requestor_id: String,
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
	/// Bound on externally-coordinated requests waiting for their turn.
	#[serde(default = "default_max_pending")]
	pub max_pending: usize,
	/// Relaunch a self-initiated transfer found in storage at startup.
	#[serde(default = "default_true")]
	pub auto_recover: bool,
}

impl Default for OrchestratorConfig {
	fn default() -> Self {
		Self {
			requestor_id: default_name(),
			event_capacity: default_event_capacity(),
			max_pending: default_max_pending(),
			auto_recover: true,
		}
	}
}

/// Durable storage backend for the transaction record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// `file` or `memory`.
	pub backend: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BankConfig {
	#[serde(default = "default_limit")]
	pub limit: u64,
	/// Opening balances for the in-process bank.
	#[serde(default)]
	pub initial: Amounts,
}

impl Default for BankConfig {
	fn default() -> Self {
		Self {
			limit: default_limit(),
			initial: Amounts::ZERO,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LaunderingConfig {
	/// Accumulated money-in that restricts cash-out to handpay.
	pub threshold: Option<u64>,
}

/// One entry of the ordered `[[providers]]` list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
	#[serde(rename = "type")]
	pub provider_type: String,
	/// Registered implementation name, e.g. `ledger`.
	pub implementation: String,
	#[serde(default = "default_true")]
	pub permitted: bool,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl ProviderConfig {
	/// Parsed `type`; unknown names become custom provider types.
	pub fn provider_type(&self) -> ProviderType {
		match self.provider_type.parse() {
			Ok(provider_type) => provider_type,
			Err(never) => match never {},
		}
	}
}

fn default_name() -> String {
	"cashout".to_string()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_event_capacity() -> usize {
	1000
}

fn default_max_pending() -> usize {
	64
}

fn default_limit() -> u64 {
	u64::MAX
}

fn default_true() -> bool {
	true
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}
