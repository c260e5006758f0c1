//! Configuration loading for the cash-out service.
//!
//! Configuration is a TOML file. `${VAR}` references are substituted from
//! the environment before parsing, a handful of settings can be overridden
//! with `<PREFIX>`-prefixed variables, and the result is checked for
//! consistency before it is handed out.

use regex::Regex;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::*;

const KNOWN_STORAGE_BACKENDS: [&str; 2] = ["file", "memory"];

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Loads [`Config`] from a TOML file with `${VAR}` substitution and
/// environment overrides.
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "CASHOUT_".to_string(),
		}
	}

	/// Sets the configuration file to read.
	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	/// Prefix of override variables, `CASHOUT_` by default.
	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Reads, substitutes, overrides and validates the configured file.
	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self
			.file_path
			.as_ref()
			.ok_or_else(|| ConfigError::FileNotFound("No configuration file specified".to_string()))?;

		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.clone()))
			}
			Err(e) => return Err(e.into()),
		};

		debug!("Loaded configuration file {}", file_path);
		self.load_from_str(&content)
	}

	/// Parses, overrides and validates configuration text.
	pub fn load_from_str(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = substitute_env_vars(content)?;

		let mut config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.service.log_level = log_level;
		}

		if let Ok(path) = env::var(format!("{}STORAGE_PATH", self.env_prefix)) {
			let table = config.storage.config.as_table_mut().ok_or_else(|| {
				ConfigError::ValidationError("storage.config must be a table".to_string())
			})?;
			table.insert("storage_path".to_string(), toml::Value::String(path));
		}

		if let Ok(max_pending) = env::var(format!("{}MAX_PENDING", self.env_prefix)) {
			config.orchestrator.max_pending = max_pending
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid max pending: {}", e)))?;
		}

		Ok(())
	}
}

fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

	let mut result = content.to_string();
	for cap in re.captures_iter(content) {
		let var_name = &cap[1];
		let value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
		result = result.replace(&cap[0], &value);
	}

	Ok(result)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
	if config.providers.is_empty() {
		return Err(ConfigError::ValidationError(
			"At least one settlement provider must be configured".to_string(),
		));
	}

	let mut seen = HashSet::new();
	for provider in &config.providers {
		if !seen.insert(provider.provider_type()) {
			return Err(ConfigError::ValidationError(format!(
				"Provider type '{}' is configured more than once",
				provider.provider_type
			)));
		}
	}

	if !KNOWN_STORAGE_BACKENDS.contains(&config.storage.backend.as_str()) {
		return Err(ConfigError::ValidationError(format!(
			"Unknown storage backend '{}'",
			config.storage.backend
		)));
	}

	if config.orchestrator.requestor_id.trim().is_empty() {
		return Err(ConfigError::ValidationError(
			"orchestrator.requestor_id must not be empty".to_string(),
		));
	}

	if config.orchestrator.event_capacity == 0 || config.orchestrator.max_pending == 0 {
		return Err(ConfigError::ValidationError(
			"orchestrator.event_capacity and orchestrator.max_pending must be positive"
				.to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use cashout_types::{Amounts, ProviderType};
	use std::io::Write;

	const BASIC: &str = r#"
[storage]
backend = "memory"

[bank]
limit = 100000
initial = { cashable = 500 }

[[providers]]
type = "voucher"
implementation = "ledger"

[[providers]]
type = "handpay"
implementation = "ledger"
permitted = false
config = { max_amount = 1000 }
"#;

	#[test]
	fn test_defaults_and_order() {
		let config = ConfigLoader::new()
			.with_env_prefix("CASHOUT_TEST_DEFAULTS_")
			.load_from_str(BASIC)
			.unwrap();

		assert_eq!(config.service.name, "cashout");
		assert_eq!(config.orchestrator.requestor_id, "cashout");
		assert_eq!(config.orchestrator.max_pending, 64);
		assert!(config.orchestrator.auto_recover);
		assert_eq!(config.bank.initial, Amounts::new(500, 0, 0));
		assert!(config.laundering.threshold.is_none());

		let types: Vec<_> = config.providers.iter().map(|p| p.provider_type()).collect();
		assert_eq!(types, vec![ProviderType::Voucher, ProviderType::Handpay]);
		assert!(config.providers[0].permitted);
		assert!(!config.providers[1].permitted);
		assert_eq!(
			config.providers[1].config.get("max_amount").and_then(|v| v.as_integer()),
			Some(1000)
		);
	}

	#[test]
	fn test_env_substitution_and_overrides() {
		env::set_var("CASHOUT_TEST_SUBST_BACKEND", "file");
		env::set_var("CASHOUT_TEST_OVR_STORAGE_PATH", "/var/lib/cashout");
		env::set_var("CASHOUT_TEST_OVR_LOG_LEVEL", "debug");

		let content = BASIC.replace("\"memory\"", "\"${CASHOUT_TEST_SUBST_BACKEND}\"");
		let config = ConfigLoader::new()
			.with_env_prefix("CASHOUT_TEST_OVR_")
			.load_from_str(&content)
			.unwrap();

		assert_eq!(config.storage.backend, "file");
		assert_eq!(
			config.storage.config.get("storage_path").and_then(|v| v.as_str()),
			Some("/var/lib/cashout")
		);
		assert_eq!(config.service.log_level, "debug");
	}

	#[test]
	fn test_missing_env_var() {
		let content = BASIC.replace("\"memory\"", "\"${CASHOUT_TEST_DEFINITELY_UNSET}\"");
		let result = ConfigLoader::new().load_from_str(&content);
		assert!(matches!(
			result,
			Err(ConfigError::EnvVarNotFound(name)) if name == "CASHOUT_TEST_DEFINITELY_UNSET"
		));
	}

	#[test]
	fn test_validation_failures() {
		let loader = ConfigLoader::new().with_env_prefix("CASHOUT_TEST_VALIDATION_");

		let duplicate = format!(
			"{}\n[[providers]]\ntype = \"voucher\"\nimplementation = \"ledger\"\n",
			BASIC
		);
		assert!(matches!(
			loader.load_from_str(&duplicate),
			Err(ConfigError::ValidationError(_))
		));

		let no_providers = "providers = []\n[storage]\nbackend = \"memory\"\n";
		assert!(matches!(
			loader.load_from_str(no_providers),
			Err(ConfigError::ValidationError(_))
		));

		let bad_backend = BASIC.replace("\"memory\"", "\"redis\"");
		assert!(matches!(
			loader.load_from_str(&bad_backend),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(BASIC.as_bytes()).unwrap();

		let config = ConfigLoader::new()
			.with_env_prefix("CASHOUT_TEST_FILE_")
			.with_file(file.path())
			.load()
			.await
			.unwrap();
		assert_eq!(config.providers.len(), 2);

		let missing = ConfigLoader::new()
			.with_file("/definitely/not/here.toml")
			.load()
			.await;
		assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));
	}
}
