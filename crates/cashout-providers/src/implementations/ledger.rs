//! Ledger settlement provider.
//!
//! Settles directly against the bank ledger, up to an optional per-transfer
//! cap. With `claims_remainder` it reports a capped transfer as partial,
//! taking ownership of the rest the way an operator-attended handpay does.
//! It keeps no state between calls, so there is never anything to recover.

use crate::{ProviderError, ProviderInterface, TransferInstruction};
use async_trait::async_trait;
use cashout_bank::BankInterface;
use cashout_types::{
	AccountClass, Amounts, ConfigSchema, Field, FieldType, ProviderResult, ProviderType, Schema,
	TransactionId, TransactionRecord, ValidationError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Settles by debiting the bank ledger directly.
pub struct LedgerProvider {
	provider_type: ProviderType,
	bank: Arc<dyn BankInterface>,
	/// Cap on the total moved per transfer.
	max_amount: Option<u64>,
	claims_remainder: bool,
}

impl LedgerProvider {
	pub fn new(
		provider_type: ProviderType,
		bank: Arc<dyn BankInterface>,
		max_amount: Option<u64>,
		claims_remainder: bool,
	) -> Self {
		Self {
			provider_type,
			bank,
			max_amount,
			claims_remainder,
		}
	}

	/// Fills the cap class by class in canonical order.
	fn capped(&self, amounts: Amounts) -> Amounts {
		let Some(mut budget) = self.max_amount else {
			return amounts;
		};
		let mut capped = Amounts::ZERO;
		for class in AccountClass::ALL {
			let take = amounts.get(class).min(budget);
			*capped.get_mut(class) = take;
			budget -= take;
		}
		capped
	}
}

/// Accepts `max_amount` (at least 1) and `claims_remainder`.
pub struct LedgerProviderSchema;

impl ConfigSchema for LedgerProviderSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("max_amount", FieldType::Amount { min: 1 }),
				Field::new("claims_remainder", FieldType::Boolean),
			],
		)
		.validate(config)
	}
}

#[async_trait]
impl ProviderInterface for LedgerProvider {
	fn provider_type(&self) -> ProviderType {
		self.provider_type.clone()
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LedgerProviderSchema)
	}

	async fn transfer(
		&self,
		instruction: &TransferInstruction,
		cancellation: CancellationToken,
	) -> Result<ProviderResult, ProviderError> {
		if cancellation.is_cancelled() {
			return Ok(ProviderResult::failed());
		}

		let target = self.capped(instruction.amounts);
		let moved = if instruction.reason.affects_balance() {
			self.bank
				.withdraw(instruction.transaction_id, target)
				.await?
		} else {
			// wins and bonuses are paid without ever reaching the bank
			target
		};

		if moved.is_zero() {
			debug!(
				"{} provider moved nothing for {}",
				self.provider_type, instruction.trace_id
			);
			return Ok(ProviderResult::failed());
		}

		info!(
			"{} provider moved {} of {} for {}",
			self.provider_type, moved, instruction.amounts, instruction.trace_id
		);

		let reference = format!("{}-{}", self.provider_type, instruction.transaction_id);
		let result = if self.claims_remainder && moved != instruction.amounts {
			ProviderResult::partial(moved)
		} else {
			ProviderResult::success(moved)
		};
		Ok(result.with_reference(reference))
	}

	async fn can_recover(&self, _transaction_id: TransactionId) -> bool {
		false
	}

	async fn recover(
		&self,
		_record: &TransactionRecord,
		_cancellation: CancellationToken,
	) -> Result<bool, ProviderError> {
		Ok(false)
	}
}

/// Configuration parameters:
/// - `max_amount`: cap on the total moved per transfer (optional)
/// - `claims_remainder`: report capped transfers as partial (default: false)
pub fn create_provider(
	provider_type: ProviderType,
	config: &toml::Value,
	bank: Arc<dyn BankInterface>,
) -> Result<Arc<dyn ProviderInterface>, ProviderError> {
	LedgerProviderSchema
		.validate(config)
		.map_err(|e| ProviderError::Config(e.to_string()))?;

	let max_amount = config
		.get("max_amount")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64);
	let claims_remainder = config
		.get("claims_remainder")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	Ok(Arc::new(LedgerProvider::new(
		provider_type,
		bank,
		max_amount,
		claims_remainder,
	)))
}
