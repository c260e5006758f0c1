//! Ordered provider registry.

use crate::{ProviderError, ProviderInterface};
use cashout_types::ProviderType;
use std::sync::Arc;

/// A provider together with its registry metadata.
#[derive(Clone)]
pub struct RegisteredProvider {
	pub provider_type: ProviderType,
	/// Jurisdiction configuration: may this channel be used at all.
	pub permitted: bool,
	pub provider: Arc<dyn ProviderInterface>,
}

impl std::fmt::Debug for RegisteredProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RegisteredProvider")
			.field("provider_type", &self.provider_type)
			.field("permitted", &self.permitted)
			.finish()
	}
}

/// How the chain for one transfer is narrowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFilter {
	/// Laundering threshold reached: handpay only, ignoring permission and
	/// every other filter.
	pub handpay_only: bool,
	pub restrict_to: Option<ProviderType>,
	pub start_from: Option<ProviderType>,
}

/// Providers in configured order; built once at startup.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
	providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a provider; each type may be registered once.
	pub fn register(
		&mut self,
		provider_type: ProviderType,
		permitted: bool,
		provider: Arc<dyn ProviderInterface>,
	) -> Result<(), ProviderError> {
		if self.get(&provider_type).is_some() {
			return Err(ProviderError::Duplicate(provider_type));
		}
		self.providers.push(RegisteredProvider {
			provider_type,
			permitted,
			provider,
		});
		Ok(())
	}

	/// Looks up a provider by type, permitted or not.
	pub fn get(&self, provider_type: &ProviderType) -> Option<&RegisteredProvider> {
		self.providers
			.iter()
			.find(|p| &p.provider_type == provider_type)
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}

	/// Permitted providers in configured order.
	pub fn permitted(&self) -> Vec<RegisteredProvider> {
		self.providers.iter().filter(|p| p.permitted).cloned().collect()
	}

	/// Providers to ask about an interrupted transfer: the permitted ones in
	/// order, then handpay if the laundering gate may have forced it in
	/// without permission.
	pub fn recovery_candidates(&self, handpay_forced: bool) -> Vec<RegisteredProvider> {
		let mut candidates = self.permitted();
		if handpay_forced {
			if let Some(handpay) = self.get(&ProviderType::Handpay) {
				if !handpay.permitted {
					candidates.push(handpay.clone());
				}
			}
		}
		candidates
	}

	/// The ordered chain for one transfer.
	///
	/// A `start_from` type that is not in the permitted chain yields an
	/// empty chain.
	pub fn select(&self, filter: &ProviderFilter) -> Vec<RegisteredProvider> {
		if filter.handpay_only {
			return self
				.providers
				.iter()
				.filter(|p| p.provider_type == ProviderType::Handpay)
				.cloned()
				.collect();
		}

		let chain = self.providers.iter().filter(|p| {
			p.permitted
				&& filter
					.restrict_to
					.as_ref()
					.map_or(true, |only| &p.provider_type == only)
		});

		match &filter.start_from {
			Some(start) => chain
				.skip_while(|p| &p.provider_type != start)
				.cloned()
				.collect(),
			None => chain.cloned().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TransferInstruction;
	use async_trait::async_trait;
	use cashout_types::{
		ConfigSchema, ProviderResult, Schema, TransactionId, TransactionRecord, ValidationError,
	};
	use tokio_util::sync::CancellationToken;

	struct NoopProvider;

	struct NoopSchema;

	impl ConfigSchema for NoopSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::default().validate(config)
		}
	}

	#[async_trait]
	impl ProviderInterface for NoopProvider {
		fn provider_type(&self) -> ProviderType {
			ProviderType::Custom("noop".to_string())
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoopSchema)
		}

		async fn transfer(
			&self,
			_instruction: &TransferInstruction,
			_cancellation: CancellationToken,
		) -> Result<ProviderResult, ProviderError> {
			Ok(ProviderResult::failed())
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

	fn registry() -> ProviderRegistry {
		let mut registry = ProviderRegistry::new();
		for (provider_type, permitted) in [
			(ProviderType::Voucher, true),
			(ProviderType::Wallet, false),
			(ProviderType::Bonus, true),
			(ProviderType::Handpay, false),
		] {
			registry
				.register(provider_type, permitted, Arc::new(NoopProvider))
				.unwrap();
		}
		registry
	}

	fn types(chain: &[RegisteredProvider]) -> Vec<ProviderType> {
		chain.iter().map(|p| p.provider_type.clone()).collect()
	}

	#[test]
	fn test_default_chain_is_permitted_in_order() {
		let chain = registry().select(&ProviderFilter::default());
		assert_eq!(types(&chain), vec![ProviderType::Voucher, ProviderType::Bonus]);
	}

	#[test]
	fn test_handpay_only_ignores_permission() {
		let filter = ProviderFilter {
			handpay_only: true,
			restrict_to: Some(ProviderType::Voucher),
			start_from: Some(ProviderType::Bonus),
		};
		assert_eq!(types(&registry().select(&filter)), vec![ProviderType::Handpay]);
	}

	#[test]
	fn test_restrict_and_start_from() {
		let registry = registry();
		let only_bonus = ProviderFilter {
			restrict_to: Some(ProviderType::Bonus),
			..Default::default()
		};
		assert_eq!(types(&registry.select(&only_bonus)), vec![ProviderType::Bonus]);

		let from_bonus = ProviderFilter {
			start_from: Some(ProviderType::Bonus),
			..Default::default()
		};
		assert_eq!(types(&registry.select(&from_bonus)), vec![ProviderType::Bonus]);

		let from_unpermitted = ProviderFilter {
			start_from: Some(ProviderType::Wallet),
			..Default::default()
		};
		assert!(registry.select(&from_unpermitted).is_empty());
	}

	#[test]
	fn test_recovery_candidates_include_forced_handpay() {
		let registry = registry();
		assert_eq!(
			types(&registry.recovery_candidates(false)),
			vec![ProviderType::Voucher, ProviderType::Bonus]
		);
		assert_eq!(
			types(&registry.recovery_candidates(true)),
			vec![ProviderType::Voucher, ProviderType::Bonus, ProviderType::Handpay]
		);
	}

	#[test]
	fn test_duplicate_type_rejected() {
		let mut registry = registry();
		let result = registry.register(ProviderType::Voucher, true, Arc::new(NoopProvider));
		assert!(matches!(result, Err(ProviderError::Duplicate(ProviderType::Voucher))));
		assert_eq!(registry.len(), 4);
	}
}
