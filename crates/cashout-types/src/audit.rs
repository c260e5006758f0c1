//! Transient audit context of the transfer in progress.

use crate::ProviderType;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Point-in-time copy of an [`AuditContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSnapshot {
	/// Settlement reference (voucher barcode, wallet receipt) of the last
	/// provider that reported one.
	pub reference: Option<String>,
	/// Provider that last moved credit.
	pub provider: Option<ProviderType>,
}

/// Shared holder reset at the start of every transfer.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
	inner: Arc<RwLock<AuditSnapshot>>,
}

impl AuditContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Forgets the previous transfer.
	pub fn reset(&self) {
		if let Ok(mut inner) = self.inner.write() {
			*inner = AuditSnapshot::default();
		}
	}

	/// Remembers the provider of a successful step. A missing reference keeps
	/// the previous one.
	pub fn record(&self, provider: ProviderType, reference: Option<String>) {
		if let Ok(mut inner) = self.inner.write() {
			inner.provider = Some(provider);
			if reference.is_some() {
				inner.reference = reference;
			}
		}
	}

	pub fn snapshot(&self) -> AuditSnapshot {
		self.inner
			.read()
			.map(|inner| inner.clone())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reset_clears_previous_transfer() {
		let context = AuditContext::new();
		context.record(ProviderType::Voucher, Some("0012-3456".to_string()));
		context.record(ProviderType::Handpay, None);

		let snapshot = context.snapshot();
		assert_eq!(snapshot.provider, Some(ProviderType::Handpay));
		assert_eq!(snapshot.reference.as_deref(), Some("0012-3456"));

		context.reset();
		assert_eq!(context.snapshot(), AuditSnapshot::default());
	}
}
