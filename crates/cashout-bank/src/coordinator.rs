//! Admission tickets.
//!
//! Only the holder of the current ticket may mutate the bank. The
//! orchestrator requests one for transfers it initiates itself; external
//! coordinators request their own and hand the id in.

use cashout_types::TransactionId;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Hands out the admission tickets that serialize credit movements on the
/// machine.
pub trait TransactionCoordinator: Send + Sync {
	/// Non-blocking ticket request; `None` when another holder is active.
	fn try_request(&self, requestor: &str) -> Option<TransactionId>;

	/// Whether `transaction_id` is the ticket currently held.
	fn verify(&self, transaction_id: &TransactionId) -> bool;

	/// Normal hand-back after the holder is done.
	fn release(&self, transaction_id: &TransactionId);

	/// Forcible hand-back when the holder gives up without finishing.
	fn abandon(&self, transaction_id: &TransactionId);
}

/// Single-slot coordinator for one machine.
#[derive(Debug, Default)]
pub struct LocalTransactionCoordinator {
	current: Mutex<Option<(TransactionId, String)>>,
}

impl LocalTransactionCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Current ticket and the requestor holding it.
	pub fn holder(&self) -> Option<(TransactionId, String)> {
		self.current.lock().ok().and_then(|current| current.clone())
	}

	fn hand_back(&self, transaction_id: &TransactionId, action: &str) {
		let Ok(mut current) = self.current.lock() else {
			return;
		};
		match current.as_ref() {
			Some((held, requestor)) if held == transaction_id => {
				debug!("Ticket {} {} by {}", transaction_id, action, requestor);
				*current = None;
			}
			Some((held, _)) => {
				warn!(
					"Ignoring {} of ticket {}: {} is the active ticket",
					action, transaction_id, held
				);
			}
			None => debug!("Ignoring {} of ticket {}: no active ticket", action, transaction_id),
		}
	}
}

impl TransactionCoordinator for LocalTransactionCoordinator {
	fn try_request(&self, requestor: &str) -> Option<TransactionId> {
		let mut current = self.current.lock().ok()?;
		if current.is_some() {
			return None;
		}
		let transaction_id = TransactionId::new();
		*current = Some((transaction_id, requestor.to_string()));
		debug!("Ticket {} issued to {}", transaction_id, requestor);
		Some(transaction_id)
	}

	fn verify(&self, transaction_id: &TransactionId) -> bool {
		self.current
			.lock()
			.map(|current| matches!(current.as_ref(), Some((held, _)) if held == transaction_id))
			.unwrap_or(false)
	}

	fn release(&self, transaction_id: &TransactionId) {
		self.hand_back(transaction_id, "released");
	}

	fn abandon(&self, transaction_id: &TransactionId) {
		self.hand_back(transaction_id, "abandoned");
	}
}
