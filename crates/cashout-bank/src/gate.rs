use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Read-only money-laundering threshold query.
pub trait LaunderingGate: Send + Sync {
	fn threshold_reached(&self) -> bool;
}

/// Gate that trips once accumulated money-in reaches a configured threshold,
/// or when tripped explicitly by the operator.
#[derive(Debug, Default)]
pub struct ThresholdGate {
	threshold: Option<u64>,
	accumulated: AtomicU64,
	tripped: AtomicBool,
}

impl ThresholdGate {
	/// `None` disables the accumulated check.
	pub fn new(threshold: Option<u64>) -> Self {
		Self {
			threshold,
			accumulated: AtomicU64::new(0),
			tripped: AtomicBool::new(false),
		}
	}

	/// Adds credit inserted into the machine to the accumulated total.
	pub fn record_money_in(&self, amount: u64) {
		// fetch_update never fails with a closure that always returns Some
		let _ = self
			.accumulated
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
				Some(current.saturating_add(amount))
			});
	}

	/// Forces the gate regardless of the accumulated total.
	pub fn set_tripped(&self, tripped: bool) {
		self.tripped.store(tripped, Ordering::SeqCst);
	}

	/// Clears accumulated money-in and the explicit trip.
	pub fn reset(&self) {
		self.accumulated.store(0, Ordering::SeqCst);
		self.tripped.store(false, Ordering::SeqCst);
	}
}

impl LaunderingGate for ThresholdGate {
	fn threshold_reached(&self) -> bool {
		if self.tripped.load(Ordering::SeqCst) {
			return true;
		}
		self.threshold
			.is_some_and(|threshold| self.accumulated.load(Ordering::SeqCst) >= threshold)
	}
}
