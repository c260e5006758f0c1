//! Backlog of externally-coordinated requests that arrived while a transfer
//! was in flight.

use crate::AdmissionError;
use cashout_types::{TraceId, TransactionId, TransferRequest};
use std::collections::VecDeque;

/// A deferred request, replayed through admission when its turn comes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
	/// Ticket supplied by the external coordinator.
	pub transaction_id: TransactionId,
	pub request: TransferRequest,
}

impl PendingEntry {
	pub fn trace_id(&self) -> &TraceId {
		&self.request.trace_id
	}
}

/// Bounded FIFO.
#[derive(Debug)]
pub struct PendingQueue {
	entries: VecDeque<PendingEntry>,
	capacity: usize,
}

impl PendingQueue {
	pub fn new(capacity: usize) -> Self {
		Self {
			entries: VecDeque::new(),
			capacity,
		}
	}

	/// Appends an entry and returns its 1-based position.
	pub fn push(&mut self, entry: PendingEntry) -> Result<usize, AdmissionError> {
		if self.entries.len() >= self.capacity {
			return Err(AdmissionError::QueueFull);
		}
		self.entries.push_back(entry);
		Ok(self.entries.len())
	}

	/// Takes the oldest deferred request.
	pub fn pop(&mut self) -> Option<PendingEntry> {
		self.entries.pop_front()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Trace ids in service order.
	pub fn trace_ids(&self) -> Vec<TraceId> {
		self.entries.iter().map(|e| e.trace_id().clone()).collect()
	}

	/// Drops every entry and returns how many were dropped.
	pub fn clear(&mut self) -> usize {
		let dropped = self.entries.len();
		self.entries.clear();
		dropped
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use cashout_types::TransferReason;

	fn entry(trace: &str) -> PendingEntry {
		let mut request = TransferRequest::whole_balance(TransferReason::CashWin, trace.into());
		request.is_owned = false;
		PendingEntry {
			transaction_id: TransactionId::new(),
			request,
		}
	}

	#[test]
	fn test_fifo_order() {
		let mut queue = PendingQueue::new(8);
		for trace in ["r1", "r2", "r3"] {
			queue.push(entry(trace)).unwrap();
		}
		assert_eq!(
			queue.trace_ids(),
			vec![TraceId::new("r1"), TraceId::new("r2"), TraceId::new("r3")]
		);
		assert_eq!(queue.pop().unwrap().trace_id(), &TraceId::new("r1"));
		assert_eq!(queue.len(), 2);
	}

	#[test]
	fn test_capacity_bound() {
		let mut queue = PendingQueue::new(2);
		assert_eq!(queue.push(entry("r1")), Ok(1));
		assert_eq!(queue.push(entry("r2")), Ok(2));
		assert_eq!(queue.push(entry("r3")), Err(AdmissionError::QueueFull));

		assert_eq!(queue.clear(), 2);
		assert!(queue.is_empty());
	}
}
