//! Durable record of the transfer currently in flight.

use crate::{Amounts, ProviderType, TraceId, TransactionId, TransferReason, TransferRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single in-flight transfer, persisted so it survives a restart.
///
/// Only identity and progress live here; the cancellation handle of a
/// running worker is attached in memory by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
	pub transaction_id: TransactionId,
	pub trace_id: TraceId,
	pub is_owned: bool,
	pub reason: TransferReason,
	#[serde(default)]
	pub associated_transactions: Vec<u64>,
	/// Explicit request amounts, `None` for whole-balance transfers.
	pub requested: Option<Amounts>,
	/// What is still to be moved, checkpointed after each provider step.
	pub remaining: Option<Amounts>,
	#[serde(default)]
	pub restrict_to: Option<ProviderType>,
	#[serde(default)]
	pub start_from: Option<ProviderType>,
	pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
	/// Record for a freshly admitted request; nothing is checkpointed yet.
	pub fn new(transaction_id: TransactionId, request: &TransferRequest) -> Self {
		Self {
			transaction_id,
			trace_id: request.trace_id.clone(),
			is_owned: request.is_owned,
			reason: request.reason,
			associated_transactions: request.associated_transactions.clone(),
			requested: request.amounts,
			remaining: request.amounts,
			restrict_to: request.restrict_to.clone(),
			start_from: request.start_from.clone(),
			created_at: Utc::now(),
		}
	}

	/// Rebuilds the request that resumes this transfer.
	///
	/// The checkpointed remainder wins over the original amounts so that
	/// credit already moved is never requested twice.
	pub fn resume_request(&self) -> TransferRequest {
		TransferRequest {
			amounts: self.remaining.or(self.requested),
			reason: self.reason,
			associated_transactions: self.associated_transactions.clone(),
			trace_id: self.trace_id.clone(),
			is_owned: self.is_owned,
			restrict_to: self.restrict_to.clone(),
			start_from: self.start_from.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_resume_prefers_checkpoint() {
		let mut request = TransferRequest::whole_balance(TransferReason::LargeWin, "t-1".into());
		request.amounts = Some(Amounts::new(1_000, 0, 0));
		let mut record = TransactionRecord::new(TransactionId::new(), &request);
		record.remaining = Some(Amounts::new(400, 0, 0));

		let resumed = record.resume_request();
		assert_eq!(resumed.amounts, Some(Amounts::new(400, 0, 0)));
		assert_eq!(resumed.trace_id, TraceId::new("t-1"));
		assert_eq!(resumed.reason, TransferReason::LargeWin);
	}

	#[test]
	fn test_whole_balance_resumes_without_amounts() {
		let request = TransferRequest::whole_balance(TransferReason::CashOut, "t-2".into());
		let record = TransactionRecord::new(TransactionId::new(), &request);
		assert!(record.resume_request().amounts.is_none());
		assert!(record.is_owned);
	}

	#[test]
	fn test_record_json_shape() {
		let request = TransferRequest::whole_balance(TransferReason::CashOut, "t-3".into());
		let record = TransactionRecord::new(TransactionId::new(), &request);
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["reason"], "cash_out");
		assert_eq!(json["trace_id"], "t-3");
		assert!(json["remaining"].is_null());
	}
}
