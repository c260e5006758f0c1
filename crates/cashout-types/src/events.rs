use crate::{Amounts, TraceId};
use serde::{Deserialize, Serialize};

/// Outcome notifications published on the event bus.
///
/// Entry points only report acceptance; callers match these events to
/// their request through the trace id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
	Started {
		requested: Amounts,
		trace_id: TraceId,
	},
	Completed {
		transferred: Amounts,
		/// Another queued request is waiting to be served.
		pending: bool,
		trace_id: TraceId,
	},
	Failed {
		/// The unmet remainder.
		remaining: Amounts,
		trace_id: TraceId,
	},
}

impl TransferEvent {
	pub fn trace_id(&self) -> &TraceId {
		match self {
			Self::Started { trace_id, .. }
			| Self::Completed { trace_id, .. }
			| Self::Failed { trace_id, .. } => trace_id,
		}
	}

	/// True for `Completed` and `Failed`.
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Started { .. })
	}
}
