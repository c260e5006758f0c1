//! Transfer-out request and result types shared between the orchestrator
//! and settlement providers.

use crate::Amounts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque admission ticket issued by the transaction coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for TransactionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for TransactionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for TransactionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Caller-supplied correlation token carried through every event of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub String);

impl TraceId {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Generates a random trace id for callers that do not correlate outcomes.
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TraceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TraceId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Why credit is leaving the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
	/// Player-initiated cash-out of existing credit.
	CashOut,
	/// Win above the jurisdiction's credit limit.
	LargeWin,
	/// Bonus award paid straight out.
	BonusPay,
	/// Game win paid straight out.
	CashWin,
}

impl TransferReason {
	/// Whether the transfer spends credit already on the bank.
	///
	/// Win and bonus payouts add credit instead, so they never check
	/// balance sufficiency at admission.
	pub fn affects_balance(&self) -> bool {
		matches!(self, TransferReason::CashOut)
	}

	/// Reasons accepted by the continuation entry point.
	pub fn allows_continuation(&self) -> bool {
		matches!(
			self,
			TransferReason::LargeWin | TransferReason::BonusPay | TransferReason::CashWin
		)
	}
}

impl fmt::Display for TransferReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::CashOut => write!(f, "cash_out"),
			Self::LargeWin => write!(f, "large_win"),
			Self::BonusPay => write!(f, "bonus_pay"),
			Self::CashWin => write!(f, "cash_win"),
		}
	}
}

/// Settlement channel kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
	Voucher,
	Handpay,
	Wallet,
	Bonus,
	Custom(String),
}

impl fmt::Display for ProviderType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Voucher => write!(f, "voucher"),
			Self::Handpay => write!(f, "handpay"),
			Self::Wallet => write!(f, "wallet"),
			Self::Bonus => write!(f, "bonus"),
			Self::Custom(name) => write!(f, "{}", name),
		}
	}
}

impl FromStr for ProviderType {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"voucher" => Self::Voucher,
			"handpay" => Self::Handpay,
			"wallet" => Self::Wallet,
			"bonus" => Self::Bonus,
			other => Self::Custom(other.to_string()),
		})
	}
}

/// A transfer-out request as seen by the orchestrator worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
	/// Explicit per-class amounts; `None` snapshots live balances when the
	/// worker starts.
	pub amounts: Option<Amounts>,
	pub reason: TransferReason,
	pub associated_transactions: Vec<u64>,
	pub trace_id: TraceId,
	/// True when the orchestrator acquired the admission ticket itself.
	pub is_owned: bool,
	/// Only this provider type may be used.
	pub restrict_to: Option<ProviderType>,
	/// Start the provider walk at this type instead of the head of the chain.
	pub start_from: Option<ProviderType>,
}

impl TransferRequest {
	/// Whole-balance request initiated by the orchestrator itself.
	pub fn whole_balance(reason: TransferReason, trace_id: TraceId) -> Self {
		Self {
			amounts: None,
			reason,
			associated_transactions: Vec::new(),
			trace_id,
			is_owned: true,
			restrict_to: None,
			start_from: None,
		}
	}
}

/// Outcome of one provider's attempt to move credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
	pub success: bool,
	/// Amounts actually moved, per class.
	pub transferred: Amounts,
	/// The provider owns completion of the remainder through its own
	/// protocol; fan-out stops here.
	pub partial: bool,
	/// Settlement reference such as a voucher barcode.
	pub reference: Option<String>,
}

impl ProviderResult {
	/// Everything in `transferred` moved and the provider is done.
	pub fn success(transferred: Amounts) -> Self {
		Self {
			success: true,
			transferred,
			partial: false,
			reference: None,
		}
	}

	/// `transferred` moved and the provider completes the rest on its own.
	pub fn partial(transferred: Amounts) -> Self {
		Self {
			success: true,
			transferred,
			partial: true,
			reference: None,
		}
	}

	/// The provider declined; nothing moved.
	pub fn failed() -> Self {
		Self::default()
	}

	pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
		self.reference = Some(reference.into());
		self
	}
}
