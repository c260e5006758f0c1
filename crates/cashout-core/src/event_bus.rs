//! Broadcast bus carrying transfer outcomes.
//!
//! Entry points only report acceptance. Whoever initiated a transfer learns
//! the outcome by subscribing here and matching on the trace id.

use cashout_types::TransferEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel carrying [`TransferEvent`]s to every subscriber.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TransferEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per lagging subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Receives every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
		self.sender.subscribe()
	}

	/// Publishing with no subscriber is not an error for the orchestrator;
	/// the caller decides whether to care.
	pub fn publish(
		&self,
		event: TransferEvent,
	) -> Result<(), broadcast::error::SendError<TransferEvent>> {
		debug!("Publishing {:?}", event);
		self.sender.send(event)?;
		Ok(())
	}
}
