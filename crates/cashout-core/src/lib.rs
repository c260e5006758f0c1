//! Transfer-out orchestration and recovery engine.
//!
//! [`TransferOrchestrator`] admits requests, persists the in-flight record
//! and runs each transfer on its own task; [`RecoveryCoordinator`] resumes
//! what a crash or a provider fault left behind. Outcomes are reported on
//! the [`EventBus`].

mod builder;
mod error;
pub mod event_bus;
mod orchestrator;
pub mod queue;
pub mod record;
mod recovery;

#[cfg(test)]
mod mocks;

pub use builder::OrchestratorBuilder;
pub use error::{AdmissionError, CoreError};
pub use event_bus::EventBus;
pub use orchestrator::{Admission, TransferOrchestrator, TransferPhase};
pub use queue::{PendingEntry, PendingQueue};
pub use record::RecordStore;
pub use recovery::{RecoveryCoordinator, RecoveryOutcome};
