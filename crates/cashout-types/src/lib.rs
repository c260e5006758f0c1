//! Shared types for the transfer-out engine.

pub mod amounts;
pub mod audit;
pub mod events;
pub mod record;
pub mod transfer;
pub mod validation;

pub use amounts::*;
pub use audit::*;
pub use events::*;
pub use record::*;
pub use transfer::*;
pub use validation::*;
