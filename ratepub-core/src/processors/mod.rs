//! Processors that drive publishing.
//!
//! - `CadenceScheduler`: Sleeps to each wall-clock boundary of the finest
//!   cadence, hands due feeds to a `TickHandler`
//! - `Orchestrator`: Handles ticks by fetching, building and publishing one
//!   feed; owns the cold start and the shutdown sequence
//! - `Publisher`: Signs events and sends them to the relay under a timeout

pub mod cadence_scheduler;
pub mod orchestrator;
pub mod publisher;

#[cfg(test)]
pub(crate) mod testing;

pub use cadence_scheduler::{CadenceScheduler, Registration, ScheduleError, Tick, TickHandler};
pub use orchestrator::{Feed, FeedError, Orchestrator, RunSummary};
pub use publisher::{EventSigner, PublishError, Publisher, RelayTransport, TransportError};
