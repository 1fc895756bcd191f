// Port Layer - Interfaces for external dependencies

pub mod connection_provider;
pub mod delivery;
pub mod downstream_store;
pub mod job_store;
pub mod sequencer_store;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use connection_provider::ConnectionProvider;
pub use delivery::{DeliveryError, DeliveryReceipt, DescribeDelivery};
pub use downstream_store::DownstreamJobStore;
pub use job_store::DescribeJobStore;
pub use sequencer_store::JobSequencerStore;
pub use time_provider::{SystemTimeProvider, TimeProvider};
