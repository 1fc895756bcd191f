// Describer Infrastructure - SQLite Adapter
// Implements: DescribeJobStore, JobSequencerStore, DownstreamJobStore

mod connection;
mod downstream_store;
mod error;
mod job_store;
mod migration;
mod sequencer_store;

pub use connection::create_pool;
pub use job_store::SqliteJobStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion goes through error::map_sqlx_error
// (orphan rule: cannot implement From<sqlx::Error> for AppError here)
