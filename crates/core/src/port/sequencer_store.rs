// Job Sequencer Store Port (Interface)

use crate::domain::{JobSequencer, NewJobSequencer, SequencerId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait JobSequencerStore: Send + Sync {
    /// Insert a record in WaitingForDependencies
    async fn create_sequencer(&self, new: &NewJobSequencer, now: i64) -> Result<JobSequencer>;

    async fn get_sequencer(&self, id: SequencerId) -> Result<Option<JobSequencer>>;

    /// All records still in WaitingForDependencies
    async fn list_waiting(&self) -> Result<Vec<JobSequencer>>;

    /// Atomically move a waiting record to Finished and enqueue its NextJob.
    ///
    /// Returns the downstream job ID, or None when the record was no longer
    /// waiting (another replica already finished or failed it).
    async fn complete_sequencer(&self, id: SequencerId, now: i64) -> Result<Option<i64>>;

    /// WaitingForDependencies -> Failed
    async fn fail_sequencer(&self, id: SequencerId, message: &str, now: i64) -> Result<bool>;
}
