// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod dispatch;
pub mod dispatcher;
pub mod reconcile;
pub mod retry;
pub mod runtime;
pub mod scheduling;
pub mod sequencer;
pub mod timeout;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use admission::{AdmissionController, AdmissionDecision};
pub use dispatch::{admit_within_ceilings, DispatchCycle, DispatchReport};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use reconcile::{ReconcileOutcome, ResultReconciler};
pub use retry::{RetryDecision, RetryPolicy, RetryReconciler, RetryReport};
pub use runtime::{run_periodic, shutdown_channel, PeriodicTask, ShutdownSender, ShutdownToken};
pub use scheduling::{
    ManualTriggerReport, ScheduleOutcome, SchedulingPolicy, SchedulingReport, SkipReason,
};
pub use sequencer::{JobSequencerService, SequencerOutcome, SequencerReport};
pub use timeout::{SweepReport, TimeoutSweeper};
