// Worker result reports from a JetStream pull consumer

use async_nats::jetstream::{self, consumer, message::AckKind, stream};
use describer_core::application::{ReconcileOutcome, ResultReconciler, ShutdownToken};
use describer_core::domain::DescribeJobResult;
use describer_core::error::{AppError, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const RESULTS_STREAM: &str = "DESCRIBE_RESULTS";
pub const RESULTS_SUBJECT: &str = "describe.results";
const DURABLE_NAME: &str = "describe-scheduler";

/// What to tell the broker about one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    Ack,
    /// Redeliver later
    Nak,
    /// Unparseable or invalid; never redeliver
    Term,
}

pub struct ResultConsumer {
    reconciler: Arc<ResultReconciler>,
}

impl ResultConsumer {
    pub fn new(reconciler: Arc<ResultReconciler>) -> Self {
        Self { reconciler }
    }

    /// Apply one raw report. Redelivery is safe because applying a report
    /// twice leaves the job unchanged.
    pub async fn handle_payload(&self, payload: &[u8]) -> AckAction {
        let result: DescribeJobResult = match serde_json::from_slice(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Malformed result report dropped");
                return AckAction::Term;
            }
        };

        match self.reconciler.apply(&result).await {
            Ok(ReconcileOutcome::Applied) | Ok(ReconcileOutcome::Ignored) => AckAction::Ack,
            Err(AppError::Validation(msg)) => {
                warn!(job_id = result.job_id, reason = %msg, "Invalid result report dropped");
                AckAction::Term
            }
            Err(e) => {
                warn!(job_id = result.job_id, error = %e, "Result not applied, requesting redelivery");
                AckAction::Nak
            }
        }
    }

    /// Consume until shutdown. A message being applied is finished before
    /// the loop observes the signal.
    pub async fn run(&self, context: jetstream::Context, mut shutdown: ShutdownToken) -> Result<()> {
        let stream = context
            .get_or_create_stream(stream::Config {
                name: RESULTS_STREAM.to_string(),
                subjects: vec![RESULTS_SUBJECT.to_string()],
                retention: stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| AppError::Transport(format!("results stream: {e}")))?;

        let consumer = stream
            .get_or_create_consumer(
                DURABLE_NAME,
                consumer::pull::Config {
                    durable_name: Some(DURABLE_NAME.to_string()),
                    ack_policy: consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AppError::Transport(format!("results consumer: {e}")))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| AppError::Transport(format!("results subscription: {e}")))?;

        info!(stream = RESULTS_STREAM, "Result consumer started");
        loop {
            let next = tokio::select! {
                _ = shutdown.wait() => break,
                next = messages.next() => next,
            };
            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!(error = %e, "Result stream error");
                    continue;
                }
                None => break,
            };

            let action = self.handle_payload(&message.payload).await;
            let acked = match action {
                AckAction::Ack => message.ack().await,
                AckAction::Nak => message.ack_with(AckKind::Nak(None)).await,
                AckAction::Term => message.ack_with(AckKind::Term).await,
            };
            match acked {
                Ok(()) => debug!(action = ?action, "Result message settled"),
                Err(e) => warn!(error = %e, "Failed to settle result message"),
            }
        }
        info!("Result consumer stopped");
        Ok(())
    }
}
