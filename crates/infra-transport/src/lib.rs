// Describer Infrastructure - Transports
// Implements: DescribeDelivery (serverless, message bus, JetStream), ConnectionProvider
// Result intake: JetStream pull consumer feeding the ResultReconciler

mod connection_provider;
pub mod jetstream;
pub mod message_bus;
mod result_consumer;
mod serverless;

#[cfg(test)]
mod test_support;

pub use connection_provider::HttpConnectionProvider;
pub use jetstream::{JetStreamDelivery, NatsStreamPublisher, StreamPublisher};
pub use message_bus::{BrokerClient, MessageBusDelivery, RestBrokerClient};
pub use result_consumer::{AckAction, ResultConsumer, RESULTS_STREAM, RESULTS_SUBJECT};
pub use serverless::ServerlessInvoker;

/// Connect to NATS and open a JetStream context
pub async fn connect_jetstream(url: &str) -> describer_core::Result<async_nats::jetstream::Context> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| describer_core::AppError::Transport(format!("nats connect {url}: {e}")))?;
    Ok(async_nats::jetstream::new(client))
}
