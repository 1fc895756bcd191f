// Runtime - periodic control loops

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// One unit of periodic work (dispatch cycle, sweep, reconciler pass)
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn tick(&self) -> Result<()>;
}

fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let max_ms = jitter.as_millis() as u64;
    if max_ms == 0 {
        return interval;
    }
    interval + Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Run `task` until shutdown.
///
/// A tick is never cancelled once started; shutdown is observed between
/// ticks and during the sleep. Tick errors are logged and the loop goes on.
pub async fn run_periodic(
    task: Arc<dyn PeriodicTask>,
    jitter: Duration,
    mut shutdown: ShutdownToken,
) {
    info!(task = task.name(), interval_secs = task.interval().as_secs(), "Loop started");
    loop {
        if shutdown.is_shutdown() {
            break;
        }

        if let Err(e) = task.tick().await {
            error!(task = task.name(), error = %e, "Tick failed");
        }

        let delay = jittered(task.interval(), jitter);
        debug!(task = task.name(), delay_ms = delay.as_millis() as u64, "Sleeping");
        tokio::select! {
            _ = sleep(delay) => {},
            _ = shutdown.wait() => {
                info!(task = task.name(), "Loop interrupted during sleep");
                break;
            }
        }
    }
    info!(task = task.name(), "Loop stopped");
}
