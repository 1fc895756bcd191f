// Runtime constants (no magic values)
use std::time::Duration;

/// How long the daemon waits for loops to finish their current tick on shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);
