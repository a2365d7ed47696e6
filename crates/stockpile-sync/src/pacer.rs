//! Minimum spacing between consecutive provider calls.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum gap between calls made by one sync flow.
///
/// The first call goes through immediately; later calls sleep until
/// `min_gap` has passed since the previous one started.
#[derive(Debug)]
pub struct Pacer {
  min_gap: Duration,
  last:    Option<Instant>,
}

impl Pacer {
  pub fn new(min_gap: Duration) -> Self { Self { min_gap, last: None } }

  pub async fn wait(&mut self) {
    if let Some(last) = self.last {
      let ready = last + self.min_gap;
      let now = Instant::now();
      if ready > now {
        debug!(delay_ms = (ready - now).as_millis() as u64, "pacing provider call");
        tokio::time::sleep_until(ready).await;
      }
    }
    self.last = Some(Instant::now());
  }
}
