//! Request pacing with a fixed minimum interval
//!
//! The Pacer serializes polite access to the platform: every network call in
//! an export run awaits [`Pacer::pace`] first, which guarantees a minimum
//! interval between consecutive calls. This is a rate-limit contract with the
//! platform, not a performance knob; the upstream API throttles or bans
//! callers that hammer it.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fixed-interval pacer shared by all fetches of one export run
///
/// The first call returns immediately; every subsequent call sleeps until at
/// least the configured interval has elapsed since the previous call was
/// admitted. A zero interval disables pacing.
pub struct Pacer {
    /// Minimum interval between admitted calls
    interval: Duration,
    /// When the previous call was admitted (None before the first call)
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer with the given minimum interval between calls
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the next network call is allowed, then claim the slot
    ///
    /// Holding the internal lock across the sleep is intentional: it keeps
    /// concurrent callers strictly serialized, so wire traffic never exceeds
    /// one request per interval even if probes are ever parallelized.
    pub async fn pace(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
