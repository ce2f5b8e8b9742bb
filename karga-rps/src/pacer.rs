use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{config::Rate, error::Interrupted};

/// How far the permit schedule may fall behind the clock and still be caught
/// up. Timer ticks are 1ms, so at high rates most wakeups land past their slot.
const CATCH_UP: Duration = Duration::from_millis(20);

/// Hands out permits on a fixed schedule of one slot every `1 / rate`.
///
/// Slots are tracked as an absolute deadline rather than a token balance, so
/// a late wakeup does not push every later permit back: slots the caller
/// overslept are granted immediately, up to [`CATCH_UP`] worth. A `burst`
/// above one lets the caller run that many slots ahead of the clock. The
/// first permit is always immediate.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    /// How far ahead of the clock a slot may be granted.
    lead: Duration,
    next_slot: Instant,
}

impl Pacer {
    pub fn new(rate: Rate, burst: u32) -> Self {
        let interval =
            Duration::try_from_secs_f64(rate.per_second().recip()).unwrap_or(Duration::MAX);
        let lead = interval
            .checked_mul(burst.max(1) - 1)
            .unwrap_or(Duration::MAX);

        Self {
            interval,
            lead,
            next_slot: Instant::now(),
        }
    }

    /// Waits for the next permit.
    ///
    /// Fails with [`Interrupted`] as soon as `cancel` fires, without
    /// consuming a slot.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), Interrupted> {
        loop {
            if cancel.is_cancelled() {
                return Err(Interrupted);
            }

            let now = Instant::now();
            let ready_at = self.ready_at(now);
            if ready_at <= now {
                self.take_slot(now);
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted),
                _ = sleep_until(ready_at) => {}
            }
        }
    }

    fn ready_at(&self, now: Instant) -> Instant {
        self.next_slot.checked_sub(self.lead).unwrap_or(now)
    }

    fn take_slot(&mut self, now: Instant) {
        let earliest = now.checked_sub(CATCH_UP).unwrap_or(now);
        let slot = self.next_slot.max(earliest);

        // an unrepresentable next slot only happens at absurdly low rates
        self.next_slot = slot
            .checked_add(self.interval)
            .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365));
    }
}
