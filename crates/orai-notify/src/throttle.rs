use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Serializes outgoing email so consecutive sends keep a minimum spacing.
///
/// Shared between the evaluator and digest workers so their combined send
/// rate respects the relay. Each caller reserves the next slot under the
/// lock, then sleeps up to its slot outside it, so a slow waiter never
/// blocks reservation for others.
pub struct SendThrottle {
    delay: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl SendThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_allowed: Mutex::new(None),
        }
    }

    /// Wait until this caller's reserved send slot arrives.
    pub async fn acquire(&self) {
        let scheduled = {
            let mut next = match self.next_allowed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            let scheduled = next.map_or(now, |slot| slot.max(now));
            *next = Some(scheduled + self.delay);
            scheduled
        };

        tokio::time::sleep_until(scheduled).await;
    }
}
