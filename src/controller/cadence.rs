use std::time::Duration;
use tokio::time::Instant;

/// Fixed-period schedule polled from the cooperative loop.
///
/// Deadlines advance by whole periods from the first firing, so a slow
/// network call in one iteration delays the next firing but does not
/// shift the schedule. Missed periods are skipped, not replayed.
#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    next_due: Option<Instant>,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// True at most once per period. The first call is always due.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(next) if now < next => false,
            Some(next) => {
                let mut following = next + self.period;
                if following <= now {
                    following = now + self.period;
                }
                self.next_due = Some(following);
                true
            }
            None => {
                self.next_due = Some(now + self.period);
                true
            }
        }
    }
}
