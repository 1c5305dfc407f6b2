use std::time::Duration;

/// Exponential reconnect schedule for the realtime channel.
///
/// Reconnect attempt `n` (1-based) waits `min(base * 2^n, cap)`. Once
/// `max_attempts` reconnects have been scheduled without a successful open,
/// the schedule is exhausted and the channel stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next reconnect, given how many reconnects have already
    /// been scheduled since the last successful open. `None` once exhausted.
    pub fn next_delay(&self, attempts_so_far: u32) -> Option<Duration> {
        if attempts_so_far >= self.max_attempts {
            return None;
        }
        Some(self.delay_for(attempts_so_far + 1))
    }

    /// Delay for reconnect attempt `attempt` (1-based), saturating at `cap`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (1..=6).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn schedule_stops_at_max_attempts() {
        let policy = ReconnectPolicy::default();
        let scheduled: Vec<Duration> = (0..10).map_while(|n| policy.next_delay(n)).collect();
        assert_eq!(scheduled.len(), 5);
        assert_eq!(scheduled[0], Duration::from_secs(2));
        assert_eq!(scheduled[4], Duration::from_secs(30));
        assert_eq!(policy.next_delay(5), None);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_cap() {
        let policy = ReconnectPolicy { max_attempts: u32::MAX, ..Default::default() };
        assert_eq!(policy.delay_for(40), policy.cap);
        assert_eq!(policy.delay_for(u32::MAX), policy.cap);
    }

    #[test]
    fn schedule_is_monotonic() {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(250),
            cap: Duration::from_secs(10),
            max_attempts: 12,
        };
        let delays: Vec<Duration> = (0..12).map_while(|n| policy.next_delay(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), policy.cap);
    }
}
