//! Windowed publish caps over the daemon's retained events.

use chrono::{DateTime, Duration, Utc};

use crate::daemon::{DaemonState, EVENT_RETENTION_HOURS};

const BURST_WINDOW_MINUTES: i64 = 5;
const HOURLY_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { reason: String },
}

impl RateDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    pub burst_cap: usize,
    pub hourly_cap: usize,
}

impl RateLimiter {
    #[must_use]
    pub fn new(burst_cap: usize, hourly_cap: usize) -> Self {
        Self {
            burst_cap,
            hourly_cap,
        }
    }

    /// Pure check; the burst window is evaluated first.
    #[must_use]
    pub fn can_publish(&self, state: &DaemonState, now: DateTime<Utc>) -> RateDecision {
        let retained = now - Duration::hours(EVENT_RETENTION_HOURS);
        let count_since = |minutes: i64| {
            let since = (now - Duration::minutes(minutes)).max(retained);
            state.events_since(since)
        };

        let burst = count_since(BURST_WINDOW_MINUTES);
        if burst >= self.burst_cap {
            return RateDecision::Denied {
                reason: format!(
                    "burst cap reached: {burst} posts in the last {BURST_WINDOW_MINUTES} minutes (cap {})",
                    self.burst_cap
                ),
            };
        }

        let hourly = count_since(HOURLY_WINDOW_MINUTES);
        if hourly >= self.hourly_cap {
            return RateDecision::Denied {
                reason: format!(
                    "hourly cap reached: {hourly} posts in the last hour (cap {})",
                    self.hourly_cap
                ),
            };
        }

        RateDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use outpost_core::PublishEvent;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn state_with(minutes_ago: &[i64]) -> DaemonState {
        DaemonState {
            events: minutes_ago
                .iter()
                .enumerate()
                .map(|(i, m)| PublishEvent {
                    at: now() - Duration::minutes(*m),
                    community: "agents".to_string(),
                    post_id: format!("p{i}"),
                })
                .collect(),
            ..DaemonState::default()
        }
    }

    #[test]
    fn empty_state_is_allowed() {
        let limiter = RateLimiter::new(4, 10);
        assert!(limiter.can_publish(&DaemonState::default(), now()).is_allowed());
    }

    #[test]
    fn burst_cap_denies() {
        let limiter = RateLimiter::new(4, 10);
        let decision = limiter.can_publish(&state_with(&[0, 1, 2, 4]), now());
        match decision {
            RateDecision::Denied { reason } => assert!(reason.contains("burst")),
            RateDecision::Allowed => panic!("expected burst denial"),
        }
    }

    #[test]
    fn burst_window_excludes_older_events() {
        let limiter = RateLimiter::new(4, 10);
        assert!(limiter
            .can_publish(&state_with(&[0, 1, 2, 6]), now())
            .is_allowed());
    }

    #[test]
    fn hourly_cap_denies() {
        let limiter = RateLimiter::new(4, 3);
        let decision = limiter.can_publish(&state_with(&[10, 20, 59]), now());
        assert!(matches!(decision, RateDecision::Denied { ref reason } if reason.contains("hourly")));
    }

    #[test]
    fn events_older_than_an_hour_do_not_count() {
        let limiter = RateLimiter::new(4, 2);
        assert!(limiter
            .can_publish(&state_with(&[61, 90, 300]), now())
            .is_allowed());
    }

    #[test]
    fn zero_caps_always_deny() {
        let limiter = RateLimiter::new(0, 0);
        assert!(!limiter.can_publish(&DaemonState::default(), now()).is_allowed());
    }
}
