// gradlink-core/src/services/rate_limit.rs

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::Error;

/// Actions that are rate limited, each with its own sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Message,
    Upload,
    Login,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Message => "message",
            LimitKind::Upload => "upload",
            LimitKind::Login => "login",
        }
    }

    /// (max attempts, window length) for the sliding window.
    fn limits(&self) -> (usize, Duration) {
        match self {
            LimitKind::Message => (30, Duration::seconds(60)),
            LimitKind::Upload => (10, Duration::minutes(5)),
            LimitKind::Login => (5, Duration::minutes(15)),
        }
    }
}

/// Outcome of a limit check. `reset_at` is when the oldest counted attempt
/// falls out of the window.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    /// Turn a denial into the error the surfaces report.
    pub fn require(self, what: &str) -> Result<Decision, Error> {
        if self.allowed {
            return Ok(self);
        }
        let retry_after_secs = (self.reset_at - Utc::now()).num_seconds().max(1);
        Err(Error::RateLimited {
            message: format!("too many {}, slow down", what),
            retry_after_secs,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitStatus {
    pub kind: &'static str,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

/// In-memory sliding-window rate limiter keyed by user and action.
///
/// An allowed check records the attempt; a denied check does not, so a
/// user hammering a full window does not push their reset time forward.
pub struct RateLimitService {
    windows: DashMap<(i64, LimitKind), Vec<DateTime<Utc>>>,
}

impl RateLimitService {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Check and record an attempt.
    pub fn check(&self, user_id: i64, kind: LimitKind) -> Decision {
        let (max, window) = kind.limits();
        let now = Utc::now();
        let cutoff = now - window;

        let mut entry = self.windows.entry((user_id, kind)).or_default();
        entry.retain(|t| *t > cutoff);

        if entry.len() >= max {
            let reset_at = entry[0] + window;
            debug!(
                "rate limit hit: user={} kind={} until={}",
                user_id,
                kind.as_str(),
                reset_at
            );
            return Decision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        entry.push(now);
        let reset_at = entry[0] + window;
        Decision {
            allowed: true,
            remaining: (max - entry.len()) as u32,
            reset_at,
        }
    }

    /// Refund the most recent recorded attempt. Used for login checks,
    /// where only failed attempts should count against the window.
    pub fn forgive(&self, user_id: i64, kind: LimitKind) {
        if let Some(mut entry) = self.windows.get_mut(&(user_id, kind)) {
            entry.pop();
        }
    }

    /// Current usage across all actions for one user, without recording.
    pub fn status(&self, user_id: i64) -> Vec<LimitStatus> {
        let now = Utc::now();
        [LimitKind::Message, LimitKind::Upload, LimitKind::Login]
            .into_iter()
            .map(|kind| {
                let (max, window) = kind.limits();
                let cutoff = now - window;
                let (used, reset_at) = match self.windows.get(&(user_id, kind)) {
                    Some(entry) => {
                        let live: Vec<_> = entry.iter().filter(|t| **t > cutoff).collect();
                        let reset = live.first().map(|t| **t + window);
                        (live.len(), reset)
                    }
                    None => (0, None),
                };
                LimitStatus {
                    kind: kind.as_str(),
                    used: used as u32,
                    limit: max as u32,
                    remaining: (max - used) as u32,
                    reset_at,
                }
            })
            .collect()
    }

    /// Drop windows whose every attempt has expired. Called from the
    /// maintenance task.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.windows.retain(|(_, kind), timestamps| {
            let (_, window) = kind.limits();
            let cutoff = now - window;
            timestamps.retain(|t| *t > cutoff);
            !timestamps.is_empty()
        });
    }

    #[cfg(test)]
    fn backdate_all(&self, user_id: i64, kind: LimitKind, by: Duration) {
        if let Some(mut entry) = self.windows.get_mut(&(user_id, kind)) {
            for t in entry.iter_mut() {
                *t = *t - by;
            }
        }
    }
}

impl Default for RateLimitService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let limiter = RateLimitService::new();
        for i in 0..30 {
            let d = limiter.check(1, LimitKind::Message);
            assert!(d.allowed, "attempt {} should pass", i);
        }
        let d = limiter.check(1, LimitKind::Message);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn denied_checks_do_not_extend_window() {
        let limiter = RateLimitService::new();
        for _ in 0..5 {
            assert!(limiter.check(1, LimitKind::Login).allowed);
        }
        let first = limiter.check(1, LimitKind::Login);
        assert!(!first.allowed);
        let second = limiter.check(1, LimitKind::Login);
        assert_eq!(first.reset_at, second.reset_at);
    }

    #[test]
    fn forgive_refunds_an_attempt() {
        let limiter = RateLimitService::new();
        for _ in 0..5 {
            assert!(limiter.check(2, LimitKind::Login).allowed);
        }
        assert!(!limiter.check(2, LimitKind::Login).allowed);

        limiter.forgive(2, LimitKind::Login);
        assert!(limiter.check(2, LimitKind::Login).allowed);
    }

    #[test]
    fn windows_are_per_user_and_per_kind() {
        let limiter = RateLimitService::new();
        for _ in 0..10 {
            assert!(limiter.check(1, LimitKind::Upload).allowed);
        }
        assert!(!limiter.check(1, LimitKind::Upload).allowed);
        // Other user and other kind unaffected.
        assert!(limiter.check(2, LimitKind::Upload).allowed);
        assert!(limiter.check(1, LimitKind::Message).allowed);
    }

    #[test]
    fn expired_attempts_fall_out() {
        let limiter = RateLimitService::new();
        for _ in 0..30 {
            assert!(limiter.check(1, LimitKind::Message).allowed);
        }
        assert!(!limiter.check(1, LimitKind::Message).allowed);

        limiter.backdate_all(1, LimitKind::Message, Duration::seconds(61));
        assert!(limiter.check(1, LimitKind::Message).allowed);
    }

    #[test]
    fn cleanup_drops_empty_windows() {
        let limiter = RateLimitService::new();
        limiter.check(1, LimitKind::Message);
        limiter.backdate_all(1, LimitKind::Message, Duration::seconds(61));
        limiter.cleanup_expired();
        assert!(limiter.windows.is_empty());
    }

    #[test]
    fn status_reports_without_recording() {
        let limiter = RateLimitService::new();
        limiter.check(1, LimitKind::Message);
        let before = limiter.status(1);
        let after = limiter.status(1);
        let msg = before.iter().find(|s| s.kind == "message").unwrap();
        assert_eq!(msg.used, 1);
        assert_eq!(msg.remaining, 29);
        assert_eq!(
            after.iter().find(|s| s.kind == "message").unwrap().used,
            1
        );
    }
}
