//! Per-address, per-action token buckets.
//!
//! The limiter itself is synchronous and owns no timers: every call
//! reports whether a timeframe or restore timer must be armed, and the
//! room task arms a Tokio sleep whose expiry message re-enters the room's
//! command channel. That keeps every counter reset on the same
//! serialization domain as the packet handlers.
//!
//! Keyed by network address, not player id — limits survive
//! reconnection. Counters for distinct actions are independent.

use std::collections::HashMap;
use std::net::IpAddr;

use bonkhost_protocol::ActionKey;

use crate::config::RatelimitRule;

/// Which of a counter's two timers fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Resets the counter only if it has not reached `amount`.
    Timeframe,
    /// Unconditionally resets the counter.
    Restore,
}

/// The outcome of recording one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// The action must be aborted (and, for errored classes, the mapped
    /// error code sent). Advisory — never disconnects.
    pub limited: bool,
    /// Arm a one-shot timeframe timer for `rule.timeframe` seconds.
    pub arm_timeframe: bool,
    /// Arm a one-shot restore timer for `rule.restore` seconds.
    pub arm_restore: bool,
}

#[derive(Debug, Default)]
struct Counter {
    count: u32,
    timeframe_armed: bool,
    restore_armed: bool,
}

/// All ratelimit state for the room.
#[derive(Debug, Default)]
pub struct RateLimiter {
    counters: HashMap<IpAddr, HashMap<ActionKey, Counter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one action from `addr`.
    ///
    /// The first `amount` actions inside a window are allowed; the one
    /// that fills the bucket arms the restore timer, and everything after
    /// it is refused until a timer resets the counter. The count never
    /// exceeds `amount`.
    pub fn hit(&mut self, addr: IpAddr, action: ActionKey, rule: &RatelimitRule) -> Hit {
        let counter = self
            .counters
            .entry(addr)
            .or_default()
            .entry(action)
            .or_default();

        if counter.count >= rule.amount {
            return Hit {
                limited: true,
                arm_timeframe: false,
                arm_restore: false,
            };
        }

        let arm_timeframe = counter.count == 0 && !counter.timeframe_armed;
        if arm_timeframe {
            counter.timeframe_armed = true;
        }

        counter.count += 1;

        let arm_restore = counter.count >= rule.amount && !counter.restore_armed;
        if arm_restore {
            counter.restore_armed = true;
        }

        Hit {
            limited: false,
            arm_timeframe,
            arm_restore,
        }
    }

    /// Applies a fired timer to the counter it belongs to.
    pub fn expired(&mut self, addr: IpAddr, action: ActionKey, kind: Expiry, rule: &RatelimitRule) {
        let Some(counter) = self
            .counters
            .get_mut(&addr)
            .and_then(|actions| actions.get_mut(&action))
        else {
            return;
        };
        match kind {
            Expiry::Timeframe => {
                counter.timeframe_armed = false;
                if counter.count < rule.amount {
                    counter.count = 0;
                }
            }
            Expiry::Restore => {
                counter.restore_armed = false;
                counter.count = 0;
            }
        }
    }

    /// Current count for an address/action pair (0 if never seen).
    pub fn count(&self, addr: IpAddr, action: ActionKey) -> u32 {
        self.counters
            .get(&addr)
            .and_then(|actions| actions.get(&action))
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    fn rule(amount: u32) -> RatelimitRule {
        RatelimitRule {
            amount,
            timeframe: 1,
            restore: 2,
        }
    }

    #[test]
    fn test_allows_amount_hits_then_refuses() {
        let mut limiter = RateLimiter::new();
        let rule = rule(2);

        let first = limiter.hit(addr(), ActionKey::Chatting, &rule);
        assert!(!first.limited);
        assert!(first.arm_timeframe);
        assert!(!first.arm_restore);

        let second = limiter.hit(addr(), ActionKey::Chatting, &rule);
        assert!(!second.limited);
        assert!(!second.arm_timeframe);
        assert!(second.arm_restore);

        let third = limiter.hit(addr(), ActionKey::Chatting, &rule);
        assert!(third.limited);
        assert!(!third.arm_restore);
    }

    #[test]
    fn test_count_never_exceeds_amount() {
        let mut limiter = RateLimiter::new();
        let rule = rule(3);
        for _ in 0..10 {
            limiter.hit(addr(), ActionKey::Joining, &rule);
        }
        assert_eq!(limiter.count(addr(), ActionKey::Joining), 3);
    }

    #[test]
    fn test_timeframe_resets_only_below_amount() {
        let mut limiter = RateLimiter::new();
        let rule = rule(3);

        limiter.hit(addr(), ActionKey::Chatting, &rule);
        limiter.hit(addr(), ActionKey::Chatting, &rule);
        limiter.expired(addr(), ActionKey::Chatting, Expiry::Timeframe, &rule);
        assert_eq!(limiter.count(addr(), ActionKey::Chatting), 0);

        // Fill the bucket; the timeframe timer must now leave it alone.
        for _ in 0..3 {
            limiter.hit(addr(), ActionKey::Chatting, &rule);
        }
        limiter.expired(addr(), ActionKey::Chatting, Expiry::Timeframe, &rule);
        assert_eq!(limiter.count(addr(), ActionKey::Chatting), 3);
        assert!(limiter.hit(addr(), ActionKey::Chatting, &rule).limited);
    }

    #[test]
    fn test_restore_always_resets() {
        let mut limiter = RateLimiter::new();
        let rule = rule(2);
        for _ in 0..2 {
            limiter.hit(addr(), ActionKey::Readying, &rule);
        }
        assert!(limiter.hit(addr(), ActionKey::Readying, &rule).limited);

        limiter.expired(addr(), ActionKey::Readying, Expiry::Restore, &rule);
        assert_eq!(limiter.count(addr(), ActionKey::Readying), 0);
        let next = limiter.hit(addr(), ActionKey::Readying, &rule);
        assert!(!next.limited);
        assert!(next.arm_timeframe);
    }

    #[test]
    fn test_actions_have_independent_buckets() {
        let mut limiter = RateLimiter::new();
        let rule = rule(1);
        assert!(!limiter.hit(addr(), ActionKey::Chatting, &rule).limited);
        assert!(limiter.hit(addr(), ActionKey::Chatting, &rule).limited);
        assert!(!limiter.hit(addr(), ActionKey::Readying, &rule).limited);
    }

    #[test]
    fn test_addresses_have_independent_buckets() {
        let mut limiter = RateLimiter::new();
        let rule = rule(1);
        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(!limiter.hit(addr(), ActionKey::Chatting, &rule).limited);
        assert!(limiter.hit(addr(), ActionKey::Chatting, &rule).limited);
        assert!(!limiter.hit(other, ActionKey::Chatting, &rule).limited);
    }

    #[test]
    fn test_expiry_for_unknown_address_is_harmless() {
        let mut limiter = RateLimiter::new();
        limiter.expired(addr(), ActionKey::Chatting, Expiry::Restore, &rule(2));
        assert_eq!(limiter.count(addr(), ActionKey::Chatting), 0);
    }
}
