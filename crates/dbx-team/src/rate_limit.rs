//! Per-action fixed-window call gate.
//!
//! Every Dropbox-facing operation consults a [`RateLimiter`] before touching
//! the network. Each action name owns an independent counter: at most
//! `max_calls` invocations are allowed between `window_start` and
//! `window_start + window_secs`, after which the window restarts on the next
//! call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default budget: 3 calls per action per 5 minutes.
pub const DEFAULT_MAX_CALLS: u32 = 3;
pub const DEFAULT_WINDOW_SECS: u64 = 300;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Monotonic time source for the limiter.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Policy & records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Call budget for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_calls: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub fn new(max_calls: u32, window_secs: u64) -> Self {
        Self {
            max_calls,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLS, DEFAULT_WINDOW_SECS)
    }
}

/// Counter state for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub action: String,
    pub window_start: Instant,
    pub count: u32,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Blocked { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Limiter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared per-action counter store.
///
/// Clones share the same records, so handing one limiter to several clients
/// makes them draw from a single budget.
#[derive(Clone)]
pub struct RateLimiter {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("actions", &self.lock().len())
            .finish()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        // A panic while holding the guard cannot leave a record half-written.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether `action` may run now and count the attempt.
    pub fn check_and_record(&self, action: &str, max_calls: u32, window_secs: u64) -> bool {
        self.check(action, RateLimitPolicy::new(max_calls, window_secs))
            .is_allowed()
    }

    /// Same as [`check_and_record`](Self::check_and_record), with the
    /// remaining budget or the time until the window resets.
    pub fn check(&self, action: &str, policy: RateLimitPolicy) -> RateDecision {
        let max_calls = policy.max_calls.max(1);
        let window = policy.window();
        let now = self.clock.now();
        let mut records = self.lock();

        let record = records
            .entry(action.to_string())
            .or_insert_with(|| RateLimitRecord {
                action: action.to_string(),
                window_start: now,
                count: 0,
            });

        if record.count == 0 || now.saturating_duration_since(record.window_start) > window {
            record.window_start = now;
            record.count = 1;
            return RateDecision::Allowed {
                remaining: max_calls - 1,
            };
        }

        if record.count < max_calls {
            record.count += 1;
            return RateDecision::Allowed {
                remaining: max_calls - record.count,
            };
        }

        let elapsed = now.saturating_duration_since(record.window_start);
        RateDecision::Blocked {
            retry_after: window.saturating_sub(elapsed),
        }
    }

    /// Snapshot of the record for `action`, if one exists.
    pub fn record(&self, action: &str) -> Option<RateLimitRecord> {
        self.lock().get(action).cloned()
    }

    /// Forget the counter for one action.
    pub fn reset(&self, action: &str) {
        self.lock().remove(action);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of actions with a live record.
    pub fn tracked_actions(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        (RateLimiter::with_clock(clock.clone()), clock)
    }

    #[test]
    fn third_call_allowed_fourth_blocked() {
        let (rl, _) = limiter();
        assert!(rl.check_and_record("upload", 3, 300));
        assert!(rl.check_and_record("upload", 3, 300));
        assert!(rl.check_and_record("upload", 3, 300));
        assert!(!rl.check_and_record("upload", 3, 300));
        assert!(!rl.check_and_record("upload", 3, 300));
    }

    #[test]
    fn blocked_call_does_not_increment() {
        let (rl, _) = limiter();
        for _ in 0..10 {
            rl.check_and_record("search", 2, 60);
        }
        assert_eq!(rl.record("search").unwrap().count, 2);
    }

    #[test]
    fn window_expiry_resets_count() {
        let (rl, clock) = limiter();
        for _ in 0..3 {
            assert!(rl.check_and_record("list_folder", 3, 300));
        }
        assert!(!rl.check_and_record("list_folder", 3, 300));

        clock.advance(Duration::from_secs(301));
        assert!(rl.check_and_record("list_folder", 3, 300));
        let rec = rl.record("list_folder").unwrap();
        assert_eq!(rec.count, 1);
        assert_eq!(rec.window_start, clock.now());
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let (rl, clock) = limiter();
        for _ in 0..3 {
            rl.check_and_record("export_file", 3, 300);
        }
        clock.advance(Duration::from_secs(300));
        assert!(!rl.check_and_record("export_file", 3, 300));
        clock.advance(Duration::from_millis(1));
        assert!(rl.check_and_record("export_file", 3, 300));
    }

    #[test]
    fn count_is_monotonic_within_window() {
        let (rl, clock) = limiter();
        let mut last = 0;
        for _ in 0..6 {
            rl.check_and_record("members_list", 4, 300);
            clock.advance(Duration::from_secs(10));
            let count = rl.record("members_list").unwrap().count;
            assert!(count >= last);
            last = count;
        }
        assert_eq!(last, 4);
    }

    #[test]
    fn actions_are_independent() {
        let (rl, _) = limiter();
        for _ in 0..3 {
            rl.check_and_record("upload", 3, 300);
        }
        assert!(!rl.check_and_record("upload", 3, 300));
        assert!(rl.check_and_record("delete_file", 3, 300));
        assert_eq!(rl.tracked_actions(), 2);
    }

    #[test]
    fn decision_reports_remaining_and_retry_after() {
        let (rl, clock) = limiter();
        let policy = RateLimitPolicy::new(2, 100);
        assert_eq!(rl.check("a", policy), RateDecision::Allowed { remaining: 1 });
        assert_eq!(rl.check("a", policy), RateDecision::Allowed { remaining: 0 });
        clock.advance(Duration::from_secs(40));
        assert_eq!(
            rl.check("a", policy),
            RateDecision::Blocked {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn zero_policy_is_clamped() {
        let (rl, _) = limiter();
        assert!(rl.check_and_record("x", 0, 0));
        assert!(!rl.check_and_record("x", 0, 0));
    }

    #[test]
    fn reset_and_clear() {
        let (rl, _) = limiter();
        rl.check_and_record("a", 1, 60);
        rl.check_and_record("b", 1, 60);
        assert!(!rl.check_and_record("a", 1, 60));
        rl.reset("a");
        assert!(rl.check_and_record("a", 1, 60));
        rl.clear();
        assert_eq!(rl.tracked_actions(), 0);
        assert!(rl.record("b").is_none());
    }

    #[test]
    fn clones_share_state() {
        let (rl, _) = limiter();
        let other = rl.clone();
        rl.check_and_record("upload", 1, 60);
        assert!(!other.check_and_record("upload", 1, 60));
    }

    #[test]
    fn concurrent_callers_never_exceed_budget() {
        let rl = RateLimiter::new();
        let allowed = std::sync::atomic::AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..50 {
                        if rl.check_and_record("download_zip", 3, 300) {
                            allowed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });
        assert_eq!(allowed.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(rl.record("download_zip").unwrap().count, 3);
    }

    #[test]
    fn default_policy_matches_budget() {
        let p = RateLimitPolicy::default();
        assert_eq!(p.max_calls, 3);
        assert_eq!(p.window_secs, 300);
    }
}
