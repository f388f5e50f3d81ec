use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

pub const DEFAULT_MAX_REQUESTS: u32 = 30;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window per-user request limiter. Entries two windows old are pruned
/// whenever the map is touched, so memory stays bounded by active users.
pub struct RateLimiter {
  max_requests: u32,
  window: Duration,
  entries: Mutex<HashMap<i64, Entry>>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
  count: u32,
  window_start: Instant,
}

impl Default for RateLimiter {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
  }
}

impl RateLimiter {
  pub fn new(max_requests: u32, window: Duration) -> Self {
    Self {
      max_requests,
      window,
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Ok when the request may proceed, Err carries the time until the window
  /// resets for this user.
  pub fn check(&self, user_id: i64) -> Result<(), Duration> {
    self.check_at(user_id, Instant::now())
  }

  fn check_at(&self, user_id: i64, now: Instant) -> Result<(), Duration> {
    let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
    entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window * 2);

    let entry = entries.entry(user_id).or_insert(Entry {
      count: 0,
      window_start: now,
    });
    if now.duration_since(entry.window_start) >= self.window {
      entry.count = 0;
      entry.window_start = now;
    }
    if entry.count >= self.max_requests {
      let elapsed = now.duration_since(entry.window_start);
      return Err(self.window.saturating_sub(elapsed));
    }
    entry.count += 1;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;
  use std::time::Instant;

  use super::RateLimiter;

  #[test]
  fn allows_up_to_limit_then_reports_retry_after() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60));
    let now = Instant::now();
    assert!(limiter.check_at(1, now).is_ok());
    assert!(limiter.check_at(1, now).is_ok());
    let retry_after = limiter.check_at(1, now).unwrap_err();
    assert!(retry_after <= Duration::from_secs(60));
  }

  #[test]
  fn window_resets_after_elapsing() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    let now = Instant::now();
    assert!(limiter.check_at(1, now).is_ok());
    assert!(limiter.check_at(1, now).is_err());
    assert!(limiter.check_at(1, now + Duration::from_secs(61)).is_ok());
  }

  #[test]
  fn users_are_limited_independently() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    let now = Instant::now();
    assert!(limiter.check_at(1, now).is_ok());
    assert!(limiter.check_at(2, now).is_ok());
  }
}
