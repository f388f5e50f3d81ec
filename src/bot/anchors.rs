use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

pub const ANCHOR_CAPACITY: usize = 1024;
pub const ANCHOR_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifies a bot-sent message a user can reply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorKey {
  pub chat_id: i64,
  pub message_id: i32,
}

/// Maps bot-sent review messages to review ids so a later photo reply can be
/// correlated. Bounded by capacity (oldest-first eviction) and by age.
pub struct AnchorStore {
  capacity: usize,
  ttl: Duration,
  inner: Mutex<AnchorMap>,
}

#[derive(Default)]
struct AnchorMap {
  entries: HashMap<AnchorKey, AnchorEntry>,
  // insertion order, oldest at the front
  order: VecDeque<AnchorKey>,
}

struct AnchorEntry {
  review_id: i64,
  recorded: Instant,
}

impl Default for AnchorStore {
  fn default() -> Self {
    Self::new(ANCHOR_CAPACITY, ANCHOR_TTL)
  }
}

impl AnchorStore {
  pub fn new(capacity: usize, ttl: Duration) -> Self {
    Self {
      capacity,
      ttl,
      inner: Mutex::new(AnchorMap::default()),
    }
  }

  pub fn record(&self, key: AnchorKey, review_id: i64) {
    self.record_at(key, review_id, Instant::now());
  }

  fn record_at(&self, key: AnchorKey, review_id: i64, now: Instant) {
    let mut map = self.inner.lock().expect("anchor store lock poisoned");
    if map.entries.insert(key, AnchorEntry { review_id, recorded: now }).is_some() {
      map.order.retain(|existing| *existing != key);
    }
    map.order.push_back(key);
    while map.entries.len() > self.capacity {
      let Some(oldest) = map.order.pop_front() else {
        break;
      };
      map.entries.remove(&oldest);
    }
  }

  pub fn resolve(&self, key: AnchorKey) -> Option<i64> {
    self.resolve_at(key, Instant::now())
  }

  fn resolve_at(&self, key: AnchorKey, now: Instant) -> Option<i64> {
    let mut map = self.inner.lock().expect("anchor store lock poisoned");
    let entry = map.entries.get(&key)?;
    if now.duration_since(entry.recorded) >= self.ttl {
      map.entries.remove(&key);
      map.order.retain(|existing| *existing != key);
      return None;
    }
    Some(entry.review_id)
  }
}
