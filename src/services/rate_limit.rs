use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Counter for one visitor's current window. The expiry is fixed when the
/// bucket is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBucket {
    pub count: u32,
    pub expires_at: Instant,
}

impl WindowBucket {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            expires_at: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone)]
pub struct VisitorRateLimiter {
    // visitor id -> bucket
    buckets: Arc<Mutex<HashMap<i64, WindowBucket>>>,
    window: Duration,
}

impl Default for VisitorRateLimiter {
    fn default() -> Self {
        Self::new(WINDOW)
    }
}

impl VisitorRateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    pub fn check(&self, visitor_id: i64, limit: u32) -> bool {
        let allowed = self.check_at(visitor_id, limit, Instant::now());

        if rand::random::<u8>() < 10 {
            self.cleanup_expired();
        }

        allowed
    }

    pub fn check_at(&self, visitor_id: i64, limit: u32, now: Instant) -> bool {
        let mut buckets = self.lock();

        match buckets.get_mut(&visitor_id) {
            Some(bucket) if !bucket.is_expired(now) => {
                if bucket.count >= limit {
                    false
                } else {
                    bucket.count += 1;
                    true
                }
            }
            _ => {
                buckets.insert(visitor_id, WindowBucket::open(now, self.window));
                true
            }
        }
    }

    pub fn bucket(&self, visitor_id: i64) -> Option<WindowBucket> {
        self.lock().get(&visitor_id).copied()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.lock().retain(|_, bucket| !bucket.is_expired(now));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, WindowBucket>> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
