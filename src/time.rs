//! Session clock utilities
//!
//! The consolidator and planner operate on a millisecond clock relative to
//! session start (`now_ms`), not wall-clock time. The Session Coordinator
//! stamps the origin on first forecast and derives `now_ms` from it on every
//! subsequent one (section 4.H, step 3).

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn wall_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}

/// Tracks the session origin timestamp and converts wall-clock readings into
/// session-relative `now_ms` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionClock {
    origin_wall_ms: Option<i64>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self { origin_wall_ms: None }
    }

    /// Stamp the origin if it hasn't been stamped yet, then return
    /// `now_ms = now_wall_ms - origin`. Callers must only invoke this for a
    /// forecast that actually carries transitions (section 4.H step 3: the
    /// origin is stamped on the first *non-empty* forecast) — use `peek_ms`
    /// for an empty one.
    pub fn now_ms(&mut self, wall_now_ms: i64) -> i64 {
        let origin = *self.origin_wall_ms.get_or_insert(wall_now_ms);
        wall_now_ms - origin
    }

    /// Compute `now_ms` without stamping the origin. Before the origin has
    /// ever been stamped, there is no session-relative time yet, so this
    /// returns `0`.
    pub fn peek_ms(&self, wall_now_ms: i64) -> i64 {
        match self.origin_wall_ms {
            Some(origin) => wall_now_ms - origin,
            None => 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.origin_wall_ms.is_some()
    }
}
