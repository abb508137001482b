#![forbid(unsafe_code)]

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What happened to an inbound response when it was offered to the table.
#[derive(Debug, PartialEq, Eq)]
pub enum Routed {
    /// The response matched a pending request and closed its entry.
    Matched(i64),
    /// No pending entry carries this id (never sent, already answered, or
    /// expired earlier). The caller drops the response.
    Unroutable,
}

/// Caller-side correlation table. Requests are pipelined with distinct ids;
/// responses arrive in processing order, not submission order, so the only
/// valid join key is the id. Entries that sit unanswered past the
/// inactivity timeout are abandoned: a late response then becomes
/// unroutable, which is safe because the server-side effect (if any) is
/// already settled.
#[derive(Debug)]
pub struct PendingRequests {
    entries: HashMap<i64, Instant>,
    timeout: Duration,
}

impl PendingRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, id: i64, now: Instant) {
        self.entries.insert(id, now);
    }

    pub fn is_pending(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offers a decoded response to the table.
    pub fn route(&mut self, response: &Value) -> Routed {
        let Some(id) = response.get("id").and_then(|v| v.as_i64()) else {
            return Routed::Unroutable;
        };
        if self.entries.remove(&id).is_some() {
            Routed::Matched(id)
        } else {
            Routed::Unroutable
        }
    }

    /// Abandons every entry whose inactivity window has elapsed and returns
    /// the expired ids.
    pub fn expire(&mut self, now: Instant) -> Vec<i64> {
        let timeout = self.timeout;
        let mut expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, sent_at)| now.duration_since(**sent_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }
}
