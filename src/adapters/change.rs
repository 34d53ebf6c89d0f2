//! Change detection for opportunistic write-through
//!
//! A live read is written back only when its payload differs from the last
//! write for that key or the minimum write interval has passed. Explicit
//! captures bypass this and always write.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

struct LastWrite {
    hash: String,
    at: DateTime<Utc>,
}

pub struct ChangeTracker {
    min_interval: Duration,
    last: DashMap<String, LastWrite>,
}

impl ChangeTracker {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: DashMap::new(),
        }
    }

    /// Fingerprint of a payload
    pub fn hash(payload: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn should_write(&self, key: &str, payload: &serde_json::Value, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last.get(key) else {
            return true;
        };

        let elapsed = now
            .signed_duration_since(last.at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.min_interval {
            tracing::debug!("Time-based write for {}: {}s since last write", key, elapsed.as_secs());
            return true;
        }

        last.hash != Self::hash(payload)
    }

    pub fn record(&self, key: &str, payload: &serde_json::Value, at: DateTime<Utc>) {
        self.last.insert(
            key.to_string(),
            LastWrite {
                hash: Self::hash(payload),
                at,
            },
        );
    }

    pub fn last_write(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last.get(key).map(|l| l.at)
    }

    pub fn clear(&self) {
        self.last.clear();
    }
}
