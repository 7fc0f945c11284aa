//! Fixed-capacity ring of the most recent matches.

use std::collections::VecDeque;
use std::sync::RwLock;

use certwatch_types::Match;

/// Default ring capacity.
const DEFAULT_CAPACITY: usize = 500;

/// In-memory ring of recent matches for low-latency queries.
///
/// Persistence workers push under the writer lock (O(1)); queries snapshot
/// under the reader lock (O(n) copy). Oldest entries are evicted once the
/// ring is full.
pub struct RecentCache {
    inner: RwLock<VecDeque<Match>>,
    capacity: usize,
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RecentCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a match, evicting from the front past capacity.
    pub fn push(&self, record: Match) {
        let mut ring = self.inner.write().unwrap_or_else(|e| e.into_inner());
        ring.push_back(record);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// A copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Match> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certwatch_types::Priority;
    use chrono::Utc;

    fn record(cert_id: &str) -> Match {
        Match {
            cert_id: cert_id.to_string(),
            domains: vec![],
            keywords: vec!["paypal".to_string()],
            rule_name: "r".to_string(),
            priority: Priority::Medium,
            timestamp: Utc::now(),
            tbs_sha256: String::new(),
            cert_sha256: String::new(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let cache = RecentCache::with_capacity(3);
        for i in 0..5 {
            cache.push(record(&format!("c{i}")));
        }
        let snap = cache.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].cert_id, "c2");
        assert_eq!(snap[2].cert_id, "c4");
    }

    #[test]
    fn clear_empties_the_ring() {
        let cache = RecentCache::default();
        cache.push(record("c1"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
