//! Atomic publication of the engine to concurrent readers.

use std::sync::{Arc, RwLock};

use crate::engine::RuleEngine;

/// The process-wide engine cell.
///
/// Readers [`load`](SharedEngine::load) a cheap `Arc` clone and hold it
/// for the duration of one event's find+evaluate; writers construct a new
/// engine off-line and [`publish`](SharedEngine::publish) it with a single
/// pointer swap. An old engine stays alive until its last reader drops the
/// `Arc`, so a reload never invalidates in-flight evaluation and a reader
/// can never observe a half-built engine.
#[derive(Clone, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<Option<Arc<RuleEngine>>>>,
}

impl SharedEngine {
    /// An empty cell with no engine published yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current engine, if one has been published.
    pub fn load(&self) -> Option<Arc<RuleEngine>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the published engine.
    pub fn publish(&self, engine: RuleEngine) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(engine));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Rule;
    use crate::parser::parse;
    use certwatch_types::Priority;

    fn engine_with_keyword(name: &str, keyword: &str) -> RuleEngine {
        RuleEngine::build(vec![Rule::new(
            name.to_string(),
            parse(keyword).unwrap(),
            keyword.to_string(),
            Priority::High,
            true,
            String::new(),
        )])
        .unwrap()
    }

    #[test]
    fn starts_empty() {
        assert!(SharedEngine::new().load().is_none());
    }

    #[test]
    fn publish_replaces_for_new_readers() {
        let shared = SharedEngine::new();
        shared.publish(engine_with_keyword("a", "paypal"));
        let first = shared.load().unwrap();
        assert_eq!(first.rules()[0].name, "a");

        shared.publish(engine_with_keyword("b", "stripe"));
        assert_eq!(shared.load().unwrap().rules()[0].name, "b");
        // The old engine handle is still fully usable.
        assert_eq!(first.rules()[0].name, "a");
    }

    #[test]
    fn concurrent_reload_never_yields_partial_engine() {
        let shared = SharedEngine::new();
        shared.publish(engine_with_keyword("seed", "paypal"));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let engine = shared.load().expect("engine must stay published");
                        // An engine is either the old or the new one, never
                        // a torn state: its invariants always hold.
                        assert_eq!(engine.rules().len(), 1);
                        assert!(engine.keyword_count() > 0);
                        let ds = vec!["paypal-login.stripe.example".to_string()];
                        let found = engine.find(&ds);
                        let _ = engine.evaluate(&found, &ds);
                    }
                })
            })
            .collect();

        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let kw = if i % 2 == 0 { "paypal" } else { "stripe" };
                    shared.publish(engine_with_keyword("swapped", kw));
                }
            })
        };

        for handle in readers {
            handle.join().unwrap();
        }
        writer.join().unwrap();
    }
}
