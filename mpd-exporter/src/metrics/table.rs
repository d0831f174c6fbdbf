//! Published period registries, one slot per endpoint.
//!
//! Each slot is an atomic reference cell: the owning watcher swaps in a
//! complete registry, readers load whatever is currently published. A
//! published registry is never mutated.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;

use super::period::PeriodRegistry;

type Slot = Arc<ArcSwapOption<PeriodRegistry>>;

#[derive(Debug, Default)]
pub struct PeriodTable {
    slots: DashMap<String, Slot>,
}

impl PeriodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty slot for an endpoint. Existing slots are left untouched.
    pub fn register(&self, endpoint: &str) {
        self.slot(endpoint);
    }

    /// Replace the published registry of an endpoint, returning the previous one.
    pub fn publish(&self, endpoint: &str, registry: PeriodRegistry) -> Option<Arc<PeriodRegistry>> {
        self.slot(endpoint).swap(Some(Arc::new(registry)))
    }

    /// Currently published registry of an endpoint.
    pub fn load(&self, endpoint: &str) -> Option<Arc<PeriodRegistry>> {
        self.slots.get(endpoint).and_then(|slot| slot.load_full())
    }

    /// All published registries, ordered by endpoint alias.
    ///
    /// Endpoints that never published are omitted.
    pub fn snapshots(&self) -> Vec<(String, Arc<PeriodRegistry>)> {
        let mut snapshots: Vec<_> = self
            .slots
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .load_full()
                    .map(|registry| (entry.key().clone(), registry))
            })
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }

    pub fn endpoint_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, endpoint: &str) -> Slot {
        if let Some(slot) = self.slots.get(endpoint) {
            return slot.value().clone();
        }
        self.slots
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(ArcSwapOption::empty()))
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::period::PeriodFamily;

    fn registry_with_period(endpoint: &str, period: &str) -> PeriodRegistry {
        let mut registry = PeriodRegistry::new();
        registry.set(PeriodFamily::Start, &[endpoint, period], 0.0);
        registry
    }

    #[test]
    fn test_registered_but_unpublished_is_omitted() {
        let table = PeriodTable::new();
        table.register("a");
        assert_eq!(table.endpoint_count(), 1);
        assert!(table.load("a").is_none());
        assert!(table.snapshots().is_empty());
    }

    #[test]
    fn test_publish_replaces_previous() {
        let table = PeriodTable::new();
        table.register("a");

        assert!(table.publish("a", registry_with_period("a", "0")).is_none());
        let reader = table.load("a").unwrap();

        let previous = table.publish("a", registry_with_period("a", "1")).unwrap();
        assert!(Arc::ptr_eq(&previous, &reader));

        // A reader holding the old snapshot still sees it unchanged.
        assert_eq!(reader.value(PeriodFamily::Start, &["a", "0"]), Some(0.0));

        let current = table.load("a").unwrap();
        assert_eq!(current.value(PeriodFamily::Start, &["a", "0"]), None);
        assert_eq!(current.value(PeriodFamily::Start, &["a", "1"]), Some(0.0));
    }

    #[test]
    fn test_snapshots_sorted_by_alias() {
        let table = PeriodTable::new();
        table.publish("b", registry_with_period("b", "0"));
        table.publish("a", registry_with_period("a", "0"));
        table.register("c");

        let aliases: Vec<_> = table.snapshots().into_iter().map(|(a, _)| a).collect();
        assert_eq!(aliases, vec!["a".to_string(), "b".to_string()]);
    }
}
