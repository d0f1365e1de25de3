//! Counter catalog for one collection target.
//!
//! Requested metrics are named by their canonical identifier
//! (`group.name.rollup`), while the performance API speaks in opaque counter
//! keys that are only valid inside one target's session. The catalog resolves
//! requested names against the target's counter metadata and keeps the
//! reverse mapping the record builder needs.

use ahash::AHashMap as HashMap;
use tracing::{debug, warn};

use crate::config::MetricRequest;
use crate::rollup::RollupKind;
use crate::source::CounterInfo;

/// A requested metric resolved to the target's counter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDefinition {
    /// Canonical name as requested, e.g. `cpu.usage.average`.
    pub name: String,
    /// Instance filter: `"*"` for all instances, `""` for the aggregate.
    pub instances: String,
    pub key: i32,
    /// `None` when the name carries no recognized rollup suffix.
    pub rollup: Option<RollupKind>,
}

/// Resolved counters for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricGroup {
    pub entity_type: String,
    pub counters: Vec<CounterDefinition>,
}

/// Reverse lookup entry: counter key back to canonical name and rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterName {
    pub name: String,
    pub rollup: Option<RollupKind>,
}

/// Counters usable on one target, grouped by entity type.
#[derive(Debug, Clone, Default)]
pub struct CounterCatalog {
    groups: Vec<MetricGroup>,
    names: HashMap<i32, CounterName>,
    unresolved: Vec<String>,
}

impl CounterCatalog {
    /// Resolves `requests` against the target's `counters`.
    ///
    /// Requested metrics the target does not expose are dropped and listed
    /// in [`CounterCatalog::unresolved`].
    pub fn build(counters: &[CounterInfo], requests: &[MetricRequest]) -> Self {
        let mut wanted: HashMap<&str, Vec<(&MetricRequest, usize)>> = HashMap::new();
        for request in requests {
            for (idx, def) in request.definitions.iter().enumerate() {
                wanted
                    .entry(def.metric.as_str())
                    .or_default()
                    .push((request, idx));
            }
        }

        let mut catalog = CounterCatalog::default();

        for counter in counters {
            let identifier = counter.identifier();
            let Some(matches) = wanted.get(identifier.as_str()) else {
                continue;
            };

            let rollup = RollupKind::from_counter_name(&identifier);
            if rollup.is_none() {
                warn!(
                    "Counter {} (key {}) has no recognized rollup suffix",
                    identifier, counter.key
                );
            }

            for (request, idx) in matches {
                let def = &request.definitions[*idx];
                let resolved = CounterDefinition {
                    name: def.metric.clone(),
                    instances: def.instances.clone(),
                    key: counter.key,
                    rollup,
                };
                for entity_type in &request.object_types {
                    catalog.push(entity_type, resolved.clone());
                }
            }

            catalog.names.insert(
                counter.key,
                CounterName {
                    name: identifier,
                    rollup,
                },
            );
        }

        let mut seen: Vec<&str> = Vec::new();
        for request in requests {
            for def in &request.definitions {
                let metric = def.metric.as_str();
                if seen.contains(&metric) {
                    continue;
                }
                seen.push(metric);
                if !catalog.names.values().any(|n| n.name == metric) {
                    debug!("Requested metric {} not exposed by target", metric);
                    catalog.unresolved.push(metric.to_string());
                }
            }
        }

        catalog
    }

    fn push(&mut self, entity_type: &str, counter: CounterDefinition) {
        match self.groups.iter_mut().find(|g| g.entity_type == entity_type) {
            Some(group) => group.counters.push(counter),
            None => self.groups.push(MetricGroup {
                entity_type: entity_type.to_string(),
                counters: vec![counter],
            }),
        }
    }

    pub fn groups(&self) -> &[MetricGroup] {
        &self.groups
    }

    pub fn group(&self, entity_type: &str) -> Option<&MetricGroup> {
        self.groups.iter().find(|g| g.entity_type == entity_type)
    }

    /// Entity types that have at least one resolved counter.
    pub fn entity_types(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.entity_type.clone()).collect()
    }

    pub fn lookup(&self, key: i32) -> Option<&CounterName> {
        self.names.get(&key)
    }

    /// Requested metrics the target does not expose.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn counter_count(&self) -> usize {
        self.groups.iter().map(|g| g.counters.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
