//! Property-based tests for addon resolution.
//!
//! The resolver's contract is set closure: for every resolved addon, every
//! prerequisite of that addon is also resolved. We generate random acyclic
//! dependency graphs and random flag assignments and check closure holds,
//! plus determinism across repeated runs.

use fastapp_addons::{resolve, ConfigError};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Generates an acyclic dependency map over `n` numbered addons by only
/// allowing edges from higher-numbered addons to lower-numbered ones.
fn acyclic_graph_strategy(
    n: usize,
) -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    prop::collection::vec(prop::collection::vec(0..n, 0..4), n).prop_map(move |edges| {
        let mut deps = BTreeMap::new();
        for (i, targets) in edges.into_iter().enumerate() {
            let prereqs: Vec<String> = targets
                .into_iter()
                .filter(|t| *t < i)
                .map(|t| format!("addon{t}"))
                .collect();
            if !prereqs.is_empty() {
                deps.insert(format!("addon{i}"), prereqs);
            }
        }
        deps
    })
}

fn flags_strategy(n: usize) -> impl Strategy<Value = BTreeMap<String, bool>> {
    prop::collection::vec(any::<bool>(), n).prop_map(|bits| {
        bits.into_iter()
            .enumerate()
            .map(|(i, on)| (format!("addon{i}"), on))
            .collect()
    })
}

proptest! {
    /// Acyclic graphs always resolve, and the result is closed under the
    /// dependency relation.
    #[test]
    fn resolution_is_closed(
        deps in acyclic_graph_strategy(12),
        enabled in flags_strategy(12),
    ) {
        let resolved = resolve(&enabled, &deps).unwrap();
        for name in &resolved {
            if let Some(prereqs) = deps.get(name) {
                for prereq in prereqs {
                    prop_assert!(
                        resolved.contains(prereq),
                        "{name} resolved but prerequisite {prereq} missing"
                    );
                }
            }
        }
        // Every enabled addon is in the result.
        for (name, on) in &enabled {
            if *on {
                prop_assert!(resolved.contains(name));
            }
        }
    }

    /// Resolution is deterministic over identical inputs.
    #[test]
    fn resolution_is_deterministic(
        deps in acyclic_graph_strategy(10),
        enabled in flags_strategy(10),
    ) {
        let first = resolve(&enabled, &deps).unwrap();
        let second = resolve(&enabled, &deps).unwrap();
        prop_assert_eq!(first, second);
    }

    /// A graph with a deliberately inserted cycle never resolves.
    #[test]
    fn inserted_cycle_is_detected(
        mut deps in acyclic_graph_strategy(8),
        enabled in flags_strategy(8),
    ) {
        deps.entry("addon0".to_string())
            .or_default()
            .push("addon7".to_string());
        deps.entry("addon7".to_string())
            .or_default()
            .push("addon0".to_string());

        let result = resolve(&enabled, &deps);
        prop_assert!(matches!(result, Err(ConfigError::CyclicDependency(_))));
    }
}
