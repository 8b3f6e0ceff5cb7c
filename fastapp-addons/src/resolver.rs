//! Dependency closure over the addon graph.

use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Computes the set of addons that must be active.
///
/// Starts from the names whose flag is `true` in `enabled` and repeatedly
/// adds every prerequisite listed in `deps` until nothing changes. The
/// returned set is closed under the dependency relation: for every member,
/// all of its prerequisites are members too. Prerequisites do not need to
/// appear as keys in `enabled`.
///
/// The pass count is bounded by the number of distinct names, and the
/// dependency graph is checked for cycles up front; a cyclic graph fails
/// with [`ConfigError::CyclicDependency`] instead of looping or mounting a
/// partial set.
pub fn resolve(
    enabled: &BTreeMap<String, bool>,
    deps: &BTreeMap<String, Vec<String>>,
) -> ConfigResult<BTreeSet<String>> {
    for name in enabled
        .keys()
        .chain(deps.keys())
        .chain(deps.values().flatten())
    {
        if name.is_empty() {
            return Err(ConfigError::EmptyAddonName);
        }
    }
    detect_cycle(deps)?;

    let mut resolved: BTreeSet<String> = enabled
        .iter()
        .filter(|(_, on)| **on)
        .map(|(name, _)| name.clone())
        .collect();

    // Worst case adds one name per pass, so distinct-name passes suffice.
    let max_passes = distinct_names(enabled, deps) + 1;
    let mut passes = 0;
    let mut changed = true;
    while changed {
        passes += 1;
        if passes > max_passes {
            return Err(ConfigError::Unstable(max_passes));
        }
        changed = false;
        let members: Vec<String> = resolved.iter().cloned().collect();
        for name in members {
            let Some(prereqs) = deps.get(&name) else {
                continue;
            };
            for prereq in prereqs {
                if resolved.insert(prereq.clone()) {
                    changed = true;
                }
            }
        }
    }

    debug!(count = resolved.len(), passes, "addon set resolved");
    Ok(resolved)
}

/// Returns the URL mount prefix for an addon: the configured override, or
/// `"/" + name` when none is set.
pub fn mount_path(name: &str, mounts: &BTreeMap<String, String>) -> ConfigResult<String> {
    if name.is_empty() {
        return Err(ConfigError::EmptyAddonName);
    }
    Ok(mounts
        .get(name)
        .cloned()
        .unwrap_or_else(|| format!("/{name}")))
}

/// Whether an addon ended up active after resolution.
pub fn is_enabled(name: &str, resolved: &BTreeSet<String>) -> bool {
    resolved.contains(name)
}

/// Kahn's algorithm over the whole dependency map. Any cycle is a
/// configuration error, reachable from the enabled set or not; a dormant
/// cycle is a latent misconfiguration that should fail loudly now.
fn detect_cycle(deps: &BTreeMap<String, Vec<String>>) -> ConfigResult<()> {
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    for (name, prereqs) in deps {
        indegree.entry(name.as_str()).or_insert(0);
        for prereq in prereqs {
            *indegree.entry(prereq.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();

    let total = indegree.len();
    let mut processed = 0;
    while let Some(name) = queue.pop_front() {
        processed += 1;
        if let Some(prereqs) = deps.get(name) {
            for prereq in prereqs {
                let deg = indegree
                    .get_mut(prereq.as_str())
                    .expect("prerequisite seen during indegree build");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(prereq.as_str());
                }
            }
        }
    }

    if processed < total {
        // Name one node still carrying indegree for the error message.
        let stuck = indegree
            .iter()
            .find(|(_, deg)| **deg > 0)
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_default();
        return Err(ConfigError::CyclicDependency(stuck));
    }
    Ok(())
}

fn distinct_names(
    enabled: &BTreeMap<String, bool>,
    deps: &BTreeMap<String, Vec<String>>,
) -> usize {
    let mut names: BTreeSet<&str> = enabled.keys().map(String::as_str).collect();
    for (name, prereqs) in deps {
        names.insert(name);
        names.extend(prereqs.iter().map(String::as_str));
    }
    names.len()
}
