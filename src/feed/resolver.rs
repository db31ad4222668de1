//! Import order resolution.
//!
//! Orders candidate table names so that every table comes after the parents
//! it declares. The scan is greedy: it restarts from the top of the pending
//! list after every scheduled table, which keeps the order stable with
//! respect to the input for independent tables.

use std::collections::HashSet;

use crate::schema::SchemaRegistry;
use crate::{Error, Result};

/// Resolves the import order for `candidates` using the registry's seeds.
///
/// Names without a registry entry are dropped. Seed tables are considered
/// scheduled before anything else and never appear in the result.
///
/// # Errors
///
/// Returns [`Error::CyclicDependency`] if the parent relations among the
/// candidates form a cycle.
pub fn resolve_import_order<S: AsRef<str>>(
    candidates: &[S],
    registry: &SchemaRegistry,
) -> Result<Vec<String>> {
    let seeds: Vec<&str> = registry.seeds().collect();
    resolve_with_seeds(candidates, registry, &seeds)
}

/// Resolves the import order with an explicit list of seed tables.
///
/// # Errors
///
/// Returns [`Error::CyclicDependency`] if the parent relations among the
/// candidates form a cycle.
pub fn resolve_with_seeds<S: AsRef<str>>(
    candidates: &[S],
    registry: &SchemaRegistry,
    seeds: &[&str],
) -> Result<Vec<String>> {
    let mut scheduled: Vec<&str> = seeds.to_vec();
    let mut pending: Vec<&str> = Vec::with_capacity(candidates.len());
    for name in candidates {
        let name = name.as_ref();
        if !scheduled.contains(&name) && !pending.contains(&name) {
            pending.push(name);
        }
    }

    // Parents outside this set can never be scheduled and do not block.
    let importable: HashSet<&str> = pending
        .iter()
        .copied()
        .filter(|name| registry.contains(name))
        .collect();

    while !pending.is_empty() {
        let next = pending.iter().position(|&name| {
            registry.get(name).is_none_or(|schema| {
                schema.parent_names().all(|parent| {
                    parent == name || scheduled.contains(&parent) || !importable.contains(parent)
                })
            })
        });

        let Some(index) = next else {
            return Err(Error::CyclicDependency {
                tables: pending.iter().map(ToString::to_string).collect(),
            });
        };

        let name = pending.remove(index);
        if registry.contains(name) {
            scheduled.push(name);
        } else {
            tracing::debug!(table = %name, "Skipping file without a table definition");
        }
    }

    Ok(scheduled
        .into_iter()
        .skip(seeds.len())
        .map(ToString::to_string)
        .collect())
}
