//! Which dependents to re-resolve after a status change, and in what order.

use crate::graph::GraphStore;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// How far a manual status change propagates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// Re-resolve only tasks that directly depend on the changed task.
    /// Tasks further down the chain keep their status until something else
    /// touches them.
    #[default]
    Direct,

    /// Re-resolve every transitive dependent, prerequisites before dependents.
    Transitive,
}

impl fmt::Display for CascadeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeMode::Direct => f.write_str("direct"),
            CascadeMode::Transitive => f.write_str("transitive"),
        }
    }
}

impl FromStr for CascadeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(CascadeMode::Direct),
            "transitive" => Ok(CascadeMode::Transitive),
            other => Err(format!("unknown cascade mode '{}': expected direct or transitive", other)),
        }
    }
}

/// Ids to re-resolve after `root` changed, in the order to resolve them.
pub fn cascade_order<S: GraphStore>(store: &S, root: &str, mode: CascadeMode) -> Result<Vec<String>> {
    match mode {
        CascadeMode::Direct => Ok(store
            .list_dependents(root)?
            .into_iter()
            .map(|edge| edge.task_id)
            .collect()),
        CascadeMode::Transitive => transitive_dependents(store, root),
    }
}

/// Every task that transitively depends on `root`, topologically ordered.
///
/// A task appears only after all of its prerequisites that are themselves
/// downstream of `root`, so each is resolved against settled inputs.
fn transitive_dependents<S: GraphStore>(store: &S, root: &str) -> Result<Vec<String>> {
    // Discover the downstream subgraph through reverse edges.
    let mut discovered: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut stack = vec![root.to_string()];

    while let Some(node) = stack.pop() {
        let dependents: Vec<String> = store
            .list_dependents(&node)?
            .into_iter()
            .map(|edge| edge.task_id)
            .collect();
        for dependent in &dependents {
            if dependent != root && seen.insert(dependent.clone()) {
                discovered.push(dependent.clone());
                stack.push(dependent.clone());
            }
        }
        children.insert(node, dependents);
    }

    // Kahn's algorithm restricted to the discovered set.
    let mut in_degree: HashMap<&str, usize> = discovered.iter().map(|id| (id.as_str(), 0)).collect();
    for id in &discovered {
        for child in children.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut ready: VecDeque<&str> = discovered
        .iter()
        .map(|id| id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();
    let mut order = Vec::with_capacity(discovered.len());

    while let Some(id) = ready.pop_front() {
        order.push(id.to_string());
        for child in children.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(child.as_str());
                }
            }
        }
    }

    if order.len() != discovered.len() {
        eyre::bail!("dependency graph below {} contains a cycle", root);
    }

    Ok(order)
}
