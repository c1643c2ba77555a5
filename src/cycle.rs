//! Cycle checks over the depends-on graph.

use crate::graph::GraphStore;
use eyre::Result;
use std::collections::HashSet;

/// Would adding the edge `dependent -> prerequisite` close a cycle?
///
/// Walks depends-on edges forward from `prerequisite`. Reaching `dependent`
/// means the prerequisite already (transitively) depends on the dependent.
/// Each task is expanded at most once, so diamonds stay linear: O(V + E).
pub fn would_create_cycle<S: GraphStore>(store: &S, dependent: &str, prerequisite: &str) -> Result<bool> {
    if dependent == prerequisite {
        return Ok(true);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![prerequisite.to_string()];

    while let Some(node) = stack.pop() {
        if node == dependent {
            return Ok(true);
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        for edge in store.list_dependencies(&node)? {
            if !visited.contains(&edge.depends_on_id) {
                stack.push(edge.depends_on_id);
            }
        }
    }

    Ok(false)
}
