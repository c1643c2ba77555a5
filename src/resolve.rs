//! Derive a task's status from its direct dependencies.

use crate::engine::EngineError;
use crate::graph::GraphStore;
use crate::types::{Status, StatusChange, Task};

/// The status a task with these prerequisite statuses should have.
///
/// Precedence: any `blocked` wins, then all `completed` gives `in_progress`,
/// anything else is `pending`. `None` when there are no dependencies: such a
/// task keeps whatever status it was last given.
pub fn derive_status(prerequisites: &[Status]) -> Option<Status> {
    if prerequisites.is_empty() {
        return None;
    }

    let mut all_completed = true;
    for status in prerequisites {
        match status {
            Status::Blocked => return Some(Status::Blocked),
            Status::Completed => {}
            Status::Pending | Status::InProgress => all_completed = false,
        }
    }

    Some(if all_completed {
        Status::InProgress
    } else {
        Status::Pending
    })
}

/// Recompute `task`'s status from the store and persist it.
///
/// Only this task is touched; cascading is the engine's job. Returns the
/// change that was written, if the status moved.
pub fn resolve_status<S: GraphStore>(store: &mut S, task: &Task) -> Result<Option<StatusChange>, EngineError> {
    let mut statuses = Vec::new();
    for edge in store.list_dependencies(&task.id)? {
        let prerequisite = store
            .get_task(&edge.depends_on_id)?
            .ok_or_else(|| EngineError::NotFound(edge.depends_on_id.clone()))?;
        statuses.push(prerequisite.status);
    }

    let Some(next) = derive_status(&statuses) else {
        return Ok(None);
    };
    if next == task.status {
        return Ok(None);
    }

    store.save_task_status(&task.id, next)?;
    log::debug!("Resolved {}: {} -> {}", task.id, task.status, next);

    Ok(Some(StatusChange {
        task_id: task.id.clone(),
        from: task.status,
        to: next,
    }))
}
