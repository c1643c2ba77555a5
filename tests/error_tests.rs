//! Integration tests for error handling.
//!
//! Tests that errors are properly returned for invalid operations and that
//! a failed operation leaves the store as it was.

mod common;

use common::TestEnv;
use taskdag::{EngineError, SqliteStore, Status, ValidationError};
use tempfile::TempDir;

const MISSING: &str = "td-0000000000";

// =============================================================================
// Task Not Found Tests
// =============================================================================

#[test]
fn test_get_nonexistent_task_returns_none() {
    let env = TestEnv::new();

    let result = env.engine.get_task(MISSING).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_set_status_nonexistent_task_fails() {
    let mut env = TestEnv::new();

    let result = env.engine.set_status(MISSING, Status::Completed);
    assert!(matches!(result, Err(EngineError::NotFound(ref id)) if id == MISSING));
}

#[test]
fn test_resolve_nonexistent_task_fails() {
    let mut env = TestEnv::new();

    let result = env.engine.resolve(MISSING);
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[test]
fn test_dependency_lookups_on_nonexistent_task_fail() {
    let env = TestEnv::new();

    assert!(matches!(env.engine.dependencies_of(MISSING), Err(EngineError::NotFound(_))));
    assert!(matches!(env.engine.dependents_of(MISSING), Err(EngineError::NotFound(_))));
}

#[test]
fn test_add_dependency_from_nonexistent_fails() {
    let mut env = TestEnv::new();

    let task = env.create_task("Real task");

    let result = env.engine.add_dependency(MISSING, &task.id);
    assert!(matches!(result, Err(EngineError::NotFound(ref id)) if id == MISSING));
}

#[test]
fn test_add_dependency_to_nonexistent_fails() {
    let mut env = TestEnv::new();

    let task = env.create_task("Real task");

    let result = env.engine.add_dependency(&task.id, MISSING);
    assert!(matches!(result, Err(EngineError::NotFound(ref id)) if id == MISSING));
    assert_eq!(env.edge_count(), 0);
}

#[test]
fn test_remove_dependency_from_nonexistent_fails() {
    let mut env = TestEnv::new();

    let task = env.create_task("Real task");

    let result = env.engine.remove_dependency(MISSING, &task.id);
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

// =============================================================================
// Argument Tests
// =============================================================================

#[test]
fn test_add_dependency_requires_prerequisite_id() {
    let mut env = TestEnv::new();

    let task = env.create_task("Task");

    for blank in ["", "   ", "\t"] {
        let result = env.engine.add_dependency(&task.id, blank);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }
    assert_eq!(env.edge_count(), 0);
}

#[test]
fn test_missing_dependent_reported_before_blank_prerequisite() {
    let mut env = TestEnv::new();

    let result = env.engine.add_dependency(MISSING, "");
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[test]
fn test_self_dependency_reported_before_existence_check() {
    let mut env = TestEnv::new();

    let task = env.create_task("Task");

    let result = env.engine.add_dependency(&task.id, &task.id);
    assert!(matches!(result, Err(EngineError::SelfDependency)));
}

// =============================================================================
// Status Name Tests
// =============================================================================

#[test]
fn test_invalid_status_name_leaves_task_unchanged() {
    let mut env = TestEnv::new();

    let task = env.create_task("Task");
    let dependent = env.create_task("Dependent");
    env.depend(&dependent, &task);

    for name in ["archived", "done", "PENDING", ""] {
        let result = env.engine.set_status_named(&task.id, name);
        assert!(matches!(result, Err(EngineError::InvalidStatus(_))), "accepted {:?}", name);
    }

    env.assert_status(&task, Status::Pending);
    env.assert_status(&dependent, Status::Pending);
}

#[test]
fn test_unknown_task_wins_over_unknown_status() {
    let mut env = TestEnv::new();

    let result = env.engine.set_status_named(MISSING, "archived");
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[test]
fn test_status_names_parse() {
    let mut env = TestEnv::new();

    let task = env.create_task("Task");
    for status in Status::ALL {
        env.engine.set_status_named(&task.id, status.as_str()).unwrap();
        env.assert_status(&task, status);
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_empty_title_rejected() {
    let mut env = TestEnv::new();

    let result = env.engine.create_task("", None, Status::Pending);
    assert!(matches!(result, Err(EngineError::Validation(ValidationError::EmptyTitle))));
    assert_eq!(env.total_count(), 0);
}

#[test]
fn test_title_too_long_rejected() {
    let mut env = TestEnv::new();

    let result = env.engine.create_task(&"x".repeat(501), None, Status::Pending);
    assert!(matches!(result, Err(EngineError::Validation(ValidationError::TitleTooLong))));
}

#[test]
fn test_control_characters_rejected() {
    let mut env = TestEnv::new();

    let result = env.engine.create_task("line\nbreak", None, Status::Pending);
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::InvalidCharacters))
    ));
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_open_uninitialized_store_fails() {
    let temp_dir = TempDir::new().unwrap();

    let result = SqliteStore::open(temp_dir.path());
    assert!(result.is_err());
}

#[test]
fn test_error_messages_are_readable() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task("B");
    env.depend(&a, &b);

    let err = env.engine.add_dependency(&b.id, &a.id).unwrap_err();
    assert_eq!(err.kind(), "cycle_detected");
    assert!(err.to_string().contains("cycle"));

    let err = env.engine.resolve(MISSING).unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(err.to_string(), format!("task not found: {}", MISSING));
}
