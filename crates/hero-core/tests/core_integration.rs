#![allow(clippy::unwrap_used, clippy::expect_used)]

use hero_core::*;

// ---------------------------------------------------------------------------
// 1. Display strings carry the subsystem prefix
// ---------------------------------------------------------------------------

#[test]
fn error_display_includes_prefix() {
    let err = HeroError::Validation("task name must not be empty".to_string());
    assert_eq!(err.to_string(), "Validation error: task name must not be empty");

    let err = HeroError::Persistence("disk full".to_string());
    assert_eq!(err.to_string(), "Persistence error: disk full");
}

// ---------------------------------------------------------------------------
// 2. Conversions from library errors
// ---------------------------------------------------------------------------

#[test]
fn io_and_json_errors_convert() {
    fn read_missing() -> HeroResult<String> {
        Ok(std::fs::read_to_string("/definitely/not/here.json")?)
    }
    assert!(matches!(read_missing(), Err(HeroError::Io(_))));

    fn parse_garbage() -> HeroResult<serde_json::Value> {
        Ok(serde_json::from_str("{not json")?)
    }
    let err = parse_garbage().unwrap_err();
    assert!(matches!(err, HeroError::Json(_)));
    assert!(err.is_client_error());
}

#[test]
fn server_side_errors_are_not_client_errors() {
    assert!(!HeroError::Persistence("x".into()).is_client_error());
    assert!(!HeroError::Config("x".into()).is_client_error());
    assert!(HeroError::NotFound("agent".into()).is_client_error());
}
