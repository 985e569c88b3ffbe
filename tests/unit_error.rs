use std::path::PathBuf;

use punchlist::error::{exit_codes, Error, JsonError};
use punchlist::selector::SelectorError;

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::NotFound(4);
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let selector = Error::from(SelectorError::Unterminated);
    assert_eq!(selector.exit_code(), exit_codes::USER_ERROR);

    let io = Error::io(
        "tasks/001-a.md",
        std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    );
    assert_eq!(io.exit_code(), exit_codes::OPERATION_FAILED);
    assert_eq!(io.kind(), "operation_failed");
    assert_eq!(missing.kind(), "user_error");
}

#[test]
fn json_error_names_the_id_or_path() {
    let err = Error::NotFound(12);
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert_eq!(json.kind, "user_error");
    assert!(json.error.contains("Task with ID 12 not found"));
    assert_eq!(json.details, Some(serde_json::json!({ "id": 12 })));

    let err = Error::ScopeNotFound(PathBuf::from("/work"));
    let json = JsonError::from(&err);
    assert_eq!(json.details, Some(serde_json::json!({ "path": "/work" })));
}

#[test]
fn io_errors_carry_the_path() {
    let err = Error::io(
        "tasks/007-x.md",
        std::io::Error::from(std::io::ErrorKind::NotFound),
    );
    assert!(err.to_string().starts_with("tasks/007-x.md: "));
}
