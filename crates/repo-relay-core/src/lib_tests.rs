//! Tests for the repo-relay-core library module.

use super::*;

#[test]
fn test_repository_name_is_lower_cased() {
    let name = RepositoryName::new("Org/Proj");
    assert_eq!(name.as_str(), "org/proj");
    assert_eq!(name, RepositoryName::new("org/proj"));
}

#[test]
fn test_repository_name_trims_whitespace() {
    let name = RepositoryName::new("  Org/Proj \n");
    assert_eq!(name.as_str(), "org/proj");
}

#[test]
fn test_repository_name_deserializes_lower_cased() {
    let name: RepositoryName = serde_json::from_str("\"Alice/Tools\"").unwrap();
    assert_eq!(name.as_str(), "alice/tools");
}

#[test]
fn test_conversation_id_validation() {
    assert!(ConversationId::new("0000abcd").is_ok());

    let empty = ConversationId::new("");
    assert!(matches!(empty, Err(ValidationError::Required { .. })));

    let spaced = ConversationId::new("conv A");
    assert!(matches!(
        spaced,
        Err(ValidationError::InvalidCharacters { .. })
    ));
}

#[test]
fn test_conversation_id_rejects_invalid_json() {
    let result: Result<ConversationId, _> = serde_json::from_str("\"\"");
    assert!(result.is_err());
}

#[test]
fn test_chat_username_validation() {
    assert!(ChatUsername::new("bob_kb").is_ok());
    assert!(matches!(
        ChatUsername::new("  "),
        Err(ValidationError::Required { .. })
    ));
    assert!(matches!(
        ChatUsername::new("bob,eve"),
        Err(ValidationError::InvalidCharacters { .. })
    ));
}

#[test]
fn test_user_id_parsing() {
    let id: UserId = "42".parse().unwrap();
    assert_eq!(id.as_i64(), 42);
    assert_eq!("-1".parse::<UserId>().unwrap().as_i64(), -1);
    assert!("alice".parse::<UserId>().is_err());
}
