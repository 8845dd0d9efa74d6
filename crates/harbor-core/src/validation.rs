//! # Validation
//!
//! Input checks applied at the engine boundary before any store access.

use crate::error::ValidationError;
use crate::types::{Mutation, OperationKind};
use crate::{is_reserved_key, MAX_KEY_LENGTH, MAX_PAGE_LIMIT};

/// Validates a user-data key.
///
/// ## Rules
/// - Not empty
/// - At most [`MAX_KEY_LENGTH`] bytes
/// - Not under the reserved metadata prefix
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(ValidationError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LENGTH,
        });
    }

    if is_reserved_key(key) {
        return Err(ValidationError::ReservedKey(key.to_string()));
    }

    Ok(())
}

/// Validates the keys of a selective backup.
///
/// A selection names keys that may already exist in the store, so only
/// empty keys are rejected. Keys missing from the store are omitted later.
pub fn validate_selection<S: AsRef<str>>(keys: &[S]) -> Result<(), ValidationError> {
    if keys.iter().any(|k| k.as_ref().is_empty()) {
        return Err(ValidationError::EmptyKey);
    }
    Ok(())
}

/// Validates a local mutation: a valid key, and a value unless removing.
pub fn validate_mutation(mutation: &Mutation) -> Result<(), ValidationError> {
    validate_key(&mutation.key)?;

    if mutation.kind != OperationKind::Remove && mutation.value.is_none() {
        return Err(ValidationError::MissingValue {
            kind: mutation.kind.to_string(),
            key: mutation.key.clone(),
        });
    }
    Ok(())
}

pub fn validate_backup_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyBackupId);
    }
    Ok(())
}

/// Validates a page size for listing calls.
pub fn validate_limit(limit: usize) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::InvalidLimit {
            limit,
            max: MAX_PAGE_LIMIT,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("settings/theme").is_ok());
        assert!(validate_key("card:42").is_ok());

        assert_eq!(validate_key(""), Err(ValidationError::EmptyKey));
        assert!(matches!(
            validate_key("@harbor:backup_index"),
            Err(ValidationError::ReservedKey(_))
        ));
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_selection() {
        assert!(validate_selection(&["a", "b"]).is_ok());
        assert!(validate_selection::<&str>(&[]).is_ok());
        assert!(validate_selection(&["@harbor:user-note"]).is_ok());
        assert!(validate_selection(&[&"k".repeat(MAX_KEY_LENGTH + 1)]).is_ok());
        assert_eq!(validate_selection(&["a", ""]), Err(ValidationError::EmptyKey));
    }

    #[test]
    fn test_validate_mutation() {
        assert!(validate_mutation(&Mutation::add("a", "1")).is_ok());
        assert!(validate_mutation(&Mutation::remove("a")).is_ok());
        assert!(validate_mutation(&Mutation::remove("@harbor:x")).is_err());

        let broken = Mutation {
            kind: OperationKind::Update,
            key: "a".into(),
            value: None,
        };
        assert!(matches!(
            validate_mutation(&broken),
            Err(ValidationError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(MAX_PAGE_LIMIT).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(MAX_PAGE_LIMIT + 1).is_err());
    }

    #[test]
    fn test_validate_backup_id() {
        assert!(validate_backup_id("bk_20260101T000000000_1").is_ok());
        assert!(validate_backup_id("  ").is_err());
    }
}
