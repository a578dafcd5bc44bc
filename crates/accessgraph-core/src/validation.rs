//! Input validation shared by every backend and the engine.

use crate::error::{GraphError, GraphResult};

pub const MAX_IDENTIFIER_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 256;

/// Identifiers are slugs: 1..=128 chars of `[A-Za-z0-9_.:-]`.
pub fn validate_identifier(label: &str, identifier: &str) -> GraphResult<()> {
    if identifier.is_empty() {
        return Err(GraphError::invalid_input(format!(
            "{label} identifier must not be empty"
        )));
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(GraphError::invalid_input(format!(
            "{label} identifier exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if let Some(c) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
    {
        return Err(GraphError::invalid_input(format!(
            "{label} identifier contains invalid character {c:?}"
        )));
    }
    Ok(())
}

pub fn validate_name(label: &str, name: &str) -> GraphResult<()> {
    if name.trim().is_empty() {
        return Err(GraphError::invalid_input(format!(
            "{label} name must not be empty"
        )));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GraphError::invalid_input(format!(
            "{label} name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_slugs() {
        for ok in ["docs", "team-a", "billing.invoices", "svc:reader", "A_1"] {
            validate_identifier("resource", ok).unwrap();
        }
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(validate_identifier("role", "").is_err());
        assert!(validate_identifier("role", "has space").is_err());
        assert!(validate_identifier("role", "slash/no").is_err());
        assert!(validate_identifier("role", &"x".repeat(129)).is_err());
    }

    #[test]
    fn names_must_not_be_blank() {
        assert!(validate_name("group", "   ").is_err());
        validate_name("group", "Platform Team").unwrap();
    }
}
