use crate::error::IdentifierError;

/// Accept `^[A-Za-z_][A-Za-z0-9_]*$`, the only names interpolated into SQL text.
pub fn validate_identifier(identifier: &str) -> Result<&str, IdentifierError> {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return Err(IdentifierError {
            identifier: identifier.to_string(),
            reason: "must not be empty",
        });
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(IdentifierError {
            identifier: identifier.to_string(),
            reason: "must start with a letter or underscore",
        });
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IdentifierError {
            identifier: identifier.to_string(),
            reason: "may only contain letters, digits and underscores",
        });
    }

    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::validate_identifier;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(validate_identifier("JusticeDB").unwrap(), "JusticeDB");
        assert!(validate_identifier("_tmp_1").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("db; DROP TABLE x").is_err());
        assert!(validate_identifier("dbo.Cases").is_err());
    }
}
