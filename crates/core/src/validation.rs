/// A request payload failed a required-field or range check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be {constraint}")]
    OutOfRange {
        field: &'static str,
        constraint: &'static str,
    },
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing { field });
    }
    Ok(())
}
