//! Configuration validation utilities

use crate::ApplicationError;
use std::fmt::Display;

/// Configuration validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value is out of acceptable range
    #[error("Field '{field}' must be {range} (got {actual})")]
    OutOfRange {
        field: String,
        range: String,
        actual: String,
    },
    /// Custom validation failed
    #[error("Field '{field}': {message}")]
    Custom { field: String, message: String },
}

impl From<ValidationError> for ApplicationError {
    fn from(err: ValidationError) -> Self {
        ApplicationError::invalid(err.to_string())
    }
}

/// Validator that accumulates failed rules
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that a value lies within the inclusive range
    pub fn range<T>(&mut self, field_name: &str, value: T, min: Option<T>, max: Option<T>) -> &mut Self
    where
        T: PartialOrd + Copy + Display,
    {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);

        if below || above {
            let range = match (min, max) {
                (Some(min), Some(max)) => format!("between {min} and {max}"),
                (Some(min), None) => format!("at least {min}"),
                (None, Some(max)) => format!("at most {max}"),
                (None, None) => "in valid range".to_string(),
            };
            self.errors.push(ValidationError::OutOfRange {
                field: field_name.to_string(),
                range,
                actual: value.to_string(),
            });
        }
        self
    }

    /// Validate using a custom predicate
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.errors.push(ValidationError::Custom {
                field: field_name.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    /// First failure, if any
    pub fn result(self) -> ValidationResult {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let mut validator = ConfigValidator::new();
        validator.range("capacity", 5_usize, Some(1), Some(4));
        let err = validator.result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field 'capacity' must be between 1 and 4 (got 5)"
        );

        let mut validator = ConfigValidator::new();
        validator.range("capacity", 3_usize, Some(1), None);
        assert!(validator.result().is_ok());
    }

    #[test]
    fn test_first_failure_reported() {
        let mut validator = ConfigValidator::new();
        validator
            .custom("limit", &0_usize, |v| *v > 0, "must be positive")
            .range("capacity", 9_usize, None, Some(4));

        assert_eq!(
            validator.result(),
            Err(ValidationError::Custom {
                field: "limit".to_string(),
                message: "must be positive".to_string(),
            })
        );
    }

    #[test]
    fn test_converts_to_invalid() {
        let err: ApplicationError = ValidationError::Custom {
            field: "x".into(),
            message: "bad".into(),
        }
        .into();
        assert!(matches!(err, ApplicationError::Invalid { .. }));
    }
}
