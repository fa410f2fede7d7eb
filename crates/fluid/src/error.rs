/// Rejected solver or pipeline parameters.
///
/// Raised at construction time only. Nothing in this crate fails mid-step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        value: usize,
        min: usize,
    },
    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: usize,
        max: usize,
    },
    #[error("{field} expects {expected} values, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ConfigError {
    /// Name of the offending parameter.
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::Zero { field }
            | ConfigError::NonPositive { field, .. }
            | ConfigError::Negative { field, .. }
            | ConfigError::TooSmall { field, .. }
            | ConfigError::TooLarge { field, .. }
            | ConfigError::LengthMismatch { field, .. } => field,
        }
    }
}

pub(crate) fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let e = ConfigError::NonPositive {
            field: "cell_size",
            value: -1.0,
        };
        assert!(e.to_string().contains("cell_size"));
        assert_eq!(e.field(), "cell_size");
    }

    #[test]
    fn helpers_reject_nan() {
        assert!(positive("x", f32::NAN).is_err());
        assert!(non_negative("x", f32::NAN).is_err());
        assert!(non_negative("x", 0.0).is_ok());
        assert!(positive("x", 0.0).is_err());
    }
}
