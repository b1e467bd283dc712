//! Invariant checks applied before records are written.

use std::fmt;

use crate::models::NewEquipment;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// NR12-active equipment without a type.
    MissingType,
    /// NR12-active equipment without any cadence.
    MissingCadence,
    /// Operator code does not match `OPnnnn`.
    InvalidOperatorCode(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingType => {
                write!(f, "NR12-active equipment must have a type")
            }
            ValidationError::MissingCadence => {
                write!(f, "NR12-active equipment must have at least one cadence")
            }
            ValidationError::InvalidOperatorCode(code) => {
                write!(f, "Invalid operator code: {}", code)
            }
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for display names.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum allowed length for observation text.
pub const MAX_OBSERVATION_LENGTH: usize = 2000;

/// Check the NR12 enrolment invariant of new or updated equipment.
pub fn validate_equipment(equipment: &NewEquipment) -> Result<(), ValidationError> {
    validate_name("name", &equipment.name)?;
    if equipment.nr12_active {
        if equipment.type_id.is_none() {
            return Err(ValidationError::MissingType);
        }
        if equipment.cadences.is_empty() {
            return Err(ValidationError::MissingCadence);
        }
    }
    Ok(())
}

/// Whether `code` has the operator-code shape: `OP` followed by at least four digits.
pub fn is_operator_code(code: &str) -> bool {
    let upper = code.trim().to_ascii_uppercase();
    match upper.strip_prefix("OP") {
        Some(digits) => digits.len() >= 4 && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Validate an operator code.
pub fn validate_operator_code(code: &str) -> Result<(), ValidationError> {
    if is_operator_code(code) {
        Ok(())
    } else {
        Err(ValidationError::InvalidOperatorCode(code.to_string()))
    }
}

/// Validate a display name.
pub fn validate_name(field: &str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
            actual: value.chars().count(),
        });
    }
    Ok(())
}

/// Validate observation text attached to an answer.
pub fn validate_observation(observation: &str) -> Result<(), ValidationError> {
    let len = observation.chars().count();
    if len > MAX_OBSERVATION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "observation".to_string(),
            max: MAX_OBSERVATION_LENGTH,
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cadence;

    #[test]
    fn test_operator_code_shape() {
        assert!(is_operator_code("OP0001"));
        assert!(is_operator_code("op12345"));
        assert!(is_operator_code("  OP0042 "));
        assert!(!is_operator_code("OP001"));
        assert!(!is_operator_code("OPABCD"));
        assert!(!is_operator_code("0001"));
    }

    #[test]
    fn test_nr12_equipment_needs_type_and_cadence() {
        let mut eq = NewEquipment::new("Escavadeira 01");
        eq.nr12_active = true;
        assert_eq!(validate_equipment(&eq), Err(ValidationError::MissingType));

        eq.type_id = Some(1);
        assert_eq!(validate_equipment(&eq), Err(ValidationError::MissingCadence));

        eq.cadences = vec![Cadence::Daily];
        assert!(validate_equipment(&eq).is_ok());
    }

    #[test]
    fn test_inactive_equipment_needs_only_name() {
        assert!(validate_equipment(&NewEquipment::new("Gerador")).is_ok());
        assert_eq!(
            validate_equipment(&NewEquipment::new("  ")),
            Err(ValidationError::Empty("name".to_string()))
        );
    }

    #[test]
    fn test_observation_length() {
        assert!(validate_observation("vazamento").is_ok());
        let long = "x".repeat(MAX_OBSERVATION_LENGTH + 1);
        assert!(matches!(
            validate_observation(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
