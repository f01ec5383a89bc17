//! Rule-table validator.
//!
//! A table maps each field to an ordered list of rules. Every field is
//! evaluated and every violation is collected; nothing short-circuits.
//! Uniqueness needs the store, so it is checked by the user service once the
//! table passes.

use std::borrow::Cow;

use validator::{ValidateEmail, ValidationError, ValidationErrors};

/// A single declarative check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The field must be present.
    Required,
    /// The field may be absent. Absent values never reach the format rules,
    /// so this only marks the field as optional in the table.
    Nullable,
    /// The value must be a well-formed e-mail address.
    Email,
    /// The value must equal the named field's value.
    Same(&'static str),
    /// The field must be present whenever the named field is.
    RequiredWith(&'static str),
}

/// Read access to normalized input values by field name.
///
/// `None` means absent: missing, `null` or empty.
pub trait FieldSource {
    fn value(&self, field: &str) -> Option<&str>;
}

/// Ordered mapping from field name to its rules.
#[derive(Debug, Default)]
pub struct RuleTable {
    fields: Vec<(&'static str, Vec<Rule>)>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rules: &[Rule]) -> Self {
        self.fields.push((name, rules.to_vec()));
        self
    }

    /// Evaluate every rule of every field against `input`.
    pub fn evaluate<S: FieldSource + ?Sized>(&self, input: &S) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut failed = false;

        for (field, rules) in &self.fields {
            let value = input.value(field);
            for rule in rules {
                if let Some(error) = check(*rule, field, value, input) {
                    errors.add(*field, error);
                    failed = true;
                }
            }
        }

        if failed {
            Err(errors)
        } else {
            Ok(())
        }
    }
}

fn check<S: FieldSource + ?Sized>(
    rule: Rule,
    field: &str,
    value: Option<&str>,
    input: &S,
) -> Option<ValidationError> {
    match (rule, value) {
        (Rule::Required, None) => Some(violation(
            "required",
            format!("The {} field is required.", attribute(field)),
        )),
        (Rule::RequiredWith(other), None) if input.value(other).is_some() => Some(violation(
            "required_with",
            format!(
                "The {} field is required when {} is present.",
                attribute(field),
                attribute(other)
            ),
        )),
        (Rule::Email, Some(email)) if !email.validate_email() => Some(violation(
            "email",
            format!("The {} field must be a valid email address.", attribute(field)),
        )),
        (Rule::Same(other), Some(v)) if input.value(other) != Some(v) => Some(violation(
            "same",
            format!("The {} field must match {}.", attribute(field), attribute(other)),
        )),
        _ => None,
    }
}

fn violation(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message));
    error
}

/// Human-readable attribute name: `confirm_password` -> `confirm password`.
pub(super) fn attribute(field: &str) -> String {
    field.replace('_', " ")
}
