//! Request validation.
//!
//! Handlers validate their JSON bodies before touching the database and
//! answer with `422` and a per-field message map, the shape the frontends
//! display next to form inputs:
//!
//! ```json
//! { "message": "The name field is required.", "errors": { "name": ["The name field is required."] } }
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

/// Field-level validation failures.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "validation failed: {}",
            self.first_message().unwrap_or("invalid input")
        )
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record `message` on `field` unless `ok`.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    /// The field must be present and not blank.
    pub fn require(&mut self, field: &str, value: &str) {
        self.check(
            !value.trim().is_empty(),
            field,
            format!("The {field} field is required."),
        );
    }

    /// At most `max` characters.
    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        self.check(
            value.chars().count() <= max,
            field,
            format!("The {field} field must not be greater than {max} characters."),
        );
    }

    /// Present, not blank, and at most `max` characters.
    pub fn require_max(&mut self, field: &str, value: &str, max: usize) {
        self.require(field, value);
        self.max_chars(field, value, max);
    }

    /// Vietnamese phone number: 9 to 11 digits, optional leading `+`.
    pub fn phone(&mut self, field: &str, value: &str) {
        let digits = value.strip_prefix('+').unwrap_or(value);
        let ok = (9..=11).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
        self.check(ok, field, format!("The {field} field must be a valid phone number."));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first message in field order.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.errors
            .values()
            .find_map(|messages| messages.first())
            .map(String::as_str)
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn finish(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Request bodies that can check themselves.
pub trait Validate {
    /// # Errors
    ///
    /// Returns every field that failed.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        assert!(ValidationErrors::new().finish().is_ok());
    }

    #[test]
    fn test_require_and_max_chars() {
        let mut errors = ValidationErrors::new();
        errors.require("name", "   ");
        errors.max_chars("note", "ábc", 3);
        errors.max_chars("address", "abcd", 3);

        let err = errors.finish().unwrap_err();
        assert_eq!(err.fields().len(), 2);
        assert_eq!(
            err.fields()["name"],
            vec!["The name field is required.".to_string()]
        );
        assert!(err.fields().contains_key("address"));
        assert!(!err.fields().contains_key("note"));
    }

    #[test]
    fn test_first_message_follows_field_order() {
        let mut errors = ValidationErrors::new();
        errors.add("phone", "bad phone");
        errors.add("email", "bad email");
        assert_eq!(errors.first_message(), Some("bad email"));
        assert_eq!(errors.to_string(), "validation failed: bad email");
    }

    #[test]
    fn test_phone() {
        let mut errors = ValidationErrors::new();
        errors.phone("a", "0901234567");
        errors.phone("b", "+84901234567");
        assert!(errors.is_empty());

        errors.phone("c", "09-0123");
        errors.phone("d", "12345678901234");
        assert_eq!(errors.fields().len(), 2);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut errors = ValidationErrors::new();
        errors.add("code", "invalid");
        let json = serde_json::to_value(&errors).unwrap_or_default();
        assert_eq!(json["errors"]["code"][0], "invalid");
    }
}
