//! Field checks that report every problem at once
//!
//! A [`Validator`] is a chain of checks over named fields. Failed checks
//! become errors, [`Validator::warn_if`] adds warnings, and
//! [`Validator::validate`] hands back the collected [`ValidationResult`].
//!
//! ```rust
//! use meteo_core::validation::Validator;
//!
//! let result = Validator::new()
//!     .present("title", Some("Weather Station"))
//!     .range("android.api", 33, 21, 35)
//!     .validate();
//!
//! assert!(result.is_valid());
//! ```

use crate::error::{Error, ErrorCode, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One failed check (or warning) on a named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// Machine-readable kind, e.g. `RANGE`
    pub code: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            expected: None,
            actual: None,
        }
    }

    #[must_use]
    pub fn expected(self, expected: impl Into<String>) -> Self {
        Self {
            expected: Some(expected.into()),
            ..self
        }
    }

    #[must_use]
    pub fn actual(self, actual: impl Into<String>) -> Self {
        Self {
            actual: Some(actual.into()),
            ..self
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors and warnings gathered by a [`Validator`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// No errors; warnings do not count
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationError] {
        &self.warnings
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationError) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        let ValidationResult { errors, warnings } = other;
        self.errors.extend(errors);
        self.warnings.extend(warnings);
    }

    /// `Ok` when valid, otherwise one [`ErrorCode::ValidationError`] naming
    /// every failed field.
    pub fn to_result(self) -> Result<()> {
        if self.is_valid() {
            return Ok(());
        }
        let summary = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::new(ErrorCode::ValidationError, format!("Validation failed: {}", summary)))
    }
}

/// Chainable field checks
#[derive(Default)]
pub struct Validator {
    result: ValidationResult,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(mut self, error: ValidationError) -> Self {
        self.result.add_error(error);
        self
    }

    /// Value must be given and not blank.
    #[must_use]
    pub fn present(self, field: &str, value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => self,
            Some(_) => self.fail(
                ValidationError::new(field, "REQUIRED", "Must not be blank")
                    .expected("non-empty value")
                    .actual("blank"),
            ),
            None => self.fail(
                ValidationError::new(field, "REQUIRED", "Field is required").expected("non-empty value"),
            ),
        }
    }

    /// At most `max` characters.
    #[must_use]
    pub fn max_length(self, field: &str, value: &str, max: usize) -> Self {
        let len = value.chars().count();
        if len <= max {
            return self;
        }
        self.fail(
            ValidationError::new(field, "MAX_LENGTH", format!("Longer than {} characters", max))
                .expected(format!("at most {} characters", max))
                .actual(format!("{} characters", len)),
        )
    }

    #[must_use]
    pub fn pattern(self, field: &str, value: &str, pattern: &Regex, description: &str) -> Self {
        if pattern.is_match(value) {
            return self;
        }
        self.fail(
            ValidationError::new(field, "PATTERN", format!("Must be {}", description))
                .expected(description)
                .actual(value),
        )
    }

    #[must_use]
    pub fn one_of(self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if allowed.contains(&value) {
            return self;
        }
        let choices = allowed.join(", ");
        self.fail(
            ValidationError::new(field, "ONE_OF", format!("Must be one of {}", choices))
                .expected(choices)
                .actual(value),
        )
    }

    /// Inclusive range check.
    #[must_use]
    pub fn range<T>(self, field: &str, value: T, min: T, max: T) -> Self
    where
        T: PartialOrd + fmt::Display,
    {
        if value >= min && value <= max {
            return self;
        }
        self.fail(
            ValidationError::new(field, "RANGE", format!("Out of range {}..={}", min, max))
                .expected(format!("{}..={}", min, max))
                .actual(value.to_string()),
        )
    }

    /// `check` returns the error message, or `None` when the field is fine.
    #[must_use]
    pub fn custom<F>(self, field: &str, check: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        match check() {
            Some(message) => self.fail(ValidationError::new(field, "CUSTOM", message)),
            None => self,
        }
    }

    #[must_use]
    pub fn warn_if(mut self, field: &str, condition: bool, message: &str) -> Self {
        if condition {
            self.result.add_warning(ValidationError::new(field, "WARNING", message));
        }
        self
    }

    pub fn validate(self) -> ValidationResult {
        self.result
    }
}
