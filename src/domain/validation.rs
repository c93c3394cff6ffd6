use std::fmt;

use serde::Serialize;

pub const MAX_RATING: i64 = 5;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

/// Collects field errors so a request reports every problem at once.
#[derive(Debug, Default)]
pub(crate) struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub(crate) fn reject(&mut self, field: &'static str, error: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            error: error.into(),
        });
    }

    /// Trimmed `value`, recording an error when it is blank.
    pub(crate) fn required(&mut self, field: &'static str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.reject(field, "is required");
        }
        trimmed.to_string()
    }

    pub(crate) fn rating(&mut self, value: i64) -> u8 {
        match u8::try_from(value) {
            Ok(rating) if value <= MAX_RATING => rating,
            _ => {
                self.reject("rating", format!("must be between 0 and {MAX_RATING}"));
                0
            }
        }
    }

    pub(crate) fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// `None` for blank text, the trimmed text otherwise.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
