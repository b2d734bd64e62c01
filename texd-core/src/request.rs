//! Compile request payload and its validation.
//!
//! The wire shape is `{"latex": string, "filename"?: string}`. Validation
//! happens here, before any file-system or process work.

use std::fmt;

use serde_json::Value;

use crate::error::CoreError;

/// Base name used when the caller supplies no `filename`.
pub const DEFAULT_BASE_NAME: &str = "document";

/// Upper bound on the sanitized base name, in characters.
pub const MAX_BASE_NAME_LEN: usize = 128;

/// JSON field carrying the markup source.
pub const SOURCE_FIELD: &str = "latex";

/// JSON field carrying the optional output base name.
pub const FILENAME_FIELD: &str = "filename";

/// An output base name restricted to `[A-Za-z0-9_-]`.
///
/// Constructed only through [`BaseName::sanitize`], so the inner string is
/// always safe to join onto a directory path or embed in a header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseName(String);

impl BaseName {
    /// Replaces every character outside `[A-Za-z0-9_-]` with `_`, one
    /// underscore per Unicode scalar value.
    ///
    /// An empty input yields [`DEFAULT_BASE_NAME`]. The result is truncated
    /// to [`MAX_BASE_NAME_LEN`] characters.
    #[must_use]
    pub fn sanitize(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        let cleaned = raw
            .chars()
            .map(|c| if is_safe_char(c) { c } else { '_' })
            .take(MAX_BASE_NAME_LEN)
            .collect();
        Self(cleaned)
    }

    /// Returns the sanitized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins the base name with an extension, e.g. `report.pdf`.
    #[must_use]
    pub fn with_extension(&self, extension: &str) -> String {
        format!("{}.{extension}", self.0)
    }
}

impl Default for BaseName {
    fn default() -> Self {
        Self(DEFAULT_BASE_NAME.to_owned())
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// A validated compile request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CompileRequest {
    /// Markup source, guaranteed non-empty.
    pub source: String,
    /// Sanitized output base name.
    pub base_name: BaseName,
}

impl CompileRequest {
    /// Builds a request from already-extracted parts.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingField`] if `source` is empty.
    pub fn new(source: impl Into<String>, filename: Option<&str>) -> Result<Self, CoreError> {
        let source = source.into();
        if source.is_empty() {
            return Err(CoreError::MissingField { field: SOURCE_FIELD });
        }
        Ok(Self {
            source,
            base_name: filename.map(BaseName::sanitize).unwrap_or_default(),
        })
    }

    /// Validates a decoded JSON payload.
    ///
    /// # Errors
    /// - [`CoreError::InvalidBody`] if the payload is not an object.
    /// - [`CoreError::MissingField`] if `latex` is absent, `null`, or `""`.
    /// - [`CoreError::InvalidField`] if `latex` is not a string, or
    ///   `filename` is present and neither a string nor `null`.
    pub fn from_json(payload: &Value) -> Result<Self, CoreError> {
        let Some(object) = payload.as_object() else {
            return Err(CoreError::InvalidBody {
                reason: "expected a JSON object".to_owned(),
            });
        };

        let source = match object.get(SOURCE_FIELD) {
            None | Some(Value::Null) => {
                return Err(CoreError::MissingField { field: SOURCE_FIELD })
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(CoreError::InvalidField {
                    field: SOURCE_FIELD,
                    reason: "must be a non-empty string".to_owned(),
                })
            }
        };

        let filename = match object.get(FILENAME_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                return Err(CoreError::InvalidField {
                    field: FILENAME_FIELD,
                    reason: "must be a string".to_owned(),
                })
            }
        };

        Self::new(source.as_str(), filename)
    }
}
