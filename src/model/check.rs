//! Violation collection for seed-record validation.
//!
//! Validation never stops at the first problem: every check pushes into a
//! [`Checker`], and the caller reports the full list with JSON-style paths
//! (`sections.home[2].ctaText`).

use std::fmt;

use serde::Serialize;

/// One validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Location in the dataset, e.g. `pages[1].metaTitle`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Accumulates [`Violation`]s.
#[derive(Debug, Default)]
pub struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Non-blank string.
    pub fn required(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(path, "is required");
        }
    }

    /// At most `max` characters (Unicode scalar values, not bytes).
    pub fn max_len(&mut self, path: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            let len = value.chars().count();
            if len > max {
                self.push(path, format!("is {len} characters, at most {max} allowed"));
            }
        }
    }

    /// Required and at most `max` characters.
    pub fn required_max(&mut self, path: &str, value: &str, max: usize) {
        self.required(path, value);
        self.max_len(path, Some(value), max);
    }

    /// URL-safe identifier: lowercase ASCII letters, digits and `-`.
    pub fn identifier(&mut self, path: &str, value: &str) {
        if value.is_empty() {
            self.push(path, "is required");
        } else if !is_identifier(value) {
            self.push(
                path,
                format!("`{value}` may only contain lowercase letters, digits and `-`"),
            );
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn finish(self) -> Vec<Violation> {
        self.violations
    }
}

fn is_identifier(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
