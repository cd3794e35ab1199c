//! Domain primitive types used across the Ensemble workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validated identifier of a composable class.
///
/// Names consist of one or more `::`-separated segments; each segment
/// starts with an ASCII letter or underscore and continues with ASCII
/// alphanumerics or underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassName(String);

impl ClassName {
    /// Creates a class name, rejecting invalid or unsafe identifiers.
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error if the name is empty or contains
    /// characters outside the identifier grammar.
    pub fn new(name: impl Into<String>) -> crate::error::Result<Self> {
        let name = name.into();
        if !is_valid_class_name(&name) {
            return Err(crate::error::EnsembleError::Composition {
                class: name.clone(),
                message: format!("invalid class name: \"{name}\""),
            });
        }
        Ok(Self(name))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_valid_class_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.split("::").all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Unique identifier for a constructed instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates a random instance ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_class_name_is_accepted() {
        let name = ClassName::new("Widget").expect("valid");
        assert_eq!(name.as_str(), "Widget");
    }

    #[test]
    fn namespaced_class_name_is_accepted() {
        let name = ClassName::new("app::ui::Widget").expect("valid");
        assert_eq!(name.to_string(), "app::ui::Widget");
    }

    #[test]
    fn leading_underscore_is_accepted() {
        assert!(ClassName::new("_Hidden").is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(ClassName::new("").is_err());
    }

    #[test]
    fn leading_digit_is_rejected() {
        assert!(ClassName::new("9Lives").is_err());
    }

    #[test]
    fn empty_segment_is_rejected() {
        assert!(ClassName::new("app::::Widget").is_err());
        assert!(ClassName::new("::Widget").is_err());
    }

    #[test]
    fn shell_metacharacters_are_rejected() {
        assert!(ClassName::new("Widget; rm -rf /").is_err());
        assert!(ClassName::new("Widget\n").is_err());
    }

    #[test]
    fn instance_ids_are_unique() {
        assert_ne!(InstanceId::generate(), InstanceId::generate());
    }
}
