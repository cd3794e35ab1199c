//! Argument values flowing through composition.
//!
//! A constructor call supplies a flat bag of named arguments; each value
//! is either a scalar (JSON-shaped) or an already-constructed instance.
//! The third variant carries the reserved non-owning back-reference a
//! parent attaches when building a delayed object.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::instance::Instance;

/// A flat bag of named constructor arguments.
pub type ArgMap = BTreeMap<String, Value>;

/// One argument value.
#[derive(Clone)]
pub enum Value {
    /// A scalar (JSON-shaped) value.
    Scalar(serde_json::Value),
    /// An already-constructed composite instance.
    Instance(Arc<Instance>),
    /// A non-owning back-reference to the instance that initiated this
    /// construction. Only ever appears under the reserved `container` key.
    BackRef(Weak<Instance>),
}

impl Value {
    /// Convenience constructor for string scalars.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(serde_json::Value::String(value.into()))
    }

    /// Returns the scalar payload, if this is a scalar.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(serde_json::Value::as_str)
    }

    /// Returns the instance payload, if this is an instance.
    #[must_use]
    pub const fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Self::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<Arc<Instance>> for Value {
    fn from(instance: Arc<Instance>) -> Self {
        Self::Instance(instance)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "Scalar({value})"),
            Self::Instance(instance) => {
                write!(f, "Instance({} #{})", instance.class(), instance.id())
            }
            Self::BackRef(_) => f.write_str("BackRef(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::BackRef(a), Self::BackRef(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}
