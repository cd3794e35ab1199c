//! Parameter validation rules and containment slot specifications.
//!
//! A [`ParamRule`] is the fixed rule vocabulary attached to one parameter
//! name: required/optional, a default (fixed or factory-computed), an
//! optional type tag, and an optional nested-object class constraint.
//! A [`SlotSpec`] declares one contained-object slot. Both are pure data;
//! the actual checking lives behind the `Validator` seam in
//! `ensemble-core`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::FACTORY_DEFAULT_PLACEHOLDER;
use crate::types::ClassName;

/// Coarse value shape expected by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// A boolean value.
    Bool,
    /// An integer value.
    Integer,
    /// Any numeric value.
    Float,
    /// A string value.
    String,
    /// An ordered list of values.
    List,
    /// A string-keyed map of values.
    Map,
}

impl TypeTag {
    /// Checks whether a scalar JSON value matches this tag.
    #[must_use]
    pub fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
        }
    }
}

/// Default value for an optional parameter.
///
/// Computed defaults are an explicit factory variant rather than
/// arbitrary embedded code; the factory runs once per construction.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed literal default.
    Fixed(serde_json::Value),
    /// A default computed at construction time.
    Factory(Arc<dyn Fn() -> serde_json::Value + Send + Sync>),
}

impl DefaultValue {
    /// Produces the concrete default value.
    #[must_use]
    pub fn produce(&self) -> serde_json::Value {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }

    /// Renders the default for reflection dumps. Factory defaults render
    /// as a best-effort placeholder, not guaranteed parseable.
    #[must_use]
    pub fn render(&self) -> serde_json::Value {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Factory(_) => serde_json::Value::String(FACTORY_DEFAULT_PLACEHOLDER.into()),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Factory(a), Self::Factory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Validation rule attached to one parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRule {
    /// Whether the parameter must be supplied (or defaulted).
    pub required: bool,
    /// Default applied when the parameter is absent. Implies optional.
    pub default: Option<DefaultValue>,
    /// Expected scalar shape, if constrained.
    pub type_tag: Option<TypeTag>,
    /// The supplied value must be an instance of this class (or a
    /// subclass of it).
    pub isa: Option<ClassName>,
    /// Human-readable description for documentation dumps.
    pub description: Option<String>,
}

impl ParamRule {
    /// A rule for a parameter that must be supplied.
    #[must_use]
    pub const fn required() -> Self {
        Self {
            required: true,
            default: None,
            type_tag: None,
            isa: None,
            description: None,
        }
    }

    /// A rule for a parameter that may be omitted.
    #[must_use]
    pub const fn optional() -> Self {
        Self {
            required: false,
            default: None,
            type_tag: None,
            isa: None,
            description: None,
        }
    }

    /// Constrains the parameter to a scalar shape.
    #[must_use]
    pub const fn of_type(mut self, tag: TypeTag) -> Self {
        self.type_tag = Some(tag);
        self
    }

    /// Requires the value to be an instance of `class` or a subclass.
    #[must_use]
    pub fn isa(mut self, class: ClassName) -> Self {
        self.isa = Some(class);
        self
    }

    /// Attaches a fixed default. A defaulted parameter is optional.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(DefaultValue::Fixed(value));
        self.required = false;
        self
    }

    /// Attaches a factory-computed default. A defaulted parameter is
    /// optional.
    #[must_use]
    pub fn with_default_factory(
        mut self,
        factory: impl Fn() -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self.required = false;
        self
    }

    /// Attaches a description used in reflection dumps.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Renders the rule as JSON for reflection dumps.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        let _ = out.insert("required".into(), serde_json::Value::Bool(self.required));
        if let Some(default) = &self.default {
            let _ = out.insert("default".into(), default.render());
        }
        if let Some(tag) = self.type_tag {
            let _ = out.insert("type".into(), serde_json::Value::String(tag.to_string()));
        }
        if let Some(isa) = &self.isa {
            let _ = out.insert("isa".into(), serde_json::Value::String(isa.to_string()));
        }
        if let Some(description) = &self.description {
            let _ = out.insert(
                "description".into(),
                serde_json::Value::String(description.clone()),
            );
        }
        serde_json::Value::Object(out)
    }
}

/// Declaration of one contained-object slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    /// Class constructed into this slot (overridable per instantiation
    /// via the `"<slot>_class"` argument).
    pub target: ClassName,
    /// Whether construction is deferred until explicitly requested.
    pub delayed: bool,
    /// Human-readable description for documentation dumps.
    pub description: Option<String>,
}

impl SlotSpec {
    /// An eagerly constructed slot targeting `target`.
    #[must_use]
    pub const fn eager(target: ClassName) -> Self {
        Self {
            target,
            delayed: false,
            description: None,
        }
    }

    /// A delayed slot targeting `target`.
    #[must_use]
    pub const fn delayed(target: ClassName) -> Self {
        Self {
            target,
            delayed: true,
            description: None,
        }
    }

    /// Attaches a description used in reflection dumps.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One declaration applied to a class's own spec map.
///
/// `Set` replaces (never merges) the map; `Clear` resets it to empty,
/// which is distinct from the class never having declared at all.
#[derive(Debug, Clone)]
pub enum Declaration<T> {
    /// Replace the class's own spec map with this one.
    Set(BTreeMap<String, T>),
    /// Reset the class's own spec map to empty.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_match_expected_shapes() {
        assert!(TypeTag::Bool.matches(&serde_json::json!(true)));
        assert!(TypeTag::Integer.matches(&serde_json::json!(7)));
        assert!(!TypeTag::Integer.matches(&serde_json::json!(7.5)));
        assert!(TypeTag::Float.matches(&serde_json::json!(7.5)));
        assert!(TypeTag::Float.matches(&serde_json::json!(7)));
        assert!(TypeTag::String.matches(&serde_json::json!("s")));
        assert!(TypeTag::List.matches(&serde_json::json!([1, 2])));
        assert!(TypeTag::Map.matches(&serde_json::json!({"k": 1})));
        assert!(!TypeTag::String.matches(&serde_json::json!(1)));
    }

    #[test]
    fn default_implies_optional() {
        let rule = ParamRule::required().with_default(serde_json::json!("x"));
        assert!(!rule.required);
        assert_eq!(rule.default.expect("default").produce(), serde_json::json!("x"));
    }

    #[test]
    fn factory_default_produces_fresh_values() {
        let rule = ParamRule::optional().with_default_factory(|| serde_json::json!([1, 2, 3]));
        let default = rule.default.expect("default");
        assert_eq!(default.produce(), serde_json::json!([1, 2, 3]));
        assert_eq!(default.render(), serde_json::json!("<factory>"));
    }

    #[test]
    fn rule_json_includes_declared_fields() {
        let class = ClassName::new("Engine").expect("valid");
        let rule = ParamRule::required()
            .of_type(TypeTag::String)
            .isa(class)
            .describe("the engine");
        let json = rule.to_json();
        assert_eq!(json["required"], serde_json::json!(true));
        assert_eq!(json["type"], serde_json::json!("string"));
        assert_eq!(json["isa"], serde_json::json!("Engine"));
        assert_eq!(json["description"], serde_json::json!("the engine"));
    }

    #[test]
    fn fixed_defaults_compare_by_value() {
        let a = ParamRule::optional().with_default(serde_json::json!(1));
        let b = ParamRule::optional().with_default(serde_json::json!(1));
        assert_eq!(a, b);
    }

    #[test]
    fn factory_defaults_compare_by_identity() {
        let a = ParamRule::optional().with_default_factory(|| serde_json::json!(1));
        let b = ParamRule::optional().with_default_factory(|| serde_json::json!(1));
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn slot_spec_constructors_set_delayed_flag() {
        let target = ClassName::new("Wheel").expect("valid");
        assert!(!SlotSpec::eager(target.clone()).delayed);
        assert!(SlotSpec::delayed(target).delayed);
    }
}
