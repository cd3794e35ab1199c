//! The pluggable single-parameter validation seam.
//!
//! The engine never interprets a [`ParamRule`] directly; it hands each
//! (rule, value) pair to the configured [`Validator`]. The built-in
//! [`StandardValidator`] implements the fixed rule vocabulary: required,
//! default filling, type tags, and nested-object class constraints.
//! Class constraints need an ancestry oracle, provided by the registry.

use std::collections::BTreeMap;

use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::rules::ParamRule;
use ensemble_common::types::ClassName;

use crate::registry::Registry;
use crate::value::{ArgMap, Value};

/// Ancestry capability needed by class-constraint checks.
pub trait ClassOracle {
    /// Whether `sub` is `ancestor` or inherits from it.
    fn is_subclass(&self, sub: &ClassName, ancestor: &ClassName) -> bool;
}

impl ClassOracle for Registry {
    fn is_subclass(&self, sub: &ClassName, ancestor: &ClassName) -> bool {
        self.is_a(sub, ancestor)
    }
}

/// Checks one parameter against its rule.
pub trait Validator: Send + Sync {
    /// Validates `value` (or its absence) against `rule`.
    ///
    /// Returns `Ok(Some(default))` when the parameter was absent and a
    /// default should be filled in, `Ok(None)` when the value passed
    /// as supplied.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming `class` and `param` when the
    /// rule is violated.
    fn validate(
        &self,
        class: &ClassName,
        param: &str,
        rule: &ParamRule,
        value: Option<&Value>,
        oracle: &dyn ClassOracle,
    ) -> Result<Option<Value>>;
}

/// Built-in validator for the fixed rule vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardValidator;

impl Validator for StandardValidator {
    fn validate(
        &self,
        class: &ClassName,
        param: &str,
        rule: &ParamRule,
        value: Option<&Value>,
        oracle: &dyn ClassOracle,
    ) -> Result<Option<Value>> {
        let Some(value) = value else {
            if let Some(default) = &rule.default {
                return Ok(Some(Value::Scalar(default.produce())));
            }
            if rule.required {
                return Err(violation(class, param, "missing required parameter"));
            }
            return Ok(None);
        };

        if let Some(tag) = rule.type_tag {
            match value.as_scalar() {
                Some(scalar) if tag.matches(scalar) => {}
                Some(scalar) => {
                    return Err(violation(
                        class,
                        param,
                        &format!("expected {tag}, got {scalar}"),
                    ));
                }
                None => {
                    return Err(violation(
                        class,
                        param,
                        &format!("expected {tag}, got an object reference"),
                    ));
                }
            }
        }

        if let Some(isa) = &rule.isa {
            match value.as_instance() {
                Some(instance) if oracle.is_subclass(instance.class(), isa) => {}
                Some(instance) => {
                    return Err(violation(
                        class,
                        param,
                        &format!(
                            "expected an instance of {isa}, got {}",
                            instance.class()
                        ),
                    ));
                }
                None => {
                    return Err(violation(
                        class,
                        param,
                        &format!("expected an instance of {isa}, got a scalar"),
                    ));
                }
            }
        }

        Ok(None)
    }
}

fn violation(class: &ClassName, param: &str, message: &str) -> EnsembleError {
    EnsembleError::Validation {
        class: class.to_string(),
        param: param.to_string(),
        message: message.to_string(),
    }
}

/// Validates a residual argument bag against a merged parameter spec:
/// rejects unknown parameters, then applies each rule, filling defaults.
///
/// # Errors
///
/// Returns the first `Validation` error encountered.
pub fn validate_args(
    validator: &dyn Validator,
    oracle: &dyn ClassOracle,
    class: &ClassName,
    spec: &BTreeMap<String, ParamRule>,
    mut args: ArgMap,
) -> Result<ArgMap> {
    for key in args.keys() {
        if !spec.contains_key(key) {
            return Err(violation(class, key, "unknown parameter"));
        }
    }
    for (name, rule) in spec {
        let filled = validator.validate(class, name, rule, args.get(name), oracle)?;
        if let Some(value) = filled {
            let _ = args.insert(name.clone(), value);
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_common::rules::TypeTag;

    struct NoInheritance;

    impl ClassOracle for NoInheritance {
        fn is_subclass(&self, sub: &ClassName, ancestor: &ClassName) -> bool {
            sub == ancestor
        }
    }

    fn class(name: &str) -> ClassName {
        ClassName::new(name).expect("valid class name")
    }

    fn check(rule: &ParamRule, value: Option<&Value>) -> Result<Option<Value>> {
        StandardValidator.validate(&class("Widget"), "p", rule, value, &NoInheritance)
    }

    #[test]
    fn missing_required_parameter_fails_with_names() {
        let err = check(&ParamRule::required(), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Widget"), "got: {msg}");
        assert!(msg.contains('p'), "got: {msg}");
    }

    #[test]
    fn missing_optional_parameter_passes() {
        assert!(check(&ParamRule::optional(), None).expect("ok").is_none());
    }

    #[test]
    fn absent_parameter_fills_default() {
        let rule = ParamRule::optional().with_default(serde_json::json!("fallback"));
        let filled = check(&rule, None).expect("ok").expect("default");
        assert_eq!(filled, Value::string("fallback"));
    }

    #[test]
    fn supplied_value_suppresses_default() {
        let rule = ParamRule::optional().with_default(serde_json::json!("fallback"));
        let supplied = Value::string("given");
        assert!(check(&rule, Some(&supplied)).expect("ok").is_none());
    }

    #[test]
    fn type_tag_mismatch_fails() {
        let rule = ParamRule::required().of_type(TypeTag::Integer);
        let err = check(&rule, Some(&Value::string("-"))).unwrap_err();
        assert!(err.to_string().contains("expected integer"), "got: {err}");
        assert!(
            check(&rule, Some(&Value::Scalar(serde_json::json!(3))))
                .expect("ok")
                .is_none()
        );
    }

    #[test]
    fn isa_rejects_scalars() {
        let rule = ParamRule::required().isa(class("Engine"));
        let err = check(&rule, Some(&Value::string("v8"))).unwrap_err();
        assert!(err.to_string().contains("Engine"), "got: {err}");
    }

    #[test]
    fn validate_args_rejects_unknown_parameter() {
        let mut spec = BTreeMap::new();
        let _ = spec.insert("known".to_string(), ParamRule::optional());
        let mut args = ArgMap::new();
        let _ = args.insert("mystery".into(), Value::string("x"));

        let err = validate_args(
            &StandardValidator,
            &NoInheritance,
            &class("Widget"),
            &spec,
            args,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mystery"), "got: {err}");
    }

    #[test]
    fn validate_args_fills_defaults_into_bag() {
        let mut spec = BTreeMap::new();
        let _ = spec.insert(
            "retries".to_string(),
            ParamRule::optional().with_default(serde_json::json!(3)),
        );
        let validated = validate_args(
            &StandardValidator,
            &NoInheritance,
            &class("Widget"),
            &spec,
            ArgMap::new(),
        )
        .expect("ok");
        assert_eq!(
            validated.get("retries"),
            Some(&Value::Scalar(serde_json::json!(3)))
        );
    }
}
