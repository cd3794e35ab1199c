//! Fluent API for declaring composable classes.

use std::collections::BTreeMap;

use ensemble_common::error::Result;
use ensemble_common::rules::{ParamRule, SlotSpec};
use ensemble_common::types::ClassName;
use ensemble_core::registry::ClassDescriptor;

use crate::composer::Composer;

#[derive(Debug, Clone)]
struct RawSlot {
    target: String,
    delayed: bool,
    description: Option<String>,
}

/// Builder for declaring a class before registration.
///
/// Names are collected as plain strings and validated when
/// [`ClassBuilder::register`] runs, so a chain never has to deal with
/// intermediate errors.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    parents: Vec<String>,
    params: BTreeMap<String, ParamRule>,
    slots: BTreeMap<String, RawSlot>,
}

impl ClassBuilder {
    /// Creates a new builder for the given class name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            params: BTreeMap::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Adds a parent class. Parents merge ancestors-first; on key
    /// collision a later parent wins and the class itself wins over all.
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Declares one constructor parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, rule: ParamRule) -> Self {
        let _ = self.params.insert(name.into(), rule);
        self
    }

    /// Declares an eagerly constructed contained-object slot.
    #[must_use]
    pub fn contains(mut self, slot: impl Into<String>, target: impl Into<String>) -> Self {
        let _ = self.slots.insert(
            slot.into(),
            RawSlot {
                target: target.into(),
                delayed: false,
                description: None,
            },
        );
        self
    }

    /// Declares a delayed contained-object slot, constructed only on
    /// explicit request.
    #[must_use]
    pub fn delayed(mut self, slot: impl Into<String>, target: impl Into<String>) -> Self {
        let _ = self.slots.insert(
            slot.into(),
            RawSlot {
                target: target.into(),
                delayed: true,
                description: None,
            },
        );
        self
    }

    /// Attaches a description to a previously declared slot, used in
    /// reflection dumps.
    #[must_use]
    pub fn describe_slot(mut self, slot: &str, description: impl Into<String>) -> Self {
        if let Some(raw) = self.slots.get_mut(slot) {
            raw.description = Some(description.into());
        }
        self
    }

    /// Validates all collected names and registers the class.
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error on an invalid class name or if the
    /// declaration would introduce an eager self-containment cycle or an
    /// inheritance cycle.
    pub fn register(self, composer: &mut Composer) -> Result<()> {
        let name = ClassName::new(self.name)?;
        let mut descriptor = ClassDescriptor::new(name);
        for parent in self.parents {
            descriptor.parents.push(ClassName::new(parent)?);
        }
        descriptor.params = self.params;
        for (slot, raw) in self.slots {
            let target = ClassName::new(raw.target)?;
            let mut spec = if raw.delayed {
                SlotSpec::delayed(target)
            } else {
                SlotSpec::eager(target)
            };
            if let Some(description) = raw.description {
                spec = spec.describe(description);
            }
            let _ = descriptor.slots.insert(slot, spec);
        }
        composer.register(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_registers_full_descriptor() {
        let mut composer = Composer::new();
        ClassBuilder::new("Wheel")
            .param("spokes", ParamRule::optional())
            .register(&mut composer)
            .expect("register Wheel");
        ClassBuilder::new("Bicycle")
            .param("brand", ParamRule::required())
            .contains("front", "Wheel")
            .delayed("spare", "Wheel")
            .describe_slot("spare", "built on demand")
            .register(&mut composer)
            .expect("register Bicycle");

        let dump = composer.all_specs();
        assert_eq!(dump["Bicycle"]["valid_params"]["brand"]["required"], true);
        assert_eq!(dump["Bicycle"]["contained_objects"]["front"]["class"], "Wheel");
        assert_eq!(dump["Bicycle"]["contained_objects"]["spare"]["delayed"], true);
        assert_eq!(
            dump["Bicycle"]["contained_objects"]["spare"]["description"],
            "built on demand"
        );
    }

    #[test]
    fn invalid_class_name_fails_at_register_time() {
        let mut composer = Composer::new();
        let err = ClassBuilder::new("not a name")
            .register(&mut composer)
            .unwrap_err();
        assert!(err.to_string().contains("invalid class name"), "got: {err}");
    }

    #[test]
    fn invalid_slot_target_fails_at_register_time() {
        let mut composer = Composer::new();
        assert!(
            ClassBuilder::new("Widget")
                .contains("part", "9bad")
                .register(&mut composer)
                .is_err()
        );
    }
}
