//! Constructor-time graph building: argument partitioning, eager
//! construction, delayed-slot capture, and the delayed-object factory.
//!
//! [`GraphBuilder`] binds the registry, engine configuration, and the
//! pluggable validator for the duration of one construction. Partitioning
//! follows a deliberate retention rule: a name accepted by both the
//! container and a contained object keeps flowing to both; a name
//! accepted only by the contained object is consumed from the bag, so
//! later sibling slots no longer see it.

use std::collections::BTreeMap;
use std::sync::Arc;

use ensemble_common::config::EngineConfig;
use ensemble_common::constants::{CLASS_OVERRIDE_SUFFIX, RESERVED_CONTAINER_KEY};
use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::rules::ParamRule;
use ensemble_common::types::ClassName;

use crate::instance::{ContainerRecord, Instance, InstanceRef, SlotState};
use crate::registry::Registry;
use crate::resolve;
use crate::validate::{self, Validator};
use crate::value::{ArgMap, Value};

/// Builds object graphs from flat argument bags.
pub struct GraphBuilder<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
    validator: &'a dyn Validator,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder over the given registry, configuration, and
    /// validator.
    #[must_use]
    pub const fn new(
        registry: &'a Registry,
        config: &'a EngineConfig,
        validator: &'a dyn Validator,
    ) -> Self {
        Self {
            registry,
            config,
            validator,
        }
    }

    /// Constructs a composite of `class` from a flat argument bag:
    /// partitions the bag across contained slots, builds eager slots
    /// recursively, validates the residual arguments, and returns the
    /// finished instance. All-or-nothing; no partial object escapes.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `Composition`, or `ClassResolution` as
    /// appropriate; every message names the originating class.
    pub fn construct(&self, class: &ClassName, args: ArgMap) -> Result<InstanceRef> {
        self.construct_at(class, args, 0)
    }

    /// Partitions `args` into the class's own arguments plus a container
    /// record describing contained and delayed slots.
    ///
    /// # Errors
    ///
    /// Returns `Composition` on structural misuse (object supplied for a
    /// delayed slot, bad override, exceeded depth) and propagates errors
    /// from recursive eager construction.
    pub fn create_contained_objects(
        &self,
        class: &ClassName,
        args: ArgMap,
    ) -> Result<(ArgMap, ContainerRecord)> {
        self.create_contained_objects_at(class, args, 0)
    }

    /// Constructs a fresh object for a delayed slot of a live instance.
    /// Stored slot arguments are merged with `overrides` (override wins),
    /// and the new object receives a non-owning back-reference to
    /// `instance` unless back-references are disabled. May be called any
    /// number of times; every call yields an independent instance with
    /// its own back-reference payload.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the slot is absent or not delayed, and
    /// propagates construction errors.
    pub fn create_delayed_object(
        &self,
        instance: &InstanceRef,
        slot: &str,
        overrides: Option<ArgMap>,
    ) -> Result<InstanceRef> {
        let (target, mut args) = {
            let record = instance.lock_record();
            match record.contained.get(slot) {
                Some(SlotState::Delayed { class, args }) => (class.clone(), args.clone()),
                _ => {
                    return Err(EnsembleError::UnknownSlot {
                        class: instance.class().to_string(),
                        slot: slot.to_string(),
                    });
                }
            }
        };
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                let _ = args.insert(key, value);
            }
        }
        if self.config.attach_back_references {
            let _ = args.insert(
                RESERVED_CONTAINER_KEY.to_string(),
                Value::BackRef(Arc::downgrade(instance)),
            );
        }
        tracing::info!(parent = %instance.class(), slot, target = %target, "constructing delayed object");
        self.construct(&target, args)
    }

    fn construct_at(&self, class: &ClassName, args: ArgMap, depth: usize) -> Result<InstanceRef> {
        if depth > self.config.max_depth {
            return Err(self.depth_exceeded(class));
        }
        tracing::debug!(class = %class, depth, "constructing composite");

        let (own_args, record) = self.create_contained_objects_at(class, args, depth)?;
        let fields = self.validate_own(class, &record, own_args)?;
        Ok(Arc::new(Instance::new(class.clone(), fields, record)))
    }

    fn create_contained_objects_at(
        &self,
        class: &ClassName,
        mut args: ArgMap,
        depth: usize,
    ) -> Result<(ArgMap, ContainerRecord)> {
        if depth > self.config.max_depth {
            return Err(self.depth_exceeded(class));
        }

        // The reserved back-reference payload is never a regular
        // parameter and never propagates to children.
        let container = match args.remove(RESERVED_CONTAINER_KEY) {
            Some(Value::BackRef(weak)) => Some(weak),
            Some(Value::Instance(strong)) => Some(Arc::downgrade(&strong)),
            Some(Value::Scalar(_)) => {
                return Err(EnsembleError::Composition {
                    class: class.to_string(),
                    message: format!(
                        "reserved \"{RESERVED_CONTAINER_KEY}\" argument must carry an object reference"
                    ),
                });
            }
            None => None,
        };
        let mut record = ContainerRecord {
            contained: BTreeMap::new(),
            container,
        };

        let slots = self.registry.merged_slots(class)?;
        for (slot, spec) in slots.iter() {
            // Caller supplied a pre-built object for the slot.
            if args.contains_key(slot.as_str()) {
                if spec.delayed {
                    return Err(EnsembleError::Composition {
                        class: class.to_string(),
                        message: format!(
                            "slot \"{slot}\" is delayed; supplying a pre-built object is not allowed"
                        ),
                    });
                }
                let supplied_class = match args.get(slot.as_str()) {
                    Some(Value::Instance(instance)) => instance.class().clone(),
                    _ => spec.target.clone(),
                };
                self.discard_pass_through(class, &supplied_class, slot, &mut args)?;
                let _ = record.contained.insert(
                    slot.clone(),
                    SlotState::Eager {
                        class: supplied_class,
                    },
                );
                continue;
            }

            let target = self.effective_target(class, spec.target.clone(), slot, &mut args)?;
            let slot_args = self.route_slot_args(class, &target, &mut args)?;
            tracing::debug!(
                class = %class,
                slot = %slot,
                target = %target,
                routed = slot_args.len(),
                "partitioned slot arguments"
            );

            if spec.delayed {
                let _ = record.contained.insert(
                    slot.clone(),
                    SlotState::Delayed {
                        class: target,
                        args: slot_args,
                    },
                );
            } else {
                let child = self.construct_at(&target, slot_args, depth + 1)?;
                let _ = record.contained.insert(
                    slot.clone(),
                    SlotState::Eager {
                        class: child.class().clone(),
                    },
                );
                // Make the constructed object visible to the parent's
                // validation as the slot's value.
                if !args.contains_key(slot.as_str()) {
                    let _ = args.insert(slot.clone(), Value::Instance(child));
                }
            }
        }

        Ok((args, record))
    }

    /// Resolves the slot's effective target class, consuming the
    /// `"<slot>_class"` override from the bag if present.
    fn effective_target(
        &self,
        class: &ClassName,
        declared: ClassName,
        slot: &str,
        args: &mut ArgMap,
    ) -> Result<ClassName> {
        let override_key = format!("{slot}{CLASS_OVERRIDE_SUFFIX}");
        match args.remove(&override_key) {
            Some(value) => match value.as_str() {
                // The error names the resolving container, not the
                // malformed string: that is where the misconfiguration
                // lives.
                Some(name) => ClassName::new(name).map_err(|_| EnsembleError::Composition {
                    class: class.to_string(),
                    message: format!(
                        "\"{override_key}\" override names an invalid class: \"{name}\""
                    ),
                }),
                None => Err(EnsembleError::Composition {
                    class: class.to_string(),
                    message: format!("\"{override_key}\" override must be a class-name string"),
                }),
            },
            None => Ok(declared),
        }
    }

    /// Copies the keys `target` accepts out of the bag. A copied key is
    /// removed from the bag only when the container's own merged
    /// parameter spec does not also declare it.
    fn route_slot_args(
        &self,
        class: &ClassName,
        target: &ClassName,
        args: &mut ArgMap,
    ) -> Result<ArgMap> {
        let accepted = resolve::allowed_params(self.registry, self.config, target, Some(args))?;
        let own = self.registry.merged_params(class)?;
        let mut slot_args = ArgMap::new();
        let matching: Vec<String> = accepted
            .keys()
            .filter(|key| args.contains_key(key.as_str()))
            .cloned()
            .collect();
        for key in matching {
            if let Some(value) = args.get(&key) {
                let _ = slot_args.insert(key.clone(), value.clone());
            }
            if !own.contains_key(&key) {
                let _ = args.remove(&key);
            }
        }
        Ok(slot_args)
    }

    /// For a slot satisfied by a supplied object, the pass-through keys
    /// are still computed and dropped from the bag (so they do not reach
    /// the container's validation as unknown), but never used.
    fn discard_pass_through(
        &self,
        class: &ClassName,
        supplied_class: &ClassName,
        slot: &str,
        args: &mut ArgMap,
    ) -> Result<()> {
        let accepted =
            resolve::allowed_params(self.registry, self.config, supplied_class, Some(args))?;
        let own = self.registry.merged_params(class)?;
        let discard: Vec<String> = accepted
            .keys()
            .filter(|key| {
                key.as_str() != slot
                    && args.contains_key(key.as_str())
                    && !own.contains_key(key.as_str())
            })
            .cloned()
            .collect();
        for key in discard {
            let _ = args.remove(&key);
        }
        Ok(())
    }

    fn validate_own(
        &self,
        class: &ClassName,
        record: &ContainerRecord,
        own_args: ArgMap,
    ) -> Result<ArgMap> {
        let mut spec: BTreeMap<String, ParamRule> =
            self.registry.merged_params(class)?.as_ref().clone();
        // Eager slot values take an implicit class-constrained rule so
        // they neither fail as unknown nor accept arbitrary scalars.
        for (slot, state) in &record.contained {
            if let SlotState::Eager { class: slot_class } = state {
                let _ = spec
                    .entry(slot.clone())
                    .or_insert_with(|| ParamRule::optional().isa(slot_class.clone()));
            }
        }
        validate::validate_args(self.validator, self.registry, class, &spec, own_args)
    }

    fn depth_exceeded(&self, class: &ClassName) -> EnsembleError {
        EnsembleError::Composition {
            class: class.to_string(),
            message: format!(
                "containment depth {} exceeded during construction",
                self.config.max_depth
            ),
        }
    }
}
