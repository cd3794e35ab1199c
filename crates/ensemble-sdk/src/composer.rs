//! High-level facade over the registry, builder, and renderer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ensemble_common::config::EngineConfig;
use ensemble_common::error::Result;
use ensemble_common::rules::{Declaration, ParamRule, SlotSpec};
use ensemble_common::types::ClassName;
use ensemble_core::build::GraphBuilder;
use ensemble_core::instance::{Instance, InstanceRef};
use ensemble_core::registry::{ClassDescriptor, Registry};
use ensemble_core::validate::{StandardValidator, Validator};
use ensemble_core::value::ArgMap;
use ensemble_core::{render, resolve};

/// Owns a class registry, engine configuration, and validator, and
/// exposes the whole composition surface behind string class names.
pub struct Composer {
    registry: Registry,
    config: EngineConfig,
    validator: Box<dyn Validator>,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Creates a composer with the default configuration and the
    /// standard validator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a composer with an explicit configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            validator: Box::new(StandardValidator),
        }
    }

    /// Swaps the single-parameter validator.
    pub fn set_validator(&mut self, validator: Box<dyn Validator>) {
        self.validator = validator;
    }

    /// The engine configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers (or wholly replaces) a class descriptor.
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error on containment or inheritance
    /// cycles.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<()> {
        self.registry.register(descriptor)
    }

    /// Replaces a class's own parameter spec (`Declaration::Clear`
    /// resets it to empty).
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error on an invalid class name.
    pub fn declare_params(&mut self, class: &str, declaration: Declaration<ParamRule>) -> Result<()> {
        let class = ClassName::new(class)?;
        self.registry.declare_params(&class, declaration);
        Ok(())
    }

    /// Replaces a class's own containment spec (`Declaration::Clear`
    /// resets it to empty).
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error on an invalid class name or an
    /// eager self-containment cycle.
    pub fn declare_contained(
        &mut self,
        class: &str,
        declaration: Declaration<SlotSpec>,
    ) -> Result<()> {
        let class = ClassName::new(class)?;
        self.registry.declare_contained(&class, declaration)
    }

    /// Constructs a composite of `class` from a flat argument bag.
    ///
    /// # Errors
    ///
    /// Propagates `Validation`, `Composition`, and `ClassResolution`
    /// errors from partitioning, construction, and validation.
    pub fn construct(&self, class: &str, args: ArgMap) -> Result<InstanceRef> {
        let class = ClassName::new(class)?;
        tracing::info!(class = %class, args = args.len(), "constructing composite");
        self.builder().construct(&class, args)
    }

    /// The transitive set of parameter names `class` accepts, optionally
    /// in the context of a concrete argument bag.
    ///
    /// # Errors
    ///
    /// Returns `ClassResolution` for unknown classes and `Composition`
    /// for malformed overrides.
    pub fn allowed_params(
        &self,
        class: &str,
        args: Option<&ArgMap>,
    ) -> Result<Arc<BTreeMap<String, ParamRule>>> {
        let class = ClassName::new(class)?;
        resolve::allowed_params(&self.registry, &self.config, &class, args)
    }

    /// Constructs a fresh object for a delayed slot of `instance`.
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
        self.builder().create_delayed_object(instance, slot, overrides)
    }

    /// Reads, and optionally patches, the stored arguments of a delayed
    /// slot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the slot is absent or not delayed.
    pub fn delayed_object_params(
        &self,
        instance: &Instance,
        slot: &str,
        patch: Option<ArgMap>,
    ) -> Result<ArgMap> {
        instance.delayed_object_params(slot, patch)
    }

    /// Class currently associated with a contained slot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the record has no such slot.
    pub fn contained_class(&self, instance: &Instance, slot: &str) -> Result<ClassName> {
        instance.contained_class(slot)
    }

    /// Class a delayed slot would construct.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the slot is absent or not delayed.
    pub fn delayed_object_class(&self, instance: &Instance, slot: &str) -> Result<ClassName> {
        instance.delayed_object_class(slot)
    }

    /// Renders the actual containment tree of a constructed instance.
    #[must_use]
    pub fn show_containers(&self, instance: &Instance) -> String {
        render::show_containers(instance)
    }

    /// Renders the static containment tree declared for a class.
    ///
    /// # Errors
    ///
    /// Returns `ClassResolution` if the class is not registered.
    pub fn show_containers_class(&self, class: &str) -> Result<String> {
        let class = ClassName::new(class)?;
        render::show_containers_class(&self.registry, &class)
    }

    /// Reflection dump of every class's own declarations.
    #[must_use]
    pub fn all_specs(&self) -> serde_json::Value {
        self.registry.all_specs()
    }

    fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(&self.registry, &self.config, self.validator.as_ref())
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}
