//! Constructed composite instances and their container records.
//!
//! An [`Instance`] carries its own validated fields plus one
//! [`ContainerRecord`] describing the contained and delayed slots it was
//! built with. Delayed slots hold the class and argument set for later
//! construction; the record also holds the optional non-owning
//! back-reference to whichever instance created this one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::types::{ClassName, InstanceId};

use crate::value::{ArgMap, Value};

/// Shared handle to a constructed instance.
pub type InstanceRef = Arc<Instance>;

/// Per-instance state of one containment slot.
#[derive(Debug, Clone)]
pub enum SlotState {
    /// The slot's object was constructed (or supplied) at parent
    /// construction time; the value lives in the parent's fields.
    Eager {
        /// Runtime class of the slot's object.
        class: ClassName,
    },
    /// Construction is deferred until explicitly requested.
    Delayed {
        /// Class to construct on request.
        class: ClassName,
        /// Arguments routed to this slot at parent construction time,
        /// patchable via [`Instance::delayed_object_params`].
        args: ArgMap,
    },
}

impl SlotState {
    /// The class currently associated with the slot.
    #[must_use]
    pub const fn class(&self) -> &ClassName {
        match self {
            Self::Eager { class } | Self::Delayed { class, .. } => class,
        }
    }

    /// Whether the slot is delayed.
    #[must_use]
    pub const fn is_delayed(&self) -> bool {
        matches!(self, Self::Delayed { .. })
    }
}

/// Per-instance containment metadata.
#[derive(Debug, Clone, Default)]
pub struct ContainerRecord {
    /// Slot name to its current state.
    pub contained: BTreeMap<String, SlotState>,
    /// Non-owning back-reference to the instance that created this one
    /// as part of a delayed-slot construction.
    pub container: Option<Weak<Instance>>,
}

/// A constructed composite: validated fields plus containment metadata.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    class: ClassName,
    fields: ArgMap,
    record: Mutex<ContainerRecord>,
}

impl Instance {
    pub(crate) fn new(class: ClassName, fields: ArgMap, record: ContainerRecord) -> Self {
        Self {
            id: InstanceId::generate(),
            class,
            fields,
            record: Mutex::new(record),
        }
    }

    /// Unique identifier of this instance.
    #[must_use]
    pub const fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Runtime class of this instance.
    #[must_use]
    pub const fn class(&self) -> &ClassName {
        &self.class
    }

    /// All validated fields, including eagerly constructed slot objects.
    #[must_use]
    pub const fn fields(&self) -> &ArgMap {
        &self.fields
    }

    /// Looks up one validated field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Snapshot of the containment record.
    #[must_use]
    pub fn record(&self) -> ContainerRecord {
        self.lock_record().clone()
    }

    /// Class currently associated with a contained slot, eager or delayed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the record has no such slot.
    pub fn contained_class(&self, slot: &str) -> Result<ClassName> {
        let record = self.lock_record();
        record
            .contained
            .get(slot)
            .map(|state| state.class().clone())
            .ok_or_else(|| self.unknown_slot(slot))
    }

    /// Class a delayed slot would construct.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the slot is absent or not delayed.
    pub fn delayed_object_class(&self, slot: &str) -> Result<ClassName> {
        let record = self.lock_record();
        match record.contained.get(slot) {
            Some(SlotState::Delayed { class, .. }) => Ok(class.clone()),
            _ => Err(self.unknown_slot(slot)),
        }
    }

    /// Reads, and optionally destructively patches, the stored argument
    /// set of a delayed slot. Patched keys override stored ones and apply
    /// to every later construction of the slot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` if the slot is absent or not delayed.
    pub fn delayed_object_params(&self, slot: &str, patch: Option<ArgMap>) -> Result<ArgMap> {
        let mut record = self.lock_record();
        match record.contained.get_mut(slot) {
            Some(SlotState::Delayed { args, .. }) => {
                if let Some(patch) = patch {
                    for (key, value) in patch {
                        let _ = args.insert(key, value);
                    }
                }
                Ok(args.clone())
            }
            _ => Err(self.unknown_slot(slot)),
        }
    }

    /// The instance that created this one as part of a delayed-slot
    /// construction, if it is still alive and back-references are
    /// enabled. The reference is non-owning: it never keeps the parent
    /// alive and never participates in cleanup.
    #[must_use]
    pub fn container(&self) -> Option<InstanceRef> {
        self.lock_record()
            .container
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub(crate) fn lock_record(&self) -> MutexGuard<'_, ContainerRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unknown_slot(&self, slot: &str) -> EnsembleError {
        EnsembleError::UnknownSlot {
            class: self.class.to_string(),
            slot: slot.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> ClassName {
        ClassName::new(name).expect("valid class name")
    }

    fn delayed_instance() -> Instance {
        let mut contained = BTreeMap::new();
        let mut args = ArgMap::new();
        let _ = args.insert("hair".into(), Value::string("brown"));
        let _ = contained.insert(
            "daughter".into(),
            SlotState::Delayed {
                class: class("Person"),
                args,
            },
        );
        let _ = contained.insert(
            "engine".into(),
            SlotState::Eager {
                class: class("Engine"),
            },
        );
        Instance::new(
            class("Family"),
            ArgMap::new(),
            ContainerRecord {
                contained,
                container: None,
            },
        )
    }

    #[test]
    fn contained_class_covers_both_slot_kinds() {
        let instance = delayed_instance();
        assert_eq!(
            instance.contained_class("daughter").expect("slot").as_str(),
            "Person"
        );
        assert_eq!(
            instance.contained_class("engine").expect("slot").as_str(),
            "Engine"
        );
    }

    #[test]
    fn contained_class_unknown_slot_fails() {
        let instance = delayed_instance();
        let err = instance.contained_class("ghost").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost"), "got: {msg}");
        assert!(msg.contains("Family"), "got: {msg}");
    }

    #[test]
    fn delayed_object_class_rejects_eager_slot() {
        let instance = delayed_instance();
        assert!(instance.delayed_object_class("engine").is_err());
        assert_eq!(
            instance
                .delayed_object_class("daughter")
                .expect("slot")
                .as_str(),
            "Person"
        );
    }

    #[test]
    fn delayed_params_patch_is_destructive() {
        let instance = delayed_instance();
        let mut patch = ArgMap::new();
        let _ = patch.insert("hair".into(), Value::string("red"));
        let _ = patch.insert("eyes".into(), Value::string("green"));

        let merged = instance
            .delayed_object_params("daughter", Some(patch))
            .expect("patch");
        assert_eq!(merged.get("hair"), Some(&Value::string("red")));
        assert_eq!(merged.get("eyes"), Some(&Value::string("green")));

        // A later read without a patch sees the mutated args.
        let current = instance
            .delayed_object_params("daughter", None)
            .expect("read");
        assert_eq!(current.get("hair"), Some(&Value::string("red")));
    }

    #[test]
    fn delayed_params_on_eager_slot_fails() {
        let instance = delayed_instance();
        assert!(instance.delayed_object_params("engine", None).is_err());
    }

    #[test]
    fn container_is_none_without_back_reference() {
        let instance = delayed_instance();
        assert!(instance.container().is_none());
    }

    #[test]
    fn container_does_not_keep_parent_alive() {
        let parent = Arc::new(delayed_instance());
        let child = Instance::new(
            class("Person"),
            ArgMap::new(),
            ContainerRecord {
                contained: BTreeMap::new(),
                container: Some(Arc::downgrade(&parent)),
            },
        );
        assert!(child.container().is_some());
        drop(parent);
        assert!(child.container().is_none());
    }
}
