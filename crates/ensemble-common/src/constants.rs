//! System-wide constants and reserved argument names.

/// Reserved argument key carrying a back-reference payload from a parent
/// to a delayed object it is constructing. Never treated as a regular
/// parameter and never propagated to children.
pub const RESERVED_CONTAINER_KEY: &str = "container";

/// Suffix of the per-instantiation class-override argument: supplying
/// `"<slot>_class"` replaces the slot's declared target class.
pub const CLASS_OVERRIDE_SUFFIX: &str = "_class";

/// Default bound on contained-object nesting depth. Exceeding it fails
/// fast instead of overflowing the stack on undetected self-containment.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Placeholder used when rendering factory-computed defaults in
/// reflection dumps.
pub const FACTORY_DEFAULT_PLACEHOLDER: &str = "<factory>";
