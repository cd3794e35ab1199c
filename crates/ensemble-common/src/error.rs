//! Unified error types for the Ensemble workspace.
//!
//! All errors are synchronous and raised at the point of detection;
//! construction is all-or-nothing, so no error ever leaves a partially
//! built composite behind. Every message names the originating class so
//! misconfiguration in deep graphs is locatable without a debugger.

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// A supplied argument bag fails a class's merged parameter spec.
    #[error("validation failed for {class}.{param}: {message}")]
    Validation {
        /// Class whose parameter spec rejected the argument.
        class: String,
        /// Name of the offending parameter.
        param: String,
        /// Description of the violation.
        message: String,
    },

    /// Structural misuse of the composition machinery: supplying a
    /// concrete object for a delayed slot, an invalid class name, an
    /// eager self-containment cycle, or an exceeded nesting depth.
    #[error("composition error in {class}: {message}")]
    Composition {
        /// Class at which the misuse was detected.
        class: String,
        /// Description of the structural problem.
        message: String,
    },

    /// A named target class is not present in the class registry.
    #[error("class not registered: {name}")]
    ClassResolution {
        /// The class name that could not be resolved.
        name: String,
    },

    /// A delayed-object or introspection call referenced a slot the
    /// instance's container record does not carry.
    #[error("unknown contained slot \"{slot}\" on {class}")]
    UnknownSlot {
        /// Class of the instance that was queried.
        class: String,
        /// The slot name that was not found.
        slot: String,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EnsembleError>;
