//! # ensemble-sdk
//!
//! Public SDK for using Ensemble as a Rust library.
//!
//! Provides two main entry points:
//! - [`ClassBuilder`](builder::ClassBuilder): Fluent API for declaring a
//!   class's parameters, parents, and contained objects.
//! - [`Composer`](composer::Composer): High-level facade owning the
//!   registry, configuration, and validator, exposing construction,
//!   resolution, delayed objects, and diagnostics.
//!
//! # Example
//!
//! ```rust
//! use ensemble_sdk::{ArgMap, ClassBuilder, Composer, ParamRule, Value};
//!
//! let mut composer = Composer::new();
//! ClassBuilder::new("Engine")
//!     .param("cylinders", ParamRule::optional().with_default(serde_json::json!(4)))
//!     .register(&mut composer)
//!     .expect("declare Engine");
//! ClassBuilder::new("Car")
//!     .param("vin", ParamRule::required())
//!     .contains("engine", "Engine")
//!     .register(&mut composer)
//!     .expect("declare Car");
//!
//! let mut args = ArgMap::new();
//! let _ = args.insert("vin".into(), Value::string("WP0ZZZ"));
//! let car = composer.construct("Car", args).expect("construct");
//! assert_eq!(car.contained_class("engine").expect("slot").as_str(), "Engine");
//! ```

pub mod builder;
pub mod composer;

pub use builder::ClassBuilder;
pub use composer::Composer;
pub use ensemble_common::config::EngineConfig;
pub use ensemble_common::error::{EnsembleError, Result};
pub use ensemble_common::rules::{Declaration, ParamRule, SlotSpec, TypeTag};
pub use ensemble_common::types::ClassName;
pub use ensemble_core::{ArgMap, Instance, InstanceRef, Value};
