//! Transitive parameter resolution: `allowed_params`.
//!
//! Computes the full set of argument names a class's constructor will
//! accept, including everything it would forward to contained objects at
//! any depth. The answer can depend on the concrete argument bag, because
//! a `"<slot>_class"` override changes which target class's parameters
//! are pulled in; argument-dependent computations are never cached.

use std::collections::BTreeMap;
use std::sync::Arc;

use ensemble_common::config::EngineConfig;
use ensemble_common::constants::CLASS_OVERRIDE_SUFFIX;
use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::rules::{ParamRule, TypeTag};
use ensemble_common::types::ClassName;

use crate::registry::Registry;
use crate::value::ArgMap;

/// Computes the transitive set of acceptable parameter names for `class`,
/// optionally in the context of a concrete argument bag. Never mutates
/// `args`; deterministic for identical inputs.
///
/// # Errors
///
/// Returns `ClassResolution` if `class` (or a containment target) is not
/// registered, or `Composition` if an override is not a string or the
/// nesting depth bound is exceeded.
pub fn allowed_params(
    registry: &Registry,
    config: &EngineConfig,
    class: &ClassName,
    args: Option<&ArgMap>,
) -> Result<Arc<BTreeMap<String, ParamRule>>> {
    let empty = ArgMap::new();
    let args = args.unwrap_or(&empty);

    // A cached entry is only ever stored for argument-independent
    // computations, so it can serve any bag that exercises no slot key
    // and no override; with an empty bag that is trivially true.
    if args.is_empty() {
        if let Some(hit) = registry.cached_allowed(class) {
            tracing::trace!(class = %class, "allowed_params cache hit");
            return Ok(hit);
        }
    }

    let mut args_dependent = false;
    let mut chain = vec![class.clone()];
    let params = collect(registry, config, class, args, &mut chain, &mut args_dependent)?;
    let params = Arc::new(params);
    if !args_dependent {
        registry.store_allowed(class, Arc::clone(&params));
    }
    Ok(params)
}

fn collect(
    registry: &Registry,
    config: &EngineConfig,
    class: &ClassName,
    args: &ArgMap,
    chain: &mut Vec<ClassName>,
    args_dependent: &mut bool,
) -> Result<BTreeMap<String, ParamRule>> {
    if chain.len() > config.max_depth {
        return Err(EnsembleError::Composition {
            class: class.to_string(),
            message: format!(
                "containment depth {} exceeded while resolving allowed parameters",
                config.max_depth
            ),
        });
    }

    let mut result = registry.merged_params(class)?.as_ref().clone();

    for (slot, spec) in registry.merged_slots(class)?.iter() {
        // An already-supplied object needs no further parameter
        // pass-through.
        if args.contains_key(slot) {
            *args_dependent = true;
            continue;
        }

        let override_key = format!("{slot}{CLASS_OVERRIDE_SUFFIX}");
        let target = match args.get(&override_key) {
            Some(value) => {
                *args_dependent = true;
                let name = value.as_str().ok_or_else(|| EnsembleError::Composition {
                    class: class.to_string(),
                    message: format!("\"{override_key}\" override must be a class-name string"),
                })?;
                // The override key itself becomes an accepted, loosely
                // typed parameter.
                let _ = result
                    .entry(override_key.clone())
                    .or_insert_with(|| ParamRule::optional().of_type(TypeTag::String));
                ClassName::new(name).map_err(|_| EnsembleError::Composition {
                    class: class.to_string(),
                    message: format!(
                        "\"{override_key}\" override names an invalid class: \"{name}\""
                    ),
                })?
            }
            None => spec.target.clone(),
        };

        // A delayed slot may legally target a class already on the
        // current chain (recursive containment); its parameters belong to
        // the later explicit construction, not to this constructor.
        // Eager recursion stays subject to the depth guard so it fails
        // fast instead of silently flattening.
        if spec.delayed && chain.contains(&target) {
            continue;
        }

        tracing::debug!(class = %class, slot = %slot, target = %target, "pulling contained parameters");
        chain.push(target.clone());
        let sub = collect(registry, config, &target, args, chain, args_dependent)?;
        let _ = chain.pop();
        for (name, rule) in sub {
            // A parameter whose class constraint the container itself
            // already satisfies is meant to receive the container, not to
            // pass through it; merging it back in would be nonsensical.
            if let Some(isa) = &rule.isa {
                if registry.is_a(class, isa) {
                    continue;
                }
            }
            // The container's own entry for a name always wins.
            let _ = result.entry(name).or_insert(rule);
        }
    }

    Ok(result)
}
