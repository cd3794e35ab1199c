//! Diagnostic rendering of containment trees.
//!
//! Produces an indented textual tree, parent before children, with
//! indentation equal to depth. Delayed slots are annotated `(delayed)`;
//! classes repeated on the current chain are annotated `(recursive)` and
//! not descended into, so delayed self-containment renders finitely.
//! Exact formatting is diagnostic only; structure is the contract.

use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::types::ClassName;

use crate::instance::Instance;
use crate::registry::Registry;
use crate::value::Value;

/// Renders the static containment tree declared for a class.
///
/// # Errors
///
/// Returns `ClassResolution` if `class` is not registered.
pub fn show_containers_class(registry: &Registry, class: &ClassName) -> Result<String> {
    if !registry.contains(class) {
        return Err(EnsembleError::ClassResolution {
            name: class.to_string(),
        });
    }
    let mut out = String::new();
    out.push_str(class.as_str());
    out.push('\n');
    let mut chain = vec![class.clone()];
    render_class_children(registry, class, 1, &mut chain, &mut out)?;
    Ok(out)
}

fn render_class_children(
    registry: &Registry,
    class: &ClassName,
    depth: usize,
    chain: &mut Vec<ClassName>,
    out: &mut String,
) -> Result<()> {
    for (slot, spec) in registry.merged_slots(class)?.iter() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(slot);
        out.push_str(" -> ");
        out.push_str(spec.target.as_str());
        if spec.delayed {
            out.push_str(" (delayed)");
        }
        if chain.contains(&spec.target) {
            out.push_str(" (recursive)\n");
            continue;
        }
        out.push('\n');
        // An undeclared target is a leaf, not an error, in diagnostics.
        if registry.contains(&spec.target) {
            chain.push(spec.target.clone());
            render_class_children(registry, &spec.target, depth + 1, chain, out)?;
            let _ = chain.pop();
        }
    }
    Ok(())
}

/// Renders the actual containment tree of a constructed instance: eager
/// slots inline with their runtime classes, delayed slots annotated.
#[must_use]
pub fn show_containers(instance: &Instance) -> String {
    let mut out = String::new();
    out.push_str(instance.class().as_str());
    out.push('\n');
    render_instance_children(instance, 1, &mut out);
    out
}

fn render_instance_children(instance: &Instance, depth: usize, out: &mut String) {
    let record = instance.record();
    for (slot, state) in &record.contained {
        out.push_str(&"  ".repeat(depth));
        out.push_str(slot);
        out.push_str(" -> ");
        out.push_str(state.class().as_str());
        if state.is_delayed() {
            out.push_str(" (delayed)");
        }
        out.push('\n');
        if let Some(Value::Instance(child)) = instance.field(slot) {
            render_instance_children(child, depth + 1, out);
        }
    }
}
