//! Class specification registry with hierarchy-aware merged specs.
//!
//! The registry owns every [`ClassDescriptor`] plus the process-wide
//! caches of merged parameter and containment specs. Declaring a spec
//! replaces (never merges) the class's own map and conservatively clears
//! every cache, since inheritance edges are rarely known at invalidation
//! time. Merged specs are recomputed lazily by a post-order walk of the
//! parent graph: ancestors first, self last, last-write-wins per key.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ensemble_common::error::{EnsembleError, Result};
use ensemble_common::rules::{Declaration, ParamRule, SlotSpec};
use ensemble_common::types::ClassName;

/// A class's own declarations: parents, parameter spec, containment spec.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Unique class name.
    pub name: ClassName,
    /// Direct parents, in declaration order. Multiple inheritance is
    /// allowed; on key collision during merge, a later parent wins and
    /// the class itself wins over all parents.
    pub parents: Vec<ClassName>,
    /// Direct parameter spec.
    pub params: BTreeMap<String, ParamRule>,
    /// Direct containment spec.
    pub slots: BTreeMap<String, SlotSpec>,
}

impl ClassDescriptor {
    /// Creates an empty descriptor for `name`.
    #[must_use]
    pub const fn new(name: ClassName) -> Self {
        Self {
            name,
            parents: Vec::new(),
            params: BTreeMap::new(),
            slots: BTreeMap::new(),
        }
    }
}

/// The process-wide class registry and merge cache.
#[derive(Debug, Default)]
pub struct Registry {
    classes: HashMap<ClassName, ClassDescriptor>,
    merged_params: Mutex<HashMap<ClassName, Arc<BTreeMap<String, ParamRule>>>>,
    merged_slots: Mutex<HashMap<ClassName, Arc<BTreeMap<String, SlotSpec>>>>,
    allowed: Mutex<HashMap<ClassName, Arc<BTreeMap<String, ParamRule>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or wholly replaces) a class descriptor.
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error if the descriptor would introduce an
    /// eager self-containment cycle or an inheritance cycle among the
    /// currently known classes.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<()> {
        let name = descriptor.name.clone();
        let mut candidate = self.classes.clone();
        let _ = candidate.insert(name.clone(), descriptor);
        Self::reject_eager_cycle(&candidate, &name)?;
        Self::reject_parent_cycle(&candidate, &name, &mut Vec::new())?;
        self.classes = candidate;
        self.invalidate();
        tracing::info!(class = %name, "registered class");
        Ok(())
    }

    /// Replaces a class's own parameter spec. The `Clear` sentinel resets
    /// it to empty, distinct from the class never having declared.
    /// Creates the class (with no parents) if it was unknown.
    pub fn declare_params(&mut self, class: &ClassName, declaration: Declaration<ParamRule>) {
        let descriptor = self
            .classes
            .entry(class.clone())
            .or_insert_with(|| ClassDescriptor::new(class.clone()));
        descriptor.params = match declaration {
            Declaration::Set(map) => map,
            Declaration::Clear => BTreeMap::new(),
        };
        self.invalidate();
        tracing::debug!(class = %class, "declared parameter spec");
    }

    /// Replaces a class's own containment spec. The `Clear` sentinel
    /// resets it to empty. Creates the class if it was unknown.
    ///
    /// # Errors
    ///
    /// Returns a `Composition` error if the declaration would introduce
    /// an eager self-containment cycle: a class that eagerly contains
    /// itself (directly or transitively) can never finish constructing.
    /// Delayed edges are exempt.
    pub fn declare_contained(
        &mut self,
        class: &ClassName,
        declaration: Declaration<SlotSpec>,
    ) -> Result<()> {
        let slots = match declaration {
            Declaration::Set(map) => map,
            Declaration::Clear => BTreeMap::new(),
        };
        let mut candidate = self.classes.clone();
        let descriptor = candidate
            .entry(class.clone())
            .or_insert_with(|| ClassDescriptor::new(class.clone()));
        descriptor.slots = slots;
        Self::reject_eager_cycle(&candidate, class)?;
        self.classes = candidate;
        self.invalidate();
        tracing::debug!(class = %class, "declared containment spec");
        Ok(())
    }

    /// Whether the class has been declared.
    #[must_use]
    pub fn contains(&self, class: &ClassName) -> bool {
        self.classes.contains_key(class)
    }

    /// The class's own declarations, if any.
    #[must_use]
    pub fn descriptor(&self, class: &ClassName) -> Option<&ClassDescriptor> {
        self.classes.get(class)
    }

    /// The merged parameter spec for a class: own declarations unioned
    /// with all ancestors', closest-to-self winning per key. Cached.
    ///
    /// # Errors
    ///
    /// Returns `ClassResolution` if the class or one of its ancestors is
    /// not registered, or `Composition` on an inheritance cycle.
    pub fn merged_params(&self, class: &ClassName) -> Result<Arc<BTreeMap<String, ParamRule>>> {
        if let Some(hit) = lock(&self.merged_params).get(class) {
            return Ok(Arc::clone(hit));
        }
        let mut out = BTreeMap::new();
        self.collect_params(class, &mut out, &mut Vec::new())?;
        let merged = Arc::new(out);
        let _ = lock(&self.merged_params).insert(class.clone(), Arc::clone(&merged));
        Ok(merged)
    }

    /// The merged containment spec for a class, same discipline as
    /// [`Registry::merged_params`].
    ///
    /// # Errors
    ///
    /// Returns `ClassResolution` if the class or one of its ancestors is
    /// not registered, or `Composition` on an inheritance cycle.
    pub fn merged_slots(&self, class: &ClassName) -> Result<Arc<BTreeMap<String, SlotSpec>>> {
        if let Some(hit) = lock(&self.merged_slots).get(class) {
            return Ok(Arc::clone(hit));
        }
        let mut out = BTreeMap::new();
        self.collect_slots(class, &mut out, &mut Vec::new())?;
        let merged = Arc::new(out);
        let _ = lock(&self.merged_slots).insert(class.clone(), Arc::clone(&merged));
        Ok(merged)
    }

    /// Reflexive, transitive ancestry test. Unknown classes are not
    /// anything's subclass (except themselves).
    #[must_use]
    pub fn is_a(&self, sub: &ClassName, ancestor: &ClassName) -> bool {
        self.is_a_inner(sub, ancestor, &mut HashSet::new())
    }

    /// Reflection dump of every class's own declarations, keyed by class
    /// name, for tooling and documentation generation. Factory defaults
    /// render as a best-effort placeholder.
    #[must_use]
    pub fn all_specs(&self) -> serde_json::Value {
        let mut names: Vec<&ClassName> = self.classes.keys().collect();
        names.sort();

        let mut out = serde_json::Map::new();
        for name in names {
            let Some(descriptor) = self.classes.get(name) else {
                continue;
            };
            let mut valid_params = serde_json::Map::new();
            for (param, rule) in &descriptor.params {
                let _ = valid_params.insert(param.clone(), rule.to_json());
            }
            let mut contained = serde_json::Map::new();
            for (slot, spec) in &descriptor.slots {
                let mut entry = serde_json::Map::new();
                let _ = entry.insert("class".into(), spec.target.to_string().into());
                let _ = entry.insert("delayed".into(), spec.delayed.into());
                if let Some(description) = &spec.description {
                    let _ = entry.insert("description".into(), description.clone().into());
                }
                let _ = contained.insert(slot.clone(), serde_json::Value::Object(entry));
            }
            let mut class_entry = serde_json::Map::new();
            let _ = class_entry.insert(
                "valid_params".into(),
                serde_json::Value::Object(valid_params),
            );
            let _ = class_entry.insert(
                "contained_objects".into(),
                serde_json::Value::Object(contained),
            );
            let _ = out.insert(name.to_string(), serde_json::Value::Object(class_entry));
        }
        serde_json::Value::Object(out)
    }

    pub(crate) fn cached_allowed(
        &self,
        class: &ClassName,
    ) -> Option<Arc<BTreeMap<String, ParamRule>>> {
        lock(&self.allowed).get(class).map(Arc::clone)
    }

    pub(crate) fn store_allowed(&self, class: &ClassName, params: Arc<BTreeMap<String, ParamRule>>) {
        let _ = lock(&self.allowed).insert(class.clone(), params);
    }

    fn invalidate(&self) {
        lock(&self.merged_params).clear();
        lock(&self.merged_slots).clear();
        lock(&self.allowed).clear();
    }

    fn collect_params(
        &self,
        class: &ClassName,
        out: &mut BTreeMap<String, ParamRule>,
        chain: &mut Vec<ClassName>,
    ) -> Result<()> {
        let descriptor = self.require(class, chain)?;
        chain.push(class.clone());
        for parent in &descriptor.parents {
            self.collect_params(parent, out, chain)?;
        }
        let _ = chain.pop();
        for (name, rule) in &descriptor.params {
            let _ = out.insert(name.clone(), rule.clone());
        }
        Ok(())
    }

    fn collect_slots(
        &self,
        class: &ClassName,
        out: &mut BTreeMap<String, SlotSpec>,
        chain: &mut Vec<ClassName>,
    ) -> Result<()> {
        let descriptor = self.require(class, chain)?;
        chain.push(class.clone());
        for parent in &descriptor.parents {
            self.collect_slots(parent, out, chain)?;
        }
        let _ = chain.pop();
        for (slot, spec) in &descriptor.slots {
            let _ = out.insert(slot.clone(), spec.clone());
        }
        Ok(())
    }

    fn require(&self, class: &ClassName, chain: &[ClassName]) -> Result<&ClassDescriptor> {
        if chain.contains(class) {
            return Err(EnsembleError::Composition {
                class: class.to_string(),
                message: "inheritance cycle detected".into(),
            });
        }
        self.classes
            .get(class)
            .ok_or_else(|| EnsembleError::ClassResolution {
                name: class.to_string(),
            })
    }

    fn is_a_inner(
        &self,
        sub: &ClassName,
        ancestor: &ClassName,
        visited: &mut HashSet<ClassName>,
    ) -> bool {
        if sub == ancestor {
            return true;
        }
        if !visited.insert(sub.clone()) {
            return false;
        }
        self.classes.get(sub).is_some_and(|descriptor| {
            descriptor
                .parents
                .iter()
                .any(|parent| self.is_a_inner(parent, ancestor, visited))
        })
    }

    fn reject_eager_cycle(
        classes: &HashMap<ClassName, ClassDescriptor>,
        declaring: &ClassName,
    ) -> Result<()> {
        match find_eager_cycle(classes) {
            Some(on_cycle) => Err(EnsembleError::Composition {
                class: declaring.to_string(),
                message: format!(
                    "eager self-containment cycle detected through class \"{on_cycle}\""
                ),
            }),
            None => Ok(()),
        }
    }

    fn reject_parent_cycle(
        classes: &HashMap<ClassName, ClassDescriptor>,
        class: &ClassName,
        chain: &mut Vec<ClassName>,
    ) -> Result<()> {
        if chain.contains(class) {
            return Err(EnsembleError::Composition {
                class: class.to_string(),
                message: "inheritance cycle detected".into(),
            });
        }
        // Forward references to not-yet-registered parents are allowed;
        // the merge walk re-checks once they exist.
        let Some(descriptor) = classes.get(class) else {
            return Ok(());
        };
        chain.push(class.clone());
        for parent in &descriptor.parents {
            Self::reject_parent_cycle(classes, parent, chain)?;
        }
        let _ = chain.pop();
        Ok(())
    }
}

/// Builds the directed graph of eager containment edges over every known
/// declaration and returns a class on a cycle, if any. Cycle detection
/// covers direct declarations; cycles reachable only through inheritance
/// are caught by the runtime depth guard instead.
fn find_eager_cycle(classes: &HashMap<ClassName, ClassDescriptor>) -> Option<ClassName> {
    let mut graph: petgraph::Graph<ClassName, ()> = petgraph::Graph::new();
    let mut nodes: HashMap<ClassName, petgraph::graph::NodeIndex> = HashMap::new();

    for (name, descriptor) in classes {
        let from = node_index(&mut graph, &mut nodes, name);
        for spec in descriptor.slots.values() {
            if spec.delayed {
                continue;
            }
            let to = node_index(&mut graph, &mut nodes, &spec.target);
            let _ = graph.add_edge(from, to, ());
        }
    }

    match petgraph::algo::toposort(&graph, None) {
        Ok(_) => None,
        Err(cycle) => graph.node_weight(cycle.node_id()).cloned(),
    }
}

fn node_index(
    graph: &mut petgraph::Graph<ClassName, ()>,
    nodes: &mut HashMap<ClassName, petgraph::graph::NodeIndex>,
    name: &ClassName,
) -> petgraph::graph::NodeIndex {
    if let Some(index) = nodes.get(name) {
        return *index;
    }
    let index = graph.add_node(name.clone());
    let _ = nodes.insert(name.clone(), index);
    index
}
