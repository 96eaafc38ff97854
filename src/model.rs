//! Value models and the arena that owns them.
//!
//! Models reference each other through lightweight [`ModelId`] handles into a
//! [`ModelArena`]. A model that must be referenced before it is complete (any
//! object-like model, which may be reachable from its own elements) is first
//! *reserved*, then *set* once its children are built. Shared and cyclic heap
//! structure is expressed with [`Model::ReferenceTo`], never with embedded
//! pointers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Display, Formatter, Write as _};
use std::rc::Rc;

use crate::expr::{Constraint, Value, Variable};
use crate::types::{FieldId, MethodSig};

/// Handle of a model inside one [`ModelArena`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ModelId(u32);

impl ModelId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the index of the model in its arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ModelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Length plus index (or key) to element mapping of an array-like model.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerModel {
    pub variable: Variable,
    pub length: ModelId,
    /// Pairs of index (or key) model and element (or value) model.
    pub elements: Vec<(ModelId, ModelId)>,
    pub constraints: BTreeSet<Constraint>,
}

/// One constructor or method call of a construction plan.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CallModel {
    pub method: Rc<MethodSig>,
    /// Argument models, without the receiver.
    pub args: Vec<ModelId>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Model {
    Null {
        variable: Variable,
    },
    Primitive {
        variable: Variable,
        concrete: Value,
        constraints: BTreeSet<Constraint>,
    },
    Object {
        variable: Variable,
        constraints: BTreeSet<Constraint>,
    },
    /// Alias of an already built model.
    ReferenceTo {
        variable: Variable,
        target: ModelId,
    },
    Array(ContainerModel),
    List(ContainerModel),
    Set(ContainerModel),
    Map(ContainerModel),
    /// A value built by calls: an optional instantiation followed by
    /// modifications on the instantiated receiver.
    Assemble {
        variable: Variable,
        instantiation: Option<CallModel>,
        modifications: Vec<CallModel>,
    },
}

impl Model {
    pub fn variable(&self) -> &Variable {
        match self {
            Model::Null { variable }
            | Model::Primitive { variable, .. }
            | Model::Object { variable, .. }
            | Model::ReferenceTo { variable, .. }
            | Model::Assemble { variable, .. } => variable,
            Model::Array(c) | Model::List(c) | Model::Set(c) | Model::Map(c) => &c.variable,
        }
    }

    pub fn constraints(&self) -> Option<&BTreeSet<Constraint>> {
        match self {
            Model::Primitive { constraints, .. } | Model::Object { constraints, .. } => Some(constraints),
            Model::Array(c) | Model::List(c) | Model::Set(c) | Model::Map(c) => Some(&c.constraints),
            Model::Null { .. } | Model::ReferenceTo { .. } | Model::Assemble { .. } => None,
        }
    }

    pub fn container(&self) -> Option<&ContainerModel> {
        match self {
            Model::Array(c) | Model::List(c) | Model::Set(c) | Model::Map(c) => Some(c),
            _ => None,
        }
    }

    pub fn concrete(&self) -> Option<&Value> {
        match self {
            Model::Primitive { concrete, .. } => Some(concrete),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Model::Null { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Model::Null { .. } => "null",
            Model::Primitive { .. } => "primitive",
            Model::Object { .. } => "object",
            Model::ReferenceTo { .. } => "ref",
            Model::Array(_) => "array",
            Model::List(_) => "list",
            Model::Set(_) => "set",
            Model::Map(_) => "map",
            Model::Assemble { .. } => "assemble",
        }
    }

    /// Handles of directly referenced models.
    pub fn children(&self) -> Vec<ModelId> {
        match self {
            Model::Null { .. } | Model::Primitive { .. } | Model::Object { .. } => Vec::new(),
            Model::ReferenceTo { target, .. } => vec![*target],
            Model::Array(c) | Model::List(c) | Model::Set(c) | Model::Map(c) => {
                let mut result = vec![c.length];
                for &(k, v) in &c.elements {
                    result.push(k);
                    result.push(v);
                }
                result
            }
            Model::Assemble {
                instantiation,
                modifications,
                ..
            } => instantiation
                .iter()
                .chain(modifications)
                .flat_map(|call| call.args.iter().copied())
                .collect(),
        }
    }

    /// Copy of this model with every handle passed through `f`.
    pub fn map_ids(&self, f: &mut dyn FnMut(ModelId) -> ModelId) -> Model {
        fn map_container(c: &ContainerModel, f: &mut dyn FnMut(ModelId) -> ModelId) -> ContainerModel {
            ContainerModel {
                variable: c.variable.clone(),
                length: f(c.length),
                elements: c.elements.iter().map(|&(k, v)| (f(k), f(v))).collect(),
                constraints: c.constraints.clone(),
            }
        }
        match self {
            Model::Null { .. } | Model::Primitive { .. } | Model::Object { .. } => self.clone(),
            Model::ReferenceTo { variable, target } => Model::ReferenceTo {
                variable: variable.clone(),
                target: f(*target),
            },
            Model::Array(c) => Model::Array(map_container(c, f)),
            Model::List(c) => Model::List(map_container(c, f)),
            Model::Set(c) => Model::Set(map_container(c, f)),
            Model::Map(c) => Model::Map(map_container(c, f)),
            Model::Assemble {
                variable,
                instantiation,
                modifications,
            } => {
                let mut map_call = |call: &CallModel| CallModel {
                    method: Rc::clone(&call.method),
                    args: call.args.iter().map(|&a| f(a)).collect(),
                };
                Model::Assemble {
                    variable: variable.clone(),
                    instantiation: instantiation.as_ref().map(&mut map_call),
                    modifications: modifications.iter().map(&mut map_call).collect(),
                }
            }
        }
    }
}

/// Owner of all models of one resolution pass or one synthesis result.
#[derive(Debug, Clone, Default)]
pub struct ModelArena {
    models: Vec<Option<Model>>,
}

impl ModelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Reserves a slot to be filled later with [`set`][ModelArena::set].
    pub fn reserve(&mut self) -> ModelId {
        let id = ModelId::new(self.models.len() as u32);
        self.models.push(None);
        id
    }

    pub fn set(&mut self, id: ModelId, model: Model) {
        let slot = &mut self.models[id.index()];
        assert!(slot.is_none(), "model {} is already set", id);
        *slot = Some(model);
    }

    pub fn alloc(&mut self, model: Model) -> ModelId {
        let id = self.reserve();
        self.set(id, model);
        id
    }

    pub fn try_get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.index()).and_then(|m| m.as_ref())
    }

    pub fn get(&self, id: ModelId) -> &Model {
        match self.try_get(id) {
            Some(model) => model,
            None => panic!("model {} is not built in this arena (size {})", id, self.models.len()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.models
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (ModelId::new(i as u32), m)))
    }

    /// Follows `ReferenceTo` links to the model they alias.
    pub fn deref(&self, mut id: ModelId) -> ModelId {
        for _ in 0..=self.models.len() {
            match self.get(id) {
                Model::ReferenceTo { target, .. } => id = *target,
                _ => return id,
            }
        }
        panic!("cycle of ReferenceTo links through {}", id);
    }

    /// Copies the model graph rooted at `id` from `other`, returning the new handle.
    pub fn import(&mut self, other: &ModelArena, id: ModelId) -> ModelId {
        let mut remap = HashMap::new();
        self.import_with(other, id, &mut remap)
    }

    /// Like [`import`][ModelArena::import], sharing `remap` across several roots.
    pub fn import_with(&mut self, other: &ModelArena, id: ModelId, remap: &mut HashMap<ModelId, ModelId>) -> ModelId {
        if let Some(&mapped) = remap.get(&id) {
            return mapped;
        }
        let new_id = self.reserve();
        remap.insert(id, new_id);
        let model = other.get(id).map_ids(&mut |child| self.import_with(other, child, remap));
        self.set(new_id, model);
        new_id
    }

    /// Human-readable rendering of the model graph rooted at `id`.
    pub fn render(&self, id: ModelId) -> String {
        let mut out = String::new();
        let mut visiting = HashSet::new();
        self.render_into(id, &mut out, &mut visiting);
        out
    }

    fn render_into(&self, id: ModelId, out: &mut String, visiting: &mut HashSet<ModelId>) {
        if !visiting.insert(id) {
            let _ = write!(out, "<cycle {}>", id);
            return;
        }
        match self.get(id) {
            Model::Null { .. } => out.push_str("null"),
            Model::Primitive { concrete, .. } => {
                let _ = write!(out, "{}", concrete);
            }
            Model::Object { variable, constraints } => {
                let _ = write!(out, "{}{{", variable.ty());
                for (i, c) in constraints.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}", c);
                }
                out.push('}');
            }
            Model::ReferenceTo { target, .. } => {
                let _ = write!(out, "ref {}", target);
            }
            Model::Array(c) | Model::List(c) | Model::Set(c) | Model::Map(c) => {
                let _ = write!(out, "{}[", self.get(id).kind());
                self.render_into(c.length, out, visiting);
                out.push_str("]{");
                for (i, &(k, v)) in c.elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(k, out, visiting);
                    out.push_str(": ");
                    self.render_into(v, out, visiting);
                }
                out.push('}');
            }
            Model::Assemble {
                instantiation,
                modifications,
                ..
            } => {
                let calls = instantiation.iter().chain(modifications);
                for (i, call) in calls.enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    let _ = write!(out, "{}(", call.method.id);
                    for (j, &arg) in call.args.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        self.render_into(arg, out, visiting);
                    }
                    out.push(')');
                }
            }
        }
        visiting.remove(&id);
    }
}

/// Models of the requested values of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ResolvedModels {
    pub arena: ModelArena,
    pub parameters: Vec<ModelId>,
    pub statics: BTreeMap<FieldId, ModelId>,
}

impl ResolvedModels {
    pub fn parameter(&self, index: usize) -> Option<&Model> {
        self.parameters.get(index).map(|&id| self.arena.get(id))
    }
}

/// Pre-call and post-call models of one execution.
#[derive(Debug, Clone)]
pub struct ConstrainedExecution {
    pub before: ResolvedModels,
    pub after: ResolvedModels,
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::{ClassId, Ty};

    fn node_ty() -> Ty {
        Ty::array_of(Ty::Object(ClassId::new("Node")))
    }

    #[test]
    fn test_reserve_then_set() {
        let mut arena = ModelArena::new();
        let id = arena.reserve();
        assert!(arena.try_get(id).is_none());
        arena.set(
            id,
            Model::Null {
                variable: Variable::null(),
            },
        );
        assert!(arena.get(id).is_null());
        assert_eq!(arena.iter().count(), 1);
    }

    #[test]
    #[should_panic]
    fn test_double_set_panics() {
        let mut arena = ModelArena::new();
        let id = arena.alloc(Model::Null {
            variable: Variable::null(),
        });
        arena.set(
            id,
            Model::Null {
                variable: Variable::null(),
            },
        );
    }

    #[test]
    fn test_import_preserves_cycle() {
        let mut arena = ModelArena::new();
        let a = Variable::param("a", node_ty());
        let root = arena.reserve();
        let len = arena.alloc(Model::Primitive {
            variable: Variable::array_length(a.clone()),
            concrete: Value::int(1),
            constraints: BTreeSet::new(),
        });
        let idx = arena.alloc(Model::Primitive {
            variable: Variable::int(0),
            concrete: Value::int(0),
            constraints: BTreeSet::new(),
        });
        let back = arena.alloc(Model::ReferenceTo {
            variable: Variable::array_access(a.clone(), Variable::int(0), node_ty()),
            target: root,
        });
        arena.set(
            root,
            Model::Array(ContainerModel {
                variable: a,
                length: len,
                elements: vec![(idx, back)],
                constraints: BTreeSet::new(),
            }),
        );

        let mut other = ModelArena::new();
        other.alloc(Model::Null {
            variable: Variable::null(),
        });
        let copied = other.import(&arena, root);
        assert_eq!(other.len(), 5);
        let container = other.get(copied).container().cloned().unwrap();
        let (_, element) = container.elements[0];
        assert_eq!(other.deref(element), copied);
        assert_eq!(other.render(copied), "array[1]{0: ref @1}");
    }
}
