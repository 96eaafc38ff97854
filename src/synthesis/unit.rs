use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::model::{Model, ModelArena, ModelId};
use crate::types::{MethodSig, Ty};

use super::catalog::MethodCatalog;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ContainerKind {
    Array,
    List,
    Set,
    Map,
}

/// A partial construction plan for one value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SynthesisUnit {
    Null {
        ty: Ty,
    },
    /// A value still to be produced. Primitive placeholders are final: they
    /// become probe parameters.
    Object {
        ty: Ty,
    },
    /// A call producing the value. For instance methods `params[0]` is the
    /// receiver, which is also the produced value.
    Method {
        method: Rc<MethodSig>,
        params: Vec<SynthesisUnit>,
    },
    /// A container whose length and entries are the target models listed here;
    /// their units live in the [`UnitContext`].
    Container {
        kind: ContainerKind,
        ty: Ty,
        length: ModelId,
        elements: Vec<(ModelId, ModelId)>,
    },
    /// The value built for another root of the same cluster.
    ReferenceTo {
        ty: Ty,
        root: usize,
    },
}

impl SynthesisUnit {
    pub fn ty(&self) -> Ty {
        match self {
            SynthesisUnit::Null { ty }
            | SynthesisUnit::Object { ty }
            | SynthesisUnit::Container { ty, .. }
            | SynthesisUnit::ReferenceTo { ty, .. } => ty.clone(),
            SynthesisUnit::Method { method, .. } => method.produced_ty(),
        }
    }

    /// One-step refinements of the first undefined leaf.
    ///
    /// Containers are refined through the context, so they yield nothing here.
    pub fn expand(&self, catalog: &MethodCatalog) -> Vec<SynthesisUnit> {
        match self {
            SynthesisUnit::Object { ty } if ty.is_primitive() => Vec::new(),
            SynthesisUnit::Object { ty } => {
                let mut result = vec![SynthesisUnit::Null { ty: ty.clone() }];
                result.extend(catalog.expand(ty));
                result
            }
            SynthesisUnit::Method { method, params } => {
                for (i, param) in params.iter().enumerate() {
                    let leaves = param.expand(catalog);
                    if !leaves.is_empty() {
                        return leaves
                            .into_iter()
                            .map(|leaf| {
                                let mut params = params.clone();
                                params[i] = leaf;
                                SynthesisUnit::Method {
                                    method: Rc::clone(method),
                                    params,
                                }
                            })
                            .collect();
                    }
                }
                Vec::new()
            }
            SynthesisUnit::Null { .. } | SynthesisUnit::ReferenceTo { .. } | SynthesisUnit::Container { .. } => {
                Vec::new()
            }
        }
    }
}

impl fmt::Display for SynthesisUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisUnit::Null { ty } => write!(f, "null:{}", ty),
            SynthesisUnit::Object { ty } => write!(f, "?{}", ty),
            SynthesisUnit::Method { method, params } => {
                write!(f, "{}(", method.id)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
            SynthesisUnit::Container { kind, ty, elements, .. } => {
                write!(f, "{:?}<{}>[{} entries]", kind, ty, elements.len())
            }
            SynthesisUnit::ReferenceTo { root, .. } => write!(f, "root#{}", root),
        }
    }
}

/// Units of one cluster of target models, keyed by target model.
///
/// Immutable: refining a unit yields a new context.
#[derive(Debug, Clone)]
pub struct UnitContext {
    targets: Rc<ModelArena>,
    roots: Rc<[ModelId]>,
    units: BTreeMap<ModelId, SynthesisUnit>,
}

impl UnitContext {
    pub fn new(targets: Rc<ModelArena>, roots: &[ModelId]) -> Self {
        Self {
            targets,
            roots: Rc::from(roots),
            units: BTreeMap::new(),
        }
    }

    pub fn targets(&self) -> &Rc<ModelArena> {
        &self.targets
    }

    pub fn roots(&self) -> &[ModelId] {
        &self.roots
    }

    /// Current unit of `model`, its initial unit if never refined.
    pub fn unit(&self, model: ModelId) -> SynthesisUnit {
        match self.units.get(&model) {
            Some(unit) => unit.clone(),
            None => self.initial_unit(model),
        }
    }

    pub fn root_units(&self) -> Vec<SynthesisUnit> {
        self.roots.iter().map(|&r| self.unit(r)).collect()
    }

    fn initial_unit(&self, model: ModelId) -> SynthesisUnit {
        let container = |kind, c: &crate::model::ContainerModel| SynthesisUnit::Container {
            kind,
            ty: c.variable.ty(),
            length: c.length,
            elements: c.elements.clone(),
        };
        match self.targets.get(model) {
            Model::Null { variable } => SynthesisUnit::Null { ty: variable.ty() },
            Model::Primitive { variable, .. } | Model::Object { variable, .. } | Model::Assemble { variable, .. } => {
                SynthesisUnit::Object { ty: variable.ty() }
            }
            Model::Array(c) => container(ContainerKind::Array, c),
            Model::List(c) => container(ContainerKind::List, c),
            Model::Set(c) => container(ContainerKind::Set, c),
            Model::Map(c) => container(ContainerKind::Map, c),
            Model::ReferenceTo { variable, target } => {
                let target = self.targets.deref(*target);
                match self.roots.iter().position(|&r| r == target) {
                    Some(root) => SynthesisUnit::ReferenceTo {
                        ty: variable.ty(),
                        root,
                    },
                    // Sharing with a non-root value is not reproduced.
                    None => SynthesisUnit::Object { ty: variable.ty() },
                }
            }
        }
    }

    pub fn with(&self, model: ModelId, unit: SynthesisUnit) -> UnitContext {
        let mut units = self.units.clone();
        units.insert(model, unit);
        UnitContext {
            targets: Rc::clone(&self.targets),
            roots: Rc::clone(&self.roots),
            units,
        }
    }

    pub fn is_fully_defined(&self) -> bool {
        self.roots.iter().all(|&r| self.is_defined(&self.unit(r)))
    }

    pub fn is_defined(&self, unit: &SynthesisUnit) -> bool {
        match unit {
            SynthesisUnit::Null { .. } | SynthesisUnit::ReferenceTo { .. } => true,
            SynthesisUnit::Object { ty } => ty.is_primitive(),
            SynthesisUnit::Method { params, .. } => params.iter().all(|p| self.is_defined(p)),
            SynthesisUnit::Container { length, elements, .. } => {
                self.is_defined(&self.unit(*length))
                    && elements
                        .iter()
                        .all(|&(k, v)| self.is_defined(&self.unit(k)) && self.is_defined(&self.unit(v)))
            }
        }
    }

    /// Total number of constructor and method calls of the plan.
    pub fn call_count(&self) -> usize {
        self.roots.iter().map(|&r| self.calls_of(&self.unit(r))).sum()
    }

    fn calls_of(&self, unit: &SynthesisUnit) -> usize {
        match unit {
            SynthesisUnit::Null { .. } | SynthesisUnit::Object { .. } | SynthesisUnit::ReferenceTo { .. } => 0,
            SynthesisUnit::Method { params, .. } => 1 + params.iter().map(|p| self.calls_of(p)).sum::<usize>(),
            SynthesisUnit::Container { elements, .. } => elements
                .iter()
                .map(|&(k, v)| self.calls_of(&self.unit(k)) + self.calls_of(&self.unit(v)))
                .sum(),
        }
    }

    /// Contexts refining the first undefined leaf of the first undefined root.
    pub fn expand(&self, catalog: &MethodCatalog) -> Vec<UnitContext> {
        for &root in self.roots.iter() {
            let next = self.expand_model(root, catalog);
            if !next.is_empty() {
                return next;
            }
        }
        Vec::new()
    }

    fn expand_model(&self, model: ModelId, catalog: &MethodCatalog) -> Vec<UnitContext> {
        match self.unit(model) {
            SynthesisUnit::Container { length, elements, .. } => {
                let mut next = self.expand_model(length, catalog);
                for (k, v) in elements {
                    if !next.is_empty() {
                        break;
                    }
                    next = self.expand_model(k, catalog);
                    if next.is_empty() {
                        next = self.expand_model(v, catalog);
                    }
                }
                next
            }
            unit => unit.expand(catalog).into_iter().map(|u| self.with(model, u)).collect(),
        }
    }
}

impl fmt::Display for UnitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, unit) in self.root_units().iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", unit)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::expr::{Constraint, Value, Variable};
    use crate::model::ContainerModel;
    use crate::types::{ClassId, FieldId};

    fn foo() -> ClassId {
        ClassId::new("Foo")
    }

    fn catalog() -> MethodCatalog {
        MethodCatalog::new([
            MethodSig::constructor(foo(), vec![]),
            MethodSig::instance(foo(), "setX", vec![Ty::Int], Ty::Void),
        ])
    }

    fn object_target() -> (Rc<ModelArena>, ModelId) {
        let p = Variable::param("p", Ty::Object(foo()));
        let x = FieldId::new(foo(), "x", Ty::Int);
        let mut arena = ModelArena::new();
        let id = arena.alloc(Model::Object {
            variable: p.clone(),
            constraints: BTreeSet::from([Constraint::eq(Variable::field(p, x), Variable::int(5))]),
        });
        (Rc::new(arena), id)
    }

    #[test]
    fn test_object_placeholder_expansion() {
        let (targets, root) = object_target();
        let context = UnitContext::new(targets, &[root]);
        assert!(!context.is_fully_defined());
        assert_eq!(context.call_count(), 0);

        let next = context.expand(&catalog());
        let rendered: Vec<String> = next.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, ["[null:Foo]", "[Foo.<init>()]", "[Foo.setX(?Foo, ?int)]"]);
        assert!(next[0].is_fully_defined());
        assert!(next[1].is_fully_defined());
        assert!(!next[2].is_fully_defined());
        assert_eq!(next[2].call_count(), 1);
    }

    #[test]
    fn test_method_expands_first_undefined_param_only() {
        let (targets, root) = object_target();
        let context = UnitContext::new(targets, &[root]);
        let catalog = catalog();
        let setter = context.expand(&catalog).remove(2);
        let next = setter.expand(&catalog);
        let rendered: Vec<String> = next.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            [
                "[Foo.setX(null:Foo, ?int)]",
                "[Foo.setX(Foo.<init>(), ?int)]",
                "[Foo.setX(Foo.setX(?Foo, ?int), ?int)]",
            ]
        );
        assert_eq!(next[1].call_count(), 2);
        assert!(next[1].is_fully_defined());
    }

    #[test]
    fn test_reference_to_root_and_containers() {
        let elem = Ty::Object(foo());
        let a = Variable::param("a", Ty::array_of(elem.clone()));
        let mut arena = ModelArena::new();
        let root = arena.reserve();
        let length = arena.alloc(Model::Primitive {
            variable: Variable::array_length(a.clone()),
            concrete: Value::int(1),
            constraints: BTreeSet::new(),
        });
        let index = arena.alloc(Model::Primitive {
            variable: Variable::local("a_index0", Ty::Int),
            concrete: Value::int(0),
            constraints: BTreeSet::new(),
        });
        let element = arena.alloc(Model::Object {
            variable: Variable::local("e", elem),
            constraints: BTreeSet::new(),
        });
        arena.set(
            root,
            Model::Array(ContainerModel {
                variable: a.clone(),
                length,
                elements: vec![(index, element)],
                constraints: BTreeSet::new(),
            }),
        );
        let alias = arena.alloc(Model::ReferenceTo {
            variable: Variable::param("b", a.ty()),
            target: root,
        });
        let context = UnitContext::new(Rc::new(arena), &[root, alias]);

        assert_eq!(context.unit(alias), SynthesisUnit::ReferenceTo { ty: a.ty(), root: 0 });
        assert!(!context.is_fully_defined());
        // The placeholder element is the only undefined leaf.
        let next = context.expand(&catalog());
        assert_eq!(next.len(), 3);
        assert!(next[0].is_fully_defined());
        assert!(next[1].is_fully_defined());
        assert!(!next[2].is_fully_defined());
        assert_eq!(next[1].call_count(), 1);
        assert_eq!(next[1].unit(element).to_string(), "Foo.<init>()");
    }
}
