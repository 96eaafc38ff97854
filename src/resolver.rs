//! Constraint-to-model resolution.
//!
//! The [`ConstraintResolver`] turns a satisfying [`Assignment`] plus the path
//! constraints of an [`ExecutionState`] into [`Model`]s of requested symbolic
//! values. One call runs one *pass* over one heap snapshot:
//!
//! 1. The atoms of the snapshot are selected. The INITIAL view is the hard path
//!    constraints (plus soft ones when enabled). The CURRENT view drops every
//!    atom that reads an overwritten heap location and adds one equality per
//!    surviving heap write.
//! 2. Every reference-typed sub-term of those atoms is evaluated, and terms are
//!    grouped by concrete address into alias classes.
//! 3. Each requested value is resolved by kind. Object-like results are
//!    memoized by address *before* their elements are resolved, so cyclic and
//!    shared structure comes out as [`Model::ReferenceTo`] links.
//!
//! The per-pass memo table is cleared when the pass ends; two passes never
//! share models.
//!
//! # Arrays
//!
//! The length comes from an `ArrayLength` atom (or the configured default).
//! Index terms are evaluated, filtered to `0 <= index < length`, and grouped by
//! concrete value. Each group gets a synthetic index variable
//! `"{array}_index{n}"` constrained to equal every index term of the group and
//! to lie within bounds.
//!
//! # Wrapper containers
//!
//! A reference with a list or set hint is unpacked through its element-holder
//! field and then the holder's storage array. Lists are densified to exactly
//! `length` entries, with missing slots reading as null. Sets stay sparse. Maps
//! read keys from the storage array and values from the holder's value array;
//! a key without a value reads as null, or as the default of a primitive value
//! type. If the holder or the storage was never touched on the path, the
//! wrapper degrades to a plain object model.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use log::debug;
use num_bigint::BigInt;

use crate::cache::MemoCache;
use crate::config::Settings;
use crate::expr::{Constraint, Value, Variable};
use crate::model::{ConstrainedExecution, ContainerModel, Model, ModelArena, ModelId, ResolvedModels};
use crate::solver::Assignment;
use crate::state::{ConcreteHint, ExecutionState, HeapWrite, Memory, MemoryState, SymbolicValue};
use crate::types::{Address, ClassId, FieldId, Ty};

/// A concrete heap location.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum HeapKey {
    Field(Address, FieldId),
    Element(Address, BigInt),
    Length(Address),
}

pub struct ConstraintResolver {
    settings: Rc<Settings>,
    resolved: MemoCache<Address, ModelId>,
}

impl ConstraintResolver {
    pub fn new(settings: Rc<Settings>) -> Self {
        Self {
            settings,
            resolved: MemoCache::new("resolver"),
        }
    }

    /// Resolves `values` against one snapshot of `state`.
    pub fn resolve(
        &mut self,
        state: &ExecutionState,
        assignment: &Assignment,
        memory_state: MemoryState,
        values: &[SymbolicValue],
    ) -> ResolvedModels {
        let mut pass = Pass::new(&self.settings, &mut self.resolved, state, assignment, memory_state);
        let parameters = values.iter().map(|v| pass.resolve_value(v)).collect();
        pass.finish(parameters, BTreeMap::new())
    }

    /// Resolves `parameters` and the static fields touched by `state`, once
    /// against the pre-call heap and once against the post-call heap.
    pub fn resolve_both_snapshots(
        &mut self,
        state: &ExecutionState,
        assignment: &Assignment,
        parameters: &[SymbolicValue],
    ) -> ConstrainedExecution {
        let before = {
            let mut pass = Pass::new(&self.settings, &mut self.resolved, state, assignment, MemoryState::Initial);
            let params = parameters.iter().map(|v| pass.resolve_value(v)).collect();
            let mut statics = BTreeMap::new();
            for (field, value) in state.memory.statics() {
                let id = pass.with_static_field(field, |pass| pass.resolve_value(&value.before));
                statics.insert(field.clone(), id);
            }
            pass.finish(params, statics)
        };
        let after = {
            let mut pass = Pass::new(&self.settings, &mut self.resolved, state, assignment, MemoryState::Current);
            let params = parameters.iter().map(|v| pass.resolve_value(v)).collect();
            let mut statics = BTreeMap::new();
            for (field, value) in state.memory.statics() {
                statics.insert(field.clone(), pass.resolve_value(&value.after));
            }
            pass.finish(params, statics)
        };
        ConstrainedExecution { before, after }
    }
}

/// One resolution pass over one snapshot.
struct Pass<'a> {
    settings: &'a Settings,
    resolved: &'a mut MemoCache<Address, ModelId>,
    assignment: &'a Assignment,
    memory_state: MemoryState,
    static_field: Option<FieldId>,
    atoms: Vec<Constraint>,
    aliases: HashMap<Address, BTreeSet<Variable>>,
    /// Initial-heap read terms by concrete location, for evaluating rewritten terms.
    reads: HashMap<HeapKey, Variable>,
    /// Latest written value per concrete location.
    writes: HashMap<HeapKey, Variable>,
    /// Synthetic terms to the actual terms they stand for.
    back_mapping: HashMap<Variable, Variable>,
    arena: ModelArena,
}

impl<'a> Pass<'a> {
    fn new(
        settings: &'a Settings,
        resolved: &'a mut MemoCache<Address, ModelId>,
        state: &ExecutionState,
        assignment: &'a Assignment,
        memory_state: MemoryState,
    ) -> Self {
        resolved.clear();
        let mut pass = Pass {
            settings,
            resolved,
            assignment,
            memory_state,
            static_field: None,
            atoms: Vec::new(),
            aliases: HashMap::new(),
            reads: HashMap::new(),
            writes: HashMap::new(),
            back_mapping: HashMap::new(),
            arena: ModelArena::new(),
        };
        let path: Vec<Constraint> = state.path.atoms(settings.use_soft_constraints).cloned().collect();
        for atom in &path {
            for v in atom.variables() {
                if let Some(key) = pass.heap_key(v, false) {
                    pass.reads.entry(key).or_insert_with(|| v.clone());
                }
            }
        }
        let latest = pass.latest_writes(&state.memory);
        for (key, write) in &latest {
            pass.writes.insert(key.clone(), write.value().clone());
        }
        let atoms = match memory_state {
            MemoryState::Initial | MemoryState::StaticInitial => path,
            MemoryState::Current => {
                let overwritten = |atom: &Constraint| {
                    atom.variables()
                        .into_iter()
                        .any(|v| pass.heap_key(v, false).map_or(false, |k| pass.writes.contains_key(&k)))
                };
                let mut atoms: Vec<Constraint> = path.iter().filter(|a| !overwritten(a)).cloned().collect();
                for (_, write) in &latest {
                    let atom = Constraint::eq(write.location(), write.value().clone());
                    if !atoms.contains(&atom) {
                        atoms.push(atom);
                    }
                }
                atoms
            }
        };
        pass.atoms = atoms;
        let mut aliases: HashMap<Address, BTreeSet<Variable>> = HashMap::new();
        for atom in &pass.atoms {
            for v in atom.variables() {
                if !v.is_reference() || v.is_const() {
                    continue;
                }
                if let Some(addr) = pass.eval(v).and_then(|x| x.as_addr()) {
                    aliases.entry(addr).or_default().insert(v.clone());
                }
            }
        }
        pass.aliases = aliases;
        debug!(
            "resolution pass ({:?}): {} atoms, {} alias classes, {} writes",
            memory_state,
            pass.atoms.len(),
            pass.aliases.len(),
            pass.writes.len()
        );
        pass
    }

    fn finish(self, parameters: Vec<ModelId>, statics: BTreeMap<FieldId, ModelId>) -> ResolvedModels {
        self.resolved.clear();
        ResolvedModels {
            arena: self.arena,
            parameters,
            statics,
        }
    }

    /// Runs `f` in the STATIC_INITIAL snapshot while `field` is being resolved.
    fn with_static_field<R>(&mut self, field: &FieldId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved_state = std::mem::replace(&mut self.memory_state, MemoryState::StaticInitial);
        let saved_field = self.static_field.replace(field.clone());
        let result = f(self);
        self.static_field = saved_field;
        self.memory_state = saved_state;
        result
    }

    fn is_current(&self) -> bool {
        self.memory_state == MemoryState::Current
    }

    /// Writes in program order, keeping only the latest write per location.
    fn latest_writes(&self, memory: &Memory) -> Vec<(HeapKey, HeapWrite)> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for write in memory.writes().iter().rev() {
            let key = match write {
                HeapWrite::Field { instance, field, .. } => self
                    .eval_with(instance, false)
                    .and_then(|v| v.as_addr())
                    .map(|a| HeapKey::Field(a, field.clone())),
                HeapWrite::Array { array, index, .. } => {
                    let addr = self.eval_with(array, false).and_then(|v| v.as_addr());
                    let index = self.eval_with(index, false).and_then(|v| v.as_int().cloned());
                    addr.zip(index).map(|(a, i)| HeapKey::Element(a, i))
                }
            };
            match key {
                Some(key) if seen.insert(key.clone()) => result.push((key, write.clone())),
                Some(_) => {}
                None => debug!("skipping write to unresolved location {}", write.location()),
            }
        }
        result.reverse();
        result
    }

    fn heap_key(&self, variable: &Variable, current: bool) -> Option<HeapKey> {
        match variable {
            Variable::Field { instance, field } => {
                let addr = self.eval_with(instance, current)?.as_addr()?;
                Some(HeapKey::Field(addr, field.clone()))
            }
            Variable::ArrayAccess { array, index, .. } => {
                let addr = self.eval_with(array, current)?.as_addr()?;
                let index = self.eval_with(index, current)?.as_int()?.clone();
                Some(HeapKey::Element(addr, index))
            }
            Variable::ArrayLength(array) => {
                let addr = self.eval_with(array, current)?.as_addr()?;
                Some(HeapKey::Length(addr))
            }
            _ => None,
        }
    }

    fn eval(&self, variable: &Variable) -> Option<Value> {
        self.eval_with(variable, self.is_current())
    }

    fn eval_with(&self, variable: &Variable, current: bool) -> Option<Value> {
        if let Some(actual) = self.back_mapping.get(variable) {
            return self.eval_with(actual, current);
        }
        if let Variable::Const(value) = variable {
            return Some(value.clone());
        }
        let key = self.heap_key(variable, current);
        if current {
            if let Some(value) = key.as_ref().and_then(|k| self.writes.get(k)) {
                return self.eval_with(value, false);
            }
        }
        self.assignment.eval(variable).or_else(|| {
            let actual = self.reads.get(key.as_ref()?)?;
            self.assignment.eval(actual)
        })
    }

    fn eval_usize(&self, variable: &Variable) -> Option<usize> {
        self.eval(variable).and_then(|v| v.as_usize())
    }

    fn resolve_value(&mut self, value: &SymbolicValue) -> ModelId {
        if let Some(field) = &self.static_field {
            debug!("resolving {} as the initial value of {}", value.variable(), field);
        }
        match value {
            SymbolicValue::Primitive { expr } => {
                let atoms = self.atoms.clone();
                self.resolve_primitive(expr, &atoms)
            }
            SymbolicValue::Reference { addr, hint } => self.resolve_reference(addr, *hint),
        }
    }

    fn resolve_primitive(&mut self, variable: &Variable, scope: &[Constraint]) -> ModelId {
        let concrete = self.eval(variable).unwrap_or_else(|| Value::default_for(&variable.ty()));
        let constraints = scope.iter().filter(|a| a.mentions(variable)).cloned().collect();
        self.arena.alloc(Model::Primitive {
            variable: variable.clone(),
            concrete,
            constraints,
        })
    }

    /// Atoms mentioning `variable` or any of its aliases.
    fn local_atoms(&self, variable: &Variable, aliases: &BTreeSet<Variable>) -> Vec<Constraint> {
        self.atoms
            .iter()
            .filter(|atom| atom.mentions(variable) || atom.mentions_any(aliases.iter()))
            .cloned()
            .collect()
    }

    /// `atoms` with every alias renamed to `variable`.
    fn canonical(atoms: &[Constraint], variable: &Variable, aliases: &BTreeSet<Variable>) -> BTreeSet<Constraint> {
        let mapping: HashMap<Variable, Variable> = aliases
            .iter()
            .filter(|a| *a != variable)
            .map(|a| (a.clone(), variable.clone()))
            .collect();
        atoms.iter().map(|atom| atom.substitute(&mapping)).collect()
    }

    fn resolve_reference(&mut self, variable: &Variable, hint: Option<ConcreteHint>) -> ModelId {
        let Some(addr) = self.eval(variable).and_then(|v| v.as_addr()) else {
            debug!("no address for {}, resolving as a plain object", variable);
            let constraints = self.local_atoms(variable, &BTreeSet::new()).into_iter().collect();
            return self.arena.alloc(Model::Object {
                variable: variable.clone(),
                constraints,
            });
        };
        if addr.is_null() {
            return self.arena.alloc(Model::Null {
                variable: variable.clone(),
            });
        }
        if let Some(target) = self.resolved.get(&addr) {
            return self.arena.alloc(Model::ReferenceTo {
                variable: variable.clone(),
                target,
            });
        }

        let id = self.arena.reserve();
        self.resolved.insert(addr, id);

        let mut aliases = self.aliases.get(&addr).cloned().unwrap_or_default();
        aliases.insert(variable.clone());
        let raw = self.local_atoms(variable, &aliases);
        let atoms = Self::canonical(&raw, variable, &aliases);

        let model = if variable.is_array() {
            Model::Array(self.resolve_array(variable, &aliases, &raw, atoms))
        } else {
            match hint {
                Some(ConcreteHint::List) | Some(ConcreteHint::Set) => self.resolve_wrapper(variable, hint, &raw, atoms),
                Some(ConcreteHint::Map) => self.resolve_map(variable, &raw, atoms),
                None => Model::Object {
                    variable: variable.clone(),
                    constraints: atoms,
                },
            }
        };
        self.arena.set(id, model);
        id
    }

    /// Resolves an array from its alias-local atoms: `raw` as they occur on the
    /// path, `atoms` renamed to `variable`.
    fn resolve_array(
        &mut self,
        variable: &Variable,
        aliases: &BTreeSet<Variable>,
        raw: &[Constraint],
        atoms: BTreeSet<Constraint>,
    ) -> ContainerModel {
        let elem_ty = match variable.ty() {
            Ty::Array(elem) => *elem,
            other => other,
        };

        let length_var = Variable::array_length(variable.clone());
        let length_reads: Vec<Variable> = aliases.iter().map(|a| Variable::array_length(a.clone())).collect();
        let has_length = raw.iter().any(|a| a.mentions_any(length_reads.iter()));
        let length = match self.eval(&length_var) {
            Some(v) if has_length => v.as_usize().unwrap_or(0),
            _ => self.settings.default_array_length,
        };
        let length_model = {
            let constraints = atoms.iter().filter(|a| a.mentions(&length_var)).cloned().collect();
            self.arena.alloc(Model::Primitive {
                variable: length_var.clone(),
                concrete: Value::int(length as i64),
                constraints,
            })
        };

        // Distinct element reads of this array, grouped by concrete index.
        let mut groups: BTreeMap<usize, Vec<(Variable, Variable)>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for atom in raw {
            for v in atom.variables() {
                let Variable::ArrayAccess { array, index, .. } = v else {
                    continue;
                };
                if !aliases.contains(&**array) || !seen.insert(v.clone()) {
                    continue;
                }
                match self.eval_usize(index) {
                    Some(i) if i < length => groups.entry(i).or_default().push(((**index).clone(), v.clone())),
                    _ => {}
                }
            }
        }

        let mut elements = Vec::with_capacity(groups.len());
        for (n, (concrete, reads)) in groups.into_iter().enumerate() {
            let index_var = Variable::local(&format!("{}_index{}", variable, n), Ty::Int);
            self.back_mapping.insert(index_var.clone(), reads[0].0.clone());

            let mut index_constraints: BTreeSet<Constraint> = reads
                .iter()
                .map(|(index, _)| Constraint::eq(index.clone(), index_var.clone()))
                .collect();
            index_constraints.insert(Constraint::ge(index_var.clone(), Variable::int(0)));
            index_constraints.insert(Constraint::lt(index_var.clone(), length_var.clone()));
            let index_model = self.arena.alloc(Model::Primitive {
                variable: index_var.clone(),
                concrete: Value::int(concrete as i64),
                constraints: index_constraints,
            });

            let elem_var = Variable::array_access(variable.clone(), index_var, elem_ty.clone());
            let element_model = if elem_ty.is_reference() {
                self.resolve_reference(&elem_var, None)
            } else {
                let mapping: HashMap<Variable, Variable> =
                    reads.iter().map(|(_, read)| (read.clone(), elem_var.clone())).collect();
                let elem_scope: Vec<Constraint> = raw.iter().map(|a| a.substitute(&mapping)).collect();
                self.resolve_primitive(&elem_var, &elem_scope)
            };
            elements.push((index_model, element_model));
        }

        ContainerModel {
            variable: variable.clone(),
            length: length_model,
            elements,
            constraints: atoms,
        }
    }

    /// Finds a field read named `name` on any term aliasing `instance`.
    fn find_field(&self, atoms: &[Constraint], instance: &Variable, name: &str) -> Option<Variable> {
        let addr = self.eval(instance).and_then(|v| v.as_addr());
        atoms
            .iter()
            .flat_map(|atom| atom.variables())
            .find_map(|v| match v {
                Variable::Field { instance: i, field } if &*field.name == name => {
                    let same = **i == *instance || (addr.is_some() && self.eval(i).and_then(|x| x.as_addr()) == addr);
                    same.then(|| Variable::field(instance.clone(), field.clone()))
                }
                _ => None,
            })
    }

    /// Resolves `holder.<name>` as an array, if that array is observable.
    fn resolve_storage(&mut self, atoms: &[Constraint], holder: &Variable, name: &str) -> Option<ContainerModel> {
        let storage = self.find_field(atoms, holder, name)?;
        let id = self.resolve_reference(&storage, None);
        let target = match self.arena.try_get(id)? {
            Model::ReferenceTo { target, .. } => *target,
            _ => id,
        };
        match self.arena.try_get(target)? {
            Model::Array(c) => Some(c.clone()),
            _ => None,
        }
    }

    fn degrade(&self, variable: &Variable, atoms: BTreeSet<Constraint>, what: &str) -> Model {
        debug!("{} of {} was not observed, resolving as a plain object", what, variable);
        Model::Object {
            variable: variable.clone(),
            constraints: atoms,
        }
    }

    fn resolve_wrapper(
        &mut self,
        variable: &Variable,
        hint: Option<ConcreteHint>,
        raw: &[Constraint],
        atoms: BTreeSet<Constraint>,
    ) -> Model {
        let settings = self.settings;
        let layout = &settings.container_layout;
        let Some(holder) = self.find_field(raw, variable, &layout.element_holder) else {
            return self.degrade(variable, atoms, "element holder");
        };
        let Some(storage) = self.resolve_storage(raw, &holder, &layout.storage) else {
            return self.degrade(variable, atoms, "storage");
        };

        if hint == Some(ConcreteHint::Set) {
            return Model::Set(ContainerModel {
                variable: variable.clone(),
                length: storage.length,
                elements: storage.elements,
                constraints: atoms,
            });
        }

        let length = self.arena.get(storage.length).concrete().and_then(|v| v.as_usize()).unwrap_or(0);
        let mut present: BTreeMap<usize, (ModelId, ModelId)> = BTreeMap::new();
        for &(index, element) in &storage.elements {
            if let Some(i) = self.arena.get(index).concrete().and_then(|v| v.as_usize()) {
                present.insert(i, (index, element));
            }
        }
        let elem_ty = storage
            .variable
            .ty()
            .element()
            .cloned()
            .unwrap_or_else(|| Ty::Object(ClassId::object()));
        let mut elements = Vec::with_capacity(length);
        for i in 0..length {
            let pair = match present.remove(&i) {
                Some(pair) => pair,
                None => self.null_slot(&storage.variable, i, &elem_ty),
            };
            elements.push(pair);
        }
        Model::List(ContainerModel {
            variable: variable.clone(),
            length: storage.length,
            elements,
            constraints: atoms,
        })
    }

    /// A zero-cost `index -> null` entry for an unset slot.
    fn null_slot(&mut self, array: &Variable, i: usize, elem_ty: &Ty) -> (ModelId, ModelId) {
        let index = self.arena.alloc(Model::Primitive {
            variable: Variable::int(i as i64),
            concrete: Value::int(i as i64),
            constraints: BTreeSet::new(),
        });
        let element = self.arena.alloc(Model::Null {
            variable: Variable::array_access(array.clone(), Variable::int(i as i64), elem_ty.clone()),
        });
        (index, element)
    }

    fn resolve_map(&mut self, variable: &Variable, raw: &[Constraint], atoms: BTreeSet<Constraint>) -> Model {
        let settings = self.settings;
        let layout = &settings.container_layout;
        let Some(holder) = self.find_field(raw, variable, &layout.element_holder) else {
            return self.degrade(variable, atoms, "element holder");
        };
        let Some(keys) = self.resolve_storage(raw, &holder, &layout.storage) else {
            return self.degrade(variable, atoms, "key storage");
        };
        let values = self.resolve_storage(raw, &holder, &layout.values);

        let mut by_index: HashMap<usize, ModelId> = HashMap::new();
        let value_ty = match &values {
            Some(values) => {
                for &(index, value) in &values.elements {
                    if let Some(i) = self.arena.get(index).concrete().and_then(|v| v.as_usize()) {
                        by_index.insert(i, value);
                    }
                }
                values.variable.ty().element().cloned()
            }
            None => None,
        };
        let value_ty = value_ty.unwrap_or_else(|| Ty::Object(ClassId::object()));
        let holder_class = holder.ty().class().cloned().unwrap_or_else(ClassId::object);
        let values_field = FieldId::new(holder_class, &layout.values, Ty::array_of(value_ty.clone()));
        let values_var = Variable::field(holder, values_field);

        let mut elements = Vec::with_capacity(keys.elements.len());
        for &(index, key) in &keys.elements {
            let Some(i) = self.arena.get(index).concrete().and_then(|v| v.as_usize()) else {
                continue;
            };
            let value = match by_index.get(&i) {
                Some(&value) => value,
                None if value_ty.is_primitive() => self.arena.alloc(Model::Primitive {
                    variable: Variable::array_access(values_var.clone(), Variable::int(i as i64), value_ty.clone()),
                    concrete: Value::default_for(&value_ty),
                    constraints: BTreeSet::new(),
                }),
                None => self.null_slot(&values_var, i, &value_ty).1,
            };
            elements.push((key, value));
        }
        Model::Map(ContainerModel {
            variable: variable.clone(),
            length: keys.length,
            elements,
            constraints: atoms,
        })
    }
}
