//! Execution states: the nodes of the exploration tree.

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::{Constraint, Variable};
use crate::solver::PathConstraints;
use crate::types::{Edge, FieldId, Location, MethodId, StateId, Ty};

/// Known runtime wrapper behind a reference, selecting specialized
/// reconstruction of its backing storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ConcreteHint {
    List,
    Set,
    Map,
}

/// A symbolic value held by a local, a parameter or a static field.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SymbolicValue {
    Primitive { expr: Variable },
    Reference { addr: Variable, hint: Option<ConcreteHint> },
}

impl SymbolicValue {
    pub fn primitive(expr: Variable) -> Self {
        SymbolicValue::Primitive { expr }
    }

    pub fn reference(addr: Variable) -> Self {
        SymbolicValue::Reference { addr, hint: None }
    }

    pub fn wrapper(addr: Variable, hint: ConcreteHint) -> Self {
        SymbolicValue::Reference { addr, hint: Some(hint) }
    }

    /// The term standing for this value in constraints.
    pub fn variable(&self) -> &Variable {
        match self {
            SymbolicValue::Primitive { expr } => expr,
            SymbolicValue::Reference { addr, .. } => addr,
        }
    }

    pub fn hint(&self) -> Option<ConcreteHint> {
        match self {
            SymbolicValue::Primitive { .. } => None,
            SymbolicValue::Reference { hint, .. } => *hint,
        }
    }

    pub fn ty(&self) -> Ty {
        self.variable().ty()
    }
}

/// Which heap snapshot field and array reads resolve against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryState {
    /// Pre-call heap.
    Initial,
    /// Post-call heap.
    Current,
    /// Pre-call heap, entered while resolving a static field.
    StaticInitial,
}

/// A heap write performed during execution.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum HeapWrite {
    Field { instance: Variable, field: FieldId, value: Variable },
    Array { array: Variable, index: Variable, value: Variable },
}

impl HeapWrite {
    /// The read term this write overrides.
    pub fn location(&self) -> Variable {
        match self {
            HeapWrite::Field { instance, field, .. } => Variable::field(instance.clone(), field.clone()),
            HeapWrite::Array { array, index, value } => {
                Variable::array_access(array.clone(), index.clone(), value.ty())
            }
        }
    }

    pub fn value(&self) -> &Variable {
        match self {
            HeapWrite::Field { value, .. } | HeapWrite::Array { value, .. } => value,
        }
    }
}

/// Values of a static field before and after the call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StaticFieldState {
    pub before: SymbolicValue,
    pub after: SymbolicValue,
}

/// Heap bookkeeping of a state: the writes layered over the initial heap.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Memory {
    writes: Vec<HeapWrite>,
    statics: BTreeMap<FieldId, StaticFieldState>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_field(&mut self, instance: Variable, field: FieldId, value: Variable) {
        self.writes.push(HeapWrite::Field { instance, field, value });
    }

    pub fn write_array(&mut self, array: Variable, index: Variable, value: Variable) {
        self.writes.push(HeapWrite::Array { array, index, value });
    }

    pub fn set_static(&mut self, field: FieldId, state: StaticFieldState) {
        self.statics.insert(field, state);
    }

    /// Writes in program order.
    pub fn writes(&self) -> &[HeapWrite] {
        &self.writes
    }

    pub fn statics(&self) -> impl Iterator<Item = (&FieldId, &StaticFieldState)> {
        self.statics.iter()
    }

    /// Rewrites every heap read in `variable` to the value currently stored,
    /// matching instances and indices syntactically. The latest write wins.
    ///
    /// A write through an alias term (`q.x` while reading `p.x`, with `p == q`
    /// only on the path) is not seen here, unlike in the resolver's CURRENT
    /// view, which matches by concrete address. Probe post-conditions and model
    /// scoring rely on the engine writing through the same term it reads back.
    pub fn current_read(&self, variable: &Variable) -> Variable {
        match variable {
            Variable::Field { instance, field } => {
                let instance = self.current_read(instance);
                let written = self.writes.iter().rev().find_map(|w| match w {
                    HeapWrite::Field { instance: i, field: f, value } if *i == instance && f == field => Some(value),
                    _ => None,
                });
                match written {
                    Some(value) => value.clone(),
                    None => Variable::field(instance, field.clone()),
                }
            }
            Variable::ArrayAccess { array, index, elem } => {
                let array = self.current_read(array);
                let index = self.current_read(index);
                let written = self.writes.iter().rev().find_map(|w| match w {
                    HeapWrite::Array { array: a, index: i, value } if *a == array && *i == index => Some(value),
                    _ => None,
                });
                match written {
                    Some(value) => value.clone(),
                    None => Variable::array_access(array, index, elem.clone()),
                }
            }
            Variable::ArrayLength(array) => Variable::array_length(self.current_read(array)),
            _ => variable.clone(),
        }
    }

    pub fn current_constraint(&self, constraint: &Constraint) -> Constraint {
        constraint.map(|v| self.current_read(v))
    }
}

/// One activation record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    pub method: MethodId,
    pub pc: usize,
    pub locals: BTreeMap<String, SymbolicValue>,
}

impl Frame {
    pub fn new(method: MethodId) -> Self {
        Frame {
            method,
            pc: 0,
            locals: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StateStatus {
    Running,
    Returned,
    Thrown,
}

/// A node of the exploration tree.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub id: StateId,
    pub location: Location,
    /// Edge through which this state was forked.
    pub last_edge: Option<Edge>,
    /// Branch indices taken from the root of the exploration tree.
    pub fork_path: Vec<u32>,
    pub stack: Vec<Frame>,
    pub memory: Memory,
    pub path: PathConstraints,
    /// Pre-call parameter values.
    pub parameters: Vec<SymbolicValue>,
    pub status: StateStatus,
    /// Constraints were added since the last feasibility check.
    pub pending_check: bool,
}

impl ExecutionState {
    pub fn new(id: StateId, location: Location) -> Self {
        ExecutionState {
            id,
            location,
            last_edge: None,
            fork_path: Vec::new(),
            stack: Vec::new(),
            memory: Memory::new(),
            path: PathConstraints::new(),
            parameters: Vec::new(),
            status: StateStatus::Running,
            pending_check: false,
        }
    }

    /// Forks a child along `branch`, moving it to `to`.
    pub fn fork(&self, id: StateId, branch: u32, to: Location) -> ExecutionState {
        let mut child = self.clone();
        child.id = id;
        child.last_edge = Some(Edge::new(self.location, to));
        child.location = to;
        child.fork_path.push(branch);
        child.pending_check = false;
        child
    }

    pub fn depth(&self) -> usize {
        self.fork_path.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.status != StateStatus::Running
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.path.add_hard(constraint);
        self.pending_check = true;
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    /// Looks a local up in the innermost frame.
    pub fn local(&self, name: &str) -> Option<&SymbolicValue> {
        self.frame()?.locals.get(name)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (depth {})", self.id, self.location, self.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassId, StateIdGen};

    #[test]
    fn test_fork_records_edge_and_path() {
        let mut ids = StateIdGen::new();
        let root = ExecutionState::new(ids.fresh(), Location::new(0));
        let child = root.fork(ids.fresh(), 1, Location::new(3));
        assert_eq!(child.last_edge, Some(Edge::new(Location::new(0), Location::new(3))));
        assert_eq!(child.fork_path, vec![1]);
        assert_eq!(child.depth(), 1);
        assert_ne!(child.id, root.id);
    }

    #[test]
    fn test_current_read_latest_write_wins() {
        let class = ClassId::new("A");
        let x = FieldId::new(class.clone(), "x", Ty::Int);
        let r = Variable::local("r", Ty::Object(class));
        let mut memory = Memory::new();
        memory.write_field(r.clone(), x.clone(), Variable::int(0));
        memory.write_field(r.clone(), x.clone(), Variable::param("v", Ty::Int));

        let read = memory.current_read(&Variable::field(r.clone(), x.clone()));
        assert_eq!(read, Variable::param("v", Ty::Int));

        let other = Variable::local("o", r.ty());
        let untouched = memory.current_read(&Variable::field(other.clone(), x.clone()));
        assert_eq!(untouched, Variable::field(other, x));
    }

    #[test]
    fn test_current_read_ignores_aliases() {
        let class = ClassId::new("A");
        let x = FieldId::new(class.clone(), "x", Ty::Int);
        let p = Variable::param("p", Ty::Object(class.clone()));
        let q = Variable::param("q", Ty::Object(class));
        let mut memory = Memory::new();
        memory.write_field(q.clone(), x.clone(), Variable::int(7));

        let read = Variable::field(p, x.clone());
        assert_eq!(memory.current_read(&read), read);
        assert_eq!(memory.current_read(&Variable::field(q, x)), Variable::int(7));

        let a = Variable::param("a", Ty::array_of(Ty::Int));
        let i = Variable::param("i", Ty::Int);
        let j = Variable::param("j", Ty::Int);
        memory.write_array(a.clone(), i, Variable::int(1));
        let element = Variable::array_access(a, j, Ty::Int);
        assert_eq!(memory.current_read(&element), element);
    }

    #[test]
    fn test_add_constraint_marks_pending() {
        let mut state = ExecutionState::new(StateId::new(0), Location::new(0));
        assert!(!state.pending_check);
        state.add_constraint(Constraint::eq(Variable::param("a", Ty::Int), Variable::int(1)));
        assert!(state.pending_check);
        assert_eq!(state.path.hard.len(), 1);
    }
}
