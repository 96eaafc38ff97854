use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

use crate::explorer::{ProbeEngine, SymbolicEngine};
use crate::expr::{Constraint, Relation, Variable};
use crate::graph::ProgramGraph;
use crate::state::{ConcreteHint, ExecutionState, Frame, StateStatus, SymbolicValue};
use crate::synthesis::{ContainerKind, MethodCatalog, ProbeMethod, ProbeStmt};
use crate::types::{Edge, FieldId, Location, MethodId, MethodSig, StateId, StateIdGen, Ty};

/// Walks a [`ProgramGraph`], forking at every branch.
///
/// Edges may carry guard constraints added to the state that takes them.
/// States reaching an exit location return.
pub struct GraphWalker {
    graph: Rc<ProgramGraph>,
    guards: HashMap<Edge, Vec<Constraint>>,
}

impl GraphWalker {
    pub fn new(graph: Rc<ProgramGraph>) -> Self {
        Self {
            graph,
            guards: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &Rc<ProgramGraph> {
        &self.graph
    }

    pub fn guard(mut self, from: u32, to: u32, constraint: Constraint) -> Self {
        let edge = Edge::new(Location::new(from), Location::new(to));
        self.guards.entry(edge).or_default().push(constraint);
        self
    }

    /// Entry state at location `0`.
    pub fn initial(&self, ids: &mut StateIdGen) -> ExecutionState {
        let mut state = ExecutionState::new(ids.fresh(), Location::new(0));
        state.stack.push(Frame::new(MethodId::new("main")));
        state
    }
}

impl SymbolicEngine for GraphWalker {
    fn step(&mut self, state: &ExecutionState, ids: &mut StateIdGen) -> Vec<ExecutionState> {
        let mut children = Vec::new();
        for (branch, &to) in self.graph.successors(state.location).iter().enumerate() {
            let mut child = state.fork(ids.fresh(), branch as u32, to);
            if let Some(guards) = self.guards.get(&Edge::new(state.location, to)) {
                for guard in guards {
                    child.add_constraint(guard.clone());
                }
            }
            if self.graph.is_exit(to) {
                child.status = StateStatus::Returned;
            }
            children.push(child);
        }
        children
    }
}

/// Effect of a toy method on its receiver.
#[derive(Debug, Clone)]
pub enum ToyOp {
    /// `this.field = args[arg]`
    SetFieldFromArg { field: FieldId, arg: usize },
    /// `this.field = value`
    SetFieldConst { field: FieldId, value: i64 },
    /// Throws unless `args[arg] <relation> value`.
    Require { arg: usize, relation: Relation, value: i64 },
}

#[derive(Debug, Clone)]
pub struct ToyMethod {
    pub sig: Rc<MethodSig>,
    pub body: Vec<ToyOp>,
}

/// Executes probe methods over a fixed set of toy methods.
///
/// Constructors and static factories allocate a fresh non-null object and run
/// their ops on it. Calls on a possibly null receiver fork a throwing sibling.
/// Containers are arrays: stores are bounds-checked against the length.
#[derive(Debug, Default)]
pub struct ToyEngine {
    methods: Vec<ToyMethod>,
    probe: Option<ProbeMethod>,
}

impl ToyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, sig: MethodSig, body: Vec<ToyOp>) -> Self {
        self.methods.push(ToyMethod { sig: Rc::new(sig), body });
        self
    }

    /// Catalog of every known method, in registration order.
    pub fn catalog(&self) -> MethodCatalog {
        MethodCatalog::new(self.methods.iter().map(|m| (*m.sig).clone()))
    }

    fn method(&self, sig: &MethodSig) -> Option<&ToyMethod> {
        self.methods.iter().find(|m| m.sig.id == sig.id)
    }

    /// Runs `method` on `this`, pushing throwing siblings of `state` to
    /// `thrown`.
    fn invoke(
        &self,
        method: &MethodSig,
        this: &Variable,
        args: &[Variable],
        state: &mut ExecutionState,
        ids: &mut StateIdGen,
        thrown: &mut Vec<ExecutionState>,
    ) -> Result<(), String> {
        let toy = self.method(method).ok_or_else(|| format!("unknown method {}", method))?;
        let arg = |i: usize| args.get(i).cloned().ok_or_else(|| format!("{} has no argument #{}", method, i));
        for op in &toy.body {
            match op {
                ToyOp::SetFieldFromArg { field, arg: i } => {
                    state.memory.write_field(this.clone(), field.clone(), arg(*i)?);
                }
                ToyOp::SetFieldConst { field, value } => {
                    state.memory.write_field(this.clone(), field.clone(), Variable::int(*value));
                }
                ToyOp::Require { arg: i, relation, value } => {
                    let check = Constraint::new(*relation, arg(*i)?, Variable::int(*value));
                    thrown.push(throwing(state, ids.fresh(), thrown.len() + 1, check.negate()));
                    state.add_constraint(check);
                }
            }
        }
        Ok(())
    }

    fn allocate(state: &mut ExecutionState, dst: &str, ty: Ty, hint: Option<ConcreteHint>) -> Result<Variable, String> {
        let object = Variable::local(dst, ty);
        state.add_constraint(Constraint::ne(object.clone(), Variable::null()));
        let value = match hint {
            Some(hint) => SymbolicValue::wrapper(object.clone(), hint),
            None => SymbolicValue::reference(object.clone()),
        };
        bind(state, dst, value)?;
        Ok(object)
    }

    fn execute(
        &self,
        stmt: &ProbeStmt,
        state: &mut ExecutionState,
        ids: &mut StateIdGen,
        thrown: &mut Vec<ExecutionState>,
    ) -> Result<(), String> {
        match stmt {
            ProbeStmt::AssignNull { dst, .. } => bind(state, dst, SymbolicValue::reference(Variable::null())),
            ProbeStmt::Copy { dst, src } => {
                let value = state.local(src).cloned().ok_or_else(|| format!("unbound {}", src))?;
                bind(state, dst, value)
            }
            ProbeStmt::Construct { dst, method, args } | ProbeStmt::CallStatic { dst, method, args } => {
                let args = operands(state, args)?;
                let object = Self::allocate(state, dst, method.produced_ty(), None)?;
                self.invoke(method, &object, &args, state, ids, thrown)
            }
            ProbeStmt::CallVirtual { receiver, method, args } => {
                let this = operand(state, receiver)?;
                if this == Variable::null() {
                    return Err(format!("{} on null", method));
                }
                if !matches!(this, Variable::Local { .. }) {
                    let null = Constraint::eq(this.clone(), Variable::null());
                    thrown.push(throwing(state, ids.fresh(), thrown.len() + 1, null));
                    state.add_constraint(Constraint::ne(this.clone(), Variable::null()));
                }
                let args = operands(state, args)?;
                self.invoke(method, &this, &args, state, ids, thrown)
            }
            ProbeStmt::NewContainer { dst, kind, ty, length } => {
                let length = operand(state, length)?;
                let hint = match kind {
                    ContainerKind::Array => None,
                    ContainerKind::List => Some(ConcreteHint::List),
                    ContainerKind::Set => Some(ConcreteHint::Set),
                    ContainerKind::Map => Some(ConcreteHint::Map),
                };
                let container = Self::allocate(state, dst, ty.clone(), hint)?;
                state.add_constraint(Constraint::ge(length.clone(), Variable::int(0)));
                state.add_constraint(Constraint::eq(Variable::array_length(container), length));
                Ok(())
            }
            ProbeStmt::Store { container, key, value } => {
                let container = operand(state, container)?;
                let key = operand(state, key)?;
                let value = operand(state, value)?;
                if key.ty() == Ty::Int {
                    let length = Variable::array_length(container.clone());
                    let bounds = [
                        Constraint::ge(key.clone(), Variable::int(0)),
                        Constraint::lt(key.clone(), length),
                    ];
                    for bound in bounds {
                        thrown.push(throwing(state, ids.fresh(), thrown.len() + 1, bound.negate()));
                        state.add_constraint(bound);
                    }
                }
                state.memory.write_array(container, key, value);
                Ok(())
            }
        }
    }
}

fn bind(state: &mut ExecutionState, name: &str, value: SymbolicValue) -> Result<(), String> {
    let frame = state.frame_mut().ok_or("no frame")?;
    frame.locals.insert(name.to_string(), value);
    Ok(())
}

fn operand(state: &ExecutionState, name: &str) -> Result<Variable, String> {
    state
        .local(name)
        .map(|v| v.variable().clone())
        .ok_or_else(|| format!("unbound {}", name))
}

fn operands(state: &ExecutionState, names: &[String]) -> Result<Vec<Variable>, String> {
    names.iter().map(|name| operand(state, name)).collect()
}

/// A sibling of `state` that throws under `condition`.
fn throwing(state: &ExecutionState, id: StateId, branch: usize, condition: Constraint) -> ExecutionState {
    let mut sibling = state.clone();
    sibling.id = id;
    if let Some(last) = sibling.fork_path.last_mut() {
        *last = branch as u32;
    }
    sibling.add_constraint(condition);
    sibling.status = StateStatus::Thrown;
    sibling
}

impl SymbolicEngine for ToyEngine {
    fn step(&mut self, state: &ExecutionState, ids: &mut StateIdGen) -> Vec<ExecutionState> {
        let Some(probe) = &self.probe else {
            warn!("no probe entered");
            return Vec::new();
        };
        let pc = state.location.index();
        let Some(stmt) = probe.body.get(pc).cloned() else {
            return Vec::new();
        };
        let end = probe.body.len();
        let next = Location::new(pc as u32 + 1);

        let mut child = state.fork(ids.fresh(), 0, next);
        let mut thrown = Vec::new();
        match self.execute(&stmt, &mut child, ids, &mut thrown) {
            Ok(()) if next.index() == end => child.status = StateStatus::Returned,
            Ok(()) => {}
            Err(reason) => {
                debug!("{} throws at `{}`: {}", child, stmt, reason);
                child.status = StateStatus::Thrown;
            }
        }
        let mut children = vec![child];
        children.extend(thrown);
        children
    }
}

impl ProbeEngine for ToyEngine {
    fn enter(&mut self, probe: &ProbeMethod, ids: &mut StateIdGen) -> ExecutionState {
        let mut state = ExecutionState::new(ids.fresh(), Location::new(0));
        let mut frame = Frame::new(MethodId::new(&probe.name));
        for param in &probe.params {
            let variable = Variable::param(&param.name, param.ty.clone());
            let value = if param.ty.is_reference() {
                SymbolicValue::reference(variable)
            } else {
                SymbolicValue::primitive(variable)
            };
            frame.locals.insert(param.name.clone(), value.clone());
            state.parameters.push(value);
        }
        state.stack.push(frame);
        if probe.body.is_empty() {
            state.status = StateStatus::Returned;
        }
        self.probe = Some(probe.clone());
        state
    }
}
