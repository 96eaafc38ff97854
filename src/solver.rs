//! The constraint solver oracle.
//!
//! The solver itself lives outside this crate: given the path constraints of a
//! state it answers SAT with an [`Assignment`] or UNSAT. Everything here is the
//! interface plus the assignment representation the resolver consumes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::expr::{Constraint, Value, Variable};
use crate::types::Address;

/// Hard (must-hold) and soft (preferred) constraints accumulated along a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathConstraints {
    pub hard: Vec<Constraint>,
    pub soft: Vec<Constraint>,
}

impl PathConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hard(&mut self, constraint: Constraint) {
        if !self.hard.contains(&constraint) {
            self.hard.push(constraint);
        }
    }

    pub fn add_soft(&mut self, constraint: Constraint) {
        if !self.soft.contains(&constraint) {
            self.soft.push(constraint);
        }
    }

    /// Hard constraints, followed by soft ones when `with_soft` is set.
    pub fn atoms(&self, with_soft: bool) -> impl Iterator<Item = &Constraint> {
        let soft: &[Constraint] = if with_soft { &self.soft } else { &[] };
        self.hard.iter().chain(soft.iter())
    }
}

/// A satisfying assignment: concrete values for the terms of a constraint set.
///
/// Constants evaluate to themselves; every other term is looked up verbatim, so
/// a solver must provide values for every term occurring in the constraints it
/// was asked about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: HashMap<Variable, Value>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, variable: Variable, value: Value) {
        self.values.insert(variable, value);
    }

    pub fn with(mut self, variable: Variable, value: Value) -> Self {
        self.set(variable, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn eval(&self, variable: &Variable) -> Option<Value> {
        match variable {
            Variable::Const(value) => Some(value.clone()),
            _ => self.values.get(variable).cloned(),
        }
    }

    pub fn eval_int(&self, variable: &Variable) -> Option<BigInt> {
        match self.eval(variable)? {
            Value::Int(v) => Some(v),
            Value::Bool(b) => Some(BigInt::from(b as i64)),
            Value::Addr(_) => None,
        }
    }

    /// Concrete address of a reference-valued term.
    pub fn address_of(&self, variable: &Variable) -> Option<Address> {
        self.eval(variable)?.as_addr()
    }

    /// Evaluates an atom; `None` if some side has no value.
    pub fn holds(&self, constraint: &Constraint) -> Option<bool> {
        let lhs = self.eval(&constraint.lhs)?;
        let rhs = self.eval(&constraint.rhs)?;
        Some(constraint.relation.holds(&lhs, &rhs))
    }
}

/// Outcome of a solver check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverStatus {
    Sat(Assignment),
    Unsat,
}

impl SolverStatus {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverStatus::Sat(_))
    }

    pub fn into_assignment(self) -> Option<Assignment> {
        match self {
            SolverStatus::Sat(assignment) => Some(assignment),
            SolverStatus::Unsat => None,
        }
    }
}

/// The solver oracle.
///
/// A check always runs to completion; callers re-test their budgets afterwards.
pub trait Solver {
    fn check(&mut self, constraints: &PathConstraints, respect_soft: bool) -> SolverStatus;
}

/// Solver handle shared by the explorer, the scoring strategy and the checker.
pub type SharedSolver = Rc<RefCell<dyn Solver>>;
