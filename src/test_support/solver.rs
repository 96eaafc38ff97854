use std::collections::HashMap;

use log::{debug, warn};
use num_bigint::BigInt;

use crate::expr::{Constraint, Relation, Value, Variable};
use crate::solver::{Assignment, PathConstraints, Solver, SolverStatus};
use crate::types::{Address, FieldId, Ty};

const DEFAULT_NODE_LIMIT: usize = 100_000;

/// A small decision procedure for conjunctions of atoms over uninterpreted
/// heap reads.
///
/// Equalities are closed under congruence (equal instances read equal
/// fields, equal arrays and indices read equal elements). Every reference
/// class without a constant gets a fresh non-null address, and the remaining
/// integer and boolean classes are enumerated over a small domain derived from
/// the constants of the problem. Enough for the fixtures of this crate, not a
/// general arithmetic solver.
#[derive(Debug)]
pub struct EqualitySolver {
    node_limit: usize,
    checks: usize,
}

impl Default for EqualitySolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EqualitySolver {
    pub fn new() -> Self {
        Self::with_node_limit(DEFAULT_NODE_LIMIT)
    }

    /// Search nodes explored per check before giving up with UNSAT.
    pub fn with_node_limit(node_limit: usize) -> Self {
        Self { node_limit, checks: 0 }
    }

    /// Number of checks answered so far.
    pub fn checks(&self) -> usize {
        self.checks
    }

    fn solve(&self, atoms: &[&Constraint]) -> Option<Assignment> {
        let mut problem = Problem::new(atoms);
        problem.close();
        let mut search = problem.classify()?;
        search.limit = self.node_limit;
        if !search.run(0) {
            if search.nodes > search.limit {
                warn!("node limit {} reached on {} atoms", self.node_limit, atoms.len());
            }
            return None;
        }
        let mut assignment = Assignment::new();
        for (term, &class) in problem.terms.iter().zip(&search.class_of) {
            if let Some(value) = &search.values[class] {
                assignment.set(term.clone(), value.clone());
            }
        }
        Some(assignment)
    }
}

impl Solver for EqualitySolver {
    fn check(&mut self, constraints: &PathConstraints, respect_soft: bool) -> SolverStatus {
        self.checks += 1;
        if respect_soft && !constraints.soft.is_empty() {
            let atoms: Vec<&Constraint> = constraints.atoms(true).collect();
            if let Some(assignment) = self.solve(&atoms) {
                return SolverStatus::Sat(assignment);
            }
            debug!("soft constraints unsatisfiable, retrying without them");
        }
        let atoms: Vec<&Constraint> = constraints.atoms(false).collect();
        match self.solve(&atoms) {
            Some(assignment) => SolverStatus::Sat(assignment),
            None => SolverStatus::Unsat,
        }
    }
}

/// Terms of a problem and the union-find over them.
struct Problem<'a> {
    atoms: &'a [&'a Constraint],
    terms: Vec<Variable>,
    index: HashMap<Variable, usize>,
    parent: Vec<usize>,
}

impl<'a> Problem<'a> {
    fn new(atoms: &'a [&'a Constraint]) -> Self {
        let mut problem = Problem {
            atoms,
            terms: Vec::new(),
            index: HashMap::new(),
            parent: Vec::new(),
        };
        for atom in atoms {
            for term in atom.variables() {
                problem.intern(term);
            }
        }
        problem
    }

    fn intern(&mut self, term: &Variable) -> usize {
        if let Some(&i) = self.index.get(term) {
            return i;
        }
        let i = self.terms.len();
        self.terms.push(term.clone());
        self.index.insert(term.clone(), i);
        self.parent.push(i);
        i
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        self.parent[a.max(b)] = a.min(b);
        true
    }

    fn same(&mut self, a: &Variable, b: &Variable) -> bool {
        match (self.index.get(a).copied(), self.index.get(b).copied()) {
            (Some(a), Some(b)) => self.find(a) == self.find(b),
            _ => a == b,
        }
    }

    fn congruent(&mut self, i: usize, j: usize) -> bool {
        let (a, b) = (self.terms[i].clone(), self.terms[j].clone());
        match (&a, &b) {
            (Variable::Field { instance: x, field: f }, Variable::Field { instance: y, field: g }) => {
                f == g && self.same(x, y)
            }
            (
                Variable::ArrayAccess { array: x, index: i, .. },
                Variable::ArrayAccess { array: y, index: j, .. },
            ) => self.same(x, y) && self.same(i, j),
            (Variable::ArrayLength(x), Variable::ArrayLength(y)) => self.same(x, y),
            _ => false,
        }
    }

    /// Merges equated terms, then congruent reads, until nothing changes.
    fn close(&mut self) {
        for atom in self.atoms {
            if atom.relation == Relation::Eq {
                let (l, r) = (self.index[&atom.lhs], self.index[&atom.rhs]);
                self.union(l, r);
            }
        }
        let n = self.terms.len();
        loop {
            let mut changed = false;
            for i in 0..n {
                for j in (i + 1)..n {
                    if self.find(i) != self.find(j) && self.congruent(i, j) {
                        changed |= self.union(i, j);
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Builds the search over equivalence classes, or `None` on a constant
    /// clash.
    fn classify(&mut self) -> Option<Search> {
        let n = self.terms.len();
        let mut class_ids: HashMap<usize, usize> = HashMap::new();
        let mut class_of = Vec::with_capacity(n);
        for i in 0..n {
            let root = self.find(i);
            let next = class_ids.len();
            class_of.push(*class_ids.entry(root).or_insert(next));
        }
        let classes = class_ids.len();

        let mut values: Vec<Option<Value>> = vec![None; classes];
        let mut reference = vec![false; classes];
        let mut boolean = vec![false; classes];
        let mut constants: Vec<BigInt> = Vec::new();
        let mut max_addr = 0;
        for (term, &c) in self.terms.iter().zip(&class_of) {
            let ty = term.ty();
            reference[c] |= ty.is_reference();
            boolean[c] |= ty == Ty::Bool;
            if let Variable::Const(value) = term {
                if let Some(existing) = &values[c] {
                    if existing != value {
                        debug!("constant clash: {} vs {}", existing, value);
                        return None;
                    }
                }
                values[c] = Some(value.clone());
                match value {
                    Value::Int(v) => constants.push(v.clone()),
                    Value::Addr(a) => max_addr = max_addr.max(a.raw()),
                    Value::Bool(_) => {}
                }
            }
        }

        let mut free = Vec::new();
        for c in 0..classes {
            if values[c].is_some() {
                continue;
            }
            if reference[c] {
                max_addr += 1;
                values[c] = Some(Value::Addr(Address::new(max_addr)));
            } else {
                free.push(c);
            }
        }

        let mut domain: Vec<BigInt> = vec![BigInt::from(0), BigInt::from(1)];
        for c in constants {
            domain.push(&c - 1);
            domain.push(&c + 1);
            domain.push(c);
        }
        domain.sort_by(|a, b| a.magnitude().cmp(b.magnitude()).then_with(|| b.cmp(a)));
        domain.dedup();

        let atoms = self
            .atoms
            .iter()
            .map(|a| (a.relation, class_of[self.index[&a.lhs]], class_of[self.index[&a.rhs]]))
            .collect();
        let reads = self.reads(&class_of);
        Some(Search {
            atoms,
            reads,
            class_of,
            values,
            free,
            boolean,
            domain,
            nodes: 0,
            limit: DEFAULT_NODE_LIMIT,
        })
    }

    /// Heap reads as (read class, base class, optional index class, kind).
    fn reads(&self, class_of: &[usize]) -> Vec<Read> {
        let class = |v: &Variable| class_of[self.index[v]];
        self.terms
            .iter()
            .enumerate()
            .filter_map(|(i, term)| {
                let (key, base, offset) = match term {
                    Variable::Field { instance, field } => (ReadKey::Field(field.clone()), class(instance.as_ref()), None),
                    Variable::ArrayAccess { array, index, .. } => {
                        (ReadKey::Element, class(array.as_ref()), Some(class(index.as_ref())))
                    }
                    Variable::ArrayLength(array) => (ReadKey::Length, class(array.as_ref()), None),
                    _ => return None,
                };
                Some(Read {
                    key,
                    base,
                    offset,
                    value: class_of[i],
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum ReadKey {
    Field(FieldId),
    Element,
    Length,
}

struct Read {
    key: ReadKey,
    base: usize,
    offset: Option<usize>,
    value: usize,
}

/// Backtracking over the free integer and boolean classes.
struct Search {
    atoms: Vec<(Relation, usize, usize)>,
    reads: Vec<Read>,
    class_of: Vec<usize>,
    values: Vec<Option<Value>>,
    free: Vec<usize>,
    boolean: Vec<bool>,
    domain: Vec<BigInt>,
    nodes: usize,
    limit: usize,
}

impl Search {
    fn consistent(&self) -> bool {
        self.atoms.iter().all(|&(relation, l, r)| match (&self.values[l], &self.values[r]) {
            (Some(a), Some(b)) => relation.holds(a, b),
            _ => true,
        })
    }

    /// Reads of equal locations must read equal values.
    fn functional(&self) -> bool {
        for (i, a) in self.reads.iter().enumerate() {
            for b in &self.reads[i + 1..] {
                if a.key != b.key || a.value == b.value {
                    continue;
                }
                let same_base = self.values[a.base] == self.values[b.base];
                let same_offset = match (a.offset, b.offset) {
                    (Some(x), Some(y)) => self.values[x] == self.values[y],
                    _ => true,
                };
                if same_base && same_offset && self.values[a.value] != self.values[b.value] {
                    return false;
                }
            }
        }
        true
    }

    fn run(&mut self, k: usize) -> bool {
        self.nodes += 1;
        if self.nodes > self.limit || !self.consistent() {
            return false;
        }
        let Some(&class) = self.free.get(k) else {
            return self.functional();
        };
        let candidates: Vec<Value> = if self.boolean[class] {
            vec![Value::Bool(false), Value::Bool(true)]
        } else {
            self.domain.iter().cloned().map(Value::Int).collect()
        };
        for value in candidates {
            self.values[class] = Some(value);
            if self.run(k + 1) {
                return true;
            }
            if self.nodes > self.limit {
                break;
            }
        }
        self.values[class] = None;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;

    fn check(atoms: Vec<Constraint>) -> SolverStatus {
        let mut path = PathConstraints::new();
        for atom in atoms {
            path.add_hard(atom);
        }
        EqualitySolver::new().check(&path, false)
    }

    #[test]
    fn test_constants_propagate_through_equalities() {
        let x = Variable::param("x", Ty::Int);
        let y = Variable::param("y", Ty::Int);
        let status = check(vec![Constraint::eq(x.clone(), y.clone()), Constraint::eq(y.clone(), Variable::int(5))]);
        let assignment = status.into_assignment().unwrap_or_default();
        assert_eq!(assignment.eval(&x), Some(Value::int(5)));
        assert_eq!(assignment.eval(&y), Some(Value::int(5)));
    }

    #[test]
    fn test_clash_and_disequality() {
        let x = Variable::param("x", Ty::Int);
        assert_eq!(
            check(vec![Constraint::eq(x.clone(), Variable::int(1)), Constraint::eq(x.clone(), Variable::int(2))]),
            SolverStatus::Unsat
        );
        assert_eq!(check(vec![Constraint::ne(x.clone(), x)]), SolverStatus::Unsat);
    }

    #[test]
    fn test_congruence_over_fields() {
        let a = ClassId::new("A");
        let f = FieldId::new(a.clone(), "f", Ty::Int);
        let p = Variable::param("p", Ty::Object(a.clone()));
        let q = Variable::param("q", Ty::Object(a));
        let status = check(vec![
            Constraint::eq(p.clone(), q.clone()),
            Constraint::eq(Variable::field(p.clone(), f.clone()), Variable::int(1)),
            Constraint::eq(Variable::field(q, f.clone()), Variable::int(2)),
        ]);
        assert_eq!(status, SolverStatus::Unsat);

        let assignment = check(vec![Constraint::ne(p.clone(), Variable::null())])
            .into_assignment()
            .unwrap_or_default();
        assert!(assignment.address_of(&p).is_some_and(|addr| !addr.is_null()));
    }

    #[test]
    fn test_free_integers_enumerated() {
        let i = Variable::param("i", Ty::Int);
        let status = check(vec![
            Constraint::ge(i.clone(), Variable::int(3)),
            Constraint::lt(i.clone(), Variable::int(4)),
        ]);
        assert_eq!(status.into_assignment().and_then(|a| a.eval(&i)), Some(Value::int(3)));
    }

    #[test]
    fn test_soft_constraints_dropped_when_conflicting() {
        let x = Variable::param("x", Ty::Int);
        let mut path = PathConstraints::new();
        path.add_hard(Constraint::ge(x.clone(), Variable::int(1)));
        path.add_soft(Constraint::eq(x.clone(), Variable::int(0)));
        let mut solver = EqualitySolver::new();
        let assignment = solver.check(&path, true).into_assignment().unwrap_or_default();
        assert_eq!(assignment.eval(&x), Some(Value::int(1)));
        assert_eq!(solver.checks(), 1);
    }
}
