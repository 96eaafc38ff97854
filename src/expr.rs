//! Constraint variables and atoms.
//!
//! Path constraints are conjunctions of binary relations between
//! [`Variable`]s. A variable is a term: a parameter, a probe local, a constant,
//! or a heap read (field access, array access, array length) built on top of
//! another term. Heap reads always denote the *initial* heap; writes performed
//! during execution are tracked separately in [`Memory`][crate::state::Memory].

use std::collections::HashMap;
use std::fmt;

use num_bigint::BigInt;

use crate::types::{Address, ClassId, FieldId, Ty};

/// A concrete value from a solver assignment.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Addr(Address),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Int(BigInt::from(v))
    }

    pub fn null() -> Self {
        Value::Addr(Address::NULL)
    }

    /// Default value of a type, as a zero-initialized heap slot reads.
    pub fn default_for(ty: &Ty) -> Self {
        match ty {
            Ty::Bool => Value::Bool(false),
            Ty::Char | Ty::Int | Ty::Long | Ty::Void => Value::int(0),
            Ty::Object(_) | Ty::Array(_) => Value::null(),
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_int().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_addr(&self) -> Option<Address> {
        match self {
            Value::Addr(a) => Some(*a),
            _ => None,
        }
    }

    fn ty(&self) -> Ty {
        match self {
            Value::Bool(_) => Ty::Bool,
            Value::Int(_) => Ty::Int,
            Value::Addr(_) => Ty::Object(ClassId::object()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Addr(a) => write!(f, "{}", a),
        }
    }
}

/// A constraint variable (a term over the initial heap).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Variable {
    /// Formal parameter of the method under analysis (or of a probe).
    Param { name: String, ty: Ty },
    /// Local created during execution (e.g. a freshly allocated object).
    Local { name: String, ty: Ty },
    Const(Value),
    Field { instance: Box<Variable>, field: FieldId },
    Static(FieldId),
    ArrayAccess { array: Box<Variable>, index: Box<Variable>, elem: Ty },
    ArrayLength(Box<Variable>),
}

impl Variable {
    pub fn param(name: &str, ty: Ty) -> Self {
        Variable::Param {
            name: name.to_string(),
            ty,
        }
    }

    pub fn local(name: &str, ty: Ty) -> Self {
        Variable::Local {
            name: name.to_string(),
            ty,
        }
    }

    pub fn int(v: i64) -> Self {
        Variable::Const(Value::int(v))
    }

    pub fn null() -> Self {
        Variable::Const(Value::null())
    }

    pub fn field(instance: Variable, field: FieldId) -> Self {
        Variable::Field {
            instance: Box::new(instance),
            field,
        }
    }

    pub fn array_access(array: Variable, index: Variable, elem: Ty) -> Self {
        Variable::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
            elem,
        }
    }

    pub fn array_length(array: Variable) -> Self {
        Variable::ArrayLength(Box::new(array))
    }

    pub fn ty(&self) -> Ty {
        match self {
            Variable::Param { ty, .. } | Variable::Local { ty, .. } => ty.clone(),
            Variable::Const(value) => value.ty(),
            Variable::Field { field, .. } => field.ty.clone(),
            Variable::Static(field) => field.ty.clone(),
            Variable::ArrayAccess { elem, .. } => elem.clone(),
            Variable::ArrayLength(_) => Ty::Int,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.ty().is_primitive()
    }

    pub fn is_array(&self) -> bool {
        self.ty().is_array()
    }

    pub fn is_reference(&self) -> bool {
        self.ty().is_reference()
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Variable::Const(_))
    }

    /// Calls `f` on this term and every nested sub-term, outermost first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Variable)) {
        f(self);
        match self {
            Variable::Field { instance, .. } => instance.visit(f),
            Variable::ArrayAccess { array, index, .. } => {
                array.visit(f);
                index.visit(f);
            }
            Variable::ArrayLength(array) => array.visit(f),
            Variable::Param { .. } | Variable::Local { .. } | Variable::Const(_) | Variable::Static(_) => {}
        }
    }

    /// Returns `true` if `other` occurs anywhere in this term.
    pub fn contains(&self, other: &Variable) -> bool {
        let mut found = false;
        self.visit(&mut |v| found |= v == other);
        found
    }

    /// Replaces every occurrence of a mapped term, outermost match first.
    pub fn substitute(&self, mapping: &HashMap<Variable, Variable>) -> Variable {
        if let Some(replacement) = mapping.get(self) {
            return replacement.clone();
        }
        match self {
            Variable::Field { instance, field } => Variable::field(instance.substitute(mapping), field.clone()),
            Variable::ArrayAccess { array, index, elem } => {
                Variable::array_access(array.substitute(mapping), index.substitute(mapping), elem.clone())
            }
            Variable::ArrayLength(array) => Variable::array_length(array.substitute(mapping)),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Param { name, .. } | Variable::Local { name, .. } => write!(f, "{}", name),
            Variable::Const(value) => write!(f, "{}", value),
            Variable::Field { instance, field } => write!(f, "{}.{}", instance, field.name),
            Variable::Static(field) => write!(f, "{}", field),
            Variable::ArrayAccess { array, index, .. } => write!(f, "{}[{}]", array, index),
            Variable::ArrayLength(array) => write!(f, "{}.length", array),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// The relation that holds exactly when this one does not.
    pub fn negate(self) -> Relation {
        match self {
            Relation::Eq => Relation::Ne,
            Relation::Ne => Relation::Eq,
            Relation::Lt => Relation::Ge,
            Relation::Le => Relation::Gt,
            Relation::Gt => Relation::Le,
            Relation::Ge => Relation::Lt,
        }
    }

    pub fn holds<T: Ord>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            Relation::Eq => lhs == rhs,
            Relation::Ne => lhs != rhs,
            Relation::Lt => lhs < rhs,
            Relation::Le => lhs <= rhs,
            Relation::Gt => lhs > rhs,
            Relation::Ge => lhs >= rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "==",
            Relation::Ne => "!=",
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Gt => ">",
            Relation::Ge => ">=",
        }
    }
}

/// A constraint atom: `lhs <relation> rhs`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Constraint {
    pub relation: Relation,
    pub lhs: Variable,
    pub rhs: Variable,
}

impl Constraint {
    pub fn new(relation: Relation, lhs: Variable, rhs: Variable) -> Self {
        Constraint { relation, lhs, rhs }
    }

    pub fn eq(lhs: Variable, rhs: Variable) -> Self {
        Self::new(Relation::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Variable, rhs: Variable) -> Self {
        Self::new(Relation::Ne, lhs, rhs)
    }

    pub fn lt(lhs: Variable, rhs: Variable) -> Self {
        Self::new(Relation::Lt, lhs, rhs)
    }

    pub fn ge(lhs: Variable, rhs: Variable) -> Self {
        Self::new(Relation::Ge, lhs, rhs)
    }

    pub fn negate(&self) -> Self {
        Self::new(self.relation.negate(), self.lhs.clone(), self.rhs.clone())
    }

    /// Every term and sub-term occurring in this atom.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut result = Vec::new();
        self.lhs.visit(&mut |v| result.push(v));
        self.rhs.visit(&mut |v| result.push(v));
        result
    }

    pub fn mentions(&self, variable: &Variable) -> bool {
        self.lhs.contains(variable) || self.rhs.contains(variable)
    }

    pub fn mentions_any<'a>(&self, mut variables: impl Iterator<Item = &'a Variable>) -> bool {
        variables.any(|v| self.mentions(v))
    }

    pub fn substitute(&self, mapping: &HashMap<Variable, Variable>) -> Self {
        Self::new(
            self.relation,
            self.lhs.substitute(mapping),
            self.rhs.substitute(mapping),
        )
    }

    /// Maps both sides through `f`.
    pub fn map(&self, mut f: impl FnMut(&Variable) -> Variable) -> Self {
        Self::new(self.relation, f(&self.lhs), f(&self.rhs))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.relation.symbol(), self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> ClassId {
        ClassId::new("Point")
    }

    #[test]
    fn test_contains_nested() {
        let p = Variable::param("p", Ty::Object(point()));
        let x = FieldId::new(point(), "x", Ty::Int);
        let px = Variable::field(p.clone(), x);
        assert!(px.contains(&p));
        assert!(!p.contains(&px));
        assert_eq!(px.ty(), Ty::Int);
        assert_eq!(px.to_string(), "p.x");
    }

    #[test]
    fn test_substitute_outermost() {
        let p = Variable::param("p", Ty::Object(point()));
        let q = Variable::local("q", Ty::Object(point()));
        let x = FieldId::new(point(), "x", Ty::Int);
        let atom = Constraint::eq(Variable::field(p.clone(), x.clone()), Variable::int(5));
        let mapping = HashMap::from([(p, q.clone())]);
        let renamed = atom.substitute(&mapping);
        assert_eq!(renamed.lhs, Variable::field(q, x));
        assert_eq!(renamed.rhs, Variable::int(5));
    }

    #[test]
    fn test_variables_flatten() {
        let a = Variable::param("a", Ty::array_of(Ty::Int));
        let i = Variable::param("i", Ty::Int);
        let atom = Constraint::lt(i.clone(), Variable::array_length(a.clone()));
        let vars = atom.variables();
        assert!(vars.contains(&&i));
        assert!(vars.contains(&&a));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn test_relation_negate() {
        for relation in [Relation::Eq, Relation::Ne, Relation::Lt, Relation::Le, Relation::Gt, Relation::Ge] {
            for (l, r) in [(1, 2), (2, 2), (3, 2)] {
                assert_ne!(relation.holds(&l, &r), relation.negate().holds(&l, &r));
            }
        }
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::int(7).as_usize(), Some(7));
        assert_eq!(Value::int(-1).as_usize(), None);
        assert_eq!(Value::default_for(&Ty::object("A")), Value::null());
        assert_eq!(Value::null().as_addr(), Some(Address::NULL));
    }
}
