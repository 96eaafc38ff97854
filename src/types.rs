//! Type-safe wrappers for heap addresses, exploration states and program entities.
//!
//! This module provides newtype wrappers that enforce compile-time distinction
//! between the many integer-like identifiers the engine juggles (addresses,
//! state ids, graph locations), plus the minimal type vocabulary the resolver
//! and the synthesizer need to talk about classes, fields and methods.
use std::fmt;
use std::rc::Rc;

/// A concrete heap address assigned by the solver.
///
/// # Invariants
///
/// - Address `0` is reserved for the null reference ([`Address::NULL`])
/// - Two expressions evaluating to the same address are aliases
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(i64);

impl Address {
    /// The distinguished null address.
    pub const NULL: Address = Address(0);

    pub const fn new(raw: i64) -> Self {
        Address(raw)
    }

    /// Returns the raw address value.
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Identifier of an [`ExecutionState`][crate::state::ExecutionState].
///
/// Ids are unique within one exploration and never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StateId(u64);

impl StateId {
    pub const fn new(id: u64) -> Self {
        StateId(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Monotonic generator of fresh [`StateId`]s.
#[derive(Debug, Default)]
pub struct StateIdGen {
    next: u64,
}

impl StateIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> StateId {
        let id = StateId(self.next);
        self.next += 1;
        id
    }
}

/// A node of the program graph (an instruction or basic block).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Location(u32);

impl Location {
    pub const fn new(index: u32) -> Self {
        Location(index)
    }

    /// Returns the raw location index as a `usize`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A control-flow edge between two locations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Edge {
    pub from: Location,
    pub to: Location,
}

impl Edge {
    pub const fn new(from: Location, to: Location) -> Self {
        Edge { from, to }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Name of a class in the program under analysis.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClassId(Rc<str>);

impl ClassId {
    pub fn new(name: &str) -> Self {
        ClassId(Rc::from(name))
    }

    /// The root class every reference type conforms to.
    pub fn object() -> Self {
        ClassId::new("java.lang.Object")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static type of a value.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Ty {
    Void,
    Bool,
    Char,
    Int,
    Long,
    Object(ClassId),
    Array(Box<Ty>),
}

impl Ty {
    pub fn object(name: &str) -> Self {
        Ty::Object(ClassId::new(name))
    }

    pub fn array_of(elem: Ty) -> Self {
        Ty::Array(Box::new(elem))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Ty::Bool | Ty::Char | Ty::Int | Ty::Long)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Object(_) | Ty::Array(_))
    }

    /// Element type of an array type.
    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Class of an object type.
    pub fn class(&self) -> Option<&ClassId> {
        match self {
            Ty::Object(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Bool => write!(f, "boolean"),
            Ty::Char => write!(f, "char"),
            Ty::Int => write!(f, "int"),
            Ty::Long => write!(f, "long"),
            Ty::Object(class) => write!(f, "{}", class),
            Ty::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// A field of a class, carrying its declared type.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldId {
    pub class: ClassId,
    pub name: Rc<str>,
    pub ty: Ty,
}

impl FieldId {
    pub fn new(class: ClassId, name: &str, ty: Ty) -> Self {
        FieldId {
            class,
            name: Rc::from(name),
            ty,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Name of a method, unique within its class.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodId(Rc<str>);

impl MethodId {
    pub fn new(name: &str) -> Self {
        MethodId(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MethodKind {
    Constructor,
    Instance,
    Static,
}

/// Signature of an accessible constructor or method.
///
/// `params` never include the receiver; instance methods receive it implicitly.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodSig {
    pub id: MethodId,
    pub class: ClassId,
    pub kind: MethodKind,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl MethodSig {
    pub fn constructor(class: ClassId, params: Vec<Ty>) -> Self {
        MethodSig {
            id: MethodId::new(&format!("{}.<init>", class)),
            class,
            kind: MethodKind::Constructor,
            params,
            ret: Ty::Void,
        }
    }

    pub fn instance(class: ClassId, name: &str, params: Vec<Ty>, ret: Ty) -> Self {
        MethodSig {
            id: MethodId::new(&format!("{}.{}", class, name)),
            class,
            kind: MethodKind::Instance,
            params,
            ret,
        }
    }

    pub fn static_method(class: ClassId, name: &str, params: Vec<Ty>, ret: Ty) -> Self {
        MethodSig {
            id: MethodId::new(&format!("{}.{}", class, name)),
            class,
            kind: MethodKind::Static,
            params,
            ret,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    pub fn is_static(&self) -> bool {
        self.kind == MethodKind::Static
    }

    /// Type of the value a call produces in a construction plan.
    ///
    /// Constructors and instance methods produce their class (the receiver),
    /// static methods produce their declared return type.
    pub fn produced_ty(&self) -> Ty {
        match self.kind {
            MethodKind::Constructor | MethodKind::Instance => Ty::Object(self.class.clone()),
            MethodKind::Static => self.ret.clone(),
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.id)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_address() {
        assert!(Address::NULL.is_null());
        assert!(!Address::new(3).is_null());
        assert_eq!(Address::NULL.to_string(), "null");
        assert_eq!(Address::new(3).to_string(), "#3");
    }

    #[test]
    fn test_state_id_gen() {
        let mut ids = StateIdGen::new();
        let a = ids.fresh();
        let b = ids.fresh();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_ty_predicates() {
        assert!(Ty::Int.is_primitive());
        assert!(!Ty::Int.is_reference());
        let arr = Ty::array_of(Ty::Int);
        assert!(arr.is_array());
        assert!(arr.is_reference());
        assert_eq!(arr.element(), Some(&Ty::Int));
        assert_eq!(arr.to_string(), "int[]");
        assert_eq!(Ty::object("A").class(), Some(&ClassId::new("A")));
    }

    #[test]
    fn test_produced_ty() {
        let a = ClassId::new("A");
        let ctor = MethodSig::constructor(a.clone(), vec![]);
        let setter = MethodSig::instance(a.clone(), "setX", vec![Ty::Int], Ty::Void);
        let factory = MethodSig::static_method(a.clone(), "of", vec![Ty::Int], Ty::object("A"));
        assert_eq!(ctor.produced_ty(), Ty::object("A"));
        assert_eq!(setter.produced_ty(), Ty::object("A"));
        assert_eq!(factory.produced_ty(), Ty::object("A"));
        assert_eq!(setter.to_string(), "A.setX(int)");
    }
}
