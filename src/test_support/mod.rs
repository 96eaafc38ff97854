//! In-crate collaborators for tests and demos.
//!
//! The solver and the engine are external to this crate in real use. These
//! stand-ins are small enough to reason about by hand and complete enough to
//! drive the explorer, the resolver and the synthesizer end to end.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::expr::{Constraint, Variable};
use crate::model::{Model, ModelArena, ModelId};
use crate::solver::SharedSolver;
use crate::types::{ClassId, FieldId, MethodSig, Ty};

mod engine;
mod solver;

pub use engine::{GraphWalker, ToyEngine, ToyMethod, ToyOp};
pub use solver::EqualitySolver;

/// A fresh [`EqualitySolver`] behind the shared handle.
pub fn shared_solver() -> SharedSolver {
    Rc::new(RefCell::new(EqualitySolver::new()))
}

/// A class `Foo` with a private `int x`, a constructor setting `x = 0` and a
/// setter `setX(int)`.
pub struct FooFixture {
    pub class: ClassId,
    pub x: FieldId,
    pub engine: ToyEngine,
}

impl FooFixture {
    pub fn new() -> Self {
        let class = ClassId::new("Foo");
        let x = FieldId::new(class.clone(), "x", Ty::Int);
        let engine = ToyEngine::new()
            .with_method(
                MethodSig::constructor(class.clone(), vec![]),
                vec![ToyOp::SetFieldConst { field: x.clone(), value: 0 }],
            )
            .with_method(
                MethodSig::instance(class.clone(), "setX", vec![Ty::Int], Ty::Void),
                vec![ToyOp::SetFieldFromArg { field: x.clone(), arg: 0 }],
            );
        Self { class, x, engine }
    }

    /// A target model of a non-null `Foo` named `name` whose `x` equals `value`.
    pub fn target(&self, arena: &mut ModelArena, name: &str, value: i64) -> ModelId {
        let variable = Variable::param(name, Ty::Object(self.class.clone()));
        let constraint = Constraint::eq(Variable::field(variable.clone(), self.x.clone()), Variable::int(value));
        arena.alloc(Model::Object {
            variable,
            constraints: BTreeSet::from([constraint]),
        })
    }
}

impl Default for FooFixture {
    fn default() -> Self {
        Self::new()
    }
}
