//! # pathsynth: path selection, model resolution and synthesis for symbolic execution
//!
//! **`pathsynth`** is the decision-making core of a symbolic execution engine.
//! The engine proper (instruction semantics) and the constraint solver live
//! outside this crate and plug in through the [`SymbolicEngine`][crate::explorer::SymbolicEngine]
//! and [`Solver`][crate::solver::Solver] traits. What remains here is:
//!
//! - **Path selection**: which live state to advance next. Selectors are
//!   built from a shared [`PathSelectorContext`][crate::selectors::PathSelectorContext],
//!   so that statistics and the stopping strategy are shared between them.
//! - **Constraint-to-model resolution**: turning a satisfying assignment plus
//!   the path constraints of a state into [`Model`][crate::model::Model]s of
//!   its inputs, before (INITIAL) and after (CURRENT) the call.
//! - **Model-directed synthesis**: finding constructor and method call
//!   sequences that produce a target model, verified by executing synthesized
//!   probe methods under a scoring selector.
//!
//! ## Key Features
//!
//! - **Arena-Backed Models**: Models reference each other through [`ModelId`][crate::model::ModelId]
//!   handles, so cyclic and shared heap structure is expressed without pointers.
//! - **Deterministic by Default**: Randomized selectors are seeded from the
//!   settings; the same seed yields the same exploration.
//! - **Lazy Feasibility**: Forked states are checked only when picked, and
//!   infeasible ones are dropped without being stepped.
//! - **Snapshot Semantics**: Heap reads denote the pre-call heap; writes are
//!   layered on top and replayed by the CURRENT view.
//!
//! ## Basic Usage
//!
//! ```rust
//! use pathsynth::expr::{Constraint, Variable};
//! use pathsynth::state::Memory;
//! use pathsynth::types::{ClassId, FieldId, Ty};
//!
//! let foo = ClassId::new("Foo");
//! let x = FieldId::new(foo.clone(), "x", Ty::Int);
//! let r = Variable::local("r", Ty::Object(foo));
//!
//! // Heap writes are layered over the initial heap...
//! let mut memory = Memory::new();
//! memory.write_field(r.clone(), x.clone(), Variable::int(5));
//!
//! // ...and reads are rewritten to the latest written value.
//! let atom = Constraint::eq(Variable::field(r, x), Variable::param("v", Ty::Int));
//! assert_eq!(memory.current_constraint(&atom).to_string(), "5 == v");
//! ```
//!
//! ## Core Components
//!
//! - **[`selectors`]**: Path selectors and their builders.
//! - **[`resolver`]**: The [`ConstraintResolver`][crate::resolver::ConstraintResolver].
//! - **[`synthesis`]**: The [`Synthesizer`][crate::synthesis::Synthesizer] and its search.
//! - **[`explorer`]**: The exploration loop tying a selector, an engine and a solver together.
//!
//! Test doubles for the engine and the solver are available behind the
//! `test-support` feature.

pub mod cache;
pub mod config;
pub mod error;
pub mod explorer;
pub mod expr;
pub mod graph;
pub mod model;
pub mod resolver;
pub mod selectors;
pub mod solver;
pub mod state;
pub mod statistics;
pub mod strategies;
pub mod synthesis;
pub mod types;

#[cfg(feature = "test-support")]
pub mod test_support;
