use std::collections::HashMap;
use std::rc::Rc;

use crate::expr::{Constraint, Variable};
use crate::model::{Model, ModelArena, ModelId};
use crate::state::ExecutionState;

/// Constraints a returned probe state must additionally satisfy for its roots
/// to match the target models.
///
/// Heap reads are rewritten with [`Memory::current_read`], so only writes made
/// through the probe locals themselves are taken into account.
///
/// [`Memory::current_read`]: crate::state::Memory::current_read
pub struct PostCondition {
    targets: Rc<ModelArena>,
    roots: Vec<ModelId>,
    locals: Vec<String>,
}

impl PostCondition {
    /// `locals[i]` is the probe local holding the value built for `roots[i]`.
    pub fn new(targets: Rc<ModelArena>, roots: &[ModelId], locals: &[String]) -> Self {
        assert_eq!(roots.len(), locals.len(), "one probe local per root");
        Self {
            targets,
            roots: roots.to_vec(),
            locals: locals.to_vec(),
        }
    }

    /// Atoms over the heap of `state`, or `None` if a root local is unbound.
    ///
    /// Target variables are renamed to the values of the probe locals, then
    /// heap reads are rewritten through the writes of `state`.
    pub fn atoms(&self, state: &ExecutionState) -> Option<Vec<Constraint>> {
        let values = self
            .locals
            .iter()
            .map(|name| state.local(name).map(|v| v.variable().clone()))
            .collect::<Option<Vec<Variable>>>()?;
        let renaming: HashMap<Variable, Variable> = self
            .roots
            .iter()
            .zip(&values)
            .map(|(&root, value)| (self.targets.get(root).variable().clone(), value.clone()))
            .collect();

        let mut atoms = Vec::new();
        for (i, &root) in self.roots.iter().enumerate() {
            let local = &values[i];
            match self.targets.get(root) {
                Model::Null { .. } => atoms.push(Constraint::eq(local.clone(), Variable::null())),
                Model::ReferenceTo { target, .. } => {
                    let target = self.targets.deref(*target);
                    if let Some(j) = self.roots.iter().position(|&r| r == target) {
                        atoms.push(Constraint::eq(local.clone(), values[j].clone()));
                    }
                }
                Model::Primitive { constraints, .. } => {
                    atoms.extend(constraints.iter().map(|c| c.substitute(&renaming)));
                }
                model @ (Model::Object { .. }
                | Model::Array(_)
                | Model::List(_)
                | Model::Set(_)
                | Model::Map(_)
                | Model::Assemble { .. }) => {
                    atoms.push(Constraint::ne(local.clone(), Variable::null()));
                    if let Some(constraints) = model.constraints() {
                        atoms.extend(constraints.iter().map(|c| c.substitute(&renaming)));
                    }
                }
            }
        }
        Some(atoms.iter().map(|c| state.memory.current_constraint(c)).collect())
    }
}
