//! Translation of a fully defined plan into an executable probe method.
//!
//! Every primitive placeholder becomes a probe parameter, every call becomes
//! one statement, and the body ends in a void return. Alongside the body the
//! translator records a [`PlanNode`] tree per root, which maps the resolved
//! probe parameters back to assembled models once an execution is accepted.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::expr::Variable;
use crate::graph::ProgramGraph;
use crate::model::{CallModel, ContainerModel, Model, ModelArena, ModelId, ResolvedModels};
use crate::types::{MethodKind, MethodSig, Ty};

use super::unit::{ContainerKind, SynthesisUnit, UnitContext};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProbeParam {
    pub name: String,
    pub ty: Ty,
}

/// A probe statement. Operands are names of probe locals or parameters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProbeStmt {
    AssignNull {
        dst: String,
        ty: Ty,
    },
    Copy {
        dst: String,
        src: String,
    },
    /// Allocates `dst` and runs the constructor on it.
    Construct {
        dst: String,
        method: Rc<MethodSig>,
        args: Vec<String>,
    },
    CallStatic {
        dst: String,
        method: Rc<MethodSig>,
        args: Vec<String>,
    },
    CallVirtual {
        receiver: String,
        method: Rc<MethodSig>,
        args: Vec<String>,
    },
    NewContainer {
        dst: String,
        kind: ContainerKind,
        ty: Ty,
        length: String,
    },
    Store {
        container: String,
        key: String,
        value: String,
    },
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[String]) -> fmt::Result {
    write!(f, "(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    write!(f, ")")
}

impl fmt::Display for ProbeStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStmt::AssignNull { dst, .. } => write!(f, "{} = null", dst),
            ProbeStmt::Copy { dst, src } => write!(f, "{} = {}", dst, src),
            ProbeStmt::Construct { dst, method, args } => {
                write!(f, "{} = new {}", dst, method.class)?;
                write_args(f, args)
            }
            ProbeStmt::CallStatic { dst, method, args } => {
                write!(f, "{} = {}", dst, method.id)?;
                write_args(f, args)
            }
            ProbeStmt::CallVirtual { receiver, method, args } => {
                write!(f, "{}.{}", receiver, method.id)?;
                write_args(f, args)
            }
            ProbeStmt::NewContainer { dst, kind, ty, length } => {
                write!(f, "{} = new {:?}<{}>[{}]", dst, kind, ty, length)
            }
            ProbeStmt::Store { container, key, value } => write!(f, "{}[{}] = {}", container, key, value),
        }
    }
}

/// How the value of one unit is assembled from the probe's parameters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PlanNode {
    Param(usize),
    Null {
        local: String,
        ty: Ty,
    },
    Call {
        local: String,
        method: Rc<MethodSig>,
        receiver: Option<Box<PlanNode>>,
        args: Vec<PlanNode>,
    },
    Container {
        local: String,
        kind: ContainerKind,
        ty: Ty,
        length: Box<PlanNode>,
        elements: Vec<(PlanNode, PlanNode)>,
    },
    RootRef {
        local: String,
        ty: Ty,
        root: usize,
    },
}

/// A synthesized static method with a void return.
#[derive(Debug, Clone)]
pub struct ProbeMethod {
    pub name: String,
    pub params: Vec<ProbeParam>,
    pub body: Vec<ProbeStmt>,
    /// Local holding the value of each root at the return.
    pub root_locals: Vec<String>,
    pub plan: Vec<PlanNode>,
}

impl ProbeMethod {
    /// Translates the roots of a fully defined `context`.
    pub fn translate(name: impl Into<String>, context: &UnitContext) -> ProbeMethod {
        let roots = context.root_units();
        let mut translator = Translator {
            context,
            params: Vec::new(),
            body: Vec::new(),
            next_local: 0,
            root_locals: vec![None; roots.len()],
        };
        let mut plan: Vec<Option<PlanNode>> = vec![None; roots.len()];
        // Aliases last, so that the roots they copy already have a local.
        let is_alias = |i: &usize| matches!(roots[*i], SynthesisUnit::ReferenceTo { .. });
        let order: Vec<usize> = (0..roots.len())
            .filter(|i| !is_alias(i))
            .chain((0..roots.len()).filter(is_alias))
            .collect();
        for i in order {
            let (local, node) = translator.unit(&roots[i], Some(i));
            translator.root_locals[i] = Some(local);
            plan[i] = Some(node);
        }

        let probe = ProbeMethod {
            name: name.into(),
            params: translator.params,
            body: translator.body,
            root_locals: translator.root_locals.into_iter().flatten().collect(),
            plan: plan.into_iter().flatten().collect(),
        };
        debug!("translated probe:\n{}", probe);
        probe
    }

    /// Straight-line graph: location `i` is statement `i`, the last location
    /// is the return.
    pub fn graph(&self) -> ProgramGraph {
        let n = self.body.len() as u32;
        let edges: Vec<(u32, u32)> = (0..n).map(|i| (i, i + 1)).collect();
        ProgramGraph::from_edges(self.body.len() + 1, &edges)
    }

    /// Builds the models of the roots from the resolved probe parameters.
    pub fn assemble(&self, params: &ResolvedModels) -> (ModelArena, Vec<ModelId>) {
        let mut builder = Assembler {
            params,
            arena: ModelArena::new(),
            remap: HashMap::new(),
            roots: Vec::new(),
        };
        builder.roots = self.plan.iter().map(|_| builder.arena.reserve()).collect();
        for (i, node) in self.plan.iter().enumerate() {
            let model = builder.model(node);
            builder.arena.set(builder.roots[i], model);
        }
        (builder.arena, builder.roots)
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "static void {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", p.ty, p.name)?;
        }
        writeln!(f, ") {{")?;
        for stmt in &self.body {
            writeln!(f, "    {};", stmt)?;
        }
        writeln!(f, "    return;")?;
        write!(f, "}}")
    }
}

struct Translator<'c> {
    context: &'c UnitContext,
    params: Vec<ProbeParam>,
    body: Vec<ProbeStmt>,
    next_local: usize,
    root_locals: Vec<Option<String>>,
}

impl Translator<'_> {
    fn fresh_local(&mut self) -> String {
        let name = format!("r{}", self.next_local);
        self.next_local += 1;
        name
    }

    fn param(&mut self, ty: Ty) -> (String, PlanNode) {
        let index = self.params.len();
        let name = format!("p{}", index);
        self.params.push(ProbeParam { name: name.clone(), ty });
        (name, PlanNode::Param(index))
    }

    fn null(&mut self, ty: Ty) -> (String, PlanNode) {
        let dst = self.fresh_local();
        self.body.push(ProbeStmt::AssignNull {
            dst: dst.clone(),
            ty: ty.clone(),
        });
        (dst.clone(), PlanNode::Null { local: dst, ty })
    }

    fn units(&mut self, units: &[SynthesisUnit]) -> (Vec<String>, Vec<PlanNode>) {
        units.iter().map(|u| self.unit(u, None)).unzip()
    }

    /// Emits the statements producing `unit`; `root` is set when `unit` is a root.
    fn unit(&mut self, unit: &SynthesisUnit, root: Option<usize>) -> (String, PlanNode) {
        match unit {
            SynthesisUnit::Object { ty } => self.param(ty.clone()),
            SynthesisUnit::Null { ty } => self.null(ty.clone()),
            SynthesisUnit::ReferenceTo { ty, root: target } => match self.root_locals[*target].clone() {
                Some(src) => {
                    let dst = self.fresh_local();
                    self.body.push(ProbeStmt::Copy { dst: dst.clone(), src });
                    let node = PlanNode::RootRef {
                        local: dst.clone(),
                        ty: ty.clone(),
                        root: *target,
                    };
                    (dst, node)
                }
                None => {
                    debug!("root #{} has no local yet, using null", target);
                    self.null(ty.clone())
                }
            },
            SynthesisUnit::Method { method, params } => match method.kind {
                MethodKind::Constructor | MethodKind::Static => {
                    let (args, arg_nodes) = self.units(params);
                    let dst = self.fresh_local();
                    self.body.push(if method.is_constructor() {
                        ProbeStmt::Construct {
                            dst: dst.clone(),
                            method: Rc::clone(method),
                            args,
                        }
                    } else {
                        ProbeStmt::CallStatic {
                            dst: dst.clone(),
                            method: Rc::clone(method),
                            args,
                        }
                    });
                    let node = PlanNode::Call {
                        local: dst.clone(),
                        method: Rc::clone(method),
                        receiver: None,
                        args: arg_nodes,
                    };
                    (dst, node)
                }
                MethodKind::Instance => {
                    let Some((receiver, rest)) = params.split_first() else {
                        debug!("{} has no receiver unit, using null", method);
                        return self.null(method.produced_ty());
                    };
                    let (local, receiver_node) = self.unit(receiver, None);
                    let (args, arg_nodes) = self.units(rest);
                    self.body.push(ProbeStmt::CallVirtual {
                        receiver: local.clone(),
                        method: Rc::clone(method),
                        args,
                    });
                    let node = PlanNode::Call {
                        local: local.clone(),
                        method: Rc::clone(method),
                        receiver: Some(Box::new(receiver_node)),
                        args: arg_nodes,
                    };
                    (local, node)
                }
            },
            SynthesisUnit::Container {
                kind,
                ty,
                length,
                elements,
            } => {
                let length_unit = self.context.unit(*length);
                let (length, length_node) = self.unit(&length_unit, None);
                let dst = self.fresh_local();
                self.body.push(ProbeStmt::NewContainer {
                    dst: dst.clone(),
                    kind: *kind,
                    ty: ty.clone(),
                    length,
                });
                if let Some(i) = root {
                    // Entries may refer back to the container itself.
                    self.root_locals[i] = Some(dst.clone());
                }
                let mut element_nodes = Vec::with_capacity(elements.len());
                for &(k, v) in elements {
                    let (key_unit, value_unit) = (self.context.unit(k), self.context.unit(v));
                    let (key, key_node) = self.unit(&key_unit, None);
                    let (value, value_node) = self.unit(&value_unit, None);
                    self.body.push(ProbeStmt::Store {
                        container: dst.clone(),
                        key,
                        value,
                    });
                    element_nodes.push((key_node, value_node));
                }
                let node = PlanNode::Container {
                    local: dst.clone(),
                    kind: *kind,
                    ty: ty.clone(),
                    length: Box::new(length_node),
                    elements: element_nodes,
                };
                (dst, node)
            }
        }
    }
}

struct Assembler<'p> {
    params: &'p ResolvedModels,
    arena: ModelArena,
    remap: HashMap<ModelId, ModelId>,
    roots: Vec<ModelId>,
}

impl Assembler<'_> {
    fn id(&mut self, node: &PlanNode) -> ModelId {
        match node {
            PlanNode::Param(i) => self.param(*i),
            _ => {
                let model = self.model(node);
                self.arena.alloc(model)
            }
        }
    }

    fn param(&mut self, i: usize) -> ModelId {
        match self.params.parameters.get(i) {
            Some(&id) => self.arena.import_with(&self.params.arena, id, &mut self.remap),
            None => self.arena.alloc(Model::Null {
                variable: Variable::null(),
            }),
        }
    }

    fn call(&mut self, method: &Rc<MethodSig>, args: &[PlanNode]) -> CallModel {
        CallModel {
            method: Rc::clone(method),
            args: args.iter().map(|a| self.id(a)).collect(),
        }
    }

    fn model(&mut self, node: &PlanNode) -> Model {
        match node {
            PlanNode::Param(i) => {
                let id = self.param(*i);
                self.arena.get(id).clone()
            }
            PlanNode::Null { local, ty } => Model::Null {
                variable: Variable::local(local, ty.clone()),
            },
            PlanNode::RootRef { local, ty, root } => Model::ReferenceTo {
                variable: Variable::local(local, ty.clone()),
                target: self.roots[*root],
            },
            PlanNode::Call {
                local,
                method,
                receiver: None,
                args,
            } => Model::Assemble {
                variable: Variable::local(local, method.produced_ty()),
                instantiation: Some(self.call(method, args)),
                modifications: Vec::new(),
            },
            PlanNode::Call {
                local,
                method,
                receiver: Some(receiver),
                args,
            } => {
                let receiver = self.model(receiver);
                let call = self.call(method, args);
                match receiver {
                    Model::Assemble {
                        instantiation,
                        mut modifications,
                        ..
                    } => {
                        modifications.push(call);
                        Model::Assemble {
                            variable: Variable::local(local, method.produced_ty()),
                            instantiation,
                            modifications,
                        }
                    }
                    _ => Model::Assemble {
                        variable: Variable::local(local, method.produced_ty()),
                        instantiation: None,
                        modifications: vec![call],
                    },
                }
            }
            PlanNode::Container {
                local,
                kind,
                ty,
                length,
                elements,
            } => {
                let container = ContainerModel {
                    variable: Variable::local(local, ty.clone()),
                    length: self.id(length),
                    elements: elements.iter().map(|(k, v)| (self.id(k), self.id(v))).collect(),
                    constraints: Default::default(),
                };
                match kind {
                    ContainerKind::Array => Model::Array(container),
                    ContainerKind::List => Model::List(container),
                    ContainerKind::Set => Model::Set(container),
                    ContainerKind::Map => Model::Map(container),
                }
            }
        }
    }
}
