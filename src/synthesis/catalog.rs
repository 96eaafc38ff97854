use std::rc::Rc;

use log::debug;

use crate::types::{MethodKind, MethodSig, Ty};

use super::unit::SynthesisUnit;

/// Accessible constructors and methods, the building blocks of plans.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    methods: Vec<Rc<MethodSig>>,
}

impl MethodCatalog {
    pub fn new(methods: impl IntoIterator<Item = MethodSig>) -> Self {
        Self {
            methods: methods.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn methods(&self) -> &[Rc<MethodSig>] {
        &self.methods
    }

    /// Calls producing a value of type `ty`: constructors of its class, static
    /// factories returning it, and instance methods of the class applied as
    /// modifiers of a receiver placeholder. Primitives and arrays yield nothing.
    pub fn expand(&self, ty: &Ty) -> Vec<SynthesisUnit> {
        let Some(class) = ty.class() else {
            return Vec::new();
        };
        let placeholders = |params: &[Ty]| -> Vec<SynthesisUnit> {
            params.iter().map(|p| SynthesisUnit::Object { ty: p.clone() }).collect()
        };

        let mut constructors = Vec::new();
        let mut factories = Vec::new();
        let mut modifiers = Vec::new();
        for method in &self.methods {
            match method.kind {
                MethodKind::Constructor if &method.class == class => constructors.push(SynthesisUnit::Method {
                    method: Rc::clone(method),
                    params: placeholders(&method.params),
                }),
                MethodKind::Static if &method.ret == ty => factories.push(SynthesisUnit::Method {
                    method: Rc::clone(method),
                    params: placeholders(&method.params),
                }),
                MethodKind::Instance if &method.class == class => {
                    let mut params = vec![SynthesisUnit::Object { ty: ty.clone() }];
                    params.extend(placeholders(&method.params));
                    modifiers.push(SynthesisUnit::Method {
                        method: Rc::clone(method),
                        params,
                    });
                }
                _ => {}
            }
        }
        debug!(
            "{}: {} constructors, {} factories, {} modifiers",
            ty,
            constructors.len(),
            factories.len(),
            modifiers.len()
        );
        constructors.extend(factories);
        constructors.extend(modifiers);
        constructors
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::ClassId;

    #[test]
    fn test_expand_by_kind() {
        let a = ClassId::new("A");
        let b = ClassId::new("B");
        let catalog = MethodCatalog::new([
            MethodSig::instance(a.clone(), "touch", vec![], Ty::Void),
            MethodSig::constructor(a.clone(), vec![Ty::Int]),
            MethodSig::static_method(b.clone(), "makeA", vec![], Ty::Object(a.clone())),
            MethodSig::constructor(b.clone(), vec![]),
        ]);
        let units: Vec<String> = catalog.expand(&Ty::Object(a)).iter().map(|u| u.to_string()).collect();
        assert_eq!(units, ["A.<init>(?int)", "B.makeA()", "A.touch(?A)"]);
        assert!(catalog.expand(&Ty::Int).is_empty());
        assert!(catalog.expand(&Ty::array_of(Ty::Object(b))).is_empty());
    }
}
