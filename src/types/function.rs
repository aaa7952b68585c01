//! Callable entities and overload resolution
//!
//! A `Function` is one concrete callable: user-defined (with an AST body),
//! native (a built-in), or an interface method stub that delegates to a
//! runtime-resolved implementation. Same-named functions pile up into an
//! `OverloadedFunction`, an immutable set of variants; re-declaring a name
//! produces a *new* overload set bound under the name, never a mutation of
//! the old one.

use crate::frontend::ast::FunctionDecl;
use crate::interp::Value;
use crate::scope::{LayerRef, Scope};
use crate::types::type_system::{OverloadLookup, Type};
use crate::utils::RuntimeError;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

/// A named, typed parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

/// Native implementation of a built-in. Arguments have already been bound
/// into a fresh scope layer by the time this runs.
pub type NativeImpl = fn(&mut Scope<Value>) -> Result<Value, RuntimeError>;

/// What happens when the function is invoked
pub enum FunctionBody {
    /// Statements plus a tail expression from a `function` declaration
    User(Rc<FunctionDecl>),
    /// A built-in
    Native(NativeImpl),
    /// Non-invocable stub; the call is late-bound through the receiver's
    /// interface-bound object
    Interface,
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(decl) => write!(f, "User({})", decl.signature.name),
            Self::Native(_) => write!(f, "Native"),
            Self::Interface => write!(f, "Interface"),
        }
    }
}

/// One concrete callable
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub body: FunctionBody,
    /// The lexical layer active at the declaration site, captured once
    /// when the declaration is evaluated. Activations parent to this
    /// layer, never to the caller's.
    pub parent: RefCell<Option<LayerRef<Value>>>,
}

impl Function {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn is_interface_stub(&self) -> bool {
        matches!(self.body, FunctionBody::Interface)
    }

    fn same_signature(&self, other: &Function) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}

// Captured layers and bodies don't participate in equality: two functions
// are the same when their signatures and body kind agree.
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.params == other.params
            && self.return_type == other.return_type
            && mem::discriminant(&self.body) == mem::discriminant(&other.body)
    }
}

/// The set of same-named function variants visible under one name
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadedFunction {
    pub name: String,
    pub variants: Vec<Rc<Function>>,
}

impl OverloadedFunction {
    pub fn single(name: impl Into<String>, f: Rc<Function>) -> Self {
        Self { name: name.into(), variants: vec![f] }
    }

    /// A new overload set with `f` added. A variant with the same
    /// signature is replaced rather than duplicated, which keeps
    /// re-entrant checking of shared imports idempotent.
    pub fn with_variant(&self, f: Rc<Function>) -> Self {
        let mut variants: Vec<Rc<Function>> = self
            .variants
            .iter()
            .filter(|v| !v.same_signature(&f))
            .cloned()
            .collect();
        variants.push(f);
        Self { name: self.name.clone(), variants }
    }

    /// Every variant whose parameter count matches the argument count and
    /// whose parameter types are each assignable from the corresponding
    /// argument type. Order-sensitive, no coercion.
    pub fn find_matching(&self, args: &[Type], ambient: &dyn OverloadLookup) -> Vec<Rc<Function>> {
        self.variants
            .iter()
            .filter(|f| matching_arguments(&f.params, args, ambient))
            .cloned()
            .collect()
    }

    /// The one applicable variant for the argument types. When both an
    /// interface stub and exactly one concrete variant apply, the concrete
    /// one wins. Zero or several applicable variants after type checking
    /// has passed is a checker bug, reported as an internal error.
    pub fn resolve(&self, args: &[Type], ambient: &dyn OverloadLookup) -> Result<Rc<Function>, RuntimeError> {
        let matching = self.find_matching(args, ambient);
        match matching.len() {
            1 => Ok(matching.into_iter().next().expect("one variant")),
            0 => Err(self.resolution_failure(args, 0)),
            n => {
                let mut concrete: Vec<Rc<Function>> =
                    matching.into_iter().filter(|f| !f.is_interface_stub()).collect();
                if concrete.len() == 1 {
                    Ok(concrete.pop().expect("one concrete variant"))
                } else {
                    Err(self.resolution_failure(args, n))
                }
            }
        }
    }

    /// Like `resolve`, but interface stubs never apply. Used when binding
    /// a concrete value to an interface: the bound set must hold real
    /// implementations, not further indirections.
    pub fn resolve_static(&self, args: &[Type], ambient: &dyn OverloadLookup) -> Result<Rc<Function>, RuntimeError> {
        let mut matching: Vec<Rc<Function>> = self
            .find_matching(args, ambient)
            .into_iter()
            .filter(|f| !f.is_interface_stub())
            .collect();
        match matching.len() {
            1 => Ok(matching.pop().expect("one variant")),
            n => Err(self.resolution_failure(args, n)),
        }
    }

    fn resolution_failure(&self, args: &[Type], found: usize) -> RuntimeError {
        let args: Vec<String> = args.iter().map(|t| t.to_string()).collect();
        let variants: Vec<String> = self
            .variants
            .iter()
            .map(|f| {
                let params: Vec<String> = f.params.iter().map(|p| p.ty.to_string()).collect();
                format!("({})", params.join(", "))
            })
            .collect();
        RuntimeError::Internal(format!(
            "type checking missed a call to {}: {} applicable variant(s) for ({}) among {}",
            self.name,
            found,
            args.join(", "),
            variants.join(" ")
        ))
    }
}

fn matching_arguments(params: &[Parameter], args: &[Type], ambient: &dyn OverloadLookup) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(p, a)| p.ty.assignable_from(a, Some(ambient)))
}

/// The intermediate result of `x.f` before the remaining arguments are
/// supplied: the name of the overload set plus the receiver's type.
#[derive(Debug, Clone, PartialEq)]
pub struct PreAppliedFunction {
    pub name: String,
    pub receiver: Type,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FakeAmbient(HashMap<String, Rc<OverloadedFunction>>);

    impl OverloadLookup for FakeAmbient {
        fn lookup_overloads(&self, name: &str) -> Option<Rc<OverloadedFunction>> {
            self.0.get(name).cloned()
        }
    }

    fn empty_ambient() -> FakeAmbient {
        FakeAmbient(HashMap::new())
    }

    fn variant(name: &str, params: Vec<Type>, ret: Type) -> Rc<Function> {
        Rc::new(Function {
            name: name.into(),
            params: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Parameter { name: format!("p{i}"), ty })
                .collect(),
            return_type: ret,
            body: FunctionBody::Interface,
            parent: RefCell::new(None),
        })
    }

    #[test]
    fn resolves_by_argument_types() {
        let combine = OverloadedFunction {
            name: "combine".into(),
            variants: vec![
                variant("combine", vec![Type::INTEGER, Type::INTEGER], Type::INTEGER),
                variant("combine", vec![Type::STRING, Type::STRING], Type::STRING),
            ],
        };
        let ambient = empty_ambient();

        let ints = combine.resolve(&[Type::INTEGER, Type::INTEGER], &ambient).unwrap();
        assert_eq!(ints.return_type, Type::INTEGER);

        let strings = combine.resolve(&[Type::STRING, Type::STRING], &ambient).unwrap();
        assert_eq!(strings.return_type, Type::STRING);

        assert!(combine.resolve(&[Type::INTEGER, Type::STRING], &ambient).is_err());
        assert!(combine.resolve(&[Type::INTEGER], &ambient).is_err());
    }

    #[test]
    fn with_variant_replaces_same_signature() {
        let first = variant("f", vec![Type::INTEGER], Type::INTEGER);
        let of = OverloadedFunction::single("f", first);
        let of = of.with_variant(variant("f", vec![Type::INTEGER], Type::INTEGER));
        assert_eq!(of.variants.len(), 1);
        let of = of.with_variant(variant("f", vec![Type::STRING], Type::STRING));
        assert_eq!(of.variants.len(), 2);
    }

    #[test]
    fn resolve_static_skips_interface_stubs() {
        let stub = variant("speak", vec![Type::ANY], Type::STRING);
        let concrete = Rc::new(Function {
            name: "speak".into(),
            params: vec![Parameter { name: "c".into(), ty: Type::ANY }],
            return_type: Type::STRING,
            body: FunctionBody::Native(|_| Ok(crate::interp::Value::Nothing)),
            parent: RefCell::new(None),
        });
        let of = OverloadedFunction { name: "speak".into(), variants: vec![stub, concrete] };
        let ambient = empty_ambient();

        let resolved = of.resolve_static(&[Type::ANY], &ambient).unwrap();
        assert!(!resolved.is_interface_stub());

        // plain resolve sees both but prefers the concrete one
        let resolved = of.resolve(&[Type::ANY], &ambient).unwrap();
        assert!(!resolved.is_interface_stub());
    }
}
