//! Type System for Brio
//!
//! A closed set of type variants and the assignability relation between
//! them. Equality is structural. `Any` is assignable from everything,
//! enums are assignable from their members (and from enums whose members
//! they cover), and interfaces are satisfied structurally: a candidate
//! type satisfies an interface when, for every required function name,
//! the ambient overload set contains a variant whose first parameter type
//! is exactly the candidate type.

use crate::types::function::{Function, FunctionBody, OverloadedFunction, Parameter, PreAppliedFunction};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Primitive built-in types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInType {
    Nothing,
    Any,
    Integer,
    String,
    Boolean,
}

impl BuiltInType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Any => "Any",
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Boolean => "Boolean",
        }
    }

    /// The built-in types users may refer to by name. `Nothing` is the
    /// checker's fallback type and is deliberately not declarable.
    pub fn declarable() -> [BuiltInType; 4] {
        [Self::Any, Self::Integer, Self::String, Self::Boolean]
    }
}

/// A record type: named, with ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl DataType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// A tagged union over a set of member types. Generic enums carry a
/// `Type::Generic` placeholder member substituted at use sites.
#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<Type>,
}

impl EnumType {
    pub fn contains(&self, ty: &Type) -> bool {
        self.members.iter().any(|m| m == ty)
    }
}

// Member order is declaration order; equality is set equality.
impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.members.len() == other.members.len()
            && self.members.iter().all(|m| other.contains(m))
    }
}

/// A structural interface: a set of required function signatures.
/// Each signature is stored as a single-variant overload set whose
/// parameters do *not* include the receiver.
#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub name: String,
    pub signatures: Vec<Rc<OverloadedFunction>>,
}

impl InterfaceType {
    /// Build the callable method stubs for this interface, with `self_type`
    /// prepended as the receiver parameter. At declaration time the
    /// receiver is the interface itself; when binding a concrete value the
    /// receiver is the concrete type.
    pub fn complete_functions(&self, self_type: &Type) -> Vec<OverloadedFunction> {
        self.signatures
            .iter()
            .map(|of| OverloadedFunction {
                name: of.name.clone(),
                variants: of
                    .variants
                    .iter()
                    .map(|f| {
                        let mut params = vec![Parameter { name: "self".into(), ty: self_type.clone() }];
                        params.extend(f.params.iter().cloned());
                        Rc::new(Function {
                            name: f.name.clone(),
                            params,
                            return_type: f.return_type.clone(),
                            body: FunctionBody::Interface,
                            parent: RefCell::new(None),
                        })
                    })
                    .collect(),
            })
            .collect()
    }
}

impl PartialEq for InterfaceType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.signatures.len() == other.signatures.len()
            && self
                .signatures
                .iter()
                .all(|s| other.signatures.iter().any(|o| o == s))
    }
}

/// Resolves a function name to the overload set currently visible under
/// it. Both the typing scope and the runtime scope can answer this, which
/// is what lets interface satisfaction be checked against either.
pub trait OverloadLookup {
    fn lookup_overloads(&self, name: &str) -> Option<Rc<OverloadedFunction>>;
}

/// A Brio type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    BuiltIn(BuiltInType),
    Data(Rc<DataType>),
    Enum(Rc<EnumType>),
    Interface(Rc<InterfaceType>),
    /// An overload set used as a type: "callable named X"
    Function(Rc<OverloadedFunction>),
    /// A dot-access before the remaining arguments are supplied
    PreApplied(Rc<PreAppliedFunction>),
    /// An atom literal, self-typed
    Symbol(String),
    /// A type parameter placeholder, only valid inside its enum's declaration
    Generic(String),
}

impl Type {
    pub const NOTHING: Type = Type::BuiltIn(BuiltInType::Nothing);
    pub const ANY: Type = Type::BuiltIn(BuiltInType::Any);
    pub const INTEGER: Type = Type::BuiltIn(BuiltInType::Integer);
    pub const STRING: Type = Type::BuiltIn(BuiltInType::String);
    pub const BOOLEAN: Type = Type::BuiltIn(BuiltInType::Boolean);

    /// The name the type goes by in diagnostics
    pub fn name(&self) -> String {
        match self {
            Type::BuiltIn(b) => b.name().to_string(),
            Type::Data(d) => d.name.clone(),
            Type::Enum(e) => e.name.clone(),
            Type::Interface(i) => i.name.clone(),
            Type::Function(f) => f.name.clone(),
            Type::PreApplied(p) => p.name.clone(),
            Type::Symbol(label) => format!("'{label}"),
            Type::Generic(name) => name.clone(),
        }
    }

    /// Whether a value of type `other` may flow into a slot of this type.
    ///
    /// Reflexive, universal for `Any`. Enum targets accept their members
    /// and any enum whose members they cover. Interface targets need the
    /// ambient overload sets to decide structural satisfaction; with no
    /// ambient lookup they only accept themselves.
    pub fn assignable_from(&self, other: &Type, ambient: Option<&dyn OverloadLookup>) -> bool {
        if *self == Type::ANY || self == other {
            return true;
        }
        match self {
            Type::Enum(target) => match other {
                Type::Enum(candidate) => candidate.members.iter().all(|m| target.contains(m)),
                _ => target.contains(other),
            },
            Type::Interface(target) => match ambient {
                Some(scope) => target
                    .signatures
                    .iter()
                    .all(|sig| signature_present(sig, scope, other)),
                None => false,
            },
            _ => false,
        }
    }
}

/// True when the ambient overload set for `sig`'s name has a variant whose
/// first parameter type equals `target` exactly. No transitive interface
/// matching.
fn signature_present(sig: &OverloadedFunction, scope: &dyn OverloadLookup, target: &Type) -> bool {
    match scope.lookup_overloads(&sig.name) {
        Some(of) => of
            .variants
            .iter()
            .any(|f| f.params.first().map(|p| &p.ty) == Some(target)),
        None => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Enum(e) if e.name == "Inline" => {
                let members: Vec<String> = e.members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", members.join("|"))
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Unify a set of types into one: nested enums are flattened into a single
/// member set, a single-member result collapses to that member, anything
/// else becomes an anonymous enum named `Inline`. This is how the types of
/// differing `if`/`match` branches are combined.
pub fn union(types: impl IntoIterator<Item = Type>) -> Type {
    let mut members: Vec<Type> = Vec::new();
    let mut push = |ty: Type, members: &mut Vec<Type>| {
        if !members.contains(&ty) {
            members.push(ty);
        }
    };
    for ty in types {
        match ty {
            Type::Enum(e) => {
                for member in &e.members {
                    push(member.clone(), &mut members);
                }
            }
            other => push(other, &mut members),
        }
    }
    if members.len() == 1 {
        members.pop().expect("single member")
    } else {
        Type::Enum(Rc::new(EnumType { name: "Inline".into(), members }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn enum_of(name: &str, members: Vec<Type>) -> Type {
        Type::Enum(Rc::new(EnumType { name: name.into(), members }))
    }

    #[test]
    fn reflexive_and_any() {
        assert!(Type::INTEGER.assignable_from(&Type::INTEGER, None));
        assert!(Type::ANY.assignable_from(&Type::STRING, None));
        assert!(!Type::INTEGER.assignable_from(&Type::STRING, None));
        assert!(!Type::INTEGER.assignable_from(&Type::ANY, None));
    }

    #[test]
    fn enum_accepts_members() {
        let choice = enum_of("Choice", vec![Type::Symbol("A".into()), Type::INTEGER]);
        assert!(choice.assignable_from(&Type::INTEGER, None));
        assert!(choice.assignable_from(&Type::Symbol("A".into()), None));
        assert!(!choice.assignable_from(&Type::Symbol("B".into()), None));
        assert!(!choice.assignable_from(&Type::BOOLEAN, None));
    }

    #[test]
    fn enum_accepts_covered_enum() {
        let big = enum_of("Big", vec![Type::INTEGER, Type::STRING, Type::Symbol("None".into())]);
        let small = enum_of("Inline", vec![Type::INTEGER, Type::Symbol("None".into())]);
        let wide = enum_of("Inline", vec![Type::INTEGER, Type::BOOLEAN]);
        assert!(big.assignable_from(&small, None));
        assert!(!big.assignable_from(&wide, None));
    }

    #[test]
    fn enum_equality_ignores_member_order() {
        let a = enum_of("Inline", vec![Type::INTEGER, Type::STRING]);
        let b = enum_of("Inline", vec![Type::STRING, Type::INTEGER]);
        assert_eq!(a, b);
    }

    #[test]
    fn union_collapses_single_member() {
        assert_eq!(union(vec![Type::INTEGER, Type::INTEGER]), Type::INTEGER);
    }

    #[test]
    fn union_builds_inline_enum() {
        let unified = union(vec![Type::INTEGER, Type::STRING]);
        assert_eq!(unified, enum_of("Inline", vec![Type::INTEGER, Type::STRING]));
        assert_eq!(unified.to_string(), "Integer|String");
    }

    #[test]
    fn union_flattens_nested_enums() {
        let opt = enum_of("Opt", vec![Type::INTEGER, Type::Symbol("None".into())]);
        let unified = union(vec![opt, Type::STRING]);
        assert_eq!(
            unified,
            enum_of("Inline", vec![Type::INTEGER, Type::Symbol("None".into()), Type::STRING])
        );
    }

    struct FakeAmbient(HashMap<String, Rc<OverloadedFunction>>);

    impl OverloadLookup for FakeAmbient {
        fn lookup_overloads(&self, name: &str) -> Option<Rc<OverloadedFunction>> {
            self.0.get(name).cloned()
        }
    }

    fn concrete(name: &str, first_param: Type) -> Rc<Function> {
        Rc::new(Function {
            name: name.into(),
            params: vec![Parameter { name: "self".into(), ty: first_param }],
            return_type: Type::STRING,
            body: FunctionBody::Interface,
            parent: RefCell::new(None),
        })
    }

    #[test]
    fn interface_satisfied_by_first_argument_overload() {
        let cat = Type::Data(Rc::new(DataType { name: "Cat".into(), fields: vec![] }));
        let robot = Type::Data(Rc::new(DataType { name: "Robot".into(), fields: vec![] }));
        let animal = Type::Interface(Rc::new(InterfaceType {
            name: "Animal".into(),
            signatures: vec![Rc::new(OverloadedFunction {
                name: "speak".into(),
                variants: vec![Rc::new(Function {
                    name: "speak".into(),
                    params: vec![],
                    return_type: Type::STRING,
                    body: FunctionBody::Interface,
                    parent: RefCell::new(None),
                })],
            })],
        }));

        let mut ambient = HashMap::new();
        ambient.insert(
            "speak".to_string(),
            Rc::new(OverloadedFunction {
                name: "speak".into(),
                variants: vec![concrete("speak", cat.clone())],
            }),
        );
        let ambient = FakeAmbient(ambient);

        assert!(animal.assignable_from(&cat, Some(&ambient)));
        assert!(!animal.assignable_from(&robot, Some(&ambient)));
        assert!(!animal.assignable_from(&cat, None));
    }
}
