//! Runtime values
//!
//! A tagged variant type matched explicitly by the evaluator; there is no
//! downcasting. `Interface` is a value wrapped at a call boundary where
//! the declared parameter type was an interface: it carries the concrete
//! data object together with the overload sets resolved for it at wrap
//! time, so late-bound dispatch is a lookup, not a search.

use crate::scope::Scope;
use crate::types::{DataType, Function, OverloadLookup, OverloadedFunction, Type};
use crate::utils::RuntimeError;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nothing,
    Integer(i64),
    Str(String),
    Boolean(bool),
    /// `'Label`
    Symbol(String),
    Data(Rc<DataObject>),
    /// An overload set bound under a name
    Function(Rc<OverloadedFunction>),
    /// A data object seen through an interface
    Interface(Rc<Iio>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nothing => "Nothing",
            Value::Integer(_) => "Integer",
            Value::Str(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Symbol(_) => "Symbol",
            Value::Data(_) => "Data",
            Value::Function(_) => "Function",
            Value::Interface(_) => "Interface",
        }
    }

    pub fn as_integer(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(other.kind_error("Integer")),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.kind_error("Boolean")),
        }
    }

    pub fn as_data(&self) -> Result<Rc<DataObject>, RuntimeError> {
        match self {
            Value::Data(obj) => Ok(Rc::clone(obj)),
            other => Err(other.kind_error("Data")),
        }
    }

    fn kind_error(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::ValueKind { expected, got: self.kind().to_string() }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "Nothing"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Symbol(label) => write!(f, "'{label}"),
            Value::Data(obj) => write!(f, "{obj}"),
            Value::Function(of) => write!(f, "{}", of.name),
            Value::Interface(iio) => write!(f, "{}", iio.value),
        }
    }
}

/// An instance of a `data` type
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    pub ty: Rc<DataType>,
    pub values: HashMap<String, Value>,
}

impl DataObject {
    pub fn field(&self, name: &str) -> Result<Value, RuntimeError> {
        self.values.get(name).cloned().ok_or_else(|| RuntimeError::MissingField {
            field: name.to_string(),
            type_name: self.ty.name.clone(),
        })
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.ty.name)?;
        // declared field order, not map order
        for (i, (name, _)) in self.ty.fields.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            match self.values.get(name) {
                Some(value) => write!(f, "{sep}{name}: {value}")?,
                None => write!(f, "{sep}{name}: ?")?,
            }
        }
        write!(f, " }}")
    }
}

/// An interface-bound object: the wrapped data object, its concrete type,
/// and the concrete overload sets resolved for it when it was wrapped.
#[derive(Debug)]
pub struct Iio {
    pub value: Rc<DataObject>,
    pub concrete: Type,
    pub functions: Vec<Rc<OverloadedFunction>>,
}

impl Iio {
    /// The concrete variant implementing `name` for this object, given the
    /// argument types that follow the receiver.
    pub fn variant(
        &self,
        name: &str,
        arg_types: &[Type],
        ambient: &dyn OverloadLookup,
    ) -> Result<Rc<Function>, RuntimeError> {
        let overloads = self
            .functions
            .iter()
            .find(|of| of.name == name)
            .ok_or_else(|| {
                RuntimeError::Internal(format!(
                    "no bound implementation of {name} for {}",
                    self.concrete.name()
                ))
            })?;
        let mut full = vec![self.concrete.clone()];
        full.extend(arg_types.iter().cloned());
        overloads.resolve(&full, ambient)
    }
}

// Bound overload sets don't participate in equality.
impl PartialEq for Iio {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.concrete == other.concrete
    }
}

impl OverloadLookup for Scope<Value> {
    fn lookup_overloads(&self, name: &str) -> Option<Rc<OverloadedFunction>> {
        match self.get(name) {
            Ok(Value::Function(of)) => Some(of),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn displays_values() {
        assert_eq!(Value::Integer(5).to_string(), "5");
        assert_eq!(Value::Str("word".into()).to_string(), "word");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Symbol("None".into()).to_string(), "'None");
        assert_eq!(Value::Nothing.to_string(), "Nothing");
    }

    #[test]
    fn displays_data_in_declared_field_order() {
        let ty = Rc::new(DataType {
            name: "Pet".into(),
            fields: vec![("name".into(), Type::STRING), ("age".into(), Type::INTEGER)],
        });
        let mut values = HashMap::new();
        values.insert("age".to_string(), Value::Integer(3));
        values.insert("name".to_string(), Value::Str("Luna".into()));
        let obj = DataObject { ty, values };
        assert_eq!(obj.to_string(), "Pet { name: Luna, age: 3 }");
    }

    #[test]
    fn value_kind_errors_name_both_sides() {
        let err = Value::Str("x".into()).as_integer().unwrap_err();
        assert_eq!(err.to_string(), "Expected Integer value, got String");
    }
}
