//! Type model - type variants, assignability, functions and overloads

pub mod function;
pub mod type_system;

pub use function::{Function, FunctionBody, NativeImpl, OverloadedFunction, Parameter, PreAppliedFunction};
pub use type_system::{union, BuiltInType, DataType, EnumType, InterfaceType, OverloadLookup, Type};
