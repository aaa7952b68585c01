//! The built-in function set
//!
//! Built-ins are ordinary `Function` values with a native body. The
//! checker registers their signatures and the evaluator their
//! implementations, so overload resolution treats them exactly like
//! user functions. Arguments are bound into a fresh detached layer
//! before the native body runs.

use crate::interp::Value;
use crate::scope::Scope;
use crate::types::{Function, FunctionBody, NativeImpl, Parameter, Type};
use crate::utils::RuntimeError;
use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;

/// All built-in functions, freshly instantiated. Registering the same
/// set twice folds into the existing overload sets without duplication.
pub fn builtins() -> Vec<Rc<Function>> {
    vec![
        native(
            "printLine",
            vec![Parameter { name: "text".into(), ty: Type::ANY }],
            Type::NOTHING,
            print_line,
        ),
        native("readLine", vec![], Type::STRING, read_line),
    ]
}

fn native(name: &str, params: Vec<Parameter>, return_type: Type, body: NativeImpl) -> Rc<Function> {
    Rc::new(Function {
        name: name.into(),
        params,
        return_type,
        body: FunctionBody::Native(body),
        parent: RefCell::new(None),
    })
}

fn print_line(scope: &mut Scope<Value>) -> Result<Value, RuntimeError> {
    let text = scope
        .get("text")
        .map_err(|e| RuntimeError::UnknownIdentifier(e.0))?;
    println!("{text}");
    Ok(Value::Nothing)
}

fn read_line(_scope: &mut Scope<Value>) -> Result<Value, RuntimeError> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RuntimeError::Io(e.to_string()))?;
    Ok(Value::Str(line.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_carry_native_bodies() {
        let all = builtins();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|f| matches!(f.body, FunctionBody::Native(_))));
        let print = all.iter().find(|f| f.name == "printLine").unwrap();
        assert_eq!(print.params.len(), 1);
        assert_eq!(print.return_type, Type::NOTHING);
        let read = all.iter().find(|f| f.name == "readLine").unwrap();
        assert!(read.params.is_empty());
        assert_eq!(read.return_type, Type::STRING);
    }
}
