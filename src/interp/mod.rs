//! Tree-walking evaluator
//!
//! Runs a type-checked source file. Call sites are executed through the
//! annotation slots the checker filled in; the evaluator never performs
//! its own overload search, and finding a slot empty (or an overload set
//! with no unique variant) is reported as an internal error, not a user
//! diagnostic.

pub mod value;

pub use value::{DataObject, Iio, Value};

use crate::frontend::ast::*;
use crate::frontend::Sources;
use crate::scope::Scope;
use crate::stdlib;
use crate::types::{Function, FunctionBody, InterfaceType, OverloadLookup, OverloadedFunction, Type};
use crate::utils::RuntimeError;
use log::debug;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

/// Integer arithmetic unwinds instead of wrapping
fn int_arith(a: i64, b: i64, op: fn(i64, i64) -> Option<i64>) -> Result<Value, RuntimeError> {
    op(a, b).map(Value::Integer).ok_or(RuntimeError::IntegerOverflow)
}

/// The evaluator state for one program run
pub struct Interpreter {
    pub scope: Scope<Value>,
    sources: Rc<Sources>,
}

impl Interpreter {
    pub fn new(sources: Rc<Sources>) -> Self {
        Self { scope: Scope::new(), sources }
    }

    // ==================== File Pass ====================

    /// Evaluate one source file: built-ins, imports, interface stubs,
    /// function declarations (each capturing the current top layer), then
    /// the top-level statements in order.
    pub fn run_file(&mut self, file: &SourceFile) -> Result<(), RuntimeError> {
        for function in stdlib::builtins() {
            self.define_function(function);
        }

        for import in &file.imports {
            self.run_import(import)?;
        }
        for decl in &file.types {
            if let TypeDecl::Interface(iface) = decl {
                for stub in iface.stubs.borrow().iter() {
                    *stub.parent.borrow_mut() = Some(self.scope.top());
                    self.define_function(Rc::clone(stub));
                }
            }
        }
        for decl in &file.functions {
            let function = decl.function.borrow().clone().ok_or_else(|| {
                RuntimeError::Internal(format!(
                    "function {} was never declared by the checker",
                    decl.signature.name
                ))
            })?;
            *function.parent.borrow_mut() = Some(self.scope.top());
            self.define_function(function);
        }
        debug!(
            "running {} top-level statement(s), {} function declaration(s)",
            file.statements.len(),
            file.functions.len()
        );
        for stmt in &file.statements {
            self.exec(stmt)?;
        }
        Ok(())
    }

    /// Evaluate the imported file in a detached layer, then copy only the
    /// listed names back into the importing layer.
    fn run_import(&mut self, import: &ImportDecl) -> Result<(), RuntimeError> {
        let file = self
            .sources
            .get(&import.path)
            .ok_or_else(|| RuntimeError::UnknownIdentifier(import.path.clone()))?;
        debug!("evaluating import {}", import.path);
        let current = self.scope.top();
        self.scope.enter_detached();
        let mut result = self.run_file(&file);
        if result.is_ok() {
            for name in &import.names {
                match self.scope.get(name) {
                    Ok(value) => current.borrow_mut().insert(name.clone(), value),
                    Err(e) => {
                        result = Err(RuntimeError::UnknownIdentifier(e.0));
                        break;
                    }
                }
            }
        }
        self.scope.leave();
        result
    }

    /// Bind `f` under its name, folding it into the overload set already
    /// visible there, if any.
    fn define_function(&mut self, f: Rc<Function>) {
        let name = f.name.clone();
        match self.scope.get(&name) {
            Ok(Value::Function(of)) => {
                let combined = Value::Function(Rc::new(of.with_variant(f)));
                let _ = self.scope.assign(&name, combined);
            }
            _ => {
                let single = Value::Function(Rc::new(OverloadedFunction::single(name.clone(), f)));
                self.scope.define(name, single);
            }
        }
    }

    // ==================== Statements ====================

    pub fn exec(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::Let { name, value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nothing,
                };
                self.scope.define(name.clone(), value);
                Ok(())
            }
            Stmt::Assign { name, value, .. } => {
                let value = self.eval(value)?;
                self.scope
                    .assign(name, value)
                    .map_err(|e| RuntimeError::UnknownIdentifier(e.0))
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            Stmt::For { var, from, to, body, .. } => {
                let from = self.eval(from)?.as_integer()?;
                let to = self.eval(to)?.as_integer()?;
                self.scope.enter();
                let result = self.run_for(var, from, to, body);
                self.scope.leave();
                result
            }
            Stmt::While { cond, body, .. } => {
                self.scope.enter();
                let result = self.run_while(cond, body);
                self.scope.leave();
                result
            }
        }
    }

    // the range is inclusive at both ends
    fn run_for(&mut self, var: &str, from: i64, to: i64, body: &[Stmt]) -> Result<(), RuntimeError> {
        for i in from..=to {
            self.scope.define(var.to_string(), Value::Integer(i));
            for stmt in body {
                self.exec(stmt)?;
            }
        }
        Ok(())
    }

    fn run_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<(), RuntimeError> {
        while self.eval(cond)?.as_boolean()? {
            for stmt in body {
                self.exec(stmt)?;
            }
        }
        Ok(())
    }

    // ==================== Expressions ====================

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Integer(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Boolean(*b)),
            ExprKind::Symbol(label) => Ok(Value::Symbol(label.clone())),
            ExprKind::Ident(name) => self
                .scope
                .get(name)
                .map_err(|e| RuntimeError::UnknownIdentifier(e.0)),
            ExprKind::Binary(op, left, right) => self.eval_binary(*op, left, right),
            ExprKind::Not(inner) => Ok(Value::Boolean(!self.eval(inner)?.as_boolean()?)),
            ExprKind::Neg(inner) => self
                .eval(inner)?
                .as_integer()?
                .checked_neg()
                .map(Value::Integer)
                .ok_or(RuntimeError::IntegerOverflow),
            ExprKind::Block(block) => self.eval_block(block),
            ExprKind::If(if_expr) => {
                if self.eval(&if_expr.cond)?.as_boolean()? {
                    self.eval_block(&if_expr.then)
                } else {
                    self.eval(&if_expr.otherwise)
                }
            }
            ExprKind::Match(m) => {
                let value = self.eval(&m.value)?;
                for (pattern, result) in &m.arms {
                    if self.eval(pattern)? == value {
                        return self.eval(result);
                    }
                }
                self.eval(&m.fallback)
            }
            ExprKind::Call(call) => self.eval_call(call),
            ExprKind::Dot(dot) => {
                let target = self.eval(&dot.target)?;
                target.as_data()?.field(&dot.name)
            }
            ExprKind::Construct(construct) => self.eval_construct(construct),
            // a cast is a static reinterpretation; the value passes through
            ExprKind::Cast(cast) => self.eval(&cast.value),
        }
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.eval(left)?;
        let right = self.eval(right)?;
        let value = match op {
            BinOp::Add => match left {
                Value::Str(s) => Value::Str(format!("{s}{right}")),
                other => int_arith(other.as_integer()?, right.as_integer()?, i64::checked_add)?,
            },
            BinOp::Sub => int_arith(left.as_integer()?, right.as_integer()?, i64::checked_sub)?,
            BinOp::Mul => int_arith(left.as_integer()?, right.as_integer()?, i64::checked_mul)?,
            BinOp::Div => {
                let divisor = right.as_integer()?;
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                int_arith(left.as_integer()?, divisor, i64::checked_div)?
            }
            BinOp::Mod => {
                let divisor = right.as_integer()?;
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                int_arith(left.as_integer()?, divisor, i64::checked_rem)?
            }
            BinOp::Eq => Value::Boolean(left == right),
            BinOp::Ne => Value::Boolean(left != right),
            BinOp::Lt => Value::Boolean(left.as_integer()? < right.as_integer()?),
            BinOp::Gt => Value::Boolean(left.as_integer()? > right.as_integer()?),
            BinOp::Le => Value::Boolean(left.as_integer()? <= right.as_integer()?),
            BinOp::Ge => Value::Boolean(left.as_integer()? >= right.as_integer()?),
        };
        Ok(value)
    }

    fn eval_block(&mut self, block: &Block) -> Result<Value, RuntimeError> {
        self.scope.enter();
        let result = self.run_block(block);
        self.scope.leave();
        result
    }

    fn run_block(&mut self, block: &Block) -> Result<Value, RuntimeError> {
        for stmt in &block.statements {
            self.exec(stmt)?;
        }
        self.eval(&block.tail)
    }

    fn eval_construct(&mut self, construct: &ConstructExpr) -> Result<Value, RuntimeError> {
        let ty = construct.resolved.borrow().clone().ok_or_else(|| {
            RuntimeError::Internal(format!(
                "constructor {} left unresolved by the checker",
                construct.type_name
            ))
        })?;
        let mut values = HashMap::new();
        for (field, expr) in &construct.fields {
            values.insert(field.clone(), self.eval(expr)?);
        }
        Ok(Value::Data(Rc::new(DataObject { ty, values })))
    }

    // ==================== Calls ====================

    fn eval_call(&mut self, call: &CallExpr) -> Result<Value, RuntimeError> {
        let resolved = call.resolved.borrow().clone().ok_or_else(|| {
            RuntimeError::Internal("call site left unresolved by the checker".to_string())
        })?;

        let mut args = Vec::with_capacity(call.args.len() + 1);
        if resolved.with_receiver {
            let ExprKind::Dot(dot) = &call.target.kind else {
                return Err(RuntimeError::Internal(
                    "receiver call without a dot-access target".to_string(),
                ));
            };
            args.push(self.eval(&dot.target)?);
        }
        for arg in &call.args {
            args.push(self.eval(arg)?);
        }
        for (i, wrap) in resolved.wrap.iter().enumerate() {
            if let Some(iface) = wrap {
                let value = mem::replace(&mut args[i], Value::Nothing);
                args[i] = self.wrap_interface(iface, value)?;
            }
        }
        self.call_function(&resolved.function, args)
    }

    /// Invoke one concrete callable with already-evaluated arguments.
    /// User functions activate against their declaration-time layer,
    /// never the caller's.
    fn call_function(&mut self, f: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match &f.body {
            FunctionBody::User(decl) => {
                let parent = f.parent.borrow().clone().ok_or_else(|| {
                    RuntimeError::Internal(format!(
                        "{} was never bound to its declaration scope",
                        f.name
                    ))
                })?;
                self.scope.enter_with(parent);
                for (param, value) in f.params.iter().zip(args) {
                    self.scope.define(param.name.clone(), value);
                }
                let decl = Rc::clone(decl);
                let result = self.run_user(&decl);
                self.scope.leave();
                result
            }
            FunctionBody::Native(implementation) => {
                self.scope.enter_detached();
                for (param, value) in f.params.iter().zip(args) {
                    self.scope.define(param.name.clone(), value);
                }
                let result = implementation(&mut self.scope);
                self.scope.leave();
                result
            }
            FunctionBody::Interface => self.call_stub(f, args),
        }
    }

    fn run_user(&mut self, decl: &FunctionDecl) -> Result<Value, RuntimeError> {
        for stmt in &decl.statements {
            self.exec(stmt)?;
        }
        self.eval(&decl.tail)
    }

    /// A virtual call always delegates to a concrete call: the receiver
    /// must be interface-bound, the implementation is looked up in its
    /// bound overload sets, and the concrete variant gets the unwrapped
    /// data object as its receiver.
    fn call_stub(&mut self, stub: &Function, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Interface(iio)) = args.first().cloned() else {
            return Err(RuntimeError::Internal(format!(
                "virtual call to {} without an interface-bound receiver",
                stub.name
            )));
        };
        let arg_types: Vec<Type> = stub.params[1..].iter().map(|p| p.ty.clone()).collect();
        let concrete = iio.variant(&stub.name, &arg_types, &self.scope)?;
        args[0] = Value::Data(Rc::clone(&iio.value));
        self.call_function(&concrete, args)
    }

    /// Bind a data object to an interface: resolve, once, the concrete
    /// variant implementing each required signature for the object's type.
    fn wrap_interface(
        &mut self,
        iface: &Rc<InterfaceType>,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let object = value.as_data()?;
        let concrete = Type::Data(Rc::clone(&object.ty));
        debug!("binding {} to interface {}", object.ty.name, iface.name);
        let mut functions = Vec::new();
        for of in iface.complete_functions(&concrete) {
            let ambient = self.scope.lookup_overloads(&of.name).ok_or_else(|| {
                RuntimeError::Internal(format!("no function {} in scope to bind", of.name))
            })?;
            let variants = of
                .variants
                .iter()
                .map(|stub| ambient.resolve_static(&stub.param_types(), &self.scope))
                .collect::<Result<Vec<_>, _>>()?;
            functions.push(Rc::new(OverloadedFunction { name: of.name.clone(), variants }));
        }
        Ok(Value::Interface(Rc::new(Iio { value: object, concrete, functions })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_source, Sources, TypeChecker};
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Interpreter {
        run_with(Sources::new(), source)
    }

    fn run_with(sources: Sources, source: &str) -> Interpreter {
        let sources = Rc::new(sources);
        let file = parse_source(source).unwrap();
        let mut checker = TypeChecker::new(Rc::clone(&sources));
        checker.check_file(&file);
        assert_eq!(checker.diagnostics, vec![]);
        let mut interpreter = Interpreter::new(sources);
        interpreter.run_file(&file).unwrap();
        interpreter
    }

    fn value_of(interpreter: &Interpreter, name: &str) -> Value {
        interpreter.scope.get(name).unwrap()
    }

    #[test]
    fn evaluates_arithmetic() {
        let interp = run("let a = 1 + 2 * 3; let b = 10 / 3; let c = 10 % 3; let d = -a;");
        assert_eq!(value_of(&interp, "a"), Value::Integer(7));
        assert_eq!(value_of(&interp, "b"), Value::Integer(3));
        assert_eq!(value_of(&interp, "c"), Value::Integer(1));
        assert_eq!(value_of(&interp, "d"), Value::Integer(-7));
    }

    #[test]
    fn concatenates_strings() {
        let interp = run("let s = \"wo\" + \"rd\"; let t = \"n = \" + 5;");
        assert_eq!(value_of(&interp, "s"), Value::Str("word".into()));
        assert_eq!(value_of(&interp, "t"), Value::Str("n = 5".into()));
    }

    #[test]
    fn cast_passes_value_through() {
        let interp = run("let x = 5 as Any; let s = \"word\" as Any;");
        assert_eq!(value_of(&interp, "x"), Value::Integer(5));
        assert_eq!(value_of(&interp, "s"), Value::Str("word".into()));
    }

    #[test]
    fn uninitialized_let_binds_nothing() {
        let interp = run("let x: Integer; x = 5;");
        assert_eq!(value_of(&interp, "x"), Value::Integer(5));
        let interp = run("let y: Integer;");
        assert_eq!(value_of(&interp, "y"), Value::Nothing);
    }

    #[test]
    fn block_shadows_without_leaking() {
        let interp = run("let x = 5; let y = { let x = 15; x };");
        assert_eq!(value_of(&interp, "x"), Value::Integer(5));
        assert_eq!(value_of(&interp, "y"), Value::Integer(15));
    }

    #[test]
    fn closure_sees_later_assignment() {
        let source = r#"
            let x = 5;
            function getX(): Integer { x }
            x = 7;
            let y = getX();
        "#;
        assert_eq!(value_of(&run(source), "y"), Value::Integer(7));
    }

    #[test]
    fn function_activates_against_declaration_scope() {
        // the caller's local x must not leak into the callee
        let source = r#"
            let x = 1;
            function getX(): Integer { x }
            function shadowed(): Integer { let x = 99; getX() }
            let y = shadowed();
        "#;
        assert_eq!(value_of(&run(source), "y"), Value::Integer(1));
    }

    #[test]
    fn recursion() {
        let source = r#"
            function fib(n: Integer): Integer { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }
            let x = fib(10);
        "#;
        assert_eq!(value_of(&run(source), "x"), Value::Integer(55));
    }

    #[test]
    fn overloads_dispatch_on_argument_types() {
        let source = r#"
            function combine(a: Integer, b: Integer): Integer { a * b }
            function combine(a: String, b: String): String { a + b }
            let n = combine(2, 5);
            let s = combine("wo", "rd");
        "#;
        let interp = run(source);
        assert_eq!(value_of(&interp, "n"), Value::Integer(10));
        assert_eq!(value_of(&interp, "s"), Value::Str("word".into()));
    }

    #[test]
    fn for_loop_is_inclusive_and_scoped() {
        let source = "let sum = 0; for i in 1..3 { sum = sum + i; }";
        assert_eq!(value_of(&run(source), "sum"), Value::Integer(6));
    }

    #[test]
    fn while_loop() {
        let source = "let n = 10; let steps = 0; while n > 1 { n = n / 2; steps = steps + 1; }";
        let interp = run(source);
        assert_eq!(value_of(&interp, "n"), Value::Integer(1));
        assert_eq!(value_of(&interp, "steps"), Value::Integer(3));
    }

    #[test]
    fn match_takes_first_equal_arm() {
        let source = "let x = match 3 { 1: \"one\", 3: \"three\", else: \"dunno\" };";
        assert_eq!(value_of(&run(source), "x"), Value::Str("three".into()));
        let source = "let x = match 9 { 1: \"one\", 3: \"three\", else: \"dunno\" };";
        assert_eq!(value_of(&run(source), "x"), Value::Str("dunno".into()));
    }

    #[test]
    fn constructs_and_reads_fields() {
        let source = r#"
            data Pet { name: String, age: Integer }
            let pet = Pet { name: "Luna", age: 3 };
            let n = pet.name;
            let a = pet.age;
        "#;
        let interp = run(source);
        assert_eq!(value_of(&interp, "n"), Value::Str("Luna".into()));
        assert_eq!(value_of(&interp, "a"), Value::Integer(3));
    }

    #[test]
    fn generic_enum_value_matches_symbol() {
        let source = r#"
            enum Option<T> { T, 'None }
            let x: Option<Integer> = 'None;
            let y = match x { 'None: 0, else: 1 };
        "#;
        assert_eq!(value_of(&run(source), "y"), Value::Integer(0));
    }

    #[test]
    fn interface_dispatch_picks_concrete_implementation() {
        let source = r#"
            interface Animal { speak(): String }
            data Cat {}
            data Dog {}
            function speak(c: Cat): String { "meow" }
            function speak(d: Dog): String { "woof" }
            function makeSpeak(a: Animal): String { a.speak() }
            let m = makeSpeak(Cat {});
            let w = makeSpeak(Dog {});
        "#;
        let interp = run(source);
        assert_eq!(value_of(&interp, "m"), Value::Str("meow".into()));
        assert_eq!(value_of(&interp, "w"), Value::Str("woof".into()));
    }

    #[test]
    fn import_copies_only_listed_names() {
        let mut sources = Sources::new();
        let library = parse_source(
            "function visible(): Integer { 1 } function timesFive(n: Integer): Integer { n * 5 }",
        )
        .unwrap();
        sources.register("lib.util", Rc::new(library));

        let source = "import lib.util.{visible, timesFive} let x = visible(); let y = timesFive(3);";
        let interp = run_with(sources, source);
        assert_eq!(value_of(&interp, "x"), Value::Integer(1));
        assert_eq!(value_of(&interp, "y"), Value::Integer(15));
        // the import layer itself is gone
        assert_eq!(interp.scope.depth(), 1);
    }

    #[test]
    fn division_by_zero_unwinds() {
        let sources = Rc::new(Sources::new());
        let file = parse_source("let x = 1 / 0;").unwrap();
        let mut checker = TypeChecker::new(Rc::clone(&sources));
        checker.check_file(&file);
        assert!(checker.diagnostics.is_empty());
        let mut interpreter = Interpreter::new(sources);
        let err = interpreter.run_file(&file).unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn integer_overflow_unwinds() {
        let sources = Rc::new(Sources::new());
        let file = parse_source("let x = 9223372036854775807 + 1;").unwrap();
        let mut checker = TypeChecker::new(Rc::clone(&sources));
        checker.check_file(&file);
        assert!(checker.diagnostics.is_empty());
        let mut interpreter = Interpreter::new(sources);
        let err = interpreter.run_file(&file).unwrap_err();
        assert!(matches!(err, RuntimeError::IntegerOverflow));
    }
}
