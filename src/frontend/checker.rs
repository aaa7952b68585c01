//! Static type checker
//!
//! A whole-file pass ordered so that forward references work: built-ins,
//! imports, type declarations, function signatures, top-level statements,
//! and only then function bodies. Diagnostics are batched; checking
//! continues past each one with `Nothing` as the fallback type. Call and
//! constructor sites get their annotation slots filled in here, once; the
//! evaluator never re-resolves.

use crate::frontend::ast::*;
use crate::frontend::diagnostics::TypeError;
use crate::frontend::Sources;
use crate::scope::Scope;
use crate::stdlib;
use crate::types::{
    union, BuiltInType, DataType, EnumType, Function, FunctionBody, InterfaceType, OverloadLookup,
    OverloadedFunction, Parameter, PreAppliedFunction, Type,
};
use crate::utils::Loc;
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

impl OverloadLookup for Scope<Type> {
    fn lookup_overloads(&self, name: &str) -> Option<Rc<OverloadedFunction>> {
        match self.get(name) {
            Ok(Type::Function(of)) => Some(of),
            _ => None,
        }
    }
}

/// The checker state for one program run
pub struct TypeChecker {
    typing: Scope<Type>,
    pub diagnostics: Vec<TypeError>,
    sources: Rc<Sources>,
}

impl TypeChecker {
    pub fn new(sources: Rc<Sources>) -> Self {
        Self {
            typing: Scope::new(),
            diagnostics: Vec::new(),
            sources,
        }
    }

    /// The type currently bound to `name`, if any. Test hook.
    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.typing.get(name).ok()
    }

    // ==================== File Pass ====================

    /// Check one source file. Re-entrant: imported files are checked in a
    /// detached layer by the same pass, and checking the same file twice
    /// produces no further diagnostics.
    pub fn check_file(&mut self, file: &SourceFile) {
        for built_in in BuiltInType::declarable() {
            self.typing.define(built_in.name(), Type::BuiltIn(built_in));
        }
        for function in stdlib::builtins() {
            self.define_function_type(function);
        }

        debug!(
            "checking file: {} import(s), {} type(s), {} function(s)",
            file.imports.len(),
            file.types.len(),
            file.functions.len()
        );
        for import in &file.imports {
            self.check_import(import);
        }
        for decl in &file.types {
            self.declare_type(decl);
        }
        for decl in &file.functions {
            self.declare_function(decl);
        }
        for stmt in &file.statements {
            self.check_stmt(stmt);
        }

        for decl in &file.functions {
            self.check_body(decl);
        }
    }

    /// Check the imported file in a detached layer, then copy only the
    /// listed names back into the importing layer.
    fn check_import(&mut self, import: &ImportDecl) {
        let Some(imported) = self.sources.get(&import.path) else {
            self.diagnostics.push(TypeError::UnknownIdentifier {
                name: import.path.clone(),
                loc: import.loc,
            });
            return;
        };
        debug!("checking import {}", import.path);
        let current = self.typing.top();
        self.typing.enter_detached();
        self.check_file(&imported);
        for name in &import.names {
            match self.typing.get(name) {
                Ok(ty) => current.borrow_mut().insert(name.clone(), ty),
                Err(_) => self.diagnostics.push(TypeError::UnknownIdentifier {
                    name: name.clone(),
                    loc: import.loc,
                }),
            }
        }
        self.typing.leave();
    }

    // ==================== Declarations ====================

    fn declare_type(&mut self, decl: &TypeDecl) {
        match decl {
            TypeDecl::Data(data) => {
                let fields = data
                    .fields
                    .iter()
                    .map(|(name, ann)| {
                        (name.clone(), self.annotation_type(ann).unwrap_or(Type::NOTHING))
                    })
                    .collect();
                let ty = Type::Data(Rc::new(DataType { name: data.name.clone(), fields }));
                self.typing.define(data.name.clone(), ty);
            }
            TypeDecl::Enum(en) => {
                let mut members: Vec<Type> = en
                    .members
                    .iter()
                    .map(|ann| {
                        if Some(&ann.name) == en.generic.as_ref() {
                            Type::Generic(ann.name.clone())
                        } else {
                            self.annotation_type(ann).unwrap_or(Type::NOTHING)
                        }
                    })
                    .collect();
                members.extend(en.symbols.iter().map(|s| Type::Symbol(s.clone())));
                let ty = Type::Enum(Rc::new(EnumType { name: en.name.clone(), members }));
                self.typing.define(en.name.clone(), ty);
            }
            TypeDecl::Interface(iface) => self.declare_interface(iface),
        }
    }

    fn declare_interface(&mut self, decl: &InterfaceDecl) {
        let signatures = decl
            .signatures
            .iter()
            .map(|sig| {
                let params = sig
                    .params
                    .iter()
                    .map(|(name, ann)| Parameter {
                        name: name.clone(),
                        ty: self.annotation_type(ann).unwrap_or(Type::NOTHING),
                    })
                    .collect();
                let return_type = self.annotation_type(&sig.return_type).unwrap_or(Type::NOTHING);
                Rc::new(OverloadedFunction::single(
                    sig.name.clone(),
                    Rc::new(Function {
                        name: sig.name.clone(),
                        params,
                        return_type,
                        body: FunctionBody::Interface,
                        parent: RefCell::new(None),
                    }),
                ))
            })
            .collect();

        let interface = Rc::new(InterfaceType { name: decl.name.clone(), signatures });
        let self_type = Type::Interface(Rc::clone(&interface));
        self.typing.define(decl.name.clone(), self_type.clone());

        // Register the method stubs as ambient callables with the
        // interface itself as the receiver type, and stash them on the
        // declaration so the evaluator can capture their lexical layer.
        let mut stubs = decl.stubs.borrow_mut();
        stubs.clear();
        for of in interface.complete_functions(&self_type) {
            for stub in of.variants {
                self.define_function_type(Rc::clone(&stub));
                stubs.push(stub);
            }
        }
    }

    fn declare_function(&mut self, decl: &Rc<FunctionDecl>) {
        let sig = &decl.signature;
        let params = sig
            .params
            .iter()
            .map(|(name, ann)| Parameter {
                name: name.clone(),
                ty: self.annotation_type(ann).unwrap_or(Type::NOTHING),
            })
            .collect();
        let return_type = self.annotation_type(&sig.return_type).unwrap_or(Type::NOTHING);
        let function = Rc::new(Function {
            name: sig.name.clone(),
            params,
            return_type,
            body: FunctionBody::User(Rc::clone(decl)),
            parent: RefCell::new(None),
        });
        *decl.function.borrow_mut() = Some(Rc::clone(&function));
        self.define_function_type(function);
    }

    /// Bind `f` under its name, folding it into the existing overload set
    /// when one is already visible. Binding produces a new set; the old
    /// one is never mutated.
    fn define_function_type(&mut self, f: Rc<Function>) {
        let name = f.name.clone();
        match self.typing.get(&name) {
            Ok(Type::Function(of)) => {
                let combined = Type::Function(Rc::new(of.with_variant(f)));
                // the name was just found, so the assignment cannot miss
                let _ = self.typing.assign(&name, combined);
            }
            _ => {
                let single = Type::Function(Rc::new(OverloadedFunction::single(name.clone(), f)));
                self.typing.define(name, single);
            }
        }
    }

    fn check_body(&mut self, decl: &Rc<FunctionDecl>) {
        let Some(function) = decl.function.borrow().clone() else {
            return;
        };
        self.typing.enter();
        for param in &function.params {
            self.typing.define(param.name.clone(), param.ty.clone());
        }
        for stmt in &decl.statements {
            self.check_stmt(stmt);
        }
        let actual = self.type_of(&decl.tail);
        self.check_assignable(&function.return_type, &actual, decl.tail.loc);
        self.typing.leave();
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, annotation, value, loc } => {
                let declared = match annotation {
                    Some(ann) => match self.annotation_type(ann) {
                        Some(ty) => Some(ty),
                        None => {
                            // the annotation names an unknown type; bind the
                            // fallback and move on
                            self.typing.define(name.clone(), Type::NOTHING);
                            return;
                        }
                    },
                    None => None,
                };
                let actual = value.as_ref().map(|v| self.type_of(v));
                let bound = declared.clone().or(actual.clone()).unwrap_or(Type::NOTHING);
                self.typing.define(name.clone(), bound);
                if let (Some(declared), Some(actual)) = (declared, actual) {
                    self.check_assignable(&declared, &actual, *loc);
                }
            }
            Stmt::Assign { name, value, loc } => {
                let actual = self.type_of(value);
                match self.typing.get(name) {
                    Ok(declared) => self.check_assignable(&declared, &actual, *loc),
                    Err(_) => self.diagnostics.push(TypeError::UnknownIdentifier {
                        name: name.clone(),
                        loc: *loc,
                    }),
                }
            }
            Stmt::Expr(expr) => {
                self.type_of(expr);
            }
            Stmt::For { var, from, to, body, .. } => {
                let from_ty = self.type_of(from);
                self.check_assignable(&Type::INTEGER, &from_ty, from.loc);
                let to_ty = self.type_of(to);
                self.check_assignable(&Type::INTEGER, &to_ty, to.loc);
                self.typing.enter();
                self.typing.define(var.clone(), Type::INTEGER);
                for stmt in body {
                    self.check_stmt(stmt);
                }
                self.typing.leave();
            }
            Stmt::While { cond, body, .. } => {
                let cond_ty = self.type_of(cond);
                self.check_assignable(&Type::BOOLEAN, &cond_ty, cond.loc);
                self.typing.enter();
                for stmt in body {
                    self.check_stmt(stmt);
                }
                self.typing.leave();
            }
        }
    }

    // ==================== Expressions ====================

    /// The type of an expression, with diagnostics recorded along the way.
    pub fn type_of(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Int(_) => Type::INTEGER,
            ExprKind::Str(_) => Type::STRING,
            ExprKind::Bool(_) => Type::BOOLEAN,
            ExprKind::Symbol(label) => Type::Symbol(label.clone()),
            ExprKind::Ident(name) => match self.typing.get(name) {
                Ok(ty) => ty,
                Err(_) => {
                    self.diagnostics.push(TypeError::UnknownIdentifier {
                        name: name.clone(),
                        loc: expr.loc,
                    });
                    Type::NOTHING
                }
            },
            ExprKind::Binary(op, left, right) => self.type_of_binary(*op, left, right),
            ExprKind::Not(inner) => {
                let ty = self.type_of(inner);
                self.check_assignable(&Type::BOOLEAN, &ty, inner.loc);
                Type::BOOLEAN
            }
            ExprKind::Neg(inner) => {
                let ty = self.type_of(inner);
                self.check_assignable(&Type::INTEGER, &ty, inner.loc);
                Type::INTEGER
            }
            ExprKind::Block(block) => self.type_of_block(block),
            ExprKind::If(if_expr) => {
                let cond_ty = self.type_of(&if_expr.cond);
                self.check_assignable(&Type::BOOLEAN, &cond_ty, if_expr.cond.loc);
                let then_ty = self.type_of_block(&if_expr.then);
                let else_ty = self.type_of(&if_expr.otherwise);
                union([then_ty, else_ty])
            }
            ExprKind::Match(m) => {
                self.type_of(&m.value);
                let mut result_types = Vec::new();
                for (pattern, result) in &m.arms {
                    self.type_of(pattern);
                    result_types.push(self.type_of(result));
                }
                result_types.push(self.type_of(&m.fallback));
                union(result_types)
            }
            ExprKind::Call(call) => self.type_of_call(call, expr.loc),
            ExprKind::Dot(dot) => self.type_of_dot(dot, expr.loc),
            ExprKind::Construct(construct) => self.type_of_construct(construct, expr.loc),
            ExprKind::Cast(cast) => {
                self.type_of(&cast.value);
                self.annotation_type(&cast.annotation).unwrap_or(Type::NOTHING)
            }
        }
    }

    fn type_of_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Type {
        let left_ty = self.type_of(left);
        let right_ty = self.type_of(right);
        match op {
            // string concatenation accepts any right operand
            BinOp::Add if left_ty == Type::STRING => Type::STRING,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                self.check_assignable(&Type::INTEGER, &left_ty, left.loc);
                self.check_assignable(&Type::INTEGER, &right_ty, right.loc);
                Type::INTEGER
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                self.check_assignable(&Type::INTEGER, &left_ty, left.loc);
                self.check_assignable(&Type::INTEGER, &right_ty, right.loc);
                Type::BOOLEAN
            }
            BinOp::Eq | BinOp::Ne => Type::BOOLEAN,
        }
    }

    fn type_of_block(&mut self, block: &Block) -> Type {
        self.typing.enter();
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
        let ty = self.type_of(&block.tail);
        self.typing.leave();
        ty
    }

    fn type_of_dot(&mut self, dot: &DotExpr, loc: Loc) -> Type {
        let target_ty = self.type_of(&dot.target);
        if let Type::Data(data) = &target_ty {
            if let Some(field_ty) = data.field(&dot.name) {
                return field_ty.clone();
            }
        }
        match self.typing.get(&dot.name) {
            Ok(Type::Function(_)) => Type::PreApplied(Rc::new(PreAppliedFunction {
                name: dot.name.clone(),
                receiver: target_ty,
            })),
            _ => {
                self.diagnostics.push(TypeError::UndeclaredField {
                    field: dot.name.clone(),
                    on: target_ty,
                    loc,
                });
                Type::NOTHING
            }
        }
    }

    fn type_of_call(&mut self, call: &CallExpr, loc: Loc) -> Type {
        let mut target_ty = self.type_of(&call.target);
        let mut arg_types = Vec::new();
        let mut with_receiver = false;

        if let Type::PreApplied(pre) = &target_ty {
            let pre = Rc::clone(pre);
            with_receiver = true;
            arg_types.push(pre.receiver.clone());
            target_ty = self.typing.get(&pre.name).unwrap_or(Type::NOTHING);
        }
        let Type::Function(overloads) = target_ty else {
            // a failed target lookup already produced its own diagnostic
            return Type::NOTHING;
        };
        for arg in &call.args {
            arg_types.push(self.type_of(arg));
        }

        if let [function] = overloads.variants.as_slice() {
            let function = Rc::clone(function);
            if function.params.len() == arg_types.len() {
                for (param, actual) in function.params.iter().zip(&arg_types) {
                    self.check_assignable(&param.ty, actual, loc);
                }
                self.record_call(call, &function, with_receiver, &arg_types);
            } else {
                self.diagnostics.push(TypeError::IncompatibleType {
                    expected: Type::Function(Rc::clone(&overloads)),
                    actual: union(arg_types),
                    loc,
                });
            }
            return function.return_type.clone();
        }

        let matching = overloads.find_matching(&arg_types, &self.typing);
        let resolved = match matching.as_slice() {
            [one] => Some(Rc::clone(one)),
            several => {
                let mut concrete = several.iter().filter(|f| !f.is_interface_stub());
                match (concrete.next(), concrete.next()) {
                    (Some(one), None) => Some(Rc::clone(one)),
                    _ => None,
                }
            }
        };
        match resolved {
            Some(function) => {
                self.record_call(call, &function, with_receiver, &arg_types);
                function.return_type.clone()
            }
            None => {
                self.diagnostics.push(TypeError::IncompatibleType {
                    expected: Type::Function(overloads),
                    actual: union(arg_types),
                    loc,
                });
                Type::NOTHING
            }
        }
    }

    /// Record the checker's verdict on the call-site annotation slot:
    /// the resolved variant, whether the dot receiver is the implicit
    /// first argument, and which argument positions need wrapping into
    /// an interface-bound object at evaluation time.
    fn record_call(
        &mut self,
        call: &CallExpr,
        function: &Rc<Function>,
        with_receiver: bool,
        arg_types: &[Type],
    ) {
        let wrap = function
            .params
            .iter()
            .zip(arg_types)
            .map(|(param, actual)| match &param.ty {
                Type::Interface(iface) if param.ty != *actual => Some(Rc::clone(iface)),
                _ => None,
            })
            .collect();
        let shape: Vec<String> = function.params.iter().map(|p| p.ty.name()).collect();
        debug!(
            "resolved call at {} to {}({})",
            call.target.loc,
            function.name,
            shape.join(", ")
        );
        *call.resolved.borrow_mut() = Some(ResolvedCall {
            function: Rc::clone(function),
            with_receiver,
            wrap,
        });
    }

    fn type_of_construct(&mut self, construct: &ConstructExpr, loc: Loc) -> Type {
        let data = match self.typing.get(&construct.type_name) {
            Ok(Type::Data(data)) => data,
            _ => {
                self.diagnostics.push(TypeError::UndeclaredType {
                    name: construct.type_name.clone(),
                    loc,
                });
                return Type::NOTHING;
            }
        };
        for (field, _) in &data.fields {
            if !construct.fields.iter().any(|(name, _)| name == field) {
                self.diagnostics.push(TypeError::UninitializedField {
                    field: field.clone(),
                    on: Type::Data(Rc::clone(&data)),
                    loc,
                });
            }
        }
        for (field, value) in &construct.fields {
            let actual = self.type_of(value);
            match data.field(field) {
                Some(declared) => {
                    let declared = declared.clone();
                    self.check_assignable(&declared, &actual, loc);
                }
                None => self.diagnostics.push(TypeError::UndeclaredField {
                    field: field.clone(),
                    on: Type::Data(Rc::clone(&data)),
                    loc,
                }),
            }
        }
        *construct.resolved.borrow_mut() = Some(Rc::clone(&data));
        Type::Data(data)
    }

    // ==================== Support ====================

    /// Resolve a type annotation against the typing scope, substituting a
    /// generic enum's placeholder member with the annotation's argument.
    /// `None` means the annotation did not name a known type; the
    /// diagnostic has already been recorded.
    fn annotation_type(&mut self, ann: &TypeAnnotation) -> Option<Type> {
        let Ok(declared) = self.typing.get(&ann.name) else {
            self.diagnostics.push(TypeError::UndeclaredType {
                name: ann.name.clone(),
                loc: ann.loc,
            });
            return None;
        };
        let Some(argument) = &ann.generic else {
            return Some(declared);
        };
        let Type::Enum(en) = &declared else {
            return Some(declared);
        };
        let Ok(argument_ty) = self.typing.get(argument) else {
            self.diagnostics.push(TypeError::UndeclaredType {
                name: argument.clone(),
                loc: ann.loc,
            });
            return None;
        };
        let members = en
            .members
            .iter()
            .map(|m| match m {
                Type::Generic(_) => argument_ty.clone(),
                other => other.clone(),
            })
            .collect();
        Some(Type::Enum(Rc::new(EnumType { name: en.name.clone(), members })))
    }

    fn check_assignable(&mut self, expected: &Type, actual: &Type, loc: Loc) {
        if !expected.assignable_from(actual, Some(&self.typing)) {
            self.diagnostics.push(TypeError::IncompatibleType {
                expected: expected.clone(),
                actual: actual.clone(),
                loc,
            });
        }
    }
}
