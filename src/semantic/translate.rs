//! The translator: turns an abstract syntax tree into its semantic type,
//! or stops at the first violation.
//!
//! Three mutually recursive procedures do the work. `trans_exp` types
//! expressions, `trans_var` types l-values, and `trans_dec` processes
//! declarations, mutating the environments as it goes. `trans_ty`
//! translates syntactic types into the type universe. Declaration groups
//! are handled in two passes so that mutually recursive types and
//! functions can refer to each other: pass one makes every name of the
//! group visible (types as empty name cells, functions as headers), pass
//! two translates the bodies in the enriched environments.
use super::binding::Binding;
use super::errors::{SemanticError, SemanticErrorKind};
use super::loops::LoopStack;
use super::scope::Environment;
use super::types::{self, IncompleteType, Type};
use crate::symbol::Symbol;
use crate::syntax::{
    Dec, Expr, ExprKind, FieldInit, FunDec, Location, Op, Ty, TyKind, TypeDec, Var, VarDec,
    VarKind,
};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub type Venv = Environment<Binding>;
pub type Tenv = Environment<Type>;

#[derive(Debug)]
pub struct Analyzer {
    venv: Venv,
    tenv: Tenv,
    loops: LoopStack,
}

impl Analyzer {
    /// An analyzer with only the primitive types bound.
    pub fn new() -> Self {
        let mut tenv = Tenv::new();
        tenv.enter(Symbol::intern("int"), Type::Int);
        tenv.enter(Symbol::intern("string"), Type::String);

        Self {
            venv: Venv::new(),
            tenv,
            loops: LoopStack::new(),
        }
    }

    /// An analyzer with the built-in functions bound as well.
    pub fn with_prelude() -> Self {
        let mut analyzer = Self::new();

        analyzer.define_function("print", &[Type::String], Type::Unit);
        analyzer.define_function("flush", &[], Type::Unit);
        analyzer.define_function("getchar", &[], Type::String);
        analyzer.define_function("ord", &[Type::String], Type::Int);
        analyzer.define_function("chr", &[Type::Int], Type::String);
        analyzer.define_function("size", &[Type::String], Type::Int);
        analyzer.define_function("substring", &[Type::String, Type::Int, Type::Int], Type::String);
        analyzer.define_function("concat", &[Type::String, Type::String], Type::String);
        analyzer.define_function("not", &[Type::Int], Type::Int);
        analyzer.define_function("exit", &[Type::Int], Type::Unit);

        analyzer
    }

    /// Registers a host-provided function in the value environment.
    pub fn define_function(&mut self, name: &str, formals: &[Type], result: Type) {
        self.venv.enter(
            Symbol::intern(name),
            Binding::Function {
                formals: formals.to_vec(),
                result,
            },
        );
    }

    /// Types the whole program. The environments are restored on every
    /// path, so the analyzer can be reused after an error.
    pub fn analyze(&mut self, expr: &Expr) -> Result<Type, SemanticError> {
        self.trans_exp(expr)
    }

    fn trans_exp(&mut self, expr: &Expr) -> Result<Type, SemanticError> {
        match &expr.kind {
            ExprKind::Var(var) => self.trans_var(var),
            ExprKind::Nil => Ok(Type::Nil),
            ExprKind::Int(_) => Ok(Type::Int),
            ExprKind::Str(_) => Ok(Type::String),
            ExprKind::Unit => Ok(Type::Unit),
            ExprKind::Call { func, args } => self.trans_call(*func, args, expr.loc),
            ExprKind::Op { op, lhs, rhs } => self.trans_op(*op, lhs, rhs, expr.loc),
            ExprKind::Record { type_id, fields } => self.trans_record(*type_id, fields, expr.loc),
            ExprKind::Array {
                type_id,
                size,
                init,
            } => self.trans_array(*type_id, size, init, expr.loc),
            ExprKind::Seq(exprs) => {
                let mut ty = Type::Unit;
                for expr in exprs {
                    ty = self.trans_exp(expr)?;
                }
                Ok(ty)
            }
            ExprKind::Assign { var, value } => {
                let dst = self.trans_var(var)?;
                let src = self.trans_exp(value)?;

                if src.is_unit() {
                    return Err(SemanticError::new(
                        value.loc,
                        SemanticErrorKind::UnitAssignment,
                    ));
                }
                if !compatible(&src, &dst, expr.loc)? {
                    return Err(type_mismatch(&dst, &src, expr.loc));
                }

                Ok(Type::Unit)
            }
            ExprKind::If { cond, then, else_ } => {
                let cond_ty = self.trans_exp(cond)?;
                expect_int(&cond_ty, cond.loc)?;

                let then_ty = self.trans_exp(then)?;
                match else_ {
                    None => {
                        if !then_ty.is_unit() {
                            return Err(type_mismatch(&Type::Unit, &then_ty, then.loc));
                        }
                        Ok(Type::Unit)
                    }
                    Some(else_exp) => {
                        let else_ty = self.trans_exp(else_exp)?;

                        if equals(&then_ty, &else_ty, expr.loc)? {
                            Ok(then_ty)
                        } else if then_ty.is_nil() && else_ty.is_record() {
                            Ok(else_ty)
                        } else if else_ty.is_nil() && then_ty.is_record() {
                            Ok(then_ty)
                        } else {
                            Err(type_mismatch(&then_ty, &else_ty, expr.loc))
                        }
                    }
                }
            }
            ExprKind::While { cond, body } => {
                let cond_ty = self.trans_exp(cond)?;
                expect_int(&cond_ty, cond.loc)?;

                self.loops.enter_loop();
                let result = self.trans_exp(body);
                self.loops.exit_loop();

                let body_ty = result?;
                if !body_ty.is_unit() {
                    return Err(type_mismatch(&Type::Unit, &body_ty, body.loc));
                }

                Ok(Type::Unit)
            }
            ExprKind::For { var, lo, hi, body } => {
                let lo_ty = self.trans_exp(lo)?;
                expect_int(&lo_ty, lo.loc)?;
                let hi_ty = self.trans_exp(hi)?;
                expect_int(&hi_ty, hi.loc)?;

                self.venv.push_scope();
                self.venv.enter(*var, Binding::Variable(Type::Int));
                self.loops.enter_loop();
                let result = self.trans_exp(body);
                self.loops.exit_loop();
                self.venv.pop_scope();

                let body_ty = result?;
                if !body_ty.is_unit() {
                    return Err(type_mismatch(&Type::Unit, &body_ty, body.loc));
                }

                Ok(Type::Unit)
            }
            ExprKind::Break => {
                if !self.loops.in_loop() {
                    return Err(SemanticError::new(
                        expr.loc,
                        SemanticErrorKind::BreakOutsideLoop,
                    ));
                }
                Ok(Type::Unit)
            }
            ExprKind::Let { decs, body } => {
                self.venv.push_scope();
                self.tenv.push_scope();
                let result = self.trans_let(decs, body);
                self.tenv.pop_scope();
                self.venv.pop_scope();

                result
            }
        }
    }

    fn trans_let(&mut self, decs: &[Dec], body: &Expr) -> Result<Type, SemanticError> {
        for dec in decs {
            self.trans_dec(dec)?;
        }
        self.trans_exp(body)
    }

    fn trans_call(
        &mut self,
        func: Symbol,
        args: &[Expr],
        loc: Location,
    ) -> Result<Type, SemanticError> {
        let (formals, result) = match self.venv.look(func) {
            None => return Err(undefined(func, loc)),
            Some(Binding::Variable(_)) => {
                return Err(kind_mismatch(
                    "a function",
                    format!("variable '{}'", func),
                    loc,
                ));
            }
            Some(Binding::Function { formals, result }) => (formals.clone(), result.clone()),
        };

        if args.len() != formals.len() {
            return Err(type_mismatch(
                format!("{} arguments", formals.len()),
                format!("{} arguments", args.len()),
                loc,
            ));
        }

        for (arg, formal) in args.iter().zip(&formals) {
            let arg_ty = self.trans_exp(arg)?;
            if !compatible(&arg_ty, formal, arg.loc)? {
                return Err(type_mismatch(formal, &arg_ty, arg.loc));
            }
        }

        Ok(result)
    }

    fn trans_op(
        &mut self,
        op: Op,
        lhs: &Expr,
        rhs: &Expr,
        loc: Location,
    ) -> Result<Type, SemanticError> {
        let lhs_ty = self.trans_exp(lhs)?;
        let rhs_ty = self.trans_exp(rhs)?;

        if op.is_comparison() {
            if !lhs_ty.is_int() && !lhs_ty.is_string() {
                return Err(kind_mismatch("an int or string operand", &lhs_ty, lhs.loc));
            }
            if !equals(&lhs_ty, &rhs_ty, loc)? {
                return Err(type_mismatch(&lhs_ty, &rhs_ty, rhs.loc));
            }
        } else if op.is_equality() {
            let ok = match (&lhs_ty, &rhs_ty) {
                (Type::Int, Type::Int) | (Type::String, Type::String) => true,
                (Type::Record(r1), Type::Record(r2)) => r1.id() == r2.id(),
                (Type::Array(a1), Type::Array(a2)) => a1.id() == a2.id(),
                (Type::Nil, Type::Record(_)) | (Type::Record(_), Type::Nil) => true,
                _ => false,
            };
            if !ok {
                // Two nils are rejected: without a record operand there is
                // no record type for the comparison to agree on.
                return Err(if lhs_ty.is_nil() && rhs_ty.is_nil() {
                    kind_mismatch("an operand with a known record type", "nil", loc)
                } else if lhs_ty.is_unit() || rhs_ty.is_unit() {
                    kind_mismatch("a comparable operand", "unit", loc)
                } else {
                    type_mismatch(&lhs_ty, &rhs_ty, loc)
                });
            }
        } else {
            // Arithmetic and the logical operators work on ints.
            expect_int(&lhs_ty, lhs.loc)?;
            expect_int(&rhs_ty, rhs.loc)?;
        }

        Ok(Type::Int)
    }

    fn trans_record(
        &mut self,
        type_id: Symbol,
        fields: &[FieldInit],
        loc: Location,
    ) -> Result<Type, SemanticError> {
        let entry = match self.tenv.look(type_id) {
            None => return Err(undefined(type_id, loc)),
            Some(ty) => ty.clone(),
        };
        let record = match actual(&entry, loc)? {
            Type::Record(record) => record,
            other => {
                return Err(kind_mismatch(
                    "a record type",
                    format!("'{}' ({})", type_id, other),
                    loc,
                ));
            }
        };

        if fields.len() != record.fields().len() {
            return Err(type_mismatch(
                format!("{} fields", record.fields().len()),
                format!("{} fields", fields.len()),
                loc,
            ));
        }

        for (init, (decl_name, decl_ty)) in fields.iter().zip(record.fields()) {
            if init.name != *decl_name {
                return Err(kind_mismatch(
                    format!("field '{}'", decl_name),
                    format!("field '{}'", init.name),
                    init.loc,
                ));
            }

            let value_ty = self.trans_exp(&init.value)?;
            if !compatible(&value_ty, decl_ty, init.loc)? {
                return Err(type_mismatch(decl_ty, &value_ty, init.loc));
            }
        }

        Ok(Type::Record(record))
    }

    fn trans_array(
        &mut self,
        type_id: Symbol,
        size: &Expr,
        init: &Expr,
        loc: Location,
    ) -> Result<Type, SemanticError> {
        let entry = match self.tenv.look(type_id) {
            None => return Err(undefined(type_id, loc)),
            Some(ty) => ty.clone(),
        };
        let array = match actual(&entry, loc)? {
            Type::Array(array) => array,
            other => {
                return Err(kind_mismatch(
                    "an array type",
                    format!("'{}' ({})", type_id, other),
                    loc,
                ));
            }
        };

        let size_ty = self.trans_exp(size)?;
        expect_int(&size_ty, size.loc)?;

        let init_ty = self.trans_exp(init)?;
        if !compatible(&init_ty, array.element(), init.loc)? {
            return Err(type_mismatch(array.element(), &init_ty, init.loc));
        }

        Ok(Type::Array(array))
    }

    /// Returns the type of an l-value, after name resolution.
    fn trans_var(&mut self, var: &Var) -> Result<Type, SemanticError> {
        match &var.kind {
            VarKind::Simple(sym) => match self.venv.look(*sym) {
                None => Err(undefined(*sym, var.loc)),
                Some(Binding::Function { .. }) => Err(kind_mismatch(
                    "a variable",
                    format!("function '{}'", sym),
                    var.loc,
                )),
                Some(Binding::Variable(ty)) => actual(ty, var.loc),
            },
            VarKind::Field(base, field) => {
                let base_ty = self.trans_var(base)?;
                let record = match base_ty {
                    Type::Record(record) => record,
                    other => return Err(kind_mismatch("a record", &other, var.loc)),
                };

                match record.field_type(*field) {
                    None => Err(undefined(*field, var.loc)),
                    Some(ty) => actual(ty, var.loc),
                }
            }
            VarKind::Index(base, index) => {
                let base_ty = self.trans_var(base)?;
                let array = match base_ty {
                    Type::Array(array) => array,
                    other => return Err(kind_mismatch("an array", &other, var.loc)),
                };

                let index_ty = self.trans_exp(index)?;
                expect_int(&index_ty, index.loc)?;

                actual(array.element(), var.loc)
            }
        }
    }

    fn trans_dec(&mut self, dec: &Dec) -> Result<(), SemanticError> {
        match dec {
            Dec::Var(dec) => self.trans_var_dec(dec),
            Dec::Types(decs) => self.trans_type_decs(decs),
            Dec::Functions(decs) => self.trans_fun_decs(decs),
        }
    }

    fn trans_var_dec(&mut self, dec: &VarDec) -> Result<(), SemanticError> {
        let init_ty = self.trans_exp(&dec.init)?;

        let chosen = match &dec.type_id {
            Some(annotation) => {
                let entry = match self.tenv.look(annotation.sym) {
                    None => return Err(undefined(annotation.sym, annotation.loc)),
                    Some(ty) => ty.clone(),
                };
                let ty = actual(&entry, annotation.loc)?;
                if !compatible(&init_ty, &ty, dec.loc)? {
                    return Err(type_mismatch(&ty, &init_ty, dec.loc));
                }
                ty
            }
            None => {
                if init_ty.is_nil() {
                    return Err(SemanticError::new(
                        dec.loc,
                        SemanticErrorKind::MissingAnnotation(dec.name.text()),
                    ));
                }
                if init_ty.is_unit() {
                    return Err(SemanticError::new(
                        dec.init.loc,
                        SemanticErrorKind::UnitAssignment,
                    ));
                }
                init_ty
            }
        };

        if !self.venv.enter(dec.name, Binding::Variable(chosen)) {
            return Err(redeclaration(dec.name, dec.loc));
        }

        Ok(())
    }

    /// A group of mutually recursive type declarations, in two passes:
    /// empty name cells first, then the bodies into those cells.
    fn trans_type_decs(&mut self, decs: &[TypeDec]) -> Result<(), SemanticError> {
        let mut names = HashSet::new();
        for dec in decs {
            if !names.insert(dec.name) {
                return Err(duplicate(dec.name, dec.loc));
            }
        }

        for dec in decs {
            if !self.tenv.enter(dec.name, Type::name(dec.name)) {
                return Err(redeclaration(dec.name, dec.loc));
            }
        }

        for dec in decs {
            let cell = match self.tenv.look(dec.name) {
                Some(Type::Name(cell)) => Rc::clone(cell),
                _ => {
                    return Err(SemanticError::new(
                        dec.loc,
                        SemanticErrorKind::Internal(format!(
                            "type group lost the placeholder for '{}'",
                            dec.name
                        )),
                    ));
                }
            };

            let ty = self.trans_ty(&dec.ty)?;
            cell.resolve(ty);
        }

        Ok(())
    }

    /// A group of mutually recursive function declarations, in two
    /// passes: headers first, then the bodies against those headers.
    fn trans_fun_decs(&mut self, decs: &[FunDec]) -> Result<(), SemanticError> {
        let mut names = HashSet::new();
        for dec in decs {
            if !names.insert(dec.name) {
                return Err(duplicate(dec.name, dec.loc));
            }
        }

        for dec in decs {
            let result = match &dec.result {
                None => Type::Unit,
                Some(annotation) => {
                    let entry = match self.tenv.look(annotation.sym) {
                        None => return Err(undefined(annotation.sym, annotation.loc)),
                        Some(ty) => ty.clone(),
                    };
                    actual(&entry, annotation.loc)?
                }
            };

            let mut formals = Vec::with_capacity(dec.params.len());
            for param in &dec.params {
                let entry = match self.tenv.look(param.type_id) {
                    None => return Err(undefined(param.type_id, param.loc)),
                    Some(ty) => ty.clone(),
                };
                formals.push(actual(&entry, param.loc)?);
            }

            if !self.venv.enter(dec.name, Binding::Function { formals, result }) {
                return Err(redeclaration(dec.name, dec.loc));
            }
        }

        for dec in decs {
            let (formals, result) = match self.venv.look(dec.name) {
                Some(Binding::Function { formals, result }) => {
                    (formals.clone(), result.clone())
                }
                _ => {
                    return Err(SemanticError::new(
                        dec.loc,
                        SemanticErrorKind::Internal(format!(
                            "function group lost the header for '{}'",
                            dec.name
                        )),
                    ));
                }
            };

            let mut params = HashSet::new();
            for param in &dec.params {
                if !params.insert(param.name) {
                    return Err(duplicate(param.name, param.loc));
                }
            }

            self.venv.push_scope();
            for (param, formal) in dec.params.iter().zip(&formals) {
                self.venv.enter(param.name, Binding::Variable(formal.clone()));
            }
            self.loops.enter_fun();
            let body_result = self.trans_exp(&dec.body);
            self.loops.exit_fun();
            self.venv.pop_scope();

            let body_ty = body_result?;
            if !compatible(&body_ty, &result, dec.loc)? {
                return Err(type_mismatch(&result, &body_ty, dec.loc));
            }
        }

        Ok(())
    }

    /// Translates a syntactic type. Record and array types mint a fresh
    /// nominal identity; a plain name returns whatever the environment
    /// holds, which may be a still-unresolved cell of the same group.
    fn trans_ty(&mut self, ty: &Ty) -> Result<Type, SemanticError> {
        match &ty.kind {
            TyKind::Name(sym) => match self.tenv.look(*sym) {
                None => Err(undefined(*sym, ty.loc)),
                Some(entry) => Ok(entry.clone()),
            },
            TyKind::Record(fields) => {
                let mut seen = HashSet::new();
                let mut out = Vec::with_capacity(fields.len());

                for field in fields {
                    if !seen.insert(field.name) {
                        return Err(duplicate(field.name, field.loc));
                    }
                    let entry = match self.tenv.look(field.type_id) {
                        None => return Err(undefined(field.type_id, field.loc)),
                        Some(ty) => ty.clone(),
                    };
                    out.push((field.name, entry));
                }

                Ok(Type::record(out))
            }
            TyKind::Array(sym) => match self.tenv.look(*sym) {
                None => Err(undefined(*sym, ty.loc)),
                Some(element) => Ok(Type::array(element.clone())),
            },
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

// --- Helpers

fn actual(ty: &Type, loc: Location) -> Result<Type, SemanticError> {
    types::actual_ty(ty).map_err(|err| incomplete(err, loc))
}

fn equals(a: &Type, b: &Type, loc: Location) -> Result<bool, SemanticError> {
    types::equals(a, b).map_err(|err| incomplete(err, loc))
}

fn compatible(src: &Type, dst: &Type, loc: Location) -> Result<bool, SemanticError> {
    types::is_compatible(src, dst).map_err(|err| incomplete(err, loc))
}

fn expect_int(ty: &Type, loc: Location) -> Result<(), SemanticError> {
    if ty.is_int() {
        Ok(())
    } else {
        Err(type_mismatch(&Type::Int, ty, loc))
    }
}

fn incomplete(err: IncompleteType, loc: Location) -> SemanticError {
    SemanticError::new(loc, SemanticErrorKind::IncompleteType(err.0.text()))
}

fn undefined(sym: Symbol, loc: Location) -> SemanticError {
    SemanticError::new(loc, SemanticErrorKind::UndefinedSymbol(sym.text()))
}

fn duplicate(sym: Symbol, loc: Location) -> SemanticError {
    SemanticError::new(loc, SemanticErrorKind::DuplicateName(sym.text()))
}

fn redeclaration(sym: Symbol, loc: Location) -> SemanticError {
    SemanticError::new(loc, SemanticErrorKind::Redeclaration(sym.text()))
}

fn type_mismatch(
    expected: impl fmt::Display,
    found: impl fmt::Display,
    loc: Location,
) -> SemanticError {
    SemanticError::new(
        loc,
        SemanticErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        },
    )
}

fn kind_mismatch(
    expected: impl fmt::Display,
    found: impl fmt::Display,
    loc: Location,
) -> SemanticError {
    SemanticError::new(
        loc,
        SemanticErrorKind::KindMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Parser;
    use assert_matches::assert_matches;

    fn analyze(src: &str) -> Result<Type, SemanticError> {
        let expr = Parser::parse_string(src).unwrap();
        Analyzer::with_prelude().analyze(&expr)
    }

    fn analyze_err(src: &str) -> SemanticErrorKind {
        analyze(src).unwrap_err().kind
    }

    // --- Literals and operators

    #[test]
    fn literals() {
        assert_matches!(analyze("42").unwrap(), Type::Int);
        assert_matches!(analyze("\"hi\"").unwrap(), Type::String);
        assert_matches!(analyze("()").unwrap(), Type::Unit);
        assert_matches!(analyze("nil").unwrap(), Type::Nil);
    }

    #[test]
    fn arithmetic_needs_ints() {
        assert_matches!(analyze("1 + 2 * 3").unwrap(), Type::Int);
        assert_matches!(
            analyze_err("1 + \"two\""),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn logical_operators_need_ints() {
        assert_matches!(analyze("1 & 0 | 1").unwrap(), Type::Int);
        assert_matches!(
            analyze_err("\"yes\" & 1"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn comparisons_accept_ints_and_strings() {
        assert_matches!(analyze("1 < 2").unwrap(), Type::Int);
        assert_matches!(analyze("\"a\" < \"b\"").unwrap(), Type::Int);
        assert_matches!(
            analyze_err("1 < \"b\""),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn comparisons_reject_records() {
        let err = analyze_err(
            "let type p = { x: int }
                 var a: p := nil
                 var b: p := nil
             in a < b end",
        );
        assert_matches!(err, SemanticErrorKind::KindMismatch { .. });
    }

    #[test]
    fn equality_on_ints_and_strings() {
        assert_matches!(analyze("1 = 2").unwrap(), Type::Int);
        assert_matches!(analyze("\"a\" <> \"b\"").unwrap(), Type::Int);
    }

    #[test]
    fn equality_on_same_record_type() {
        let ty = analyze(
            "let type p = { x: int }
                 var a: p := p { x = 1 }
                 var b: p := p { x = 2 }
             in a = b end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn equality_across_record_types_is_rejected() {
        // Same shape, distinct declarations: nominally different.
        let err = analyze_err(
            "let type p = { x: int }
                 type q = { x: int }
                 var a: p := nil
                 var b: q := nil
             in a = b end",
        );
        assert_matches!(err, SemanticErrorKind::TypeMismatch { .. });
    }

    #[test]
    fn equality_on_arrays_is_nominal() {
        assert_matches!(
            analyze(
                "let type ints = array of int
                     var a := ints [4] of 0
                     var b := ints [4] of 0
                 in a = b end"
            )
            .unwrap(),
            Type::Int
        );

        let err = analyze_err(
            "let type ints = array of int
                 type more = array of int
                 var a := ints [4] of 0
                 var b := more [4] of 0
             in a = b end",
        );
        assert_matches!(err, SemanticErrorKind::TypeMismatch { .. });
    }

    #[test]
    fn nil_compares_against_records_from_either_side() {
        let src = "let type p = { x: int } var a: p := nil in a = nil end";
        assert_matches!(analyze(src).unwrap(), Type::Int);

        let src = "let type p = { x: int } var a: p := nil in nil <> a end";
        assert_matches!(analyze(src).unwrap(), Type::Int);
    }

    #[test]
    fn nil_equals_nil_is_rejected() {
        assert_matches!(
            analyze_err("nil = nil"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn unit_is_not_comparable() {
        assert_matches!(
            analyze_err("flush() = flush()"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    // --- Calls

    #[test]
    fn prelude_calls_typecheck() {
        assert_matches!(analyze("size(concat(getchar(), \"x\"))").unwrap(), Type::Int);
        assert_matches!(analyze("print(\"hi\")").unwrap(), Type::Unit);
        assert_matches!(analyze("substring(\"abc\", 0, 1)").unwrap(), Type::String);
    }

    #[test]
    fn call_of_undefined_function() {
        assert_matches!(
            analyze_err("frobnicate(1)"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "frobnicate");
            }
        );
    }

    #[test]
    fn call_of_a_variable() {
        assert_matches!(
            analyze_err("let var f := 1 in f(2) end"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn call_arity_is_checked() {
        assert_matches!(
            analyze_err("substring(\"abc\", 0)"),
            SemanticErrorKind::TypeMismatch { expected, found } => {
                assert_eq!(expected, "3 arguments");
                assert_eq!(found, "2 arguments");
            }
        );
    }

    #[test]
    fn call_argument_types_are_checked() {
        assert_matches!(
            analyze_err("print(7)"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn nil_argument_for_a_record_parameter() {
        let ty = analyze(
            "let type p = { x: int }
                 function probe(it: p): int = 1
             in probe(nil) end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    // --- Records, arrays, l-values

    #[test]
    fn record_literal_and_field_access() {
        let ty = analyze(
            "let type point = { x: int, y: int }
                 var p := point { x = 1, y = 2 }
             in p.x + p.y end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn record_field_count_must_match() {
        assert_matches!(
            analyze_err(
                "let type point = { x: int, y: int }
                 in point { x = 1 } end"
            ),
            SemanticErrorKind::TypeMismatch { expected, found } => {
                assert_eq!(expected, "2 fields");
                assert_eq!(found, "1 fields");
            }
        );
    }

    #[test]
    fn record_field_names_must_match_in_order() {
        assert_matches!(
            analyze_err(
                "let type point = { x: int, y: int }
                 in point { y = 2, x = 1 } end"
            ),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn record_field_values_must_be_compatible() {
        assert_matches!(
            analyze_err(
                "let type point = { x: int, y: int }
                 in point { x = 1, y = \"two\" } end"
            ),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn record_literal_of_a_non_record_type() {
        assert_matches!(
            analyze_err("int { x = 1 }"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn field_access_on_a_non_record() {
        assert_matches!(
            analyze_err("let var x := 1 in x.y end"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn unknown_record_field() {
        assert_matches!(
            analyze_err(
                "let type p = { x: int } var a := p { x = 1 } in a.z end"
            ),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "z");
            }
        );
    }

    #[test]
    fn array_literal_and_indexing() {
        let ty = analyze(
            "let type intArray = array of int
                 var a := intArray [10] of 0
             in a[3] := 7; a[3] end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn array_size_must_be_int() {
        assert_matches!(
            analyze_err(
                "let type ints = array of int in ints [\"ten\"] of 0 end"
            ),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn array_init_must_match_element_type() {
        assert_matches!(
            analyze_err(
                "let type ints = array of int in ints [10] of \"zero\" end"
            ),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn indexing_a_non_array() {
        assert_matches!(
            analyze_err("let var x := 1 in x[0] end"),
            SemanticErrorKind::KindMismatch { .. }
        );
    }

    #[test]
    fn index_must_be_int() {
        assert_matches!(
            analyze_err(
                "let type ints = array of int
                     var a := ints [10] of 0
                 in a[\"three\"] end"
            ),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    // --- Assignment

    #[test]
    fn assignment_produces_unit() {
        assert_matches!(
            analyze("let var x := 1 in x := 2 end").unwrap(),
            Type::Unit
        );
    }

    #[test]
    fn assignment_source_must_not_be_unit() {
        assert_matches!(
            analyze_err("let var x := 1 in x := print(\"no\") end"),
            SemanticErrorKind::UnitAssignment
        );
    }

    #[test]
    fn assignment_requires_compatible_types() {
        assert_matches!(
            analyze_err("let var x := 1 in x := \"two\" end"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn nil_can_be_assigned_to_a_record_variable() {
        let ty = analyze(
            "let type p = { x: int }
                 var a := p { x = 1 }
             in a := nil end",
        )
        .unwrap();
        assert_matches!(ty, Type::Unit);
    }

    // --- Control flow

    #[test]
    fn if_without_else_requires_unit_branch() {
        assert_matches!(
            analyze("if 1 then print(\"side\")").unwrap(),
            Type::Unit
        );
        assert_matches!(
            analyze_err("if 1 then 2"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn if_condition_must_be_int() {
        assert_matches!(
            analyze_err("if \"yes\" then 1 else 2"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn if_branches_must_agree() {
        assert_matches!(analyze("if 1 then 2 else 3").unwrap(), Type::Int);
        assert_matches!(
            analyze_err("if 1 then 2 else \"three\""),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn if_mixes_nil_with_a_record_branch() {
        let ty = analyze(
            "let type p = { x: int }
                 var a := p { x = 1 }
             in if 1 then a else nil end",
        )
        .unwrap();
        assert_matches!(ty, Type::Record(_));

        let ty = analyze(
            "let type p = { x: int }
                 var a := p { x = 1 }
             in if 1 then nil else a end",
        )
        .unwrap();
        assert_matches!(ty, Type::Record(_));
    }

    #[test]
    fn while_body_must_be_unit() {
        assert_matches!(
            analyze("while 1 do print(\"spin\")").unwrap(),
            Type::Unit
        );
        assert_matches!(
            analyze_err("while 1 do 2"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn for_binds_its_index_as_an_int() {
        let ty = analyze("for i := 0 to 10 do print(chr(i))").unwrap();
        assert_matches!(ty, Type::Unit);

        // The index does not leak out of the loop.
        assert_matches!(
            analyze_err("(for i := 0 to 10 do (); i)"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "i");
            }
        );
    }

    #[test]
    fn for_bounds_must_be_ints() {
        assert_matches!(
            analyze_err("for i := \"a\" to 10 do ()"),
            SemanticErrorKind::TypeMismatch { .. }
        );
        assert_matches!(
            analyze_err("for i := 0 to \"z\" do ()"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn break_needs_an_enclosing_loop() {
        assert_matches!(analyze("while 1 do break").unwrap(), Type::Unit);
        assert_matches!(
            analyze("for i := 0 to 9 do if i = 5 then break").unwrap(),
            Type::Unit
        );
        assert_matches!(analyze_err("break"), SemanticErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn break_does_not_escape_into_an_outer_function_loop() {
        let err = analyze_err(
            "while 1 do
               let function inner() = break
               in inner() end",
        );
        assert_matches!(err, SemanticErrorKind::BreakOutsideLoop);
    }

    // --- Declarations

    #[test]
    fn annotated_variable_declaration() {
        assert_matches!(
            analyze("let var x: int := 0 in x + 1 end").unwrap(),
            Type::Int
        );
    }

    #[test]
    fn annotation_must_match_the_initializer() {
        assert_matches!(
            analyze_err("let var x: string := 0 in x end"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn annotation_must_name_a_known_type() {
        assert_matches!(
            analyze_err("let var x: mystery := 0 in x end"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "mystery");
            }
        );
    }

    #[test]
    fn nil_initializer_requires_an_annotation() {
        assert_matches!(
            analyze_err("let var x := nil in x end"),
            SemanticErrorKind::MissingAnnotation(name) => {
                assert_eq!(name, "x");
            }
        );
    }

    #[test]
    fn unit_initializer_is_rejected() {
        assert_matches!(
            analyze_err("let var x := print(\"no\") in x end"),
            SemanticErrorKind::UnitAssignment
        );
    }

    #[test]
    fn redeclaration_in_one_scope_is_rejected() {
        assert_matches!(
            analyze_err("let var x := 1 var x := 2 in x end"),
            SemanticErrorKind::Redeclaration(name) => {
                assert_eq!(name, "x");
            }
        );
    }

    #[test]
    fn shadowing_in_a_nested_scope_is_fine() {
        let ty = analyze(
            "let var x := \"outer\"
             in let var x := 1 in x + 1 end end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn let_bindings_do_not_leak() {
        assert_matches!(
            analyze_err("(let var y := 1 in y end; y)"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "y");
            }
        );
    }

    #[test]
    fn empty_let_is_its_body() {
        assert_matches!(analyze("let in 42 end").unwrap(), Type::Int);
        assert_matches!(analyze("let in end").unwrap(), Type::Unit);
    }

    #[test]
    fn recursive_function() {
        let ty = analyze(
            "let function f(x: int): int = if x = 0 then 1 else x * f(x - 1)
             in f(5) end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn mutually_recursive_functions() {
        let ty = analyze(
            "let function even(n: int): int = if n = 0 then 1 else odd(n - 1)
                 function odd(n: int): int = if n = 0 then 0 else even(n - 1)
             in even(8) end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn function_body_must_match_declared_result() {
        assert_matches!(
            analyze_err("let function f(): int = \"nope\" in f() end"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn procedure_body_must_be_unit_compatible() {
        assert_matches!(
            analyze("let function p() = print(\"ok\") in p() end").unwrap(),
            Type::Unit
        );
        assert_matches!(
            analyze_err("let function p() = 3 in p() end"),
            SemanticErrorKind::TypeMismatch { .. }
        );
    }

    #[test]
    fn parameter_types_must_exist() {
        assert_matches!(
            analyze_err("let function f(x: mystery): int = 1 in f(1) end"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "mystery");
            }
        );
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        assert_matches!(
            analyze_err("let function f(x: int, x: int): int = x in f(1, 2) end"),
            SemanticErrorKind::DuplicateName(name) => {
                assert_eq!(name, "x");
            }
        );
    }

    #[test]
    fn duplicate_function_names_in_a_group_are_rejected() {
        assert_matches!(
            analyze_err(
                "let function f(): int = 1
                     function f(): int = 2
                 in f() end"
            ),
            SemanticErrorKind::DuplicateName(_)
        );
    }

    #[test]
    fn parameters_do_not_leak_out_of_the_body() {
        assert_matches!(
            analyze_err("let function f(x: int): int = x in x end"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "x");
            }
        );
    }

    // --- Type declarations

    #[test]
    fn type_aliases_share_nominal_identity() {
        let ty = analyze(
            "let type ints = array of int
                 type same = ints
                 var a := ints [3] of 0
                 var b: same := a
             in b := a end",
        )
        .unwrap();
        assert_matches!(ty, Type::Unit);
    }

    #[test]
    fn recursive_record_type_through_a_name() {
        let ty = analyze(
            "let type intlist = { hd: int, tl: intlist }
                 var l: intlist := intlist { hd = 1, tl = nil }
             in l.hd end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn recursive_list_traversal() {
        let ty = analyze(
            "let type intlist = { hd: int, tl: intlist }
                 var l: intlist := intlist { hd = 1, tl = intlist { hd = 2, tl = nil } }
             in l.tl.hd end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn mutually_recursive_types() {
        let ty = analyze(
            "let type tree = { value: int, children: treelist }
                 type treelist = { head: tree, tail: treelist }
                 var t: tree := tree { value = 1, children = nil }
             in t.value end",
        )
        .unwrap();
        assert_matches!(ty, Type::Int);
    }

    #[test]
    fn duplicate_type_names_in_a_group_are_rejected() {
        assert_matches!(
            analyze_err(
                "let type t = int
                     type t = string
                 in 0 end"
            ),
            SemanticErrorKind::DuplicateName(name) => {
                assert_eq!(name, "t");
            }
        );
    }

    #[test]
    fn alias_cycle_is_reported_when_used() {
        assert_matches!(
            analyze_err(
                "let type a = b
                     type b = a
                     var x: a := 1
                 in x end"
            ),
            SemanticErrorKind::IncompleteType(_)
        );
    }

    #[test]
    fn alias_cycle_is_tolerated_until_used() {
        // The cycle is never forced, so analysis succeeds.
        assert_matches!(
            analyze("let type a = b type b = a in 0 end").unwrap(),
            Type::Int
        );
    }

    #[test]
    fn record_type_duplicate_fields_are_rejected() {
        assert_matches!(
            analyze_err("let type p = { x: int, x: int } in 0 end"),
            SemanticErrorKind::DuplicateName(name) => {
                assert_eq!(name, "x");
            }
        );
    }

    #[test]
    fn record_field_types_must_exist() {
        assert_matches!(
            analyze_err("let type p = { x: mystery } in 0 end"),
            SemanticErrorKind::UndefinedSymbol(name) => {
                assert_eq!(name, "mystery");
            }
        );
    }

    #[test]
    fn structurally_equal_types_stay_distinct() {
        let err = analyze_err(
            "let type a = { x: int }
                 type b = { x: int }
                 var it: a := b { x = 1 }
             in it end",
        );
        assert_matches!(err, SemanticErrorKind::TypeMismatch { .. });
    }

    // --- Failure semantics and reuse

    #[test]
    fn first_error_wins() {
        // Both operands are bad; the left one is reported.
        let err = analyze("(\"a\" + 1) * (\"b\" + 2)").unwrap_err();
        assert_eq!(err.location.column, 2);
    }

    #[test]
    fn error_locations_point_at_the_offender() {
        let err = analyze("let var x := 1 in\n  unknown\nend").unwrap_err();
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 3);
    }

    #[test]
    fn analyzer_survives_an_error() {
        let mut analyzer = Analyzer::with_prelude();

        let bad = Parser::parse_string("let var x := nil in x end").unwrap();
        assert!(analyzer.analyze(&bad).is_err());

        // The failed run's scopes were unwound: `x` is gone, and a fresh
        // program still analyzes cleanly.
        let probe = Parser::parse_string("x").unwrap();
        assert_matches!(
            analyzer.analyze(&probe).unwrap_err().kind,
            SemanticErrorKind::UndefinedSymbol(_)
        );

        let good = Parser::parse_string("let var x: int := 0 in x + 1 end").unwrap();
        assert_matches!(analyzer.analyze(&good).unwrap(), Type::Int);
    }

    #[test]
    fn dropping_an_equal_typed_branch_preserves_the_type() {
        let with_branch = analyze("if 0 then 1 else 2").unwrap();
        let without = analyze("2").unwrap();
        assert!(types::equals(&with_branch, &without).unwrap());
    }

    #[test]
    fn record_recursion_through_an_intermediate_alias() {
        let ty = analyze(
            "let type node = link
                 type link = { value: int, next: node }
                 var head: node := link { value = 1, next = nil }
             in head.next end",
        )
        .unwrap();
        assert_matches!(ty, Type::Record(_));
    }

    #[test]
    fn analysis_is_deterministic() {
        let expr = Parser::parse_string("let var x: int := 0 in x + 1 end").unwrap();
        let mut analyzer = Analyzer::with_prelude();

        let first = analyzer.analyze(&expr).unwrap();
        let second = analyzer.analyze(&expr).unwrap();
        assert!(types::equals(&first, &second).unwrap());
    }
}
