//! Per-expression type inference.
//!
//! Inference is driven by the analyzer through [`InferCtx`], which
//! supplies symbol lookups (position-aware, with narrowing applied),
//! registry access, the active hook, and the sinks for caching and
//! diagnostics. Every inferred expression is cached by the start
//! offset of its span.

use crate::definitions::Definitions;
use crate::syntax::{BinOp, Expr, ExprKind, Span, TableField, UnOp};
use crate::types::{FieldTy, FnTy, ParamTy, TableTy, Ty};

/// Capabilities the analyzer lends to inference.
pub trait InferCtx {
    fn defs(&self) -> &'static Definitions;
    fn hook_name(&self) -> Option<String>;
    /// The merged `context.prev` table, when prior-layer scripts are
    /// configured.
    fn prev_table_ty(&self) -> Option<Ty>;
    /// Pin an identifier reference to the current flow.
    fn bind_identifier(&mut self, offset: usize);
    /// Position-aware symbol lookup; records the reference and applies
    /// flow narrowing.
    fn lookup_symbol_type(&mut self, name: &str, offset: usize) -> Option<Ty>;
    /// An identifier that resolved to nothing at all.
    fn unresolved_identifier(&mut self, name: &str, span: Span);
    /// A call of an async helper outside any `await(...)` argument.
    fn async_helper_call(&mut self, helper: &str, span: Span);
    /// Cache sink for `type_by_offset`.
    fn record(&mut self, offset: usize, ty: Ty);
}

/// Infer the type of `expr`, caching it and all sub-expressions.
pub fn infer_expr(ctx: &mut dyn InferCtx, expr: &Expr) -> Ty {
    Engine {
        ctx,
        await_depth: 0,
    }
    .infer(expr)
}

struct Engine<'a> {
    ctx: &'a mut dyn InferCtx,
    await_depth: usize,
}

impl Engine<'_> {
    fn infer(&mut self, expr: &Expr) -> Ty {
        let ty = self.infer_uncached(expr);
        self.ctx.record(expr.span.start, ty.clone());
        ty
    }

    fn infer_uncached(&mut self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Nil => Ty::Nil,
            ExprKind::True => Ty::BooleanLit(true),
            ExprKind::False => Ty::BooleanLit(false),
            ExprKind::Vararg => Ty::Variadic(Box::new(Ty::Any)),
            ExprKind::Number { value, .. } => Ty::NumberLit(*value),
            ExprKind::Str(value) => Ty::StringLit(value.clone()),
            ExprKind::Ident(name) => self.infer_ident(name, expr.span),
            ExprKind::Member { base, name, .. } => {
                let base_ty = self.infer(base);
                self.member_of(&base_ty, name)
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.infer(base);
                let index_ty = self.infer(index);
                self.index_of(&base_ty, &index_ty)
            }
            ExprKind::Call { base, args } => self.infer_call(expr, base, args),
            ExprKind::MethodCall {
                base, name, args, ..
            } => {
                let base_ty = self.infer(base);
                for arg in args {
                    self.infer(arg);
                }
                self.method_result(&base_ty, name)
            }
            ExprKind::Function(body) => Ty::Fn(FnTy {
                params: body
                    .params
                    .iter()
                    .map(|p| ParamTy {
                        name: p.name.clone(),
                        ty: Ty::Unknown,
                        vararg: false,
                        optional: false,
                    })
                    .collect(),
                returns: vec![Ty::Unknown],
            }),
            ExprKind::Table(fields) => self.infer_table(fields),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.infer(lhs);
                let rhs_ty = self.infer(rhs);
                binary_result(*op, lhs_ty, rhs_ty)
            }
            ExprKind::Unary { op, expr: inner } => {
                self.infer(inner);
                match op {
                    UnOp::Not => Ty::Boolean,
                    UnOp::Neg => Ty::Number,
                    UnOp::Len | UnOp::BitNot => Ty::Integer,
                }
            }
            ExprKind::Paren(inner) => self.infer(inner),
        }
    }

    /// Identifier lookup chain: symbol table, sandbox item, library,
    /// global. Anything else is unknown (and reported).
    fn infer_ident(&mut self, name: &str, span: Span) -> Ty {
        self.ctx.bind_identifier(span.start);
        if let Some(ty) = self.ctx.lookup_symbol_type(name, span.start) {
            return ty;
        }
        let defs = self.ctx.defs();
        let hook = self.ctx.hook_name();
        if let Some(ty) = defs.sandbox_item_ty(name, hook.as_deref()) {
            if name == "context" {
                if let Some(prev) = self.ctx.prev_table_ty() {
                    return override_field(ty, "prev", prev);
                }
            }
            return ty;
        }
        if defs.library(name).is_some() {
            return library_table_ty(defs, name);
        }
        if let Some(def) = defs.global_def(name) {
            return defs.member_ty(def);
        }
        self.ctx.unresolved_identifier(name, span);
        Ty::Unknown
    }

    fn infer_call(&mut self, call: &Expr, base: &Expr, args: &[Expr]) -> Ty {
        let base_ty = self.infer(base);
        let is_await = base.as_ident() == Some("await");
        if is_await {
            self.await_depth += 1;
        }
        for arg in args {
            self.infer(arg);
        }
        if is_await {
            self.await_depth -= 1;
        }

        if self.await_depth == 0 {
            if let ExprKind::Member {
                base: member_base,
                name,
                ..
            } = &base.kind
            {
                if member_base.as_ident() == Some("helpers") {
                    let defs = self.ctx.defs();
                    if defs.helper(name).map(|d| d.is_async).unwrap_or(false) {
                        self.ctx.async_helper_call(name, call.span);
                    }
                }
            }
        }

        match base_ty {
            Ty::Fn(function) => returns_ty(&function),
            _ => Ty::Unknown,
        }
    }

    fn infer_table(&mut self, fields: &[TableField]) -> Ty {
        if fields.is_empty() {
            return Ty::Table(TableTy::default());
        }
        let all_positional = fields.iter().all(|f| matches!(f, TableField::Item(_)));
        if all_positional {
            let mut element_tys = Vec::new();
            for field in fields {
                if let TableField::Item(value) = field {
                    element_tys.push(self.infer(value));
                }
            }
            return Ty::Array(Box::new(Ty::union(element_tys)));
        }
        let mut table = TableTy::default();
        for field in fields {
            match field {
                TableField::Named { name, value, .. } => {
                    let ty = self.infer(value);
                    table.fields.push(FieldTy::required(name.clone(), ty));
                }
                TableField::Keyed { key, value } => {
                    let key_ty = self.infer(key);
                    let value_ty = self.infer(value);
                    if let Ty::StringLit(name) = key_ty {
                        table.fields.push(FieldTy::required(name, value_ty));
                    }
                }
                TableField::Item(value) => {
                    self.infer(value);
                }
            }
        }
        Ty::Table(table)
    }

    fn member_of(&mut self, base: &Ty, name: &str) -> Ty {
        let defs = self.ctx.defs();
        match base {
            Ty::Table(table) => table
                .field(name)
                .map(|f| f.ty.clone())
                .unwrap_or(Ty::Unknown),
            Ty::Ref(type_name) => defs
                .type_fields(type_name)
                .and_then(|fields| fields.get(name))
                .map(|def| defs.member_ty(def))
                .unwrap_or(Ty::Unknown),
            Ty::Union(members) => {
                for member in members {
                    if matches!(member, Ty::Nil) {
                        continue;
                    }
                    let ty = self.member_of(member, name);
                    if ty != Ty::Unknown {
                        return ty;
                    }
                }
                Ty::Unknown
            }
            _ => Ty::Unknown,
        }
    }

    fn index_of(&mut self, base: &Ty, index: &Ty) -> Ty {
        match base {
            Ty::Array(element) => (**element).clone(),
            Ty::Tuple(elements) => match index {
                // Tuples are 1-indexed.
                Ty::NumberLit(value) if value.fract() == 0.0 && *value >= 1.0 => elements
                    .get((*value as usize) - 1)
                    .cloned()
                    .unwrap_or(Ty::Unknown),
                _ => Ty::Unknown,
            },
            Ty::Table(table) => {
                let by_field = match index {
                    Ty::StringLit(name) => table.field(name).map(|f| f.ty.clone()),
                    Ty::NumberLit(value) => {
                        let name = if value.fract() == 0.0 {
                            format!("{}", *value as i64)
                        } else {
                            format!("{}", value)
                        };
                        table.field(&name).map(|f| f.ty.clone())
                    }
                    _ => None,
                };
                by_field
                    .or_else(|| table.value_type.as_deref().cloned())
                    .unwrap_or(Ty::Unknown)
            }
            Ty::Ref(_) => match index {
                Ty::StringLit(name) => self.member_of(base, name),
                _ => Ty::Unknown,
            },
            Ty::Union(members) => {
                for member in members {
                    if matches!(member, Ty::Nil) {
                        continue;
                    }
                    let ty = self.index_of(member, index);
                    if ty != Ty::Unknown {
                        return ty;
                    }
                }
                Ty::Unknown
            }
            _ => Ty::Unknown,
        }
    }

    fn method_result(&mut self, base: &Ty, name: &str) -> Ty {
        let defs = self.ctx.defs();
        if matches!(base, Ty::String | Ty::StringLit(_)) {
            if let Some(def) = defs.library_method("string", name) {
                if let Ty::Fn(function) = defs.member_ty(def) {
                    return returns_ty(&function);
                }
            }
            return Ty::Unknown;
        }
        match self.member_of(base, name) {
            Ty::Fn(function) => returns_ty(&function),
            _ => Ty::Unknown,
        }
    }
}

fn binary_result(op: BinOp, lhs: Ty, rhs: Ty) -> Ty {
    match op {
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Ty::Boolean,
        BinOp::Concat => Ty::String,
        BinOp::FloorDiv | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl
        | BinOp::Shr => Ty::Integer,
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => Ty::Number,
        // The value of `and`/`or` is one of its operands.
        BinOp::And | BinOp::Or => Ty::union([lhs, rhs]),
    }
}

/// Collapse a function's declared returns into a single result type.
pub fn returns_ty(function: &FnTy) -> Ty {
    match function.returns.len() {
        0 => Ty::Void,
        1 => function.returns[0].clone(),
        _ => Ty::Tuple(function.returns.clone()),
    }
}

/// A library namespace (`string`, `table`, `math`) as a table type.
pub fn library_table_ty(defs: &Definitions, name: &str) -> Ty {
    let Some(lib) = defs.library(name) else {
        return Ty::Unknown;
    };
    let mut table = TableTy::default();
    for (method_name, def) in &lib.methods {
        table.fields.push(FieldTy {
            name: method_name.clone(),
            ty: defs.member_ty(def),
            optional: false,
            description: def.description.clone(),
        });
    }
    for (field_name, def) in &lib.fields {
        table.fields.push(FieldTy {
            name: field_name.clone(),
            ty: defs.member_ty(def),
            optional: false,
            description: def.description.clone(),
        });
    }
    Ty::Table(table)
}

/// Replace the type of one field in a table type, keeping the rest.
pub fn override_field(ty: Ty, field_name: &str, new_ty: Ty) -> Ty {
    match ty {
        Ty::Table(mut table) => {
            match table.fields.iter_mut().find(|f| f.name == field_name) {
                Some(field) => field.ty = new_ty,
                None => table.fields.push(FieldTy::required(field_name, new_ty)),
            }
            Ty::Table(table)
        }
        other => other,
    }
}
