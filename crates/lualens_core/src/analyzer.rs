//! Two-pass semantic analysis.
//!
//! Pass 1 collects declarations (locals, parameters, loop variables,
//! assignment-created globals, function scopes). Pass 2 walks the same
//! statements inferring every expression, building the flow graph, and
//! emitting diagnostics. One analysis produces one immutable
//! [`Analysis`]; nothing is shared across analyses except the
//! definition registry.

use std::collections::{HashMap, HashSet};

use crate::definitions::Definitions;
use crate::diagnostics::{codes, Diagnostic, DiagnosticTag, Severity};
use crate::document::Document;
use crate::flow::{FlowBinder, FlowId, FlowTree, FLOW_START, FLOW_UNREACHABLE};
use crate::infer::{infer_expr, library_table_ty, returns_ty, InferCtx};
use crate::layers::merge_previous_outputs;
use crate::symbols::{ScopeKind, SymbolId, SymbolKind, SymbolTable};
use crate::syntax::{Block, Expr, ExprKind, FuncBody, Name, Span, Stat, StatKind, TableField};
use crate::types::{FieldTy, FnTy, ParamTy, TableTy, Ty};

/// Per-analysis configuration supplied by the host.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// The hook this script is attached to; selects `context` fields.
    pub hook_name: Option<String>,
    /// Raw sources of every script in the immediately previous layer.
    pub previous_scripts: Vec<String>,
    pub max_script_size: usize,
    pub max_loop_depth: usize,
    pub check_unused: bool,
    pub check_shadowing: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            hook_name: None,
            previous_scripts: Vec::new(),
            max_script_size: 5 * 1024,
            max_loop_depth: 3,
            check_unused: true,
            check_shadowing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnInfo {
    pub span: Span,
    pub ty: Ty,
}

/// Everything one analysis produces.
#[derive(Debug)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
    pub type_by_offset: HashMap<usize, Ty>,
    pub returns: Vec<ReturnInfo>,
    pub flow: FlowTree,
    /// True when no Error-severity diagnostic was emitted.
    pub success: bool,
}

impl Analysis {
    pub fn type_at(&self, offset: usize) -> Option<&Ty> {
        self.type_by_offset.get(&offset)
    }
}

/// Analyze one document. Never fails: internal inconsistencies degrade
/// to unknown types and missing data, not errors.
pub fn analyze(document: &Document, options: &AnalyzerOptions) -> Analysis {
    let text_len = document.text().len();
    let mut diagnostics = Vec::new();

    if let Some(failure) = document.parse_failure() {
        let span = if failure.span.is_empty() {
            Span::new(failure.offset, (failure.offset + 1).min(text_len.max(1)))
        } else {
            failure.span
        };
        diagnostics.push(Diagnostic::error(
            codes::SYNTAX_ERROR,
            span,
            failure.message.clone(),
        ));
    }
    if text_len > options.max_script_size {
        diagnostics.push(Diagnostic::error(
            codes::SCRIPT_TOO_LARGE,
            Span::new(0, text_len.min(1)),
            format!(
                "script is {} bytes; the sandbox accepts at most {}",
                text_len, options.max_script_size
            ),
        ));
    }

    let document_span = Span::new(0, text_len);
    let prev_ty = if options.previous_scripts.is_empty() {
        None
    } else {
        Some(Ty::Table(merge_previous_outputs(&options.previous_scripts)))
    };

    let Some(ast) = document.ast() else {
        let success = !diagnostics.iter().any(|d| d.severity == Severity::Error);
        return Analysis {
            symbols: SymbolTable::new(document_span),
            diagnostics,
            type_by_offset: HashMap::new(),
            returns: Vec::new(),
            flow: FlowBinder::new().finish(),
            success,
        };
    };

    let mut analyzer = Analyzer {
        defs: Definitions::global(),
        options,
        symbols: SymbolTable::new(document_span),
        flow: FlowBinder::new(),
        current_flow: FLOW_START,
        diagnostics,
        type_by_offset: HashMap::new(),
        returns: Vec::new(),
        used: HashSet::new(),
        loop_depth: 0,
        prev_ty,
    };

    analyzer.collect_block(ast);
    analyzer.analyze_block(ast);
    analyzer.check_unused();

    let success = !analyzer
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    log::debug!(
        "analysis finished: {} symbols, {} diagnostics",
        analyzer.symbols.symbols().len(),
        analyzer.diagnostics.len()
    );
    Analysis {
        symbols: analyzer.symbols,
        diagnostics: analyzer.diagnostics,
        type_by_offset: analyzer.type_by_offset,
        returns: analyzer.returns,
        flow: analyzer.flow.finish(),
        success,
    }
}

struct Analyzer<'a> {
    defs: &'static Definitions,
    options: &'a AnalyzerOptions,
    symbols: SymbolTable,
    flow: FlowBinder,
    current_flow: FlowId,
    diagnostics: Vec<Diagnostic>,
    type_by_offset: HashMap<usize, Ty>,
    returns: Vec<ReturnInfo>,
    used: HashSet<SymbolId>,
    loop_depth: usize,
    prev_ty: Option<Ty>,
}

// ---------------------------------------------------------------------------
// Pass 1: declaration collection
// ---------------------------------------------------------------------------

impl Analyzer<'_> {
    fn collect_block(&mut self, block: &Block) {
        for stat in &block.stats {
            self.collect_stat(stat);
        }
    }

    fn collect_stat(&mut self, stat: &Stat) {
        match &stat.kind {
            StatKind::Local { names, exprs } => {
                let tys: Vec<Ty> = exprs.iter().map(|e| self.quiet_ty(e)).collect();
                for (index, name) in names.iter().enumerate() {
                    self.check_shadowing(name);
                    let ty = nth_value(&tys, index);
                    self.symbols.declare(
                        name.name.clone(),
                        SymbolKind::Local,
                        ty,
                        name.span,
                        name.span.start,
                    );
                }
                self.collect_function_exprs(exprs);
            }
            StatKind::Assign { targets, exprs } => {
                let tys: Vec<Ty> = exprs.iter().map(|e| self.quiet_ty(e)).collect();
                for (index, target) in targets.iter().enumerate() {
                    if let ExprKind::Ident(name) = &target.kind {
                        if self.symbols.lookup(name, None).is_none() {
                            self.symbols.add_global(
                                name.clone(),
                                nth_value(&tys, index),
                                target.span,
                                target.span.start,
                            );
                        }
                    }
                }
                self.collect_function_exprs(exprs);
            }
            StatKind::Call(expr) => {
                self.collect_function_exprs(std::slice::from_ref(expr));
            }
            StatKind::Do(body) => self.collect_block(body),
            StatKind::While { cond, body } => {
                self.collect_function_exprs(std::slice::from_ref(cond));
                self.collect_block(body);
            }
            StatKind::Repeat { body, cond } => {
                self.collect_block(body);
                self.collect_function_exprs(std::slice::from_ref(cond));
            }
            StatKind::If { clauses, else_body } => {
                for clause in clauses {
                    self.collect_function_exprs(std::slice::from_ref(&clause.cond));
                    self.collect_block(&clause.body);
                }
                if let Some(body) = else_body {
                    self.collect_block(body);
                }
            }
            StatKind::NumericFor {
                var,
                start,
                end,
                step,
                body,
            } => {
                self.collect_function_exprs(std::slice::from_ref(&**start));
                self.collect_function_exprs(std::slice::from_ref(&**end));
                if let Some(step) = step {
                    self.collect_function_exprs(std::slice::from_ref(&**step));
                }
                self.symbols.enter_scope(ScopeKind::For, stat.span);
                self.check_shadowing(var);
                self.symbols.declare(
                    var.name.clone(),
                    SymbolKind::LoopVariable,
                    Ty::Number,
                    var.span,
                    var.span.start,
                );
                self.collect_block(body);
                self.symbols.exit_scope();
            }
            StatKind::GenericFor { names, exprs, body } => {
                self.collect_function_exprs(exprs);
                self.symbols.enter_scope(ScopeKind::ForIn, stat.span);
                for name in names {
                    self.check_shadowing(name);
                    self.symbols.declare(
                        name.name.clone(),
                        SymbolKind::LoopVariable,
                        Ty::Unknown,
                        name.span,
                        name.span.start,
                    );
                }
                self.collect_block(body);
                self.symbols.exit_scope();
            }
            StatKind::Function {
                path,
                is_method,
                body,
            } => {
                if path.len() == 1 && !is_method {
                    let name = &path[0];
                    if self.symbols.lookup(&name.name, None).is_none() {
                        self.symbols.add_global(
                            name.name.clone(),
                            fn_ty_of_body(body),
                            name.span,
                            name.span.start,
                        );
                    }
                }
                let kind = if *is_method {
                    ScopeKind::Method
                } else {
                    ScopeKind::Function
                };
                self.collect_func_body(kind, body);
            }
            StatKind::LocalFunction { name, body } => {
                self.check_shadowing(name);
                self.symbols.declare_hoisted(
                    name.name.clone(),
                    SymbolKind::Local,
                    fn_ty_of_body(body),
                    name.span,
                    name.span.start,
                );
                self.collect_func_body(ScopeKind::Function, body);
            }
            StatKind::Return { exprs } => {
                self.collect_function_exprs(exprs);
            }
            StatKind::Break => {}
        }
    }

    fn collect_func_body(&mut self, kind: ScopeKind, body: &FuncBody) {
        self.symbols.enter_scope(kind, body.span);
        for param in &body.params {
            self.check_shadowing(param);
            self.symbols.declare(
                param.name.clone(),
                SymbolKind::Parameter,
                Ty::Unknown,
                param.span,
                param.span.start,
            );
        }
        self.collect_block(&body.body);
        self.symbols.exit_scope();
    }

    /// Walk expressions looking for function literals, opening their
    /// scopes in source order.
    fn collect_function_exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.collect_function_expr(expr);
        }
    }

    fn collect_function_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Function(body) => {
                self.collect_func_body(ScopeKind::Function, body);
            }
            ExprKind::Member { base, .. } => self.collect_function_expr(base),
            ExprKind::Index { base, index } => {
                self.collect_function_expr(base);
                self.collect_function_expr(index);
            }
            ExprKind::Call { base, args } => {
                self.collect_function_expr(base);
                self.collect_function_exprs(args);
            }
            ExprKind::MethodCall { base, args, .. } => {
                self.collect_function_expr(base);
                self.collect_function_exprs(args);
            }
            ExprKind::Table(fields) => {
                for field in fields {
                    match field {
                        TableField::Named { value, .. } => self.collect_function_expr(value),
                        TableField::Keyed { key, value } => {
                            self.collect_function_expr(key);
                            self.collect_function_expr(value);
                        }
                        TableField::Item(value) => self.collect_function_expr(value),
                    }
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.collect_function_expr(lhs);
                self.collect_function_expr(rhs);
            }
            ExprKind::Unary { expr: inner, .. } | ExprKind::Paren(inner) => {
                self.collect_function_expr(inner);
            }
            _ => {}
        }
    }

    fn check_shadowing(&mut self, name: &Name) {
        if !self.options.check_shadowing {
            return;
        }
        if name.name.starts_with('_') {
            return;
        }
        if let Some(existing) = self.symbols.find_shadowed(&name.name) {
            let related = existing.span;
            self.diagnostics.push(
                Diagnostic::warning(
                    codes::SHADOWED_VARIABLE,
                    name.span,
                    format!("'{}' shadows an earlier declaration", name.name),
                )
                .with_related(related),
            );
        }
    }

    /// Side-effect-free typing for pass-1 declarations: literals,
    /// constructor shapes, and registry-known member paths. Everything
    /// else is refined by pass 2.
    fn quiet_ty(&self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Nil => Ty::Nil,
            ExprKind::True => Ty::BooleanLit(true),
            ExprKind::False => Ty::BooleanLit(false),
            ExprKind::Number { value, .. } => Ty::NumberLit(*value),
            ExprKind::Str(value) => Ty::StringLit(value.clone()),
            ExprKind::Function(body) => fn_ty_of_body(body),
            ExprKind::Paren(inner) => self.quiet_ty(inner),
            ExprKind::Table(fields) => self.quiet_table_ty(fields),
            ExprKind::Ident(_) | ExprKind::Member { .. } => self.static_path_ty(expr),
            ExprKind::Call { base, .. } => match self.static_path_ty(base) {
                Ty::Fn(function) => returns_ty(&function),
                _ => Ty::Unknown,
            },
            _ => Ty::Unknown,
        }
    }

    fn quiet_table_ty(&self, fields: &[TableField]) -> Ty {
        if fields.is_empty() {
            return Ty::Table(TableTy::default());
        }
        if fields.iter().all(|f| matches!(f, TableField::Item(_))) {
            let mut element_tys = Vec::new();
            for field in fields {
                if let TableField::Item(value) = field {
                    element_tys.push(self.quiet_ty(value));
                }
            }
            return Ty::Array(Box::new(Ty::union(element_tys)));
        }
        let mut table = TableTy::default();
        for field in fields {
            if let TableField::Named { name, value, .. } = field {
                table
                    .fields
                    .push(FieldTy::required(name.clone(), self.quiet_ty(value)));
            }
        }
        Ty::Table(table)
    }

    /// Type a dotted path through the registry, provided its root is
    /// not locally bound.
    fn static_path_ty(&self, expr: &Expr) -> Ty {
        let Some(path) = expr.member_path() else {
            return Ty::Unknown;
        };
        let root = path[0];
        if self.symbols.lookup(root, None).is_some() {
            return Ty::Unknown;
        }
        let hook = self.options.hook_name.as_deref();
        if path.len() == 1 {
            if let Some(ty) = self.defs.sandbox_item_ty(root, hook) {
                return ty;
            }
            if self.defs.library(root).is_some() {
                return library_table_ty(self.defs, root);
            }
            return self
                .defs
                .global_def(root)
                .map(|def| self.defs.member_ty(def))
                .unwrap_or(Ty::Unknown);
        }
        if root == "context" && path.len() == 2 {
            if let Some(def) = self.defs.context_fields_for_hook(hook).get(&path[1].to_string()) {
                return self.defs.member_ty(def);
            }
        }
        self.defs
            .resolve_member_path(&path)
            .map(|def| self.defs.member_ty(def))
            .unwrap_or(Ty::Unknown)
    }
}

// ---------------------------------------------------------------------------
// Pass 2: analysis
// ---------------------------------------------------------------------------

impl Analyzer<'_> {
    fn analyze_block(&mut self, block: &Block) {
        for stat in &block.stats {
            self.analyze_stat(stat);
        }
    }

    fn analyze_stat(&mut self, stat: &Stat) {
        match &stat.kind {
            StatKind::Local { names, exprs } => {
                let tys: Vec<Ty> = exprs.iter().map(|e| self.infer(e)).collect();
                for (index, name) in names.iter().enumerate() {
                    let ty = nth_value(&tys, index);
                    if ty != Ty::Unknown {
                        self.refine_symbol(name, ty);
                    }
                }
                self.analyze_function_bodies(exprs);
            }
            StatKind::Assign { targets, exprs } => {
                for target in targets {
                    self.infer(target);
                }
                for expr in exprs {
                    self.infer(expr);
                }
                self.analyze_function_bodies(targets);
                self.analyze_function_bodies(exprs);
            }
            StatKind::Call(expr) => {
                self.infer(expr);
                self.analyze_function_bodies(std::slice::from_ref(expr));
                self.apply_call_flow(expr);
            }
            StatKind::Do(body) => self.analyze_block(body),
            StatKind::While { cond, body } => {
                self.infer(cond);
                self.analyze_function_bodies(std::slice::from_ref(cond));
                let entry = self.current_flow;
                let body_entry = self.flow.create_true_condition(cond, entry);
                let exit = self.flow.create_false_condition(cond, entry);
                self.current_flow = body_entry;
                self.with_loop(stat.span, |a| a.analyze_block(body));
                let after = self.flow.create_branch_label();
                self.flow.add_antecedent(after, exit);
                self.flow.add_antecedent(after, self.current_flow);
                self.current_flow = after;
            }
            StatKind::Repeat { body, cond } => {
                self.with_loop(stat.span, |a| a.analyze_block(body));
                self.infer(cond);
                self.analyze_function_bodies(std::slice::from_ref(cond));
                // The loop exits when the condition first holds.
                let after = self.flow.create_true_condition(cond, self.current_flow);
                self.current_flow = after;
            }
            StatKind::If { clauses, else_body } => {
                let mut tails = Vec::new();
                let mut incoming = self.current_flow;
                for clause in clauses {
                    self.current_flow = incoming;
                    self.infer(&clause.cond);
                    self.analyze_function_bodies(std::slice::from_ref(&clause.cond));
                    let then_flow = self.flow.create_true_condition(&clause.cond, incoming);
                    let else_flow = self.flow.create_false_condition(&clause.cond, incoming);
                    self.current_flow = then_flow;
                    self.analyze_block(&clause.body);
                    tails.push(self.current_flow);
                    incoming = else_flow;
                }
                match else_body {
                    Some(body) => {
                        self.current_flow = incoming;
                        self.analyze_block(body);
                        tails.push(self.current_flow);
                    }
                    // Without an else, the final falsy path joins directly.
                    None => tails.push(incoming),
                }
                let after = self.flow.create_branch_label();
                for tail in tails {
                    self.flow.add_antecedent(after, tail);
                }
                self.current_flow = after;
            }
            StatKind::NumericFor {
                start,
                end,
                step,
                body,
                ..
            } => {
                self.infer(start);
                self.infer(end);
                if let Some(step) = step {
                    self.infer(step);
                }
                let entry = self.current_flow;
                self.with_loop(stat.span, |a| a.analyze_block(body));
                let after = self.flow.create_branch_label();
                self.flow.add_antecedent(after, entry);
                self.flow.add_antecedent(after, self.current_flow);
                self.current_flow = after;
            }
            StatKind::GenericFor { exprs, body, .. } => {
                for expr in exprs {
                    self.infer(expr);
                }
                self.analyze_function_bodies(exprs);
                let entry = self.current_flow;
                self.with_loop(stat.span, |a| a.analyze_block(body));
                let after = self.flow.create_branch_label();
                self.flow.add_antecedent(after, entry);
                self.flow.add_antecedent(after, self.current_flow);
                self.current_flow = after;
            }
            StatKind::Function {
                path,
                is_method,
                body,
            } => {
                // `function t.m()` / `function t:m()` reads `t`.
                if path.len() > 1 || *is_method {
                    if let Some(root) = path.first() {
                        let offset = root.span.start;
                        self.bind_identifier(offset);
                        self.lookup_symbol_type(&root.name, offset);
                    }
                }
                self.analyze_isolated_body(body);
            }
            StatKind::LocalFunction { body, .. } => {
                self.analyze_isolated_body(body);
            }
            StatKind::Return { exprs } => {
                let tys: Vec<Ty> = exprs.iter().map(|e| self.infer(e)).collect();
                self.analyze_function_bodies(exprs);
                let ty = match tys.len() {
                    0 => Ty::Nil,
                    1 => tys.into_iter().next().unwrap_or(Ty::Nil),
                    _ => Ty::Tuple(tys),
                };
                self.returns.push(ReturnInfo {
                    span: stat.span,
                    ty,
                });
                self.flow.create_return(self.current_flow);
                self.current_flow = FLOW_UNREACHABLE;
            }
            StatKind::Break => {
                self.current_flow = FLOW_UNREACHABLE;
            }
        }
    }

    /// `assert(x)` narrows the rest of the statement list; `error(...)`
    /// makes it unreachable.
    fn apply_call_flow(&mut self, expr: &Expr) {
        let ExprKind::Call { base, args } = &expr.kind else {
            return;
        };
        match base.as_ident() {
            Some("assert") => {
                if let Some(first) = args.first() {
                    self.current_flow = self.flow.create_true_condition(first, self.current_flow);
                }
            }
            Some("error") => {
                self.current_flow = FLOW_UNREACHABLE;
            }
            _ => {}
        }
    }

    /// Analyze a function body with its own flow, leaving the
    /// surrounding statement flow untouched.
    fn analyze_isolated_body(&mut self, body: &FuncBody) {
        let saved_flow = self.current_flow;
        let saved_depth = self.loop_depth;
        self.current_flow = FLOW_START;
        self.loop_depth = 0;
        self.analyze_block(&body.body);
        self.current_flow = saved_flow;
        self.loop_depth = saved_depth;
    }

    /// Find function literals in already-inferred expressions and
    /// analyze their bodies.
    fn analyze_function_bodies(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.analyze_function_body(expr);
        }
    }

    fn analyze_function_body(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Function(body) => self.analyze_isolated_body(body),
            ExprKind::Member { base, .. } => self.analyze_function_body(base),
            ExprKind::Index { base, index } => {
                self.analyze_function_body(base);
                self.analyze_function_body(index);
            }
            ExprKind::Call { base, args } => {
                self.analyze_function_body(base);
                self.analyze_function_bodies(args);
            }
            ExprKind::MethodCall { base, args, .. } => {
                self.analyze_function_body(base);
                self.analyze_function_bodies(args);
            }
            ExprKind::Table(fields) => {
                for field in fields {
                    match field {
                        TableField::Named { value, .. } => self.analyze_function_body(value),
                        TableField::Keyed { key, value } => {
                            self.analyze_function_body(key);
                            self.analyze_function_body(value);
                        }
                        TableField::Item(value) => self.analyze_function_body(value),
                    }
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.analyze_function_body(lhs);
                self.analyze_function_body(rhs);
            }
            ExprKind::Unary { expr: inner, .. } | ExprKind::Paren(inner) => {
                self.analyze_function_body(inner);
            }
            _ => {}
        }
    }

    fn with_loop<F: FnOnce(&mut Self)>(&mut self, span: Span, f: F) {
        self.loop_depth += 1;
        if self.loop_depth > self.options.max_loop_depth {
            self.diagnostics.push(Diagnostic::warning(
                codes::DEEPLY_NESTED_LOOP,
                span,
                format!(
                    "loop nesting exceeds {} levels",
                    self.options.max_loop_depth
                ),
            ));
        }
        f(self);
        self.loop_depth -= 1;
    }

    fn infer(&mut self, expr: &Expr) -> Ty {
        infer_expr(self, expr)
    }

    /// Update the declared type of the symbol introduced at `name`.
    fn refine_symbol(&mut self, name: &Name, ty: Ty) {
        let id = self
            .symbols
            .symbols()
            .iter()
            .find(|s| s.offset == name.span.start && s.name == name.name)
            .map(|s| s.id);
        if let Some(id) = id {
            self.symbols.symbol_mut(id).ty = ty;
        }
    }

    fn check_unused(&mut self) {
        if !self.options.check_unused {
            return;
        }
        let mut unused = Vec::new();
        for symbol in self.symbols.symbols() {
            if self.used.contains(&symbol.id) || symbol.name.starts_with('_') {
                continue;
            }
            match symbol.kind {
                SymbolKind::Local => unused.push((
                    codes::UNUSED_VARIABLE,
                    symbol.span,
                    format!("unused variable '{}'", symbol.name),
                )),
                SymbolKind::Parameter => unused.push((
                    codes::UNUSED_PARAMETER,
                    symbol.span,
                    format!("unused parameter '{}'", symbol.name),
                )),
                SymbolKind::LoopVariable | SymbolKind::Global => {}
            }
        }
        for (code, span, message) in unused {
            self.diagnostics
                .push(Diagnostic::warning(code, span, message).with_tag(DiagnosticTag::Unused));
        }
    }
}

fn fn_ty_of_body(body: &FuncBody) -> Ty {
    Ty::Fn(FnTy {
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
    })
}

/// The type the `index`-th name receives from a value list: pairwise,
/// with a trailing multi-return tuple spread over remaining names.
fn nth_value(tys: &[Ty], index: usize) -> Ty {
    if tys.is_empty() {
        return Ty::Unknown;
    }
    let last = tys.len() - 1;
    if index < last {
        return tys[index].clone();
    }
    match &tys[last] {
        Ty::Tuple(elements) => elements.get(index - last).cloned().unwrap_or(Ty::Unknown),
        ty if index == last => ty.clone(),
        _ => Ty::Unknown,
    }
}

impl InferCtx for Analyzer<'_> {
    fn defs(&self) -> &'static Definitions {
        self.defs
    }

    fn hook_name(&self) -> Option<String> {
        self.options.hook_name.clone()
    }

    fn prev_table_ty(&self) -> Option<Ty> {
        self.prev_ty.clone()
    }

    fn bind_identifier(&mut self, offset: usize) {
        self.flow.bind_offset(offset, self.current_flow);
    }

    fn lookup_symbol_type(&mut self, name: &str, offset: usize) -> Option<Ty> {
        let (id, declared) = {
            let symbol = self.symbols.lookup(name, Some(offset))?;
            (symbol.id, symbol.ty.clone())
        };
        self.symbols.add_reference(id, offset);
        self.used.insert(id);
        if declared.may_be_nil() && self.flow.proves_non_nil(name, self.current_flow) {
            Some(declared.without_nil())
        } else {
            Some(declared)
        }
    }

    fn unresolved_identifier(&mut self, name: &str, span: Span) {
        if name == "self" || name == "_" {
            return;
        }
        if self.defs.is_disabled(name) {
            let message = self
                .defs
                .disabled_message(name)
                .unwrap_or("this global is not available in the sandbox")
                .to_string();
            self.diagnostics
                .push(Diagnostic::error(codes::DISABLED_GLOBAL, span, message));
            return;
        }
        self.diagnostics.push(Diagnostic::error(
            codes::UNDEFINED_VARIABLE,
            span,
            format!("undefined variable '{}'", name),
        ));
    }

    fn async_helper_call(&mut self, helper: &str, span: Span) {
        self.diagnostics.push(Diagnostic::warning(
            codes::ASYNC_WITHOUT_AWAIT,
            span,
            format!(
                "helpers.{} is asynchronous; wrap the call in await(...)",
                helper
            ),
        ));
    }

    fn record(&mut self, offset: usize, ty: Ty) {
        // Nested expressions share start offsets with their parents
        // (`u.email` starts where `u` does); the innermost expression
        // is recorded first and wins, so identifier hovers see the
        // narrowed identifier type.
        self.type_by_offset.entry(offset).or_insert(ty);
    }
}
