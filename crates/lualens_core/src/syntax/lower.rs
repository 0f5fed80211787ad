//! Lowering from the external Lua parser's tree to the analyzer's node
//! model.
//!
//! The parser is treated as a black box: the only contract consumed
//! here is node kinds and byte positions. Prefix/suffix chains
//! (`a.b[c](d):m(e)`) are folded into nested member/index/call nodes so
//! the analyzer sees one expression shape.

use std::borrow::Borrow;

use full_moon::ast as fm;
use full_moon::node::Node;
use full_moon::tokenizer::{TokenReference, TokenType};

use super::ast::{
    BinOp, Block, Expr, ExprKind, FuncBody, IfClause, Name, Span, Stat, StatKind, TableField,
    UnOp,
};

/// A recorded parse failure, positions 0-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub message: String,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

/// Parse `source` into a lowered chunk, or report the first failure.
pub fn parse_chunk(source: &str) -> Result<Block, ParseFailure> {
    match full_moon::parse(source) {
        Ok(ast) => Ok(lower_block(ast.nodes())),
        Err(errors) => Err(failure_from_errors(&errors)),
    }
}

fn failure_from_errors(errors: &[full_moon::Error]) -> ParseFailure {
    let Some(err) = errors.first() else {
        return ParseFailure {
            message: "unknown parse error".to_string(),
            offset: 0,
            line: 0,
            column: 0,
            span: Span::default(),
        };
    };
    let (start, end) = err.range();
    ParseFailure {
        message: err.error_message().to_string(),
        offset: start.bytes(),
        line: start.line().saturating_sub(1) as u32,
        column: start.character().saturating_sub(1) as u32,
        span: Span::new(start.bytes(), end.bytes().max(start.bytes())),
    }
}

fn node_span<N: Node>(node: &N) -> Span {
    match (node.start_position(), node.end_position()) {
        (Some(start), Some(end)) => Span::new(start.bytes(), end.bytes()),
        _ => Span::default(),
    }
}

fn token_span(tr: &TokenReference) -> Span {
    Span::new(
        tr.token().start_position().bytes(),
        tr.token().end_position().bytes(),
    )
}

fn token_text(tr: &TokenReference) -> String {
    tr.token().to_string()
}

fn name_of(tr: &TokenReference) -> Name {
    Name {
        name: token_text(tr),
        span: token_span(tr),
    }
}

fn lower_block(block: &fm::Block) -> Block {
    let mut stats = Vec::new();
    for stmt in block.stmts() {
        if let Some(stat) = lower_stmt(stmt) {
            stats.push(stat);
        }
    }
    if let Some(last) = block.last_stmt() {
        if let Some(stat) = lower_last_stmt(last) {
            stats.push(stat);
        }
    }
    let span = match (stats.first(), stats.last()) {
        (Some(first), Some(last)) => first.span.join(last.span),
        _ => node_span(block),
    };
    Block { span, stats }
}

fn lower_stmt(stmt: &fm::Stmt) -> Option<Stat> {
    let span = node_span(stmt);
    let kind = match stmt {
        fm::Stmt::Assignment(assignment) => StatKind::Assign {
            targets: assignment.variables().iter().map(lower_var).collect(),
            exprs: assignment.expressions().iter().map(lower_expr).collect(),
        },
        fm::Stmt::LocalAssignment(local) => StatKind::Local {
            names: local.names().iter().map(name_of).collect(),
            exprs: local.expressions().iter().map(lower_expr).collect(),
        },
        fm::Stmt::Do(do_stmt) => StatKind::Do(lower_block(do_stmt.block())),
        fm::Stmt::FunctionCall(call) => StatKind::Call(lower_function_call(call)),
        fm::Stmt::FunctionDeclaration(decl) => {
            let fname = decl.name();
            let mut path: Vec<Name> = fname.names().iter().map(name_of).collect();
            let is_method = match fname.method_name() {
                Some(method) => {
                    path.push(name_of(method));
                    true
                }
                None => false,
            };
            StatKind::Function {
                path,
                is_method,
                body: lower_func_body(decl.body()),
            }
        }
        fm::Stmt::GenericFor(generic_for) => StatKind::GenericFor {
            names: generic_for.names().iter().map(name_of).collect(),
            exprs: generic_for.expressions().iter().map(lower_expr).collect(),
            body: lower_block(generic_for.block()),
        },
        fm::Stmt::If(if_stmt) => {
            let mut clauses = vec![IfClause {
                cond: lower_expr(if_stmt.condition()),
                body: lower_block(if_stmt.block()),
            }];
            if let Some(else_ifs) = if_stmt.else_if() {
                for else_if in else_ifs {
                    clauses.push(IfClause {
                        cond: lower_expr(else_if.condition()),
                        body: lower_block(else_if.block()),
                    });
                }
            }
            StatKind::If {
                clauses,
                else_body: if_stmt.else_block().map(lower_block),
            }
        }
        fm::Stmt::LocalFunction(local_fn) => StatKind::LocalFunction {
            name: name_of(local_fn.name()),
            body: lower_func_body(local_fn.body()),
        },
        fm::Stmt::NumericFor(numeric_for) => StatKind::NumericFor {
            var: name_of(numeric_for.index_variable()),
            start: Box::new(lower_expr(numeric_for.start())),
            end: Box::new(lower_expr(numeric_for.r#end())),
            step: numeric_for.step().map(|s| Box::new(lower_expr(s))),
            body: lower_block(numeric_for.block()),
        },
        fm::Stmt::Repeat(repeat) => StatKind::Repeat {
            body: lower_block(repeat.block()),
            cond: lower_expr(repeat.until()),
        },
        fm::Stmt::While(while_stmt) => StatKind::While {
            cond: lower_expr(while_stmt.condition()),
            body: lower_block(while_stmt.block()),
        },
        _ => return None,
    };
    Some(Stat { span, kind })
}

fn lower_last_stmt(last: &fm::LastStmt) -> Option<Stat> {
    match last {
        fm::LastStmt::Break(token) => Some(Stat {
            span: token_span(token),
            kind: StatKind::Break,
        }),
        fm::LastStmt::Return(ret) => Some(Stat {
            span: node_span(ret),
            kind: StatKind::Return {
                exprs: ret.returns().iter().map(lower_expr).collect(),
            },
        }),
        _ => None,
    }
}

fn lower_var(var: &fm::Var) -> Expr {
    match var {
        fm::Var::Name(token) => Expr {
            span: token_span(token),
            kind: ExprKind::Ident(token_text(token)),
        },
        fm::Var::Expression(var_expr) => {
            let mut expr = lower_prefix(var_expr.prefix());
            for suffix in var_expr.suffixes() {
                expr = apply_suffix(expr, suffix);
            }
            expr
        }
        _ => Expr {
            span: node_span(var),
            kind: ExprKind::Nil,
        },
    }
}

fn lower_prefix(prefix: &fm::Prefix) -> Expr {
    match prefix {
        fm::Prefix::Name(token) => Expr {
            span: token_span(token),
            kind: ExprKind::Ident(token_text(token)),
        },
        fm::Prefix::Expression(expression) => lower_expr(expression.borrow()),
        _ => Expr {
            span: node_span(prefix),
            kind: ExprKind::Nil,
        },
    }
}

fn lower_function_call(call: &fm::FunctionCall) -> Expr {
    let mut expr = lower_prefix(call.prefix());
    for suffix in call.suffixes() {
        expr = apply_suffix(expr, suffix);
    }
    expr
}

fn apply_suffix(base: Expr, suffix: &fm::Suffix) -> Expr {
    let span = base.span.join(node_span(suffix));
    match suffix {
        fm::Suffix::Call(call) => match call {
            fm::Call::AnonymousCall(args) => Expr {
                span,
                kind: ExprKind::Call {
                    base: Box::new(base),
                    args: lower_call_args(args),
                },
            },
            fm::Call::MethodCall(method) => Expr {
                span,
                kind: ExprKind::MethodCall {
                    base: Box::new(base),
                    name: token_text(method.name()),
                    name_span: token_span(method.name()),
                    args: lower_call_args(method.args()),
                },
            },
            _ => base,
        },
        fm::Suffix::Index(index) => match index {
            fm::Index::Dot { name, .. } => Expr {
                span,
                kind: ExprKind::Member {
                    base: Box::new(base),
                    name: token_text(name),
                    name_span: token_span(name),
                },
            },
            fm::Index::Brackets { expression, .. } => Expr {
                span,
                kind: ExprKind::Index {
                    base: Box::new(base),
                    index: Box::new(lower_expr(expression)),
                },
            },
            _ => base,
        },
        _ => base,
    }
}

fn lower_call_args(args: &fm::FunctionArgs) -> Vec<Expr> {
    match args {
        fm::FunctionArgs::Parentheses { arguments, .. } => {
            arguments.iter().map(lower_expr).collect()
        }
        fm::FunctionArgs::String(token) => vec![Expr {
            span: token_span(token),
            kind: ExprKind::Str(string_literal_text(token)),
        }],
        fm::FunctionArgs::TableConstructor(table) => vec![lower_table(table)],
        _ => vec![],
    }
}

fn lower_table(table: &fm::TableConstructor) -> Expr {
    let mut fields = Vec::new();
    for field in table.fields() {
        match field {
            fm::Field::NameKey { key, value, .. } => fields.push(TableField::Named {
                name: token_text(key),
                name_span: token_span(key),
                value: lower_expr(value),
            }),
            fm::Field::ExpressionKey { key, value, .. } => fields.push(TableField::Keyed {
                key: lower_expr(key),
                value: lower_expr(value),
            }),
            fm::Field::NoKey(expr) => fields.push(TableField::Item(lower_expr(expr))),
            _ => {}
        }
    }
    Expr {
        span: node_span(table),
        kind: ExprKind::Table(fields),
    }
}

fn lower_func_body(body: &fm::FunctionBody) -> FuncBody {
    let mut params = Vec::new();
    let mut is_vararg = false;
    for parameter in body.parameters() {
        match parameter {
            fm::Parameter::Name(token) => params.push(name_of(token)),
            fm::Parameter::Ellipsis(_) => is_vararg = true,
            _ => {}
        }
    }
    FuncBody {
        span: node_span(body),
        params,
        is_vararg,
        body: lower_block(body.block()),
    }
}

fn lower_expr(expr: &fm::Expression) -> Expr {
    let span = node_span(expr);
    let kind = match expr {
        fm::Expression::BinaryOperator { lhs, binop, rhs } => {
            let lhs = lower_expr(lhs.borrow());
            let rhs = lower_expr(rhs.borrow());
            match lower_binop(binop) {
                Some(op) => ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                None => ExprKind::Paren(Box::new(lhs)),
            }
        }
        fm::Expression::Parentheses { expression, .. } => {
            ExprKind::Paren(Box::new(lower_expr(expression.borrow())))
        }
        fm::Expression::UnaryOperator { unop, expression } => {
            let inner = lower_expr(expression.borrow());
            match lower_unop(unop) {
                Some(op) => ExprKind::Unary {
                    op,
                    expr: Box::new(inner),
                },
                None => ExprKind::Paren(Box::new(inner)),
            }
        }
        fm::Expression::Function(func) => ExprKind::Function(lower_func_body(&func.1)),
        fm::Expression::FunctionCall(call) => lower_function_call(call).kind,
        fm::Expression::TableConstructor(table) => lower_table(table).kind,
        fm::Expression::Number(token) => {
            let (value, is_integer) = parse_number(token_text(token).trim());
            ExprKind::Number { value, is_integer }
        }
        fm::Expression::String(token) => ExprKind::Str(string_literal_text(token)),
        fm::Expression::Symbol(token) => match token_text(token).trim() {
            "true" => ExprKind::True,
            "false" => ExprKind::False,
            "..." => ExprKind::Vararg,
            _ => ExprKind::Nil,
        },
        fm::Expression::Var(var) => lower_var(var).kind,
        _ => ExprKind::Nil,
    };
    Expr { span, kind }
}

fn lower_binop(op: &fm::BinOp) -> Option<BinOp> {
    let text = op.to_string();
    Some(match text.trim() {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "//" => BinOp::FloorDiv,
        "%" => BinOp::Mod,
        "^" => BinOp::Pow,
        ".." => BinOp::Concat,
        "==" => BinOp::Eq,
        "~=" => BinOp::Ne,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        "~" => BinOp::BitXor,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        _ => return None,
    })
}

fn lower_unop(op: &fm::UnOp) -> Option<UnOp> {
    let text = op.to_string();
    Some(match text.trim() {
        "not" => UnOp::Not,
        "-" => UnOp::Neg,
        "#" => UnOp::Len,
        "~" => UnOp::BitNot,
        _ => return None,
    })
}

fn string_literal_text(token: &TokenReference) -> String {
    if let TokenType::StringLiteral { literal, .. } = token.token().token_type() {
        return literal.to_string();
    }
    // Fallback: strip matching quotes from the raw token text.
    let raw = token_text(token);
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0]
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_number(text: &str) -> (f64, bool) {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        if let Ok(value) = u64::from_str_radix(hex, 16) {
            return (value as f64, true);
        }
        return (0.0, true);
    }
    let is_integer = !lower.contains('.') && !lower.contains('e');
    let value = lower.parse::<f64>().unwrap_or(0.0);
    (value, is_integer)
}
