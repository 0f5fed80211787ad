//! Span-carrying Lua syntax tree consumed by the analyzer.
//!
//! The grammar itself is handled by the external parser; [`lower`]
//! converts its tree into the node model defined in [`ast`]. Everything
//! downstream of this module identifies a node by the start offset of
//! its span and never touches the parser's types.

pub mod ast;
pub mod lower;

pub use ast::{
    BinOp, Block, Expr, ExprKind, FuncBody, IfClause, Name, Span, Stat, StatKind, TableField,
    UnOp,
};
pub use lower::{parse_chunk, ParseFailure};
