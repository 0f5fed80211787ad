//! Node model for analyzed Lua chunks.

use std::fmt;

/// Half-open byte range `[start, end)` into the UTF-8 source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An identifier together with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub name: String,
    pub span: Span,
}

/// A sequence of statements. The chunk root and every body is a `Block`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub span: Span,
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub span: Span,
    pub kind: StatKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatKind {
    /// `local a, b = e1, e2`
    Local { names: Vec<Name>, exprs: Vec<Expr> },
    /// `a, b.c = e1, e2`
    Assign { targets: Vec<Expr>, exprs: Vec<Expr> },
    /// A call (or method call) in statement position.
    Call(Expr),
    Do(Block),
    While { cond: Expr, body: Block },
    /// Body runs before the condition is first evaluated.
    Repeat { body: Block, cond: Expr },
    If {
        clauses: Vec<IfClause>,
        else_body: Option<Block>,
    },
    NumericFor {
        var: Name,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Block,
    },
    GenericFor {
        names: Vec<Name>,
        exprs: Vec<Expr>,
        body: Block,
    },
    /// `function a.b.c()` / `function a:m()`. A bare `function f()` has a
    /// single-segment path.
    Function {
        path: Vec<Name>,
        is_method: bool,
        body: FuncBody,
    },
    LocalFunction { name: Name, body: FuncBody },
    Return { exprs: Vec<Expr> },
    Break,
}

/// One `if`/`elseif` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub span: Span,
    pub params: Vec<Name>,
    pub is_vararg: bool,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,
    True,
    False,
    Vararg,
    Number { value: f64, is_integer: bool },
    Str(String),
    Ident(String),
    /// `base.name` (also produced for `base:name` outside call position).
    Member {
        base: Box<Expr>,
        name: String,
        name_span: Span,
    },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `base(args...)`, including `base "s"` and `base { ... }` sugar.
    Call { base: Box<Expr>, args: Vec<Expr> },
    /// `base:name(args...)`
    MethodCall {
        base: Box<Expr>,
        name: String,
        name_span: Span,
        args: Vec<Expr>,
    },
    Function(FuncBody),
    Table(Vec<TableField>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnOp, expr: Box<Expr> },
    Paren(Box<Expr>),
}

impl Expr {
    /// The identifier name if this expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Flatten `a.b.c` into `["a", "b", "c"]`; `None` when any link is
    /// not a plain member access on an identifier root.
    pub fn member_path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Ident(name) => Some(vec![name.as_str()]),
            ExprKind::Member { base, name, .. } => {
                let mut path = base.member_path()?;
                path.push(name.as_str());
                Some(path)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// `name = value`
    Named {
        name: String,
        name_span: Span,
        value: Expr,
    },
    /// `[key] = value`
    Keyed { key: Expr, value: Expr },
    /// Positional entry.
    Item(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    Len,
    BitNot,
}
