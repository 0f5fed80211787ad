//! Control-flow graph for truthiness narrowing.
//!
//! Flow nodes live in an arena and form a DAG rooted at the start
//! node; antecedents are recorded as indices. The analyzer binds every
//! identifier reference to the flow reached just before its
//! evaluation, so later queries can ask whether any path to that point
//! has proved the identifier non-nil.
//!
//! Narrowing is advisory: loops and unhandled statement forms widen
//! back to the declared type.

use std::collections::HashMap;

use crate::syntax::{Expr, ExprKind, Span, UnOp};
use crate::types::Ty;

pub type FlowId = usize;

/// What a condition, when it holds, proves about an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowCondition {
    pub span: Span,
    /// The identifier the condition talks about, if it has that shape.
    pub subject: Option<String>,
    /// `true` when the condition proves the subject truthy (`x`,
    /// `x ~= nil`); `false` when its negation does (`not x`,
    /// `x == nil`).
    pub positive: bool,
}

impl FlowCondition {
    /// Extract the provable subject from a condition expression.
    pub fn from_expr(expr: &Expr) -> FlowCondition {
        let (subject, positive) = subject_of(expr);
        FlowCondition {
            span: expr.span,
            subject,
            positive,
        }
    }
}

fn subject_of(expr: &Expr) -> (Option<String>, bool) {
    match &expr.kind {
        ExprKind::Ident(name) => (Some(name.clone()), true),
        ExprKind::Paren(inner) => subject_of(inner),
        ExprKind::Unary {
            op: UnOp::Not,
            expr: inner,
        } => {
            let (subject, positive) = subject_of(inner);
            (subject, !positive)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            use crate::syntax::BinOp;
            let ident_and_nil = || match (&lhs.kind, &rhs.kind) {
                (ExprKind::Ident(name), ExprKind::Nil) => Some(name.clone()),
                (ExprKind::Nil, ExprKind::Ident(name)) => Some(name.clone()),
                _ => None,
            };
            match op {
                BinOp::Ne => (ident_and_nil(), true),
                BinOp::Eq => (ident_and_nil(), false),
                _ => (None, true),
            }
        }
        _ => (None, true),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowKind {
    Start,
    /// Join point after a branch; the new "current" flow.
    BranchLabel,
    TrueCondition(FlowCondition),
    FalseCondition(FlowCondition),
    Return,
    Unreachable,
    Join,
}

#[derive(Debug, Clone)]
pub struct FlowNode {
    pub kind: FlowKind,
    pub antecedents: Vec<FlowId>,
}

pub const FLOW_START: FlowId = 0;
pub const FLOW_UNREACHABLE: FlowId = 1;

/// Mutable builder used while the analyzer walks the tree.
#[derive(Debug)]
pub struct FlowBinder {
    nodes: Vec<FlowNode>,
    bindings: HashMap<usize, FlowId>,
}

impl Default for FlowBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBinder {
    pub fn new() -> Self {
        FlowBinder {
            nodes: vec![
                FlowNode {
                    kind: FlowKind::Start,
                    antecedents: vec![],
                },
                FlowNode {
                    kind: FlowKind::Unreachable,
                    antecedents: vec![],
                },
            ],
            bindings: HashMap::new(),
        }
    }

    pub fn start(&self) -> FlowId {
        FLOW_START
    }

    pub fn unreachable(&self) -> FlowId {
        FLOW_UNREACHABLE
    }

    fn push(&mut self, kind: FlowKind, antecedents: Vec<FlowId>) -> FlowId {
        let id = self.nodes.len();
        self.nodes.push(FlowNode { kind, antecedents });
        id
    }

    pub fn create_branch_label(&mut self) -> FlowId {
        self.push(FlowKind::BranchLabel, vec![])
    }

    pub fn create_join(&mut self) -> FlowId {
        self.push(FlowKind::Join, vec![])
    }

    pub fn create_true_condition(&mut self, expr: &Expr, antecedent: FlowId) -> FlowId {
        let condition = FlowCondition::from_expr(expr);
        self.push(FlowKind::TrueCondition(condition), vec![antecedent])
    }

    pub fn create_false_condition(&mut self, expr: &Expr, antecedent: FlowId) -> FlowId {
        let condition = FlowCondition::from_expr(expr);
        self.push(FlowKind::FalseCondition(condition), vec![antecedent])
    }

    pub fn create_return(&mut self, antecedent: FlowId) -> FlowId {
        self.push(FlowKind::Return, vec![antecedent])
    }

    pub fn add_antecedent(&mut self, to: FlowId, from: FlowId) {
        if from == FLOW_UNREACHABLE {
            return;
        }
        if !self.nodes[to].antecedents.contains(&from) {
            self.nodes[to].antecedents.push(from);
        }
    }

    /// Pin an identifier reference at `offset` to the flow reached just
    /// before its evaluation.
    pub fn bind_offset(&mut self, offset: usize, flow: FlowId) {
        self.bindings.insert(offset, flow);
    }

    pub fn is_unreachable(&self, flow: FlowId) -> bool {
        flow == FLOW_UNREACHABLE
            || (matches!(self.nodes[flow].kind, FlowKind::BranchLabel | FlowKind::Join)
                && self.nodes[flow].antecedents.is_empty())
    }

    /// Whether any path from `flow` back to the start has proved
    /// `name` non-nil.
    pub fn proves_non_nil(&self, name: &str, flow: FlowId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![flow];
        while let Some(id) = stack.pop() {
            if id >= self.nodes.len() || visited[id] {
                continue;
            }
            visited[id] = true;
            let node = &self.nodes[id];
            match &node.kind {
                FlowKind::TrueCondition(cond)
                    if cond.positive && cond.subject.as_deref() == Some(name) =>
                {
                    return true;
                }
                FlowKind::FalseCondition(cond)
                    if !cond.positive && cond.subject.as_deref() == Some(name) =>
                {
                    return true;
                }
                _ => {}
            }
            stack.extend(node.antecedents.iter().copied());
        }
        false
    }

    pub fn finish(self) -> FlowTree {
        FlowTree {
            nodes: self.nodes,
            bindings: self.bindings,
        }
    }
}

/// Immutable snapshot produced by [`FlowBinder::finish`].
#[derive(Debug)]
pub struct FlowTree {
    nodes: Vec<FlowNode>,
    bindings: HashMap<usize, FlowId>,
}

impl FlowTree {
    pub fn node(&self, id: FlowId) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn binding_at(&self, offset: usize) -> Option<FlowId> {
        self.bindings.get(&offset).copied()
    }

    pub fn is_unreachable(&self, flow: FlowId) -> bool {
        flow == FLOW_UNREACHABLE
    }

    pub fn proves_non_nil(&self, name: &str, flow: FlowId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![flow];
        while let Some(id) = stack.pop() {
            if id >= self.nodes.len() || visited[id] {
                continue;
            }
            visited[id] = true;
            let node = &self.nodes[id];
            match &node.kind {
                FlowKind::TrueCondition(cond)
                    if cond.positive && cond.subject.as_deref() == Some(name) =>
                {
                    return true;
                }
                FlowKind::FalseCondition(cond)
                    if !cond.positive && cond.subject.as_deref() == Some(name) =>
                {
                    return true;
                }
                _ => {}
            }
            stack.extend(node.antecedents.iter().copied());
        }
        false
    }

    /// The narrowed type of `name` at a bound offset: strips nil when
    /// some path has proved the identifier, otherwise returns the
    /// declared type unchanged.
    pub fn narrow(&self, name: &str, offset: usize, declared: &Ty) -> Ty {
        if !declared.may_be_nil() {
            return declared.clone();
        }
        match self.binding_at(offset) {
            Some(flow) if self.proves_non_nil(name, flow) => declared.without_nil(),
            _ => declared.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> Expr {
        Expr {
            span: Span::new(start, start + name.len()),
            kind: ExprKind::Ident(name.to_string()),
        }
    }

    #[test]
    fn condition_subject_from_identifier() {
        let cond = FlowCondition::from_expr(&ident("u", 3));
        assert_eq!(cond.subject.as_deref(), Some("u"));
        assert!(cond.positive);
    }

    #[test]
    fn condition_subject_from_not() {
        let expr = Expr {
            span: Span::new(0, 5),
            kind: ExprKind::Unary {
                op: UnOp::Not,
                expr: Box::new(ident("u", 4)),
            },
        };
        let cond = FlowCondition::from_expr(&expr);
        assert_eq!(cond.subject.as_deref(), Some("u"));
        assert!(!cond.positive);
    }

    #[test]
    fn condition_subject_from_nil_comparison() {
        use crate::syntax::BinOp;
        let ne_nil = Expr {
            span: Span::new(0, 9),
            kind: ExprKind::Binary {
                op: BinOp::Ne,
                lhs: Box::new(ident("u", 0)),
                rhs: Box::new(Expr {
                    span: Span::new(6, 9),
                    kind: ExprKind::Nil,
                }),
            },
        };
        let cond = FlowCondition::from_expr(&ne_nil);
        assert_eq!(cond.subject.as_deref(), Some("u"));
        assert!(cond.positive);
    }

    #[test]
    fn true_condition_proves_subject() {
        let mut binder = FlowBinder::new();
        let cond = binder.create_true_condition(&ident("u", 0), FLOW_START);
        assert!(binder.proves_non_nil("u", cond));
        assert!(!binder.proves_non_nil("v", cond));
        assert!(!binder.proves_non_nil("u", FLOW_START));
    }

    #[test]
    fn proof_traverses_antecedent_chain() {
        let mut binder = FlowBinder::new();
        let cond = binder.create_true_condition(&ident("u", 0), FLOW_START);
        let label = binder.create_branch_label();
        binder.add_antecedent(label, cond);
        assert!(binder.proves_non_nil("u", label));
    }

    #[test]
    fn unreachable_antecedents_are_dropped() {
        let mut binder = FlowBinder::new();
        let label = binder.create_branch_label();
        binder.add_antecedent(label, FLOW_UNREACHABLE);
        assert!(binder.is_unreachable(label), "label with no live antecedents");
    }

    #[test]
    fn narrow_strips_nil_when_proved() {
        let mut binder = FlowBinder::new();
        let cond = binder.create_true_condition(&ident("u", 10), FLOW_START);
        binder.bind_offset(42, cond);
        let tree = binder.finish();
        let declared = Ty::union([Ty::Ref("User".into()), Ty::Nil]);
        assert_eq!(tree.narrow("u", 42, &declared), Ty::Ref("User".into()));
        // Unbound offsets keep the declared type.
        assert_eq!(tree.narrow("u", 99, &declared), declared);
    }

    #[test]
    fn narrow_keeps_non_nilable_types() {
        let tree = FlowBinder::new().finish();
        assert_eq!(tree.narrow("x", 0, &Ty::Number), Ty::Number);
    }
}
