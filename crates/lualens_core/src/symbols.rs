//! Hierarchical scopes and symbols.
//!
//! Scopes form a tree stored in an arena; symbols point at their scope
//! by index, never by reference. Lookups are position-aware: within a
//! scope a symbol is visible only after its declaration offset, except
//! function declarations, which are hoisted across their enclosing
//! scope.

use std::collections::HashMap;

use crate::syntax::Span;
use crate::types::Ty;

pub type ScopeId = usize;
pub type SymbolId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Function,
    Method,
    For,
    ForIn,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Local,
    Parameter,
    LoopVariable,
    Global,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Ty,
    pub span: Span,
    pub offset: usize,
    pub scope: ScopeId,
    pub documentation: Option<String>,
    /// Offsets of every reference recorded during analysis.
    pub references: Vec<usize>,
    /// Visible across the whole enclosing scope (function declarations).
    pub hoisted: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub span: Span,
    pub parent: Option<ScopeId>,
    symbols: HashMap<String, SymbolId>,
}

/// The global scope is always id 0 and spans the whole document.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current: ScopeId,
}

pub const GLOBAL_SCOPE: ScopeId = 0;

impl SymbolTable {
    pub fn new(document_span: Span) -> Self {
        SymbolTable {
            scopes: vec![Scope {
                id: GLOBAL_SCOPE,
                kind: ScopeKind::Block,
                span: document_span,
                parent: None,
                symbols: HashMap::new(),
            }],
            symbols: Vec::new(),
            current: GLOBAL_SCOPE,
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn enter_scope(&mut self, kind: ScopeKind, span: Span) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            id,
            kind,
            span,
            parent: Some(self.current),
            symbols: HashMap::new(),
        });
        self.current = id;
        id
    }

    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    pub fn declare(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: Ty,
        span: Span,
        offset: usize,
    ) -> SymbolId {
        self.declare_in(self.current, name, kind, ty, span, offset, false)
    }

    /// Declare a symbol that is visible across its whole scope.
    pub fn declare_hoisted(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: Ty,
        span: Span,
        offset: usize,
    ) -> SymbolId {
        self.declare_in(self.current, name, kind, ty, span, offset, true)
    }

    /// Declare into the global scope regardless of the current scope.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: Ty,
        span: Span,
        offset: usize,
    ) -> SymbolId {
        self.declare_in(GLOBAL_SCOPE, name, SymbolKind::Global, ty, span, offset, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_in(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: Ty,
        span: Span,
        offset: usize,
        hoisted: bool,
    ) -> SymbolId {
        let name = name.into();
        let id = self.symbols.len();
        self.symbols.push(Symbol {
            id,
            name: name.clone(),
            kind,
            ty,
            span,
            offset,
            scope,
            documentation: None,
            references: Vec::new(),
            hoisted,
        });
        self.scopes[scope].symbols.insert(name, id);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn add_reference(&mut self, id: SymbolId, offset: usize) {
        self.symbols[id].references.push(offset);
    }

    /// Resolve `name` as seen from `offset` (when given) or from the
    /// current scope. The deepest scope containing the offset is
    /// searched first, walking outward; the global scope comes last.
    pub fn lookup(&self, name: &str, offset: Option<usize>) -> Option<&Symbol> {
        let start = match offset {
            Some(o) => self.scope_at(o),
            None => self.current,
        };
        let mut scope = Some(start);
        while let Some(id) = scope {
            if let Some(&symbol_id) = self.scopes[id].symbols.get(name) {
                let symbol = &self.symbols[symbol_id];
                let visible = match offset {
                    Some(o) => {
                        symbol.hoisted || symbol.kind == SymbolKind::Global || symbol.offset <= o
                    }
                    None => true,
                };
                if visible {
                    return Some(symbol);
                }
            }
            scope = self.scopes[id].parent;
        }
        None
    }

    /// The deepest scope whose span contains `offset`.
    pub fn scope_at(&self, offset: usize) -> ScopeId {
        let mut best = GLOBAL_SCOPE;
        let mut best_len = usize::MAX;
        for scope in &self.scopes {
            if scope.id == GLOBAL_SCOPE {
                continue;
            }
            if scope.span.contains(offset) && scope.span.len() < best_len {
                best = scope.id;
                best_len = scope.span.len();
            }
        }
        best
    }

    /// A same-named non-global symbol in an enclosing scope, for
    /// shadowing warnings.
    pub fn find_shadowed(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(&symbol_id) = self.scopes[id].symbols.get(name) {
                let symbol = &self.symbols[symbol_id];
                if symbol.kind != SymbolKind::Global {
                    return Some(symbol);
                }
            }
            scope = self.scopes[id].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::new(Span::new(0, 100))
    }

    #[test]
    fn declaration_visible_only_after_offset() {
        let mut t = table();
        t.declare("x", SymbolKind::Local, Ty::Number, Span::new(10, 11), 10);
        assert!(t.lookup("x", Some(5)).is_none(), "before declaration");
        assert!(t.lookup("x", Some(10)).is_some(), "at declaration");
        assert!(t.lookup("x", Some(50)).is_some(), "after declaration");
    }

    #[test]
    fn hoisted_symbols_ignore_position() {
        let mut t = table();
        t.declare_hoisted("f", SymbolKind::Local, Ty::Function, Span::new(40, 41), 40);
        assert!(t.lookup("f", Some(5)).is_some(), "functions hoist");
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut t = table();
        t.declare("x", SymbolKind::Local, Ty::Number, Span::new(0, 1), 0);
        t.enter_scope(ScopeKind::Function, Span::new(20, 60));
        let inner = t.declare("x", SymbolKind::Local, Ty::String, Span::new(25, 26), 25);
        let found = t.lookup("x", Some(30)).expect("inner x");
        assert_eq!(found.id, inner);
        assert_eq!(found.ty, Ty::String);
        // Outside the inner scope, the outer declaration wins.
        let outer = t.lookup("x", Some(5)).expect("outer x");
        assert_eq!(outer.ty, Ty::Number);
    }

    #[test]
    fn lookup_walks_outward_from_deepest_scope() {
        let mut t = table();
        t.declare("y", SymbolKind::Local, Ty::Boolean, Span::new(0, 1), 0);
        t.enter_scope(ScopeKind::For, Span::new(10, 90));
        t.enter_scope(ScopeKind::Function, Span::new(20, 80));
        assert!(t.lookup("y", Some(50)).is_some(), "outer symbol reachable");
    }

    #[test]
    fn globals_visible_everywhere() {
        let mut t = table();
        t.add_global("flag", Ty::Boolean, Span::new(80, 84), 80);
        assert!(t.lookup("flag", Some(0)).is_some());
    }

    #[test]
    fn references_accumulate() {
        let mut t = table();
        let id = t.declare("x", SymbolKind::Local, Ty::Number, Span::new(0, 1), 0);
        t.add_reference(id, 12);
        t.add_reference(id, 30);
        assert_eq!(t.symbol(id).references, vec![12, 30]);
    }

    #[test]
    fn find_shadowed_sees_enclosing_locals_only() {
        let mut t = table();
        t.add_global("g", Ty::Unknown, Span::new(0, 1), 0);
        t.enter_scope(ScopeKind::Function, Span::new(10, 90));
        t.declare("v", SymbolKind::Parameter, Ty::Unknown, Span::new(12, 13), 12);
        t.enter_scope(ScopeKind::For, Span::new(20, 80));
        assert!(t.find_shadowed("v").is_some(), "parameter shadowed");
        assert!(t.find_shadowed("g").is_none(), "globals are not reported");
    }

    #[test]
    fn scope_at_picks_deepest() {
        let mut t = table();
        t.enter_scope(ScopeKind::Function, Span::new(10, 90));
        let inner = t.enter_scope(ScopeKind::For, Span::new(30, 50));
        assert_eq!(t.scope_at(40), inner);
        assert_eq!(t.scope_at(95), GLOBAL_SCOPE);
    }
}
