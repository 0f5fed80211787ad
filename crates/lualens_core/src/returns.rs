//! Standalone return-shape extraction.
//!
//! Parses a script on its own and infers the shape of its `return
//! { ... }` value from literal constructors. Used to type the outputs
//! prior-layer scripts feed into `context.prev`.

use crate::syntax::{parse_chunk, Block, Expr, ExprKind, StatKind, TableField};
use crate::types::{FieldTy, TableTy, Ty};

/// The type of the script's result: the first argument of its last
/// `return` statement. No return statement (or a bare `return`) yields
/// nil; a parse error yields unknown, silently.
pub fn extract_return_type(source: &str) -> Ty {
    let Ok(block) = parse_chunk(source) else {
        return Ty::Unknown;
    };
    let mut returns = Vec::new();
    collect_returns(&block, &mut returns);
    match returns.last() {
        None => Ty::Nil,
        Some(exprs) if exprs.is_empty() => Ty::Nil,
        Some(exprs) => shape_of(&exprs[0]),
    }
}

/// The `data` field of the script's result shape, if present.
pub fn extract_return_data_type(source: &str) -> Ty {
    match extract_return_type(source) {
        Ty::Table(table) => table
            .field("data")
            .map(|f| f.ty.clone())
            .unwrap_or(Ty::Unknown),
        _ => Ty::Unknown,
    }
}

/// Collect every `return` in the top-level block, including those
/// nested in clauses and loop bodies. Function bodies are skipped:
/// their returns are not the script's result.
fn collect_returns<'a>(block: &'a Block, out: &mut Vec<&'a [Expr]>) {
    for stat in &block.stats {
        match &stat.kind {
            StatKind::Return { exprs } => out.push(exprs),
            StatKind::Do(body) => collect_returns(body, out),
            StatKind::While { body, .. } => collect_returns(body, out),
            StatKind::Repeat { body, .. } => collect_returns(body, out),
            StatKind::If { clauses, else_body } => {
                for clause in clauses {
                    collect_returns(&clause.body, out);
                }
                if let Some(body) = else_body {
                    collect_returns(body, out);
                }
            }
            StatKind::NumericFor { body, .. } => collect_returns(body, out),
            StatKind::GenericFor { body, .. } => collect_returns(body, out),
            _ => {}
        }
    }
}

/// Literal constructor shapes only; anything computed is unknown.
fn shape_of(expr: &Expr) -> Ty {
    match &expr.kind {
        ExprKind::Nil => Ty::Nil,
        ExprKind::True => Ty::BooleanLit(true),
        ExprKind::False => Ty::BooleanLit(false),
        ExprKind::Number { value, .. } => Ty::NumberLit(*value),
        ExprKind::Str(value) => Ty::StringLit(value.clone()),
        ExprKind::Paren(inner) => shape_of(inner),
        ExprKind::Table(fields) => {
            if fields.is_empty() {
                return Ty::Table(TableTy::default());
            }
            if fields.iter().all(|f| matches!(f, TableField::Item(_))) {
                let mut element_tys = Vec::new();
                for field in fields {
                    if let TableField::Item(value) = field {
                        element_tys.push(shape_of(value));
                    }
                }
                return Ty::Array(Box::new(Ty::union(element_tys)));
            }
            let mut table = TableTy::default();
            for field in fields {
                if let TableField::Named { name, value, .. } = field {
                    table
                        .fields
                        .push(FieldTy::required(name.clone(), shape_of(value)));
                }
            }
            Ty::Table(table)
        }
        _ => Ty::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_return_shape() {
        let ty = extract_return_type("return { allowed = true, data = { userId = \"u1\" } }");
        let Ty::Table(table) = ty else {
            panic!("expected table shape");
        };
        assert_eq!(table.fields[0].name, "allowed");
        assert_eq!(table.fields[0].ty, Ty::BooleanLit(true));
        let Ty::Table(data) = &table.field("data").unwrap().ty else {
            panic!("expected nested table");
        };
        assert_eq!(data.fields[0].name, "userId");
        assert_eq!(data.fields[0].ty, Ty::StringLit("u1".to_string()));
    }

    #[test]
    fn data_sub_shape() {
        let ty = extract_return_data_type("return { allowed = true, data = { userId = \"u1\" } }");
        let Ty::Table(data) = ty else {
            panic!("expected table for data");
        };
        assert_eq!(data.fields.len(), 1);
        assert_eq!(data.fields[0].ty.widen(), Ty::String);
    }

    #[test]
    fn last_return_wins() {
        let source = "if x then return { a = 1 } end\nreturn { b = 2 }";
        let Ty::Table(table) = extract_return_type(source) else {
            panic!("expected table shape");
        };
        assert!(table.field("b").is_some());
        assert!(table.field("a").is_none());
    }

    #[test]
    fn nested_returns_are_collected() {
        let source = "if x then\n  if y then\n    return { a = 1 }\n  end\nend";
        let Ty::Table(table) = extract_return_type(source) else {
            panic!("expected table shape");
        };
        assert!(table.field("a").is_some());
    }

    #[test]
    fn function_body_returns_are_ignored() {
        let source = "local function f()\n  return { a = 1 }\nend\nreturn { b = 2 }";
        let Ty::Table(table) = extract_return_type(source) else {
            panic!("expected table shape");
        };
        assert!(table.field("a").is_none());
        assert!(table.field("b").is_some());
    }

    #[test]
    fn no_return_yields_nil() {
        assert_eq!(extract_return_type("local x = 1"), Ty::Nil);
        assert_eq!(extract_return_type("return"), Ty::Nil);
    }

    #[test]
    fn parse_error_yields_unknown() {
        assert_eq!(extract_return_type("return {"), Ty::Unknown);
        assert_eq!(extract_return_data_type("return {"), Ty::Unknown);
    }

    #[test]
    fn computed_values_are_unknown() {
        let Ty::Table(table) = extract_return_type("return { allowed = check() }") else {
            panic!("expected table shape");
        };
        assert_eq!(table.field("allowed").unwrap().ty, Ty::Unknown);
    }

    #[test]
    fn missing_data_field_is_unknown() {
        assert_eq!(
            extract_return_data_type("return { allowed = true }"),
            Ty::Unknown
        );
        assert_eq!(extract_return_data_type("return 42"), Ty::Unknown);
    }

    #[test]
    fn array_shape() {
        let ty = extract_return_type("return { 1, 2, 3 }");
        assert_eq!(ty, Ty::Array(Box::new(Ty::union([
            Ty::NumberLit(1.0),
            Ty::NumberLit(2.0),
            Ty::NumberLit(3.0),
        ]))));
    }
}
