//! Merging prior-layer script outputs into the `context.prev` type.
//!
//! Scripts in one layer run in parallel and cannot observe each other,
//! so the next layer sees a dictionary where any field may or may not
//! have been set. Field types are conservative: when two scripts
//! disagree on a field's kind it widens to `any`.

use std::collections::BTreeMap;

use crate::returns::extract_return_data_type;
use crate::types::{FieldTy, TableTy, Ty};

/// Compute the type of `context.prev` from the raw sources of every
/// script in the immediately previous layer. The result is independent
/// of script order.
pub fn merge_previous_outputs(sources: &[String]) -> TableTy {
    let mut merged = TableTy::default()
        .with_field(FieldTy::required("allowed", Ty::Boolean))
        .with_field(FieldTy::optional("error", Ty::String));

    let mut data_fields: BTreeMap<String, Ty> = BTreeMap::new();
    for source in sources {
        let Ty::Table(data) = extract_return_data_type(source) else {
            continue;
        };
        for field in data.fields {
            let widened = field.ty.widen();
            match data_fields.get_mut(&field.name) {
                Some(existing) => {
                    if *existing != widened {
                        *existing = Ty::Any;
                    }
                }
                None => {
                    data_fields.insert(field.name, widened);
                }
            }
        }
    }

    if !data_fields.is_empty() {
        let mut data = TableTy::default();
        for (name, ty) in data_fields {
            data.fields.push(FieldTy::optional(name, ty));
        }
        merged
            .fields
            .push(FieldTy::optional("data", Ty::Table(data)));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn base_fields_always_present() {
        let merged = merge_previous_outputs(&[]);
        let allowed = merged.field("allowed").expect("allowed");
        assert_eq!(allowed.ty, Ty::Boolean);
        assert!(!allowed.optional);
        let error = merged.field("error").expect("error");
        assert_eq!(error.ty, Ty::String);
        assert!(error.optional);
        assert!(merged.field("data").is_none(), "no data without observations");
    }

    #[test]
    fn merged_fields_are_optional_and_widened() {
        let merged = merge_previous_outputs(&sources(&[
            "return { data = { userId = \"u1\" } }",
        ]));
        let Ty::Table(data) = &merged.field("data").unwrap().ty else {
            panic!("expected data table");
        };
        let user_id = data.field("userId").expect("userId");
        assert!(user_id.optional, "parallel scripts may not have run");
        assert_eq!(user_id.ty, Ty::String, "literal shape widened");
    }

    #[test]
    fn disagreeing_kinds_widen_to_any() {
        let merged = merge_previous_outputs(&sources(&[
            "return { data = { a = 1 } }",
            "return { data = { a = \"x\", b = true } }",
        ]));
        let Ty::Table(data) = &merged.field("data").unwrap().ty else {
            panic!("expected data table");
        };
        assert_eq!(data.field("a").unwrap().ty, Ty::Any);
        assert_eq!(data.field("b").unwrap().ty, Ty::Boolean);
        assert!(data.field("b").unwrap().optional);
    }

    #[test]
    fn merge_is_commutative() {
        let forward = merge_previous_outputs(&sources(&[
            "return { data = { a = 1 } }",
            "return { data = { a = \"x\", b = true } }",
            "return { data = { c = 2 } }",
        ]));
        let backward = merge_previous_outputs(&sources(&[
            "return { data = { c = 2 } }",
            "return { data = { a = \"x\", b = true } }",
            "return { data = { a = 1 } }",
        ]));
        assert_eq!(forward, backward);
    }

    #[test]
    fn agreeing_kinds_keep_their_type() {
        let merged = merge_previous_outputs(&sources(&[
            "return { data = { n = 1 } }",
            "return { data = { n = 2 } }",
        ]));
        let Ty::Table(data) = &merged.field("data").unwrap().ty else {
            panic!("expected data table");
        };
        assert_eq!(data.field("n").unwrap().ty, Ty::Number);
    }

    #[test]
    fn scripts_without_data_are_skipped() {
        let merged = merge_previous_outputs(&sources(&[
            "return { allowed = true }",
            "syntactically broken (",
            "return { data = { ok = true } }",
        ]));
        let Ty::Table(data) = &merged.field("data").unwrap().ty else {
            panic!("expected data table");
        };
        assert_eq!(data.fields.len(), 1);
        assert_eq!(data.field("ok").unwrap().ty, Ty::Boolean);
    }
}
