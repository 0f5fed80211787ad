//! Parameter hints for calls.
//!
//! The enclosing call is found by scanning backwards for the open
//! parenthesis that contains the cursor; the active parameter is the
//! number of top-level commas before the cursor.

use tower_lsp::lsp_types::{
    Documentation, ParameterInformation, ParameterLabel, Position, SignatureHelp,
    SignatureInformation,
};

use lualens_core::definitions::{Definitions, MemberDef, ParamDef};
use lualens_core::types::{format_ty, Ty};

use crate::document::DocumentState;

pub fn signature_help(doc: &DocumentState, position: Position) -> Option<SignatureHelp> {
    let offset = doc.offset_of(position);
    let text = doc.document.text();
    let (open_paren, active_parameter) = enclosing_call(text, offset)?;

    // The callee's dotted path ends just before the parenthesis.
    let callee_position = doc.lsp_position(open_paren.saturating_sub(1));
    let (path, _) = doc.member_path_at(callee_position)?;
    let path_refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();

    let defs = Definitions::global();
    let signature = if path.len() == 1 {
        // `await(...)` and other callable sandbox items first, then
        // globals, then script functions.
        if let Some(item) = defs.sandbox_item(&path[0]) {
            signature_from_parts(
                item.signature.as_deref(),
                &path[0],
                item.parameters.as_deref(),
                item.description.as_deref(),
            )
        } else if let Some(def) = defs.global_def(&path[0]) {
            signature_from_def(&path[0], def)
        } else {
            local_function_signature(doc, &path[0])
        }
    } else {
        defs.resolve_member_path(&path_refs)
            .and_then(|def| signature_from_def(&path.join("."), def))
    }?;

    Some(SignatureHelp {
        active_signature: Some(0),
        active_parameter: Some(active_parameter),
        signatures: vec![SignatureInformation {
            active_parameter: Some(active_parameter),
            ..signature
        }],
    })
}

/// Find the unmatched `(` containing `offset` and count the commas
/// between it and the cursor at nesting depth zero.
fn enclosing_call(text: &str, offset: usize) -> Option<(usize, u32)> {
    let bytes = text.as_bytes();
    let mut cursor = offset.min(bytes.len());
    let mut depth = 0usize;
    let mut commas = 0u32;
    while cursor > 0 {
        cursor -= 1;
        match bytes[cursor] {
            b')' | b']' | b'}' => depth += 1,
            b'(' if depth == 0 => return Some((cursor, commas)),
            b'(' | b'[' | b'{' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => commas += 1,
            b';' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

fn signature_from_def(label: &str, def: &MemberDef) -> Option<SignatureInformation> {
    if def.type_name.as_deref() != Some("function") && def.parameters.is_none() {
        return None;
    }
    signature_from_parts(
        def.signature.as_deref(),
        label,
        def.parameters.as_deref(),
        def.description.as_deref(),
    )
}

fn signature_from_parts(
    signature: Option<&str>,
    label: &str,
    parameters: Option<&[ParamDef]>,
    description: Option<&str>,
) -> Option<SignatureInformation> {
    let rendered = signature.map(|s| s.to_string()).unwrap_or_else(|| {
        let params: Vec<&str> = parameters
            .unwrap_or_default()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        format!("{}({})", label, params.join(", "))
    });
    let parameter_infos: Vec<ParameterInformation> = parameters
        .unwrap_or_default()
        .iter()
        .map(|p| ParameterInformation {
            label: ParameterLabel::Simple(p.name.clone()),
            documentation: Some(Documentation::String(format!(
                "{}: {}",
                p.name,
                p.type_name.as_deref().unwrap_or("any")
            ))),
        })
        .collect();
    Some(SignatureInformation {
        label: rendered,
        documentation: description.map(|d| Documentation::String(d.to_string())),
        parameters: if parameter_infos.is_empty() {
            None
        } else {
            Some(parameter_infos)
        },
        active_parameter: None,
    })
}

fn local_function_signature(doc: &DocumentState, name: &str) -> Option<SignatureInformation> {
    let symbol = doc.analysis.symbols.lookup(name, None)?;
    let Ty::Fn(function) = &symbol.ty else {
        return None;
    };
    let params: Vec<ParameterInformation> = function
        .params
        .iter()
        .map(|p| ParameterInformation {
            label: ParameterLabel::Simple(p.name.clone()),
            documentation: Some(Documentation::String(format!(
                "{}: {}",
                p.name,
                format_ty(&p.ty)
            ))),
        })
        .collect();
    let rendered = format!(
        "{}({})",
        name,
        function
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Some(SignatureInformation {
        label: rendered,
        documentation: None,
        parameters: if params.is_empty() { None } else { Some(params) },
        active_parameter: None,
    })
}
