//! The definition registry: globals, libraries, sandbox items, disabled
//! globals, named record types, and return shapes.
//!
//! Loaded once from two embedded JSON documents and never mutated.
//! Hook-specific variation is parameterized by the `hook_name` option
//! each analysis carries; the registry itself holds no hook state.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::types::{parse_type_string, FieldTy, FnTy, ParamTy, TableTy, Ty};

const BUILTINS_JSON: &str = include_str!("../defs/builtins.json");
const SANDBOX_JSON: &str = include_str!("../defs/sandbox.json");

/// A single named member: a field of a namespace or record type, a
/// library method, or a global.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MemberDef {
    pub kind: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub description: Option<String>,
    pub optional: bool,
    pub signature: Option<String>,
    pub parameters: Option<Vec<ParamDef>>,
    #[serde(rename = "returnType")]
    pub return_type: Option<String>,
    #[serde(rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub vararg: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDef {
    pub description: Option<String>,
    #[serde(default)]
    pub methods: BTreeMap<String, MemberDef>,
    #[serde(default)]
    pub fields: BTreeMap<String, MemberDef>,
}

#[derive(Debug, Deserialize)]
struct BuiltinsDoc {
    globals: BTreeMap<String, MemberDef>,
    libraries: BTreeMap<String, LibraryDef>,
    keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxItemDef {
    pub kind: String,
    #[serde(rename = "semanticType")]
    pub semantic_type: Option<String>,
    #[serde(rename = "isBuiltin", default)]
    pub is_builtin: bool,
    #[serde(rename = "isReadonly", default)]
    pub is_readonly: bool,
    #[serde(rename = "builtinUri")]
    pub builtin_uri: Option<String>,
    #[serde(rename = "hasHookVariants", default)]
    pub has_hook_variants: bool,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, MemberDef>,
    #[serde(rename = "hookVariants", default)]
    pub hook_variants: BTreeMap<String, HookVariantDef>,
    pub signature: Option<String>,
    pub parameters: Option<Vec<ParamDef>>,
    #[serde(rename = "returnType")]
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HookVariantDef {
    #[serde(default)]
    pub fields: BTreeMap<String, MemberDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedTypeDef {
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, MemberDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisabledDef {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnShapeDef {
    pub description: String,
    #[serde(rename = "requiredFields", default)]
    pub required_fields: Vec<String>,
    #[serde(rename = "optionalFields", default)]
    pub optional_fields: Vec<String>,
    pub example: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SandboxDoc {
    sandbox: BTreeMap<String, SandboxItemDef>,
    #[serde(rename = "disabledGlobals")]
    disabled_globals: BTreeMap<String, DisabledDef>,
    types: BTreeMap<String, NamedTypeDef>,
    #[serde(rename = "returnTypes", default)]
    return_types: BTreeMap<String, ReturnShapeDef>,
}

/// Answer to [`Definitions::sandbox_item_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxItemMetadata {
    pub kind: String,
    pub is_builtin: bool,
    pub is_readonly: bool,
    pub builtin_uri: Option<String>,
    pub has_hook_variants: bool,
}

pub struct Definitions {
    builtins: BuiltinsDoc,
    sandbox: SandboxDoc,
}

static GLOBAL: OnceLock<Definitions> = OnceLock::new();

impl Definitions {
    /// The process-wide registry, loaded from the embedded documents.
    pub fn global() -> &'static Definitions {
        GLOBAL.get_or_init(|| {
            Definitions::from_json(BUILTINS_JSON, SANDBOX_JSON)
                .expect("embedded definition documents are well-formed")
        })
    }

    pub fn from_json(builtins: &str, sandbox: &str) -> Result<Definitions, serde_json::Error> {
        Ok(Definitions {
            builtins: serde_json::from_str(builtins)?,
            sandbox: serde_json::from_str(sandbox)?,
        })
    }

    pub fn global_def(&self, name: &str) -> Option<&MemberDef> {
        self.builtins.globals.get(name)
    }

    pub fn global_names(&self) -> impl Iterator<Item = &String> {
        self.builtins.globals.keys()
    }

    pub fn library(&self, name: &str) -> Option<&LibraryDef> {
        self.builtins.libraries.get(name)
    }

    pub fn library_names(&self) -> impl Iterator<Item = &String> {
        self.builtins.libraries.keys()
    }

    pub fn library_method(&self, library: &str, method: &str) -> Option<&MemberDef> {
        let lib = self.library(library)?;
        lib.methods.get(method).or_else(|| lib.fields.get(method))
    }

    pub fn keywords(&self) -> &[String] {
        &self.builtins.keywords
    }

    pub fn sandbox_item(&self, name: &str) -> Option<&SandboxItemDef> {
        self.sandbox.sandbox.get(name)
    }

    pub fn sandbox_item_names(&self) -> impl Iterator<Item = &String> {
        self.sandbox.sandbox.keys()
    }

    pub fn sandbox_item_metadata(&self, name: &str) -> Option<SandboxItemMetadata> {
        let item = self.sandbox_item(name)?;
        Some(SandboxItemMetadata {
            kind: item.kind.clone(),
            is_builtin: item.is_builtin,
            is_readonly: item.is_readonly,
            builtin_uri: item.builtin_uri.clone(),
            has_hook_variants: item.has_hook_variants,
        })
    }

    pub fn helper(&self, name: &str) -> Option<&MemberDef> {
        self.sandbox_item("helpers")?.fields.get(name)
    }

    pub fn helper_names(&self) -> Vec<&String> {
        self.sandbox_item("helpers")
            .map(|item| item.fields.keys().collect())
            .unwrap_or_default()
    }

    /// The field map of `context` for the given hook: always-present
    /// base fields plus the matching hook variant's fields. With no
    /// hook, the union of all variants, so schemaless views stay
    /// useful.
    pub fn context_fields_for_hook(
        &self,
        hook_name: Option<&str>,
    ) -> BTreeMap<&String, &MemberDef> {
        let mut merged = BTreeMap::new();
        let Some(context) = self.sandbox_item("context") else {
            return merged;
        };
        for (name, def) in &context.fields {
            merged.insert(name, def);
        }
        match hook_name {
            Some(hook) => {
                if let Some(variant) = context.hook_variants.get(hook) {
                    for (name, def) in &variant.fields {
                        merged.insert(name, def);
                    }
                }
            }
            None => {
                for variant in context.hook_variants.values() {
                    for (name, def) in &variant.fields {
                        merged.entry(name).or_insert(def);
                    }
                }
            }
        }
        merged
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.sandbox.disabled_globals.contains_key(name)
    }

    pub fn disabled_message(&self, name: &str) -> Option<&str> {
        self.sandbox
            .disabled_globals
            .get(name)
            .map(|d| d.message.as_str())
    }

    pub fn named_type(&self, name: &str) -> Option<&NamedTypeDef> {
        self.sandbox.types.get(name)
    }

    pub fn type_fields(&self, name: &str) -> Option<&BTreeMap<String, MemberDef>> {
        self.named_type(name).map(|t| &t.fields)
    }

    pub fn return_shape(&self, mode: &str) -> Option<&ReturnShapeDef> {
        self.sandbox.return_types.get(mode)
    }

    /// Walk a dotted path (`["context", "user", "email"]`) through
    /// sandbox items, libraries, and globals to the terminal member.
    pub fn resolve_member_path(&self, path: &[&str]) -> Option<&MemberDef> {
        let (&root, rest) = path.split_first()?;
        if rest.is_empty() {
            return self.global_def(root);
        }
        let (&first, remainder) = rest.split_first()?;
        let mut current: &MemberDef = if let Some(item) = self.sandbox_item(root) {
            if item.fields.contains_key(first) {
                item.fields.get(first)?
            } else {
                // Hook-variant fields are reachable without a hook by
                // searching every variant.
                item.hook_variants
                    .values()
                    .find_map(|variant| variant.fields.get(first))?
            }
        } else if let Some(_lib) = self.library(root) {
            self.library_method(root, first)?
        } else {
            return None;
        };
        for &segment in remainder {
            current = self.member_fields(current)?.get(segment)?;
        }
        Some(current)
    }

    /// The nested field map a member leads to, when its declared type
    /// is a named record.
    fn member_fields(&self, def: &MemberDef) -> Option<&BTreeMap<String, MemberDef>> {
        let type_name = def.type_name.as_deref()?;
        match parse_type_string(type_name) {
            Ty::Ref(name) => self.type_fields(&name),
            Ty::Union(members) => members.iter().find_map(|member| match member {
                Ty::Ref(name) => self.type_fields(name),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Candidate members for autocomplete after `path.`.
    pub fn member_completions(
        &self,
        path: &[&str],
        hook_name: Option<&str>,
    ) -> Vec<(&String, &MemberDef)> {
        let Some((&root, rest)) = path.split_first() else {
            return vec![];
        };
        if rest.is_empty() {
            if root == "context" {
                return self
                    .context_fields_for_hook(hook_name)
                    .into_iter()
                    .collect();
            }
            if let Some(item) = self.sandbox_item(root) {
                return item.fields.iter().collect();
            }
            if let Some(lib) = self.library(root) {
                let mut members: Vec<_> = lib.methods.iter().collect();
                members.extend(lib.fields.iter());
                members.sort_by(|a, b| a.0.cmp(b.0));
                return members;
            }
            return vec![];
        }
        match self.resolve_member_path(path) {
            Some(def) => self
                .member_fields(def)
                .map(|fields| fields.iter().collect())
                .unwrap_or_default(),
            None => vec![],
        }
    }

    /// A go-to-definition target for a builtin name.
    pub fn builtin_uri_for(&self, name: &str) -> Option<String> {
        if let Some(item) = self.sandbox_item(name) {
            return item.builtin_uri.clone();
        }
        if self.global_def(name).is_some() || self.library(name).is_some() {
            return Some(format!("lualens://builtins/{}", name));
        }
        None
    }

    /// Convert a member definition to a lattice type.
    pub fn member_ty(&self, def: &MemberDef) -> Ty {
        if def.type_name.as_deref() == Some("function") || def.parameters.is_some() {
            return Ty::Fn(self.fn_ty(def.parameters.as_deref(), def.return_type.as_deref()));
        }
        match def.type_name.as_deref() {
            Some(type_name) => parse_type_string(type_name),
            None => Ty::Unknown,
        }
    }

    fn fn_ty(&self, parameters: Option<&[ParamDef]>, return_type: Option<&str>) -> FnTy {
        let params = parameters
            .unwrap_or_default()
            .iter()
            .map(|p| ParamTy {
                name: p.name.clone(),
                ty: p
                    .type_name
                    .as_deref()
                    .map(parse_type_string)
                    .unwrap_or(Ty::Unknown),
                vararg: p.vararg,
                optional: p.optional,
            })
            .collect();
        let returns = match return_type {
            Some(ret) => vec![parse_type_string(ret)],
            None => vec![Ty::Unknown],
        };
        FnTy { params, returns }
    }

    /// The lattice type of a sandbox item: namespaces become tables of
    /// their fields (`context` applies the hook variant), functions
    /// become function types.
    pub fn sandbox_item_ty(&self, name: &str, hook_name: Option<&str>) -> Option<Ty> {
        let item = self.sandbox_item(name)?;
        match item.kind.as_str() {
            "namespace" => {
                let mut table = TableTy::default();
                if name == "context" {
                    for (field_name, def) in self.context_fields_for_hook(hook_name) {
                        table.fields.push(self.field_ty(field_name, def));
                    }
                } else {
                    for (field_name, def) in &item.fields {
                        table.fields.push(self.field_ty(field_name, def));
                    }
                }
                Some(Ty::Table(table))
            }
            "function" => Some(Ty::Fn(
                self.fn_ty(item.parameters.as_deref(), item.return_type.as_deref()),
            )),
            _ => item
                .return_type
                .as_deref()
                .or(item.semantic_type.as_deref())
                .map(parse_type_string),
        }
    }

    fn field_ty(&self, name: &str, def: &MemberDef) -> FieldTy {
        FieldTy {
            name: name.to_string(),
            ty: self.member_ty(def),
            optional: def.optional,
            description: def.description.clone(),
        }
    }

    /// The lattice type of a named record type.
    pub fn named_type_ty(&self, name: &str) -> Option<Ty> {
        let def = self.named_type(name)?;
        let mut table = TableTy::default();
        for (field_name, member) in &def.fields {
            table.fields.push(self.field_ty(field_name, member));
        }
        Some(Ty::Table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> &'static Definitions {
        Definitions::global()
    }

    #[test]
    fn embedded_documents_load() {
        let d = defs();
        assert!(d.global_def("print").is_some());
        assert!(d.library("string").is_some());
        assert!(!d.keywords().is_empty());
        assert!(d.sandbox_item("helpers").is_some());
    }

    #[test]
    fn library_method_lookup() {
        let upper = defs().library_method("string", "upper").expect("string.upper");
        assert_eq!(upper.return_type.as_deref(), Some("string"));
        // Library constants resolve through the same query.
        assert!(defs().library_method("math", "pi").is_some());
        assert!(defs().library_method("string", "nope").is_none());
    }

    #[test]
    fn context_fields_respect_hook_variants() {
        let base: Vec<_> = defs()
            .context_fields_for_hook(Some("before_login"))
            .into_iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert!(base.contains(&"request".to_string()), "base field kept");
        assert!(base.contains(&"user".to_string()), "variant field added");
        assert!(
            !base.contains(&"session".to_string()),
            "other variants' fields excluded"
        );

        let all: Vec<_> = defs()
            .context_fields_for_hook(None)
            .into_iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert!(all.contains(&"session".to_string()), "no hook → union of variants");
    }

    #[test]
    fn disabled_globals_have_messages() {
        assert!(defs().is_disabled("io"));
        assert!(defs().disabled_message("io").unwrap().contains("io"));
        assert!(!defs().is_disabled("print"));
    }

    #[test]
    fn resolve_member_path_walks_types() {
        let email = defs()
            .resolve_member_path(&["context", "user", "email"])
            .expect("context.user.email resolves through the User type");
        assert_eq!(email.type_name.as_deref(), Some("string"));

        assert!(defs().resolve_member_path(&["context", "bogus"]).is_none());
        assert!(defs().resolve_member_path(&["string", "upper"]).is_some());
    }

    #[test]
    fn member_completions_for_namespaces() {
        let helpers: Vec<_> = defs()
            .member_completions(&["helpers"], None)
            .into_iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert!(helpers.contains(&"log".to_string()));
        assert!(helpers.contains(&"http_request".to_string()));

        let user_fields: Vec<_> = defs()
            .member_completions(&["context", "user"], Some("before_login"))
            .into_iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert!(user_fields.contains(&"email".to_string()));
    }

    #[test]
    fn helper_defs_become_function_types() {
        let log = defs().helper("log").expect("helpers.log");
        let ty = defs().member_ty(log);
        let Ty::Fn(function) = ty else {
            panic!("helpers.log should be a function type");
        };
        assert_eq!(function.params.len(), 2);
        assert_eq!(function.returns, vec![Ty::Void]);
    }

    #[test]
    fn async_marker_survives_loading() {
        assert!(defs().helper("http_request").unwrap().is_async);
        assert!(!defs().helper("log").unwrap().is_async);
    }

    #[test]
    fn sandbox_item_ty_applies_hook_variant() {
        let ty = defs()
            .sandbox_item_ty("context", Some("before_login"))
            .expect("context type");
        let Ty::Table(table) = ty else {
            panic!("context should be a table type");
        };
        let user = table.field("user").expect("variant field present");
        assert_eq!(
            user.ty,
            Ty::union([Ty::Ref("User".to_string()), Ty::Nil])
        );
    }

    #[test]
    fn builtin_uris() {
        assert_eq!(
            defs().builtin_uri_for("helpers").as_deref(),
            Some("lualens://builtins/helpers")
        );
        assert_eq!(
            defs().builtin_uri_for("print").as_deref(),
            Some("lualens://builtins/print")
        );
        assert!(defs().builtin_uri_for("no_such_name").is_none());
    }

    #[test]
    fn return_shapes_available() {
        let decision = defs().return_shape("decision").expect("decision shape");
        assert_eq!(decision.required_fields, vec!["allowed"]);
        assert!(defs().return_shape("unknown-mode").is_none());
    }

    #[test]
    fn sandbox_metadata() {
        let meta = defs().sandbox_item_metadata("context").expect("metadata");
        assert_eq!(meta.kind, "namespace");
        assert!(meta.is_readonly);
        assert!(meta.has_hook_variants);
        assert_eq!(meta.builtin_uri.as_deref(), Some("lualens://builtins/context"));
    }
}
