//! The type lattice.
//!
//! Every dynamic Lua construct the analyzer reasons about maps to a
//! declared variant here: records become [`TableTy`] with optional
//! fields, multi-return becomes [`Ty::Tuple`], namespaces are tables
//! built from the definition registry. Types are immutable values;
//! constructors normalize (unions flatten and deduplicate, singleton
//! unions collapse).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Any,
    Unknown,
    Nil,
    Void,
    Boolean,
    Number,
    Integer,
    String,
    /// Coarse "some function" without a known signature.
    Function,
    BooleanLit(bool),
    NumberLit(f64),
    StringLit(std::string::String),
    Array(Box<Ty>),
    /// 1-indexed ordered elements (multi-return, fixed-shape sequences).
    Tuple(Vec<Ty>),
    Table(TableTy),
    /// Named reference resolved through the definition registry.
    Ref(std::string::String),
    Union(Vec<Ty>),
    Intersection(Vec<Ty>),
    Fn(FnTy),
    Variadic(Box<Ty>),
    TypeParam(std::string::String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableTy {
    /// Fields in insertion order; lookup is by name.
    pub fields: Vec<FieldTy>,
    /// Fallback type for index access when no field matches.
    pub value_type: Option<Box<Ty>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTy {
    pub name: std::string::String,
    pub ty: Ty,
    pub optional: bool,
    pub description: Option<std::string::String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnTy {
    pub params: Vec<ParamTy>,
    pub returns: Vec<Ty>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamTy {
    pub name: std::string::String,
    pub ty: Ty,
    pub vararg: bool,
    pub optional: bool,
}

impl FieldTy {
    pub fn required(name: impl Into<std::string::String>, ty: Ty) -> Self {
        FieldTy {
            name: name.into(),
            ty,
            optional: false,
            description: None,
        }
    }

    pub fn optional(name: impl Into<std::string::String>, ty: Ty) -> Self {
        FieldTy {
            name: name.into(),
            ty,
            optional: true,
            description: None,
        }
    }
}

impl TableTy {
    pub fn field(&self, name: &str) -> Option<&FieldTy> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn with_field(mut self, field: FieldTy) -> Self {
        self.fields.push(field);
        self
    }
}

impl Ty {
    /// Build a union: flattens nested unions, deduplicates members, and
    /// collapses a single-member union to the member itself.
    pub fn union(members: impl IntoIterator<Item = Ty>) -> Ty {
        fn push(out: &mut Vec<Ty>, ty: Ty) {
            match ty {
                Ty::Union(inner) => {
                    for member in inner {
                        push(out, member);
                    }
                }
                other => {
                    if !out.contains(&other) {
                        out.push(other);
                    }
                }
            }
        }
        let mut flat = Vec::new();
        for member in members {
            push(&mut flat, member);
        }
        match flat.len() {
            0 => Ty::Unknown,
            1 => flat.into_iter().next().unwrap_or(Ty::Unknown),
            _ => Ty::Union(flat),
        }
    }

    /// Strip literal singletons to their base kinds.
    pub fn widen(&self) -> Ty {
        match self {
            Ty::BooleanLit(_) => Ty::Boolean,
            Ty::NumberLit(_) => Ty::Number,
            Ty::StringLit(_) => Ty::String,
            Ty::Union(members) => Ty::union(members.iter().map(Ty::widen)),
            other => other.clone(),
        }
    }

    /// Whether a value of this type is definitely truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Ty::Nil | Ty::Void | Ty::Unknown | Ty::Any | Ty::Boolean => false,
            Ty::BooleanLit(value) => *value,
            Ty::Union(members) => members.iter().all(Ty::is_truthy),
            _ => true,
        }
    }

    /// Whether a value of this type may be nil.
    pub fn may_be_nil(&self) -> bool {
        match self {
            Ty::Nil | Ty::Unknown | Ty::Any => true,
            Ty::Union(members) => members.iter().any(|m| matches!(m, Ty::Nil)),
            _ => false,
        }
    }

    /// The non-nil remainder of this type, used by flow narrowing.
    pub fn without_nil(&self) -> Ty {
        match self {
            Ty::Nil => Ty::Unknown,
            Ty::Union(members) => {
                Ty::union(members.iter().filter(|m| !matches!(m, Ty::Nil)).cloned())
            }
            other => other.clone(),
        }
    }
}

/// Structural equality over the lattice.
pub fn types_equal(a: &Ty, b: &Ty) -> bool {
    a == b
}

/// Whether a value of type `sub` can be used where `sup` is expected.
pub fn is_assignable_to(sub: &Ty, sup: &Ty) -> bool {
    if sub == sup {
        return true;
    }
    match (sub, sup) {
        (Ty::Any, _) | (_, Ty::Any) => true,
        (Ty::Unknown, _) | (_, Ty::Unknown) => true,
        // Union on the left must hold for every member; union on the
        // right for at least one.
        (Ty::Union(members), _) => members.iter().all(|m| is_assignable_to(m, sup)),
        (_, Ty::Union(members)) => members.iter().any(|m| is_assignable_to(sub, m)),
        (Ty::BooleanLit(_), Ty::Boolean) => true,
        (Ty::NumberLit(_), Ty::Number) => true,
        (Ty::NumberLit(value), Ty::Integer) => value.fract() == 0.0,
        (Ty::StringLit(_), Ty::String) => true,
        (Ty::Integer, Ty::Number) => true,
        (Ty::Fn(_), Ty::Function) => true,
        (Ty::Array(a), Ty::Array(b)) => is_assignable_to(a, b),
        (Ty::Tuple(a), Ty::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| is_assignable_to(x, y))
        }
        (Ty::Table(a), Ty::Table(b)) => b.fields.iter().filter(|f| !f.optional).all(|want| {
            a.field(&want.name)
                .map(|have| is_assignable_to(&have.ty, &want.ty))
                .unwrap_or(false)
        }),
        (Ty::Fn(a), Ty::Fn(b)) => {
            // Parameter-contravariant, return-covariant.
            a.params.len() <= b.params.len()
                && a.params
                    .iter()
                    .zip(&b.params)
                    .all(|(pa, pb)| is_assignable_to(&pb.ty, &pa.ty))
                && a.returns.len() >= b.returns.len()
                && a.returns
                    .iter()
                    .zip(&b.returns)
                    .all(|(ra, rb)| is_assignable_to(ra, rb))
        }
        _ => false,
    }
}

/// Formatting options for [`format_ty_with`].
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub multiline: bool,
    pub max_depth: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            multiline: false,
            max_depth: 3,
        }
    }
}

pub fn format_ty(ty: &Ty) -> std::string::String {
    format_ty_with(ty, &FormatOptions::default())
}

pub fn format_ty_with(ty: &Ty, opts: &FormatOptions) -> std::string::String {
    fmt_depth(ty, opts, opts.max_depth)
}

fn fmt_depth(ty: &Ty, opts: &FormatOptions, depth: usize) -> std::string::String {
    match ty {
        Ty::Any => "any".to_string(),
        Ty::Unknown => "unknown".to_string(),
        Ty::Nil => "nil".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Boolean => "boolean".to_string(),
        Ty::Number => "number".to_string(),
        Ty::Integer => "integer".to_string(),
        Ty::String => "string".to_string(),
        Ty::Function => "function".to_string(),
        Ty::BooleanLit(value) => value.to_string(),
        Ty::NumberLit(value) => format_number(*value),
        Ty::StringLit(value) => format!("\"{}\"", value),
        Ty::Array(element) => {
            let inner = fmt_depth(element, opts, depth);
            if matches!(**element, Ty::Union(_)) {
                format!("({})[]", inner)
            } else {
                format!("{}[]", inner)
            }
        }
        Ty::Tuple(elements) => {
            let parts: Vec<_> = elements.iter().map(|e| fmt_depth(e, opts, depth)).collect();
            format!("({})", parts.join(", "))
        }
        Ty::Table(table) => fmt_table(table, opts, depth),
        Ty::Ref(name) => name.clone(),
        Ty::Union(members) => {
            let parts: Vec<_> = members.iter().map(|m| fmt_depth(m, opts, depth)).collect();
            parts.join(" | ")
        }
        Ty::Intersection(members) => {
            let parts: Vec<_> = members.iter().map(|m| fmt_depth(m, opts, depth)).collect();
            parts.join(" & ")
        }
        Ty::Fn(function) => {
            let params: Vec<_> = function
                .params
                .iter()
                .map(|p| {
                    let marker = if p.optional { "?" } else { "" };
                    if p.vararg {
                        format!("...{}", fmt_depth(&p.ty, opts, depth))
                    } else {
                        format!("{}{}: {}", p.name, marker, fmt_depth(&p.ty, opts, depth))
                    }
                })
                .collect();
            let rendered = format!("function({})", params.join(", "));
            match function.returns.len() {
                0 => rendered,
                1 => format!("{}: {}", rendered, fmt_depth(&function.returns[0], opts, depth)),
                _ => {
                    let rets: Vec<_> = function
                        .returns
                        .iter()
                        .map(|r| fmt_depth(r, opts, depth))
                        .collect();
                    format!("{}: ({})", rendered, rets.join(", "))
                }
            }
        }
        Ty::Variadic(element) => format!("...{}", fmt_depth(element, opts, depth)),
        Ty::TypeParam(name) => name.clone(),
    }
}

fn fmt_table(table: &TableTy, opts: &FormatOptions, depth: usize) -> std::string::String {
    if table.fields.is_empty() {
        return match &table.value_type {
            Some(value) => format!("{{ [any]: {} }}", fmt_depth(value, opts, depth)),
            None => "table".to_string(),
        };
    }
    if depth == 0 {
        return "table".to_string();
    }
    let nested = FormatOptions {
        multiline: false,
        ..opts.clone()
    };
    let fields: Vec<_> = table
        .fields
        .iter()
        .map(|f| {
            let marker = if f.optional { "?" } else { "" };
            format!(
                "{}{}: {}",
                f.name,
                marker,
                fmt_depth(&f.ty, &nested, depth - 1)
            )
        })
        .collect();
    if opts.multiline {
        format!("{{\n  {}\n}}", fields.join(",\n  "))
    } else {
        format!("{{ {} }}", fields.join(", "))
    }
}

fn format_number(value: f64) -> std::string::String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_ty(self))
    }
}

/// Parse a type string from the definition documents.
///
/// Recognizes primitive names, `T[]`, unions `A | B`, ad-hoc tables
/// `{ k: T, k2: U }`, literal singletons (`"s"`, `42`, `true`), and
/// bare identifiers as named references. Anything else degrades to
/// [`Ty::Unknown`].
pub fn parse_type_string(input: &str) -> Ty {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ty::Unknown;
    }
    let parts = split_top_level(trimmed, '|');
    if parts.len() > 1 {
        return Ty::union(parts.into_iter().map(parse_type_string));
    }
    parse_single(trimmed)
}

fn parse_single(input: &str) -> Ty {
    let trimmed = input.trim();
    if let Some(base) = trimmed.strip_suffix("[]") {
        return Ty::Array(Box::new(parse_single(base)));
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return parse_table_type(&trimmed[1..trimmed.len() - 1]);
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        return Ty::StringLit(trimmed[1..trimmed.len() - 1].to_string());
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Ty::NumberLit(value);
    }
    match trimmed {
        "any" => Ty::Any,
        "unknown" => Ty::Unknown,
        "nil" => Ty::Nil,
        "void" => Ty::Void,
        "boolean" | "bool" => Ty::Boolean,
        "number" => Ty::Number,
        "integer" => Ty::Integer,
        "string" => Ty::String,
        "function" => Ty::Function,
        "table" => Ty::Table(TableTy::default()),
        "true" => Ty::BooleanLit(true),
        "false" => Ty::BooleanLit(false),
        name if is_identifier(name) => Ty::Ref(name.to_string()),
        _ => Ty::Unknown,
    }
}

fn parse_table_type(body: &str) -> Ty {
    let mut table = TableTy::default();
    for entry in split_top_level(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((raw_name, raw_ty)) = split_field(entry) else {
            continue;
        };
        let (name, optional) = match raw_name.strip_suffix('?') {
            Some(stripped) => (stripped.trim(), true),
            None => (raw_name.trim(), false),
        };
        if !is_identifier(name) {
            continue;
        }
        table.fields.push(FieldTy {
            name: name.to_string(),
            ty: parse_type_string(raw_ty),
            optional,
            description: None,
        });
    }
    Ty::Table(table)
}

/// Split `name: type` at the first top-level colon.
fn split_field(entry: &str) -> Option<(&str, &str)> {
    let mut nesting = 0usize;
    for (idx, ch) in entry.char_indices() {
        match ch {
            '{' | '[' | '(' => nesting += 1,
            '}' | ']' | ')' => nesting = nesting.saturating_sub(1),
            ':' if nesting == 0 => return Some((&entry[..idx], &entry[idx + 1..])),
            _ => {}
        }
    }
    None
}

fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut nesting = 0usize;
    let mut in_string: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in input.char_indices() {
        if let Some(quote) = in_string {
            if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '{' | '[' | '(' => nesting += 1,
            '}' | ']' | ')' => nesting = nesting.saturating_sub(1),
            c if c == separator && nesting == 0 => {
                parts.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
