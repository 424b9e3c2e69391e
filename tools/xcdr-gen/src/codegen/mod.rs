// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rust emission: one generated module per input IDL file, containing the
//! value types, the streamer functions, the property-tree builders and the
//! topic-type traits.

mod streamers;
mod traits;
mod types;

use crate::config::Config;
use crate::parser::ast::{Definition, IdlFile, TypeSpec};
use std::fmt::Write as _;

/// What a named reference ultimately points at, aliases stripped.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ResolvedKind {
    Struct,
    Union,
    Enum { bit_bound: u32 },
    Bitmask { bit_bound: u32 },
}

/// Resolution helpers over the parsed file.
pub(crate) struct Registry<'a> {
    pub file: &'a IdlFile,
}

impl<'a> Registry<'a> {
    pub fn new(file: &'a IdlFile) -> Self {
        Registry { file }
    }

    /// Strip typedef chains; aliased array dimensions accumulate.
    pub fn strip_aliases(&self, spec: &TypeSpec, dims: &[u32]) -> (TypeSpec, Vec<u32>) {
        let mut spec = spec.clone();
        let mut dims = dims.to_vec();
        loop {
            let TypeSpec::Named(name) = &spec else {
                return (spec, dims);
            };
            match self.file.find(name) {
                Some(Definition::Typedef(def)) => {
                    dims.extend_from_slice(&def.array_dims);
                    spec = def.type_spec.clone();
                }
                _ => return (spec, dims),
            }
        }
    }

    /// The kind behind a named reference, aliases stripped; `None` when
    /// the alias resolves to a non-named type.
    pub fn kind(&self, name: &str) -> Option<ResolvedKind> {
        match self.file.find(name)? {
            Definition::Struct(_) => Some(ResolvedKind::Struct),
            Definition::Union(_) => Some(ResolvedKind::Union),
            Definition::Enum(def) => Some(ResolvedKind::Enum {
                bit_bound: def.bit_bound,
            }),
            Definition::Bitmask(def) => Some(ResolvedKind::Bitmask {
                bit_bound: def.bit_bound,
            }),
            Definition::Typedef(def) => {
                let (stripped, _) = self.strip_aliases(&def.type_spec, &[]);
                match stripped {
                    TypeSpec::Named(inner) => self.kind(&inner),
                    _ => None,
                }
            }
        }
    }
}

/// Rust keywords that need escaping in emitted identifiers.
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "false", "type", "unsafe", "use", "where",
    "while", "yield", "union",
];

/// Identifiers raw syntax cannot express; suffixed instead.
const RUST_UNESCAPABLE: &[&str] = &["self", "Self", "super", "crate"];

/// Escape an IDL identifier for use in emitted Rust.
pub(crate) fn escape(name: &str) -> String {
    if RUST_UNESCAPABLE.contains(&name) {
        format!("{}_", name)
    } else if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Path from code inside `from_scope` to the type `scoped_name`, both in
/// IDL terms, expressed with `super::` hops so the generated file works
/// wherever it is mounted.
pub(crate) fn relative_path(from_scope: &[String], scoped_name: &str) -> String {
    let parts: Vec<&str> = scoped_name.split("::").collect();
    let (target_scope, name) = parts.split_at(parts.len() - 1);
    let common = from_scope
        .iter()
        .zip(target_scope.iter())
        .take_while(|(a, b)| a.as_str() == **b)
        .count();
    let mut out = String::new();
    for _ in common..from_scope.len() {
        out.push_str("super::");
    }
    for part in &target_scope[common..] {
        out.push_str(&escape(part));
        out.push_str("::");
    }
    out.push_str(&escape(name[0]));
    out
}

/// The Rust spelling of a member type, container templates applied.
pub(crate) fn rust_type(
    registry: &Registry<'_>,
    config: &Config,
    scope: &[String],
    spec: &TypeSpec,
    dims: &[u32],
    optional: bool,
    external: bool,
) -> String {
    let mut out = base_rust_type(registry, config, scope, spec);
    for dim in dims.iter().rev() {
        out = config.array.expand(&out, &dim.to_string(), 0);
    }
    if external {
        out = config.external.expand(&out, "", 0);
    }
    if optional {
        out = config.optional.expand(&out, "", 0);
    }
    out
}

fn base_rust_type(
    registry: &Registry<'_>,
    config: &Config,
    scope: &[String],
    spec: &TypeSpec,
) -> String {
    match spec {
        TypeSpec::Primitive(p) => p.rust_type().to_string(),
        TypeSpec::String { bound } => {
            if *bound == 0 {
                config.string.expand("", "", 0)
            } else {
                config.bounded_string.expand("", "", *bound)
            }
        }
        TypeSpec::Sequence { element, bound } => {
            let element = base_rust_type(registry, config, scope, element);
            if *bound == 0 {
                config.sequence.expand(&element, "", 0)
            } else {
                config.bounded_sequence.expand(&element, "", *bound)
            }
        }
        TypeSpec::Named(name) => relative_path(scope, name),
    }
}

/// The `BitBound` expression for a member record.
pub(crate) fn member_bit_bound(registry: &Registry<'_>, spec: &TypeSpec, dims: &[u32]) -> String {
    let (stripped, _) = registry.strip_aliases(spec, dims);
    match &stripped {
        TypeSpec::Primitive(p) => match p.size() {
            1 => "::xcdr::BitBound::B8".into(),
            2 => "::xcdr::BitBound::B16".into(),
            4 => "::xcdr::BitBound::B32".into(),
            _ => "::xcdr::BitBound::B64".into(),
        },
        TypeSpec::Named(name) => match registry.kind(name) {
            Some(ResolvedKind::Enum { bit_bound }) | Some(ResolvedKind::Bitmask { bit_bound }) => {
                bit_bound_expr(bit_bound).into()
            }
            _ => "::xcdr::BitBound::Unset".into(),
        },
        _ => "::xcdr::BitBound::Unset".into(),
    }
}

pub(crate) fn bit_bound_expr(bit_bound: u32) -> &'static str {
    match bit_bound {
        8 => "::xcdr::BitBound::B8",
        16 => "::xcdr::BitBound::B16",
        64 => "::xcdr::BitBound::B64",
        _ => "::xcdr::BitBound::B32",
    }
}

/// The scalar holder type of a bit bound.
pub(crate) fn bit_bound_holder(bit_bound: u32) -> &'static str {
    match bit_bound {
        8 => "u8",
        16 => "u16",
        64 => "u64",
        _ => "u32",
    }
}

pub(crate) fn extensibility_expr(ext: crate::parser::ast::Extensibility) -> &'static str {
    match ext {
        crate::parser::ast::Extensibility::Final => "::xcdr::Extensibility::Final",
        crate::parser::ast::Extensibility::Appendable => "::xcdr::Extensibility::Appendable",
        crate::parser::ast::Extensibility::Mutable => "::xcdr::Extensibility::Mutable",
    }
}

/// Indent every non-empty line by `levels` module levels.
fn indent(code: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    let mut out = String::new();
    for line in code.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&pad);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Camel-case a case or flag name for variant emission.
pub(crate) fn camel(name: &str) -> String {
    let mut out = String::new();
    let mut upper = true;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Generate the full Rust module for one parsed IDL file.
pub fn generate(file: &IdlFile, config: &Config, source_name: &str) -> String {
    let registry = Registry::new(file);
    let mut out = String::new();
    let _ = writeln!(out, "// Generated from {} by xcdr-gen; do not edit.", source_name);
    out.push('\n');
    let _ = writeln!(
        out,
        "#![allow(dead_code, unused_mut, unused_variables, unused_parens, non_camel_case_types, non_snake_case, non_upper_case_globals, clippy::all)]"
    );
    out.push('\n');
    for include in config.includes() {
        let _ = writeln!(out, "{}", include);
    }
    if !config.includes().is_empty() {
        out.push('\n');
    }

    // definitions are emitted in declaration order, each wrapped in its
    // module chain relative to the previous one
    let mut open_scope: Vec<String> = Vec::new();
    for def in &file.definitions {
        let target_scope = def.scope().to_vec();
        adjust_modules(&mut out, &mut open_scope, &target_scope);
        let code = emit_definition(&registry, config, def);
        out.push_str(&indent(&code, open_scope.len()));
    }
    adjust_modules(&mut out, &mut open_scope, &[]);

    let registrations = traits::emit_registration(file);
    out.push_str(&registrations);
    out
}

fn adjust_modules(out: &mut String, open_scope: &mut Vec<String>, target: &[String]) {
    let common = open_scope
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    while open_scope.len() > common {
        open_scope.pop();
        let _ = writeln!(out, "{}}}", "    ".repeat(open_scope.len()));
        out.push('\n');
    }
    for part in &target[common..] {
        let _ = writeln!(
            out,
            "{}pub mod {} {{",
            "    ".repeat(open_scope.len()),
            escape(part)
        );
        open_scope.push(part.clone());
    }
}

fn emit_definition(registry: &Registry<'_>, config: &Config, def: &Definition) -> String {
    match def {
        Definition::Struct(s) => {
            let mut out = types::emit_struct_type(registry, config, s);
            out.push_str(&streamers::emit_struct_streamable(registry, config, s));
            if !s.nested {
                out.push_str(&traits::emit_topic_type(registry, def));
            }
            out
        }
        Definition::Union(u) => {
            let mut out = types::emit_union_type(registry, config, u);
            out.push_str(&streamers::emit_union_streamable(registry, config, u));
            if !u.nested {
                out.push_str(&traits::emit_topic_type(registry, def));
            }
            out
        }
        Definition::Enum(e) => types::emit_enum_type(e),
        Definition::Bitmask(b) => types::emit_bitmask_type(b),
        Definition::Typedef(t) => types::emit_typedef(registry, config, t),
    }
}

/// True when the element category of a collection is scalar-packed (no
/// DHEADER under XCDR2, block transfer eligible).
pub(crate) fn is_scalar_element(registry: &Registry<'_>, spec: &TypeSpec) -> bool {
    let (stripped, dims) = registry.strip_aliases(spec, &[]);
    dims.is_empty() && matches!(stripped, TypeSpec::Primitive(_))
}

/// The scalar Rust type of a primitive spec.
pub(crate) fn scalar_type(spec: &TypeSpec) -> Option<&'static str> {
    match spec {
        TypeSpec::Primitive(p) => Some(p.rust_type()),
        _ => None,
    }
}
