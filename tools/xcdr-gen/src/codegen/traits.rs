// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic-trait emission: type name, extensibility, keyless and
//! self-contained flags, allowable encodings and the registration helper.
//!
//! Only non-default trait values are spelled out, so a plain final keyless
//! type gets the minimal impl.

use super::{escape, relative_path, Registry};
use crate::parser::ast::{Definition, Extensibility, IdlFile, TypeSpec};
use std::collections::HashSet;
use std::fmt::Write as _;

/// True when the type holds no strings, sequences, optionals or external
/// members anywhere in its transitive content.
pub(crate) fn is_self_contained(registry: &Registry<'_>, name: &str) -> bool {
    let mut visiting = HashSet::new();
    self_contained_inner(registry, name, &mut visiting)
}

fn self_contained_inner(
    registry: &Registry<'_>,
    name: &str,
    visiting: &mut HashSet<String>,
) -> bool {
    if !visiting.insert(name.to_string()) {
        return true; // recursion cycles are broken optimistically
    }
    let contained = match registry.file.find(name) {
        Some(Definition::Struct(def)) => def.members.iter().all(|member| {
            !member.is_optional
                && !member.is_external
                && spec_self_contained(registry, &member.type_spec, visiting)
        }),
        Some(Definition::Union(def)) => def
            .cases
            .iter()
            .all(|case| spec_self_contained(registry, &case.type_spec, visiting)),
        Some(Definition::Enum(_)) | Some(Definition::Bitmask(_)) => true,
        Some(Definition::Typedef(def)) => spec_self_contained(registry, &def.type_spec, visiting),
        None => true,
    };
    visiting.remove(name);
    contained
}

fn spec_self_contained(
    registry: &Registry<'_>,
    spec: &TypeSpec,
    visiting: &mut HashSet<String>,
) -> bool {
    match spec {
        TypeSpec::Primitive(_) => true,
        TypeSpec::String { .. } | TypeSpec::Sequence { .. } => false,
        TypeSpec::Named(name) => self_contained_inner(registry, name, visiting),
    }
}

/// True when the type needs XCDR2-only features anywhere in its transitive
/// content: optionals, must-understand members, non-final extensibility,
/// bitmasks, or collections whose elements require a delimiter header.
pub(crate) fn requires_xcdr2(registry: &Registry<'_>, name: &str) -> bool {
    let mut visiting = HashSet::new();
    requires_xcdr2_inner(registry, name, &mut visiting)
}

fn requires_xcdr2_inner(
    registry: &Registry<'_>,
    name: &str,
    visiting: &mut HashSet<String>,
) -> bool {
    if !visiting.insert(name.to_string()) {
        return false;
    }
    let required = match registry.file.find(name) {
        Some(Definition::Struct(def)) => {
            def.extensibility != Extensibility::Final
                || def.members.iter().any(|member| {
                    member.is_optional
                        || member.must_understand
                        || collection_needs_dheader(
                            registry,
                            &member.type_spec,
                            &member.array_dims,
                        )
                        || spec_requires_xcdr2(registry, &member.type_spec, visiting)
                })
        }
        Some(Definition::Union(def)) => {
            def.extensibility != Extensibility::Final
                || def.cases.iter().any(|case| {
                    collection_needs_dheader(registry, &case.type_spec, &case.array_dims)
                        || spec_requires_xcdr2(registry, &case.type_spec, visiting)
                })
        }
        Some(Definition::Bitmask(_)) => true,
        Some(Definition::Enum(_)) => false,
        Some(Definition::Typedef(def)) => spec_requires_xcdr2(registry, &def.type_spec, visiting),
        None => false,
    };
    visiting.remove(name);
    required
}

fn spec_requires_xcdr2(
    registry: &Registry<'_>,
    spec: &TypeSpec,
    visiting: &mut HashSet<String>,
) -> bool {
    match spec {
        TypeSpec::Primitive(_) | TypeSpec::String { .. } => false,
        TypeSpec::Sequence { element, .. } => spec_requires_xcdr2(registry, element, visiting),
        TypeSpec::Named(name) => requires_xcdr2_inner(registry, name, visiting),
    }
}

/// A sequence or array of non-primitive elements is framed by a DHEADER.
fn collection_needs_dheader(registry: &Registry<'_>, spec: &TypeSpec, dims: &[u32]) -> bool {
    let (stripped, dims) = registry.strip_aliases(spec, dims);
    let element = match &stripped {
        TypeSpec::Sequence { element, .. } => element.as_ref().clone(),
        _ if !dims.is_empty() => stripped.clone(),
        _ => return false,
    };
    !super::is_scalar_element(registry, &element)
}

fn is_keyless(def: &Definition) -> bool {
    match def {
        Definition::Struct(s) => s.keylist.is_empty() && !s.members.iter().any(|m| m.is_key),
        Definition::Union(u) => !u.discriminator_is_key,
        _ => true,
    }
}

fn extensibility_of(def: &Definition) -> Extensibility {
    match def {
        Definition::Struct(s) => s.extensibility,
        Definition::Union(u) => u.extensibility,
        _ => Extensibility::Final,
    }
}

pub(crate) fn emit_topic_type(registry: &Registry<'_>, def: &Definition) -> String {
    let name = escape(def.name());
    let scoped = def.scoped_name();
    let mut out = String::new();

    let _ = writeln!(out, "impl ::xcdr::TopicType for {} {{", name);
    let _ = writeln!(out, "    const TYPE_NAME: &'static str = \"{}\";", scoped);
    match extensibility_of(def) {
        Extensibility::Final => {}
        Extensibility::Appendable => {
            let _ = writeln!(
                out,
                "    const EXTENSIBILITY: ::xcdr::Extensibility = ::xcdr::Extensibility::Appendable;"
            );
        }
        Extensibility::Mutable => {
            let _ = writeln!(
                out,
                "    const EXTENSIBILITY: ::xcdr::Extensibility = ::xcdr::Extensibility::Mutable;"
            );
        }
    }
    if is_keyless(def) {
        let _ = writeln!(out, "    const IS_KEYLESS: bool = true;");
    }
    if !is_self_contained(registry, &scoped) {
        let _ = writeln!(out, "    const IS_SELF_CONTAINED: bool = false;");
    }
    if requires_xcdr2(registry, &scoped) {
        let _ = writeln!(
            out,
            "    const ALLOWABLE_ENCODINGS: ::xcdr::AllowableEncodings = ::xcdr::ENCODING_XCDR2;"
        );
    }
    let _ = writeln!(out, "}}");
    out.push('\n');
    out
}

/// The file-level registration helper, one call per topic type.
pub(crate) fn emit_registration(file: &IdlFile) -> String {
    let topics: Vec<&Definition> = file
        .definitions
        .iter()
        .filter(|def| match def {
            Definition::Struct(s) => !s.nested,
            Definition::Union(u) => !u.nested,
            _ => false,
        })
        .collect();
    if topics.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "/// Register every topic type in this file with the process-wide registry."
    );
    let _ = writeln!(out, "pub fn register_topic_types() -> ::xcdr::Result<()> {{");
    for def in topics {
        let _ = writeln!(
            out,
            "    ::xcdr::register_topic_type!({})?;",
            relative_path(&[], &def.scoped_name())
        );
    }
    let _ = writeln!(out, "    Ok(())");
    let _ = writeln!(out, "}}");
    out
}
