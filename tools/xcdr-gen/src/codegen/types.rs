// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value-type emission: structs with accessors, unions over a branch sum
//! type, enums with wire conversion, bitmasks and typedefs.

use super::{bit_bound_expr, camel, escape, rust_type, Registry};
use crate::config::Config;
use crate::parser::ast::{BitmaskDef, EnumDef, StructDef, TypedefDef, UnionDef};
use std::fmt::Write as _;

pub(crate) fn default_expr(dims: &[u32]) -> String {
    if dims.is_empty() {
        "::std::default::Default::default()".to_string()
    } else {
        // nested from_fn keeps arrays of any length constructible
        let mut out = "::std::default::Default::default()".to_string();
        for _ in dims {
            out = format!("::std::array::from_fn(|_| {})", out);
        }
        out
    }
}

pub(crate) fn emit_struct_type(
    registry: &Registry<'_>,
    config: &Config,
    def: &StructDef,
) -> String {
    let name = escape(&def.name);
    let mut out = String::new();

    let _ = writeln!(out, "#[derive(Debug, Clone, PartialEq)]");
    let _ = writeln!(out, "pub struct {} {{", name);
    for member in &def.members {
        let ty = rust_type(
            registry,
            config,
            &def.scope,
            &member.type_spec,
            &member.array_dims,
            member.is_optional,
            member.is_external,
        );
        let _ = writeln!(out, "    {}: {},", escape(&member.name), ty);
    }
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "impl Default for {} {{", name);
    let _ = writeln!(out, "    fn default() -> Self {{");
    let _ = writeln!(out, "        {} {{", name);
    for member in &def.members {
        let expr = if member.is_optional {
            "::std::default::Default::default()".to_string()
        } else {
            default_expr(&member.array_dims)
        };
        let _ = writeln!(out, "            {}: {},", escape(&member.name), expr);
    }
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "impl {} {{", name);
    // by-field constructor
    let params: Vec<String> = def
        .members
        .iter()
        .map(|member| {
            let ty = rust_type(
                registry,
                config,
                &def.scope,
                &member.type_spec,
                &member.array_dims,
                member.is_optional,
                member.is_external,
            );
            format!("{}: {}", escape(&member.name), ty)
        })
        .collect();
    let _ = writeln!(out, "    pub fn new({}) -> Self {{", params.join(", "));
    let fields: Vec<String> = def.members.iter().map(|m| escape(&m.name)).collect();
    let _ = writeln!(out, "        {} {{ {} }}", name, fields.join(", "));
    let _ = writeln!(out, "    }}");

    for member in &def.members {
        let field = escape(&member.name);
        let ty = rust_type(
            registry,
            config,
            &def.scope,
            &member.type_spec,
            &member.array_dims,
            member.is_optional,
            member.is_external,
        );
        out.push('\n');
        let _ = writeln!(out, "    pub fn {}(&self) -> &{} {{", field, ty);
        let _ = writeln!(out, "        &self.{}", field);
        let _ = writeln!(out, "    }}");
        out.push('\n');
        let _ = writeln!(out, "    pub fn {}_mut(&mut self) -> &mut {} {{", field, ty);
        let _ = writeln!(out, "        &mut self.{}", field);
        let _ = writeln!(out, "    }}");
        out.push('\n');
        let _ = writeln!(out, "    pub fn set_{}(&mut self, {}: {}) {{", field, field, ty);
        let _ = writeln!(out, "        self.{} = {};", field, field);
        let _ = writeln!(out, "    }}");
    }
    let _ = writeln!(out, "}}");
    out.push('\n');
    out
}

pub(crate) fn emit_enum_type(def: &EnumDef) -> String {
    let name = escape(&def.name);
    let mut out = String::new();
    let default_index = def
        .enumerators
        .iter()
        .position(|e| e.is_default)
        .unwrap_or(0);

    let _ = writeln!(out, "#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]");
    let _ = writeln!(out, "#[repr(u32)]");
    let _ = writeln!(out, "pub enum {} {{", name);
    for (index, enumerator) in def.enumerators.iter().enumerate() {
        if index == default_index {
            let _ = writeln!(out, "    #[default]");
        }
        let _ = writeln!(out, "    {} = {},", escape(&enumerator.name), enumerator.value);
    }
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "impl {} {{", name);
    let _ = writeln!(
        out,
        "    pub const BIT_BOUND: ::xcdr::BitBound = {};",
        bit_bound_expr(def.bit_bound)
    );
    out.push('\n');
    let _ = writeln!(out, "    /// Unknown wire values map to the default enumerator.");
    let _ = writeln!(out, "    pub fn from_wire(value: u32) -> Self {{");
    let _ = writeln!(out, "        match value {{");
    for enumerator in &def.enumerators {
        let _ = writeln!(
            out,
            "            {} => {}::{},",
            enumerator.value,
            name,
            escape(&enumerator.name)
        );
    }
    let _ = writeln!(
        out,
        "            _ => {}::{},",
        name,
        escape(&def.enumerators[default_index].name)
    );
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');
    out
}

pub(crate) fn emit_bitmask_type(def: &BitmaskDef) -> String {
    let name = escape(&def.name);
    let holder = super::bit_bound_holder(def.bit_bound);
    let mut out = String::new();

    let _ = writeln!(out, "#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]");
    let _ = writeln!(out, "pub struct {}(pub {});", name, holder);
    out.push('\n');
    let _ = writeln!(out, "impl {} {{", name);
    let _ = writeln!(
        out,
        "    pub const BIT_BOUND: ::xcdr::BitBound = {};",
        bit_bound_expr(def.bit_bound)
    );
    for (flag, position) in &def.bits {
        let _ = writeln!(
            out,
            "    pub const {}: {} = {}(1 << {});",
            escape(flag),
            name,
            name,
            position
        );
    }
    out.push('\n');
    let _ = writeln!(out, "    pub fn bits(self) -> {} {{", holder);
    let _ = writeln!(out, "        self.0");
    let _ = writeln!(out, "    }}");
    out.push('\n');
    let _ = writeln!(out, "    pub fn from_wire(value: u64) -> Self {{");
    let _ = writeln!(out, "        {}(value as {})", name, holder);
    let _ = writeln!(out, "    }}");
    out.push('\n');
    let _ = writeln!(out, "    pub fn contains(self, other: {}) -> bool {{", name);
    let _ = writeln!(out, "        self.0 & other.0 == other.0");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');
    let _ = writeln!(out, "impl ::std::ops::BitOr for {} {{", name);
    let _ = writeln!(out, "    type Output = {};", name);
    out.push('\n');
    let _ = writeln!(out, "    fn bitor(self, rhs: {}) -> {} {{", name, name);
    let _ = writeln!(out, "        {}(self.0 | rhs.0)", name);
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');
    out
}

pub(crate) fn emit_typedef(
    registry: &Registry<'_>,
    config: &Config,
    def: &TypedefDef,
) -> String {
    let ty = rust_type(
        registry,
        config,
        &def.scope,
        &def.type_spec,
        &def.array_dims,
        false,
        false,
    );
    format!("pub type {} = {};\n\n", escape(&def.name), ty)
}

/// Union labels as a `|`-joined Rust pattern over `as i64` values.
pub(crate) fn label_pattern(labels: &[i64]) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// All labels of every non-default case, for default-branch guards.
pub(crate) fn all_labels(def: &UnionDef) -> Vec<i64> {
    def.cases
        .iter()
        .filter(|case| !case.is_default)
        .flat_map(|case| case.labels.iter().copied())
        .collect()
}

pub(crate) fn branch_enum_name(def: &UnionDef) -> String {
    format!("{}Branch", camel(&def.name))
}

/// The branch selected by a raw discriminator value, as a variant
/// constructor with default payload; `None` means the empty branch.
pub(crate) fn branch_for_value(def: &UnionDef, value: i64) -> Option<usize> {
    if let Some(index) = def
        .cases
        .iter()
        .position(|case| !case.is_default && case.labels.contains(&value))
    {
        return Some(index);
    }
    def.cases.iter().position(|case| case.is_default)
}

pub(crate) fn emit_union_type(
    registry: &Registry<'_>,
    config: &Config,
    def: &UnionDef,
) -> String {
    let name = escape(&def.name);
    let branch_name = branch_enum_name(def);
    let disc_ty = rust_type(registry, config, &def.scope, &def.discriminator, &[], false, false);
    let mut out = String::new();

    let _ = writeln!(out, "#[derive(Debug, Clone, PartialEq)]");
    let _ = writeln!(out, "pub struct {} {{", name);
    let _ = writeln!(out, "    d: {},", disc_ty);
    let _ = writeln!(out, "    branch: {},", branch_name);
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "#[derive(Debug, Clone, PartialEq)]");
    let _ = writeln!(out, "pub enum {} {{", branch_name);
    for case in &def.cases {
        let ty = rust_type(
            registry,
            config,
            &def.scope,
            &case.type_spec,
            &case.array_dims,
            false,
            false,
        );
        let _ = writeln!(out, "    {}({}),", camel(&case.name), ty);
    }
    let has_default_case = def.cases.iter().any(|case| case.is_default);
    if !has_default_case {
        let _ = writeln!(out, "    Empty,");
    }
    let _ = writeln!(out, "}}");
    out.push('\n');

    // implicit default: discriminator zero selects its branch, or the
    // default case, or the empty branch
    let _ = writeln!(out, "impl Default for {} {{", name);
    let _ = writeln!(out, "    fn default() -> Self {{");
    let default_branch = match branch_for_value(def, 0) {
        Some(index) => format!(
            "{}::{}(::std::default::Default::default())",
            branch_name,
            camel(&def.cases[index].name)
        ),
        None => format!("{}::Empty", branch_name),
    };
    let _ = writeln!(out, "        {} {{", name);
    let _ = writeln!(out, "            d: ::std::default::Default::default(),");
    let _ = writeln!(out, "            branch: {},", default_branch);
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "impl {} {{", name);
    let _ = writeln!(out, "    pub fn d(&self) -> {} {{", disc_ty);
    let _ = writeln!(out, "        self.d");
    let _ = writeln!(out, "    }}");

    for case in &def.cases {
        let field = escape(&case.name);
        let variant = camel(&case.name);
        let ty = rust_type(
            registry,
            config,
            &def.scope,
            &case.type_spec,
            &case.array_dims,
            false,
            false,
        );
        let guard = if case.is_default {
            format!("!matches!(self.d as i64, {})", label_pattern(&all_labels(def)))
        } else {
            format!("matches!(self.d as i64, {})", label_pattern(&case.labels))
        };
        // by-reference getters unless the configuration asks for clones
        let (getter_ty, getter_ok) = if config.union_getter_by_ref {
            (format!("&{}", ty), "Ok(value)".to_string())
        } else {
            (ty.clone(), "Ok(value.clone())".to_string())
        };
        out.push('\n');
        let _ = writeln!(
            out,
            "    pub fn {}(&self) -> ::xcdr::Result<{}> {{",
            field, getter_ty
        );
        let _ = writeln!(out, "        match &self.branch {{");
        let _ = writeln!(
            out,
            "            {}::{}(value) if {} => {},",
            branch_name, variant, guard, getter_ok
        );
        let _ = writeln!(
            out,
            "            _ => Err(::xcdr::CdrError::InvalidArgument("
        );
        let _ = writeln!(
            out,
            "                \"discriminator does not select member `{}`\".into(),",
            case.name
        );
        let _ = writeln!(out, "            )),");
        let _ = writeln!(out, "        }}");
        let _ = writeln!(out, "    }}");
        out.push('\n');
        if !case.is_default && case.labels.len() == 1 {
            // a single label fixes the discriminator
            let literal = disc_literal(registry, def, &disc_ty, case.labels[0]);
            let _ = writeln!(out, "    pub fn set_{}(&mut self, value: {}) {{", field, ty);
            let _ = writeln!(out, "        self.d = {};", literal);
            let _ = writeln!(out, "        self.branch = {}::{}(value);", branch_name, variant);
            let _ = writeln!(out, "    }}");
        } else {
            let _ = writeln!(
                out,
                "    pub fn set_{}(&mut self, value: {}, discriminator: {}) -> ::xcdr::Result<()> {{",
                field, ty, disc_ty
            );
            let _ = writeln!(out, "        if !({}) {{", guard_for(&guard));
            let _ = writeln!(
                out,
                "            return Err(::xcdr::CdrError::InvalidArgument("
            );
            let _ = writeln!(
                out,
                "                \"label incompatible with member `{}`\".into(),",
                case.name
            );
            let _ = writeln!(out, "            ));");
            let _ = writeln!(out, "        }}");
            let _ = writeln!(out, "        self.d = discriminator;");
            let _ = writeln!(out, "        self.branch = {}::{}(value);", branch_name, variant);
            let _ = writeln!(out, "        Ok(())");
            let _ = writeln!(out, "    }}");
        }
    }

    // branch selection with default payload, for key reads and defaults
    out.push('\n');
    let _ = writeln!(
        out,
        "    fn select_branch_default(&mut self, discriminator: {}) {{",
        disc_ty
    );
    let _ = writeln!(out, "        self.d = discriminator;");
    let _ = writeln!(out, "        self.branch = match discriminator as i64 {{");
    for case in def.cases.iter().filter(|case| !case.is_default) {
        let _ = writeln!(
            out,
            "            {} => {}::{}(::std::default::Default::default()),",
            label_pattern(&case.labels),
            branch_name,
            camel(&case.name)
        );
    }
    if let Some(default_case) = def.cases.iter().find(|case| case.is_default) {
        let _ = writeln!(
            out,
            "            _ => {}::{}(::std::default::Default::default()),",
            branch_name,
            camel(&default_case.name)
        );
    } else {
        let _ = writeln!(out, "            _ => {}::Empty,", branch_name);
    }
    let _ = writeln!(out, "        }};");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out.push('\n');
    out
}

fn guard_for(guard: &str) -> String {
    guard.replace("self.d", "discriminator")
}

/// A discriminator value as a typed Rust expression.
fn disc_literal(
    registry: &Registry<'_>,
    def: &UnionDef,
    disc_ty: &str,
    value: i64,
) -> String {
    use crate::parser::ast::{Primitive, TypeSpec};
    match &def.discriminator {
        TypeSpec::Primitive(Primitive::Bool) => {
            if value == 0 {
                "false".to_string()
            } else {
                "true".to_string()
            }
        }
        TypeSpec::Primitive(_) => format!("{} as {}", value, disc_ty),
        TypeSpec::Named(name) => match registry.kind(name) {
            Some(super::ResolvedKind::Enum { .. }) => {
                format!("{}::from_wire({} as u32)", disc_ty, value)
            }
            _ => format!("{} as {}", value, disc_ty),
        },
        _ => format!("{} as {}", value, disc_ty),
    }
}
