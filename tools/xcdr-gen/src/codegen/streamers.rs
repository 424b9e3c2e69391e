// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streamer emission: the property-tree builders and the
//! `CdrStreamable` implementation (write/read/max switchboxes) per
//! generated type.

use super::types::{branch_enum_name, default_expr, label_pattern};
use super::{
    camel as camel_case, escape, extensibility_expr, is_scalar_element, member_bit_bound,
    relative_path, rust_type, scalar_type, Registry, ResolvedKind,
};
use crate::config::Config;
use crate::parser::ast::{Definition, Extensibility, Member, StructDef, TypeSpec, UnionDef};
use std::fmt::Write as _;

/// Which operation body is being emitted.
#[derive(Copy, Clone, PartialEq)]
enum Op {
    Write,
    Read,
    Max,
}

impl Op {
    fn stream_var(self) -> &'static str {
        match self {
            Op::Write => "os",
            Op::Read => "is",
            Op::Max => "xs",
        }
    }
}

/// Where the property node for a constructed value comes from.
#[derive(Clone)]
enum NodeSource {
    /// `member.node()` of the enclosing switchbox arm.
    Member,
    /// The type's own root tree (union branches).
    TypeRoot(String),
}

struct Emitter<'a> {
    registry: &'a Registry<'a>,
    config: &'a Config,
    scope: &'a [String],
    out: String,
}

impl<'a> Emitter<'a> {
    fn line(&mut self, indent: usize, text: &str) {
        let _ = writeln!(self.out, "{}{}", "    ".repeat(indent), text);
    }

    fn ext_of_member_type(&self, spec: &TypeSpec, dims: &[u32]) -> &'static str {
        let (stripped, _) = self.registry.strip_aliases(spec, dims);
        if let TypeSpec::Named(name) = &stripped {
            match self.registry.file.find(name) {
                Some(Definition::Struct(def)) => return extensibility_expr(def.extensibility),
                Some(Definition::Union(def)) => {
                    // mutable unions are framed like appendable bodies
                    let ext = if def.extensibility == Extensibility::Mutable {
                        Extensibility::Appendable
                    } else {
                        def.extensibility
                    };
                    return extensibility_expr(ext);
                }
                _ => {}
            }
        }
        extensibility_expr(Extensibility::Final)
    }

    // --------------------------------------------------------------
    // Property builders
    // --------------------------------------------------------------

    fn emit_member_properties(&mut self, ext: Extensibility, members: &[Member]) {
        self.line(1, "fn member_properties() -> Vec<::xcdr::EntityProperty> {");
        self.line(
            2,
            &format!(
                "let mut props = vec![::xcdr::EntityProperty::root({})];",
                extensibility_expr(ext)
            ),
        );
        for member in members {
            let bb = member_bit_bound(self.registry, &member.type_spec, &member.array_dims);
            self.line(
                2,
                &format!(
                    "props.push(::xcdr::EntityProperty::new(1, {}, {}, {}, {}, {}));",
                    member.id,
                    member.is_optional,
                    bb,
                    self.ext_of_member_type(&member.type_spec, &member.array_dims),
                    member.must_understand
                ),
            );
            let (stripped, _) = self
                .registry
                .strip_aliases(&member.type_spec, &member.array_dims);
            if let TypeSpec::Named(name) = &stripped {
                if self.registry.kind(name) == Some(ResolvedKind::Struct) {
                    let path = relative_path(self.scope, name);
                    self.line(
                        2,
                        &format!(
                            "::xcdr::PropertyList::append_nested(&mut props, {}::properties());",
                            path
                        ),
                    );
                }
            }
        }
        self.line(2, "props");
        self.line(1, "}");
    }

    fn emit_properties_fn(&mut self) {
        self.line(1, "fn properties() -> &'static ::xcdr::PropertyList {");
        self.line(
            2,
            "static PROPS: ::std::sync::OnceLock<::xcdr::PropertyList> = ::std::sync::OnceLock::new();",
        );
        self.line(2, "PROPS.get_or_init(|| {");
        self.line(
            3,
            "::xcdr::PropertyList::finish(Self::member_properties(), &Self::key_endpoints())",
        );
        self.line(2, "})");
        self.line(1, "}");
    }

    fn emit_key_endpoints(&mut self, paths: &[Vec<u32>]) {
        if paths.is_empty() {
            return;
        }
        self.out.push('\n');
        self.line(1, "fn key_endpoints() -> ::xcdr::KeyEndpoints {");
        self.line(2, "let mut keys = ::xcdr::KeyEndpoints::new();");
        for path in paths {
            let ids: Vec<String> = path.iter().map(|id| id.to_string()).collect();
            self.line(
                2,
                &format!("keys.add_key_endpoint(&[{}]);", ids.join(", ")),
            );
        }
        self.line(2, "keys");
        self.line(1, "}");
    }

    // --------------------------------------------------------------
    // Value streaming
    // --------------------------------------------------------------

    /// Emit the code that streams one value (already inside the member
    /// framing), recursing through collections.
    fn value_op(
        &mut self,
        op: Op,
        spec: &TypeSpec,
        dims: &[u32],
        place: &str,
        node: &NodeSource,
        depth: usize,
        indent: usize,
    ) {
        let stream = op.stream_var();
        let (stripped, dims) = {
            let (s, d) = self.registry.strip_aliases(spec, dims);
            (s, d)
        };

        if !dims.is_empty() {
            self.array_op(op, &stripped, &dims, place, node, depth, indent);
            return;
        }

        match &stripped {
            TypeSpec::Primitive(p) => match op {
                Op::Write => self.line(indent, &format!("{}.write_scalar({})?;", stream, place)),
                Op::Read => self.line(indent, &format!("{} = {}.read_scalar()?;", place, stream)),
                Op::Max => self.line(
                    indent,
                    &format!("{}.move_scalar::<{}>()?;", stream, p.rust_type()),
                ),
            },
            TypeSpec::String { bound } => match op {
                Op::Write => self.line(
                    indent,
                    &format!("{}.write_string(&{}, {})?;", stream, place, bound),
                ),
                Op::Read => self.line(
                    indent,
                    &format!("{} = {}.read_string({})?;", place, stream, bound),
                ),
                Op::Max => self.line(indent, &format!("{}.max_string({})?;", stream, bound)),
            },
            TypeSpec::Sequence { element, bound } => {
                self.sequence_op(op, element, *bound, place, node, depth, indent);
            }
            TypeSpec::Named(name) => match self.registry.kind(name) {
                Some(ResolvedKind::Enum { .. }) => {
                    let path = relative_path(self.scope, name);
                    match op {
                        Op::Write => self.line(
                            indent,
                            &format!(
                                "{}.write_enum({} as u32, {}::BIT_BOUND)?;",
                                stream, place, path
                            ),
                        ),
                        Op::Read => self.line(
                            indent,
                            &format!(
                                "{} = {}::from_wire({}.read_enum({}::BIT_BOUND)?);",
                                place, path, stream, path
                            ),
                        ),
                        Op::Max => self.line(
                            indent,
                            &format!("{}.write_enum(0, {}::BIT_BOUND)?;", stream, path),
                        ),
                    }
                }
                Some(ResolvedKind::Bitmask { .. }) => {
                    let path = relative_path(self.scope, name);
                    match op {
                        Op::Write => self.line(
                            indent,
                            &format!(
                                "{}.write_bitmask(u64::from({}.bits()), {}::BIT_BOUND)?;",
                                stream, place, path
                            ),
                        ),
                        Op::Read => self.line(
                            indent,
                            &format!(
                                "{} = {}::from_wire({}.read_bitmask({}::BIT_BOUND)?);",
                                place, path, stream, path
                            ),
                        ),
                        Op::Max => self.line(
                            indent,
                            &format!("{}.write_bitmask(0, {}::BIT_BOUND)?;", stream, path),
                        ),
                    }
                }
                _ => self.constructed_op(op, name, place, node, indent),
            },
        }
    }

    fn constructed_op(
        &mut self,
        op: Op,
        name: &str,
        place: &str,
        node: &NodeSource,
        indent: usize,
    ) {
        let stream = op.stream_var();
        let path = relative_path(self.scope, name);
        let method = match op {
            Op::Write => format!("{}.write_cdr({}, child)?;", place, stream),
            Op::Read => format!("{}.read_cdr({}, child)?;", place, stream),
            Op::Max => format!("{}::max_cdr({}, child)?;", path, stream),
        };
        match node {
            NodeSource::Member => {
                self.line(indent, "if let Some(child) = member.node() {");
                self.line(indent + 1, &method);
                self.line(indent, "}");
            }
            NodeSource::TypeRoot(root_path) => {
                self.line(
                    indent,
                    &format!("let child = {}::properties().root();", root_path),
                );
                self.line(indent, &method);
            }
        }
    }

    fn array_op(
        &mut self,
        op: Op,
        element: &TypeSpec,
        dims: &[u32],
        place: &str,
        node: &NodeSource,
        depth: usize,
        indent: usize,
    ) {
        let stream = op.stream_var();
        let scalar = matches!(element, TypeSpec::Primitive(_));
        self.line(
            indent,
            &format!("{}.start_consecutive({})?;", stream, scalar),
        );
        self.array_dims_op(op, element, dims, place, node, depth, indent);
        self.line(indent, &format!("{}.finish_consecutive()?;", stream));
    }

    fn array_dims_op(
        &mut self,
        op: Op,
        element: &TypeSpec,
        dims: &[u32],
        place: &str,
        node: &NodeSource,
        depth: usize,
        indent: usize,
    ) {
        let stream = op.stream_var();
        if dims.len() == 1 {
            if let Some(ty) = scalar_type(element) {
                match op {
                    Op::Write => self.line(
                        indent,
                        &format!("{}.write_scalar_slice(&{})?;", stream, place),
                    ),
                    Op::Read => self.line(
                        indent,
                        &format!("{}.read_scalar_slice(&mut {})?;", stream, place),
                    ),
                    Op::Max => self.line(
                        indent,
                        &format!("{}.move_scalar_slice::<{}>({})?;", stream, ty, dims[0]),
                    ),
                }
                return;
            }
        }
        if dims.is_empty() {
            self.value_op(op, element, &[], place, node, depth, indent);
            return;
        }
        let var = format!("a_{}", depth + 1);
        match op {
            Op::Write => {
                self.line(indent, &format!("for {} in {}.iter() {{", var, place));
                self.array_dims_op(
                    op,
                    element,
                    &dims[1..],
                    &format!("(*{})", var),
                    node,
                    depth + 1,
                    indent + 1,
                );
                self.line(indent, "}");
            }
            Op::Read => {
                self.line(indent, &format!("for {} in {}.iter_mut() {{", var, place));
                self.array_dims_op(
                    op,
                    element,
                    &dims[1..],
                    &format!("(*{})", var),
                    node,
                    depth + 1,
                    indent + 1,
                );
                self.line(indent, "}");
            }
            Op::Max => {
                self.line(indent, &format!("for _ in 0..{} {{", dims[0]));
                self.array_dims_op(op, element, &dims[1..], place, node, depth + 1, indent + 1);
                self.line(indent, "}");
            }
        }
    }

    fn sequence_op(
        &mut self,
        op: Op,
        element: &TypeSpec,
        bound: u32,
        place: &str,
        node: &NodeSource,
        depth: usize,
        indent: usize,
    ) {
        let stream = op.stream_var();
        if is_scalar_element(self.registry, element) {
            let (stripped, _) = self.registry.strip_aliases(element, &[]);
            let ty = scalar_type(&stripped).unwrap_or("u8");
            self.line(indent, &format!("{}.start_consecutive(true)?;", stream));
            match op {
                Op::Write => self.line(
                    indent,
                    &format!("{}.write_scalar_seq(&{}, {})?;", stream, place, bound),
                ),
                Op::Read => self.line(
                    indent,
                    &format!("{}.read_scalar_seq(&mut {}, {})?;", stream, place, bound),
                ),
                Op::Max => self.line(
                    indent,
                    &format!("{}.max_scalar_seq::<{}>({})?;", stream, ty, bound),
                ),
            }
            self.line(indent, &format!("{}.finish_consecutive()?;", stream));
            return;
        }

        if op == Op::Max && bound == 0 {
            // unbounded content makes the upper bound unlimited
            self.line(indent, &format!("{}.saturate();", stream));
            return;
        }

        self.line(indent, &format!("{}.start_consecutive(false)?;", stream));
        match op {
            Op::Write => {
                self.line(
                    indent,
                    &format!("{}.write_length({}.len(), {})?;", stream, place, bound),
                );
                let var = format!("e_{}", depth + 1);
                self.line(indent, &format!("for {} in {}.iter() {{", var, place));
                self.value_op(
                    op,
                    element,
                    &[],
                    &format!("(*{})", var),
                    node,
                    depth + 1,
                    indent + 1,
                );
                self.line(indent, "}");
            }
            Op::Read => {
                let len = format!("se_{}", depth + 1);
                let idx = format!("i_{}", depth + 1);
                let var = format!("e_{}", depth + 1);
                self.line(indent, &format!("let {} = {}.read_length()?;", len, stream));
                self.line(indent, &format!("{}.clear();", place));
                self.line(indent, &format!("for {} in 0..{} {{", idx, len));
                let elem_ty = rust_type(
                    self.registry,
                    self.config,
                    self.scope,
                    element,
                    &[],
                    false,
                    false,
                );
                self.line(
                    indent + 1,
                    &format!(
                        "let mut {}: {} = ::std::default::Default::default();",
                        var, elem_ty
                    ),
                );
                self.value_op(op, element, &[], &var, node, depth + 1, indent + 1);
                if bound == 0 {
                    self.line(indent + 1, &format!("{}.push({});", place, var));
                } else {
                    self.line(indent + 1, &format!("if {} < {} {{", idx, bound));
                    self.line(indent + 2, &format!("{}.push({});", place, var));
                    self.line(indent + 1, "}");
                }
                self.line(indent, "}");
            }
            Op::Max => {
                self.line(indent, &format!("{}.move_scalar::<u32>()?;", stream));
                self.line(indent, &format!("for _ in 0..{} {{", bound));
                self.value_op(op, element, &[], place, node, depth + 1, indent + 1);
                self.line(indent, "}");
            }
        }
        self.line(indent, &format!("{}.finish_consecutive()?;", stream));
    }

    // --------------------------------------------------------------
    // Struct switchboxes
    // --------------------------------------------------------------

    fn member_arm(&mut self, op: Op, member: &Member, indent: usize) {
        let stream = op.stream_var();
        let field = escape(&member.name);
        self.line(indent, &format!("{} => {{", member.id));

        if member.is_optional && op != Op::Max {
            match op {
                Op::Write => {
                    self.line(indent + 1, &format!("match self.{}.as_ref() {{", field));
                    self.line(indent + 2, "Some(value) => {");
                    self.line(indent + 3, &format!("{}.start_member(member.prop(), true)?;", stream));
                    self.value_op(
                        op,
                        &member.type_spec,
                        &member.array_dims,
                        "(*value)",
                        &NodeSource::Member,
                        0,
                        indent + 3,
                    );
                    self.line(
                        indent + 3,
                        &format!(
                            "{}.finish_member(member.prop(), true, &mut member_ids)?;",
                            stream
                        ),
                    );
                    self.line(indent + 2, "}");
                    self.line(indent + 2, "None => {");
                    self.line(
                        indent + 3,
                        &format!("{}.start_member(member.prop(), false)?;", stream),
                    );
                    self.line(
                        indent + 3,
                        &format!(
                            "{}.finish_member(member.prop(), false, &mut member_ids)?;",
                            stream
                        ),
                    );
                    self.line(indent + 2, "}");
                    self.line(indent + 1, "}");
                }
                Op::Read => {
                    let inner_ty = rust_type(
                        self.registry,
                        self.config,
                        self.scope,
                        &member.type_spec,
                        &member.array_dims,
                        false,
                        member.is_external,
                    );
                    self.line(
                        indent + 1,
                        &format!("if {}.start_member(member.prop(), true)? {{", stream),
                    );
                    self.line(
                        indent + 2,
                        &format!(
                            "let mut value: {} = {};",
                            inner_ty,
                            default_expr(&member.array_dims)
                        ),
                    );
                    self.value_op(
                        op,
                        &member.type_spec,
                        &member.array_dims,
                        "value",
                        &NodeSource::Member,
                        0,
                        indent + 2,
                    );
                    self.line(indent + 2, &format!("self.{} = Some(value);", field));
                    self.line(indent + 1, "} else {");
                    self.line(indent + 2, &format!("self.{} = None;", field));
                    self.line(indent + 1, "}");
                    self.line(
                        indent + 1,
                        &format!(
                            "{}.finish_member(member.prop(), self.{}.is_some(), &mut member_ids)?;",
                            stream, field
                        ),
                    );
                }
                Op::Max => {}
            }
            self.line(indent, "}");
            return;
        }

        self.line(
            indent + 1,
            &format!("{}.start_member(member.prop(), true)?;", stream),
        );
        let place = match op {
            Op::Max => String::new(),
            _ if member.is_external => format!("(*self.{})", field),
            _ => format!("self.{}", field),
        };
        self.value_op(
            op,
            &member.type_spec,
            &member.array_dims,
            &place,
            &NodeSource::Member,
            0,
            indent + 1,
        );
        self.line(
            indent + 1,
            &format!(
                "{}.finish_member(member.prop(), true, &mut member_ids)?;",
                stream
            ),
        );
        self.line(indent, "}");
    }

    fn emit_switchbox(&mut self, op: Op, members: &[Member], receiver: &str) {
        let stream = op.stream_var();
        self.line(1, receiver);
        self.line(2, &format!("{}.start_struct(node)?;", stream));
        self.line(2, "let mut member_ids = ::xcdr::MemberIdSet::new();");
        self.line(2, &format!("let mut entity = {}.first_entity(node)?;", stream));
        self.line(2, "while let Some(member) = entity {");
        self.line(3, "match member.member_id() {");
        for member in members {
            self.member_arm(op, member, 4);
        }
        self.line(4, &format!("_ => {}.skip_entity(member.prop())?,", stream));
        self.line(3, "}");
        self.line(3, &format!("entity = {}.next_entity(node, &member)?;", stream));
        self.line(2, "}");
        self.line(2, &format!("{}.finish_struct(node, &member_ids)", stream));
        self.line(1, "}");
    }
}

/// Resolve keylist name paths to member-id paths at generation time.
fn resolve_keylist(registry: &Registry<'_>, def: &StructDef) -> Vec<Vec<u32>> {
    if !def.keylist.is_empty() {
        let mut out = Vec::new();
        for path in &def.keylist {
            let mut ids = Vec::new();
            let mut current: Option<&StructDef> = Some(def);
            for field in path {
                let Some(struct_def) = current else {
                    break;
                };
                let Some(member) = struct_def.members.iter().find(|m| &m.name == field) else {
                    break;
                };
                ids.push(member.id);
                let (stripped, _) =
                    registry.strip_aliases(&member.type_spec, &member.array_dims);
                current = match &stripped {
                    TypeSpec::Named(name) => match registry.file.find(name) {
                        Some(Definition::Struct(next)) => Some(next),
                        _ => None,
                    },
                    _ => None,
                };
            }
            if ids.len() == path.len() {
                out.push(ids);
            } else {
                tracing::warn!("keylist path {:?} does not resolve in {}", path, def.name);
            }
        }
        return out;
    }
    def.members
        .iter()
        .filter(|m| m.is_key)
        .map(|m| vec![m.id])
        .collect()
}

pub(crate) fn emit_struct_streamable(
    registry: &Registry<'_>,
    config: &Config,
    def: &StructDef,
) -> String {
    let mut emitter = Emitter {
        registry,
        config,
        scope: &def.scope,
        out: String::new(),
    };
    let name = escape(&def.name);
    emitter.line(0, &format!("impl ::xcdr::CdrStreamable for {} {{", name));
    emitter.emit_properties_fn();
    emitter.out.push('\n');
    emitter.emit_member_properties(def.extensibility, &def.members);
    emitter.emit_key_endpoints(&resolve_keylist(registry, def));
    emitter.out.push('\n');
    emitter.emit_switchbox(
        Op::Write,
        &def.members,
        "fn write_cdr(&self, os: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.out.push('\n');
    emitter.emit_switchbox(
        Op::Read,
        &def.members,
        "fn read_cdr(&mut self, is: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.out.push('\n');
    emitter.emit_switchbox(
        Op::Max,
        &def.members,
        "fn max_cdr(xs: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.line(0, "}");
    emitter.out.push('\n');
    emitter.out
}

pub(crate) fn emit_union_streamable(
    registry: &Registry<'_>,
    config: &Config,
    def: &UnionDef,
) -> String {
    let mut emitter = Emitter {
        registry,
        config,
        scope: &def.scope,
        out: String::new(),
    };
    let name = escape(&def.name);
    let branch_name = branch_enum_name(def);
    let disc_bb = member_bit_bound(registry, &def.discriminator, &[]);
    // mutable unions are framed like appendable bodies
    let root_ext = if def.extensibility == Extensibility::Mutable {
        Extensibility::Appendable
    } else {
        def.extensibility
    };

    emitter.line(0, &format!("impl ::xcdr::CdrStreamable for {} {{", name));
    emitter.emit_properties_fn();
    emitter.out.push('\n');

    emitter.line(1, "fn member_properties() -> Vec<::xcdr::EntityProperty> {");
    emitter.line(
        2,
        &format!(
            "let mut props = vec![::xcdr::EntityProperty::root({})];",
            extensibility_expr(root_ext)
        ),
    );
    emitter.line(
        2,
        &format!(
            "props.push(::xcdr::EntityProperty::new(1, 0, false, {}, ::xcdr::Extensibility::Final, false));",
            disc_bb
        ),
    );
    emitter.line(2, "props");
    emitter.line(1, "}");
    if def.discriminator_is_key {
        emitter.emit_key_endpoints(&[vec![0]]);
    }

    // write
    emitter.out.push('\n');
    emitter.line(
        1,
        "fn write_cdr(&self, os: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.line(2, "os.start_struct(node)?;");
    emitter.line(2, "let member_ids = ::xcdr::MemberIdSet::new();");
    emit_disc_write(&mut emitter, def, 2);
    let body_indent = if def.discriminator_is_key {
        emitter.line(2, "if !os.is_key() {");
        3
    } else {
        2
    };
    emitter.line(body_indent, "match &self.branch {");
    for case in &def.cases {
        let variant = camel_case(&case.name);
        emitter.line(
            body_indent + 1,
            &format!("{}::{}(value) => {{", branch_name, variant),
        );
        emitter.value_op(
            Op::Write,
            &case.type_spec,
            &case.array_dims,
            "(*value)",
            &node_source_for(&emitter, &case.type_spec),
            0,
            body_indent + 2,
        );
        emitter.line(body_indent + 1, "}");
    }
    if !def.cases.iter().any(|case| case.is_default) {
        emitter.line(
            body_indent + 1,
            &format!("{}::Empty => {{}}", branch_name),
        );
    }
    emitter.line(body_indent, "}");
    if def.discriminator_is_key {
        emitter.line(2, "}");
    }
    emitter.line(2, "os.finish_struct(node, &member_ids)");
    emitter.line(1, "}");

    // read
    emitter.out.push('\n');
    emitter.line(
        1,
        "fn read_cdr(&mut self, is: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.line(2, "is.start_struct(node)?;");
    emitter.line(2, "let mut member_ids = ::xcdr::MemberIdSet::new();");
    emit_disc_read(&mut emitter, def, 2);
    emitter.line(2, "member_ids.insert(0);");
    if def.discriminator_is_key {
        emitter.line(2, "if is.is_key() {");
        emitter.line(3, "self.select_branch_default(discriminator);");
        emitter.line(2, "} else {");
    }
    let body_indent = if def.discriminator_is_key { 3 } else { 2 };
    emitter.line(body_indent, "self.d = discriminator;");
    emitter.line(body_indent, "match discriminator as i64 {");
    for case in def.cases.iter().filter(|case| !case.is_default) {
        let variant = camel_case(&case.name);
        let elem_ty = rust_type(
            registry,
            config,
            &def.scope,
            &case.type_spec,
            &case.array_dims,
            false,
            false,
        );
        emitter.line(
            body_indent + 1,
            &format!("{} => {{", label_pattern(&case.labels)),
        );
        emitter.line(
            body_indent + 2,
            &format!(
                "let mut value: {} = {};",
                elem_ty,
                default_expr(&case.array_dims)
            ),
        );
        emitter.value_op(
            Op::Read,
            &case.type_spec,
            &case.array_dims,
            "value",
            &node_source_for(&emitter, &case.type_spec),
            0,
            body_indent + 2,
        );
        emitter.line(
            body_indent + 2,
            &format!("self.branch = {}::{}(value);", branch_name, variant),
        );
        emitter.line(body_indent + 1, "}");
    }
    if let Some(default_case) = def.cases.iter().find(|case| case.is_default) {
        let variant = camel_case(&default_case.name);
        let elem_ty = rust_type(
            registry,
            config,
            &def.scope,
            &default_case.type_spec,
            &default_case.array_dims,
            false,
            false,
        );
        emitter.line(body_indent + 1, "_ => {");
        emitter.line(
            body_indent + 2,
            &format!(
                "let mut value: {} = {};",
                elem_ty,
                default_expr(&default_case.array_dims)
            ),
        );
        emitter.value_op(
            Op::Read,
            &default_case.type_spec,
            &default_case.array_dims,
            "value",
            &node_source_for(&emitter, &default_case.type_spec),
            0,
            body_indent + 2,
        );
        emitter.line(
            body_indent + 2,
            &format!("self.branch = {}::{}(value);", branch_name, variant),
        );
        emitter.line(body_indent + 1, "}");
    } else {
        emitter.line(
            body_indent + 1,
            &format!("_ => self.branch = {}::Empty,", branch_name),
        );
    }
    emitter.line(body_indent, "}");
    if def.discriminator_is_key {
        emitter.line(2, "}");
    }
    emitter.line(2, "is.finish_struct(node, &member_ids)");
    emitter.line(1, "}");

    // max: discriminator plus the largest branch
    emitter.out.push('\n');
    emitter.line(
        1,
        "fn max_cdr(xs: &mut ::xcdr::CdrStream<'_>, node: ::xcdr::Node<'_>) -> ::xcdr::Result<()> {",
    );
    emitter.line(2, "xs.start_struct(node)?;");
    emitter.line(2, "let member_ids = ::xcdr::MemberIdSet::new();");
    emit_disc_max(&mut emitter, def, 2);
    emitter.line(2, "let base = xs.position();");
    emitter.line(2, "let mut largest = base;");
    for case in &def.cases {
        emitter.line(2, "xs.set_position(base);");
        emitter.value_op(
            Op::Max,
            &case.type_spec,
            &case.array_dims,
            "",
            &node_source_for(&emitter, &case.type_spec),
            0,
            2,
        );
        emitter.line(2, "largest = largest.max(xs.position());");
    }
    emitter.line(2, "xs.set_position(largest);");
    emitter.line(2, "xs.finish_struct(node, &member_ids)");
    emitter.line(1, "}");
    emitter.line(0, "}");
    emitter.out.push('\n');
    emitter.out
}

fn node_source_for(emitter: &Emitter<'_>, spec: &TypeSpec) -> NodeSource {
    let (stripped, _) = emitter.registry.strip_aliases(spec, &[]);
    if let TypeSpec::Named(name) = &stripped {
        if matches!(
            emitter.registry.kind(name),
            Some(ResolvedKind::Struct) | Some(ResolvedKind::Union)
        ) {
            return NodeSource::TypeRoot(relative_path(emitter.scope, name));
        }
    }
    NodeSource::Member
}

fn emit_disc_write(emitter: &mut Emitter<'_>, def: &UnionDef, indent: usize) {
    match disc_category(emitter.registry, def) {
        DiscCategory::Scalar => emitter.line(indent, "os.write_scalar(self.d)?;"),
        DiscCategory::Enum(path) => emitter.line(
            indent,
            &format!("os.write_enum(self.d as u32, {}::BIT_BOUND)?;", path),
        ),
    }
}

fn emit_disc_read(emitter: &mut Emitter<'_>, def: &UnionDef, indent: usize) {
    match disc_category(emitter.registry, def) {
        DiscCategory::Scalar => {
            emitter.line(indent, "let discriminator = is.read_scalar()?;");
        }
        DiscCategory::Enum(path) => {
            emitter.line(
                indent,
                &format!(
                    "let discriminator = {}::from_wire(is.read_enum({}::BIT_BOUND)?);",
                    path, path
                ),
            );
        }
    }
}

fn emit_disc_max(emitter: &mut Emitter<'_>, def: &UnionDef, indent: usize) {
    match disc_category(emitter.registry, def) {
        DiscCategory::Scalar => {
            let (stripped, _) = emitter.registry.strip_aliases(&def.discriminator, &[]);
            let ty = scalar_type(&stripped).unwrap_or("u32");
            emitter.line(indent, &format!("xs.move_scalar::<{}>()?;", ty));
        }
        DiscCategory::Enum(path) => {
            emitter.line(indent, &format!("xs.write_enum(0, {}::BIT_BOUND)?;", path));
        }
    }
}

enum DiscCategory {
    Scalar,
    Enum(String),
}

fn disc_category(registry: &Registry<'_>, def: &UnionDef) -> DiscCategory {
    let (stripped, _) = registry.strip_aliases(&def.discriminator, &[]);
    if let TypeSpec::Named(name) = &stripped {
        if matches!(registry.kind(name), Some(ResolvedKind::Enum { .. })) {
            return DiscCategory::Enum(relative_path(&def.scope, name));
        }
    }
    DiscCategory::Scalar
}
