// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Abstract syntax for the parsed IDL subset.

/// A primitive IDL type with a fixed Rust mapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Octet,
    Char,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl Primitive {
    /// The Rust spelling of the mapped type.
    pub fn rust_type(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Octet | Primitive::Char | Primitive::Uint8 => "u8",
            Primitive::Int8 => "i8",
            Primitive::Int16 => "i16",
            Primitive::Uint16 => "u16",
            Primitive::Int32 => "i32",
            Primitive::Uint32 => "u32",
            Primitive::Int64 => "i64",
            Primitive::Uint64 => "u64",
            Primitive::Float32 => "f32",
            Primitive::Float64 => "f64",
        }
    }

    pub fn size(self) -> usize {
        match self {
            Primitive::Bool
            | Primitive::Octet
            | Primitive::Char
            | Primitive::Int8
            | Primitive::Uint8 => 1,
            Primitive::Int16 | Primitive::Uint16 => 2,
            Primitive::Int32 | Primitive::Uint32 | Primitive::Float32 => 4,
            Primitive::Int64 | Primitive::Uint64 | Primitive::Float64 => 8,
        }
    }
}

/// A type expression as written in member, case or typedef position.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    Primitive(Primitive),
    /// `string` / `string<N>`; bound 0 means unbounded.
    String { bound: u32 },
    /// `sequence<T>` / `sequence<T, N>`; bound 0 means unbounded.
    Sequence { element: Box<TypeSpec>, bound: u32 },
    /// Reference to a named (constructed or aliased) type, fully scoped.
    Named(String),
}

/// Extensibility of a constructed type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Extensibility {
    #[default]
    Final,
    Appendable,
    Mutable,
}

/// One struct member declarator with its annotations applied.
#[derive(Clone, Debug)]
pub struct Member {
    pub name: String,
    pub type_spec: TypeSpec,
    /// Fixed array dimensions attached to the declarator, outermost first.
    pub array_dims: Vec<u32>,
    pub id: u32,
    pub is_key: bool,
    pub is_optional: bool,
    pub must_understand: bool,
    pub is_external: bool,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub scope: Vec<String>,
    pub extensibility: Extensibility,
    pub members: Vec<Member>,
    /// `@nested` types are members only; no topic traits are emitted.
    pub nested: bool,
    /// Key paths from `#pragma keylist`, as member-name paths.
    pub keylist: Vec<Vec<String>>,
}

/// One union case; `labels` holds the evaluated label values.
#[derive(Clone, Debug)]
pub struct UnionCase {
    pub labels: Vec<i64>,
    pub is_default: bool,
    pub name: String,
    pub type_spec: TypeSpec,
    pub array_dims: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct UnionDef {
    pub name: String,
    pub scope: Vec<String>,
    pub extensibility: Extensibility,
    pub discriminator: TypeSpec,
    pub discriminator_is_key: bool,
    pub cases: Vec<UnionCase>,
    pub nested: bool,
}

#[derive(Clone, Debug)]
pub struct Enumerator {
    pub name: String,
    pub value: u32,
    pub is_default: bool,
}

#[derive(Clone, Debug)]
pub struct EnumDef {
    pub name: String,
    pub scope: Vec<String>,
    /// 8, 16 or 32.
    pub bit_bound: u32,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Clone, Debug)]
pub struct BitmaskDef {
    pub name: String,
    pub scope: Vec<String>,
    /// 8, 16, 32 or 64.
    pub bit_bound: u32,
    /// Flag name and bit position.
    pub bits: Vec<(String, u32)>,
}

#[derive(Clone, Debug)]
pub struct TypedefDef {
    pub name: String,
    pub scope: Vec<String>,
    pub type_spec: TypeSpec,
    pub array_dims: Vec<u32>,
}

/// Every definition the generator emits code for, in declaration order.
#[derive(Clone, Debug)]
pub enum Definition {
    Struct(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
    Bitmask(BitmaskDef),
    Typedef(TypedefDef),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Struct(d) => &d.name,
            Definition::Union(d) => &d.name,
            Definition::Enum(d) => &d.name,
            Definition::Bitmask(d) => &d.name,
            Definition::Typedef(d) => &d.name,
        }
    }

    pub fn scope(&self) -> &[String] {
        match self {
            Definition::Struct(d) => &d.scope,
            Definition::Union(d) => &d.scope,
            Definition::Enum(d) => &d.scope,
            Definition::Bitmask(d) => &d.scope,
            Definition::Typedef(d) => &d.scope,
        }
    }

    /// Fully scoped IDL name, `::`-separated.
    pub fn scoped_name(&self) -> String {
        let mut parts = self.scope().to_vec();
        parts.push(self.name().to_string());
        parts.join("::")
    }
}

/// A parsed IDL file: flat definition list plus symbol information.
#[derive(Clone, Debug, Default)]
pub struct IdlFile {
    pub definitions: Vec<Definition>,
}

impl IdlFile {
    /// Look a definition up by its fully scoped name.
    pub fn find(&self, scoped_name: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|def| def.scoped_name() == scoped_name)
    }
}
