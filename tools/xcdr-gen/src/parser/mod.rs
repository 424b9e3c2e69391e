// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive-descent parser for the IDL subset: modules, structs, unions,
//! enums, bitmasks, typedefs, integer constants, the DDS annotations the
//! streamer cares about, and `#pragma keylist`.

pub mod ast;
pub mod lexer;

use ast::{
    BitmaskDef, Definition, EnumDef, Enumerator, Extensibility, IdlFile, Member, Primitive,
    StructDef, TypeSpec, TypedefDef, UnionCase, UnionDef,
};
use lexer::{tokenize, Spanned, Token};
use std::collections::HashMap;
use std::fmt;

/// Parse failure with 1-based source position.
#[derive(Debug)]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<lexer::LexError> for ParseError {
    fn from(err: lexer::LexError) -> Self {
        ParseError {
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}

type Result<T> = core::result::Result<T, ParseError>;

/// Parse one IDL source into its definition list.
pub fn parse(input: &str) -> Result<IdlFile> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope: Vec::new(),
        known: Vec::new(),
        consts: HashMap::new(),
        enum_values: HashMap::new(),
        file: IdlFile::default(),
    };
    parser.parse_file()?;
    Ok(parser.file)
}

/// Annotations collected in front of a definition or member.
#[derive(Clone, Debug, Default)]
struct Annotations {
    key: bool,
    optional: bool,
    must_understand: bool,
    external: bool,
    nested: bool,
    default_literal: bool,
    id: Option<u32>,
    bit_bound: Option<u32>,
    extensibility: Option<Extensibility>,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    scope: Vec<String>,
    /// Fully scoped names of every type seen so far (forward declarations
    /// included), for reference resolution.
    known: Vec<String>,
    consts: HashMap<String, i64>,
    /// Fully scoped enumerator name to value, for union labels.
    enum_values: HashMap<String, i64>,
    file: IdlFile,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn here(&self) -> (u32, u32) {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or((0, 0), |s| (s.line, s.column))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.here();
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.peek().is_some_and(|s| s.token == *expected) {
            self.pos += 1;
            return Ok(());
        }
        match self.peek() {
            Some(spanned) => {
                Err(self.error(format!("expected {}, found {}", expected, spanned.token)))
            }
            None => Err(self.error(format!("expected {}, found end of input", expected))),
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().map(|s| &s.token) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.bump() {
            Some(Spanned {
                token: Token::Identifier(name),
                ..
            }) => Ok(name),
            Some(spanned) => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {}", spanned.token)))
            }
            None => Err(self.error("expected identifier, found end of input")),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Spanned {
                token: Token::Identifier(name),
                ..
            }) if name == keyword => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Spanned {
                token: Token::Identifier(name),
                ..
            }) if name == keyword
        )
    }

    // --------------------------------------------------------------
    // Top level
    // --------------------------------------------------------------

    fn parse_file(&mut self) -> Result<()> {
        while self.peek().is_some() {
            self.parse_item()?;
        }
        Ok(())
    }

    fn parse_item(&mut self) -> Result<()> {
        if self.eat(&Token::Hash) {
            return self.parse_pragma();
        }
        let annotations = self.parse_annotations()?;
        if self.eat_keyword("module") {
            return self.parse_module();
        }
        if self.eat_keyword("struct") {
            return self.parse_struct(annotations);
        }
        if self.eat_keyword("union") {
            return self.parse_union(annotations);
        }
        if self.eat_keyword("enum") {
            return self.parse_enum(annotations);
        }
        if self.eat_keyword("bitmask") {
            return self.parse_bitmask(annotations);
        }
        if self.eat_keyword("typedef") {
            return self.parse_typedef();
        }
        if self.eat_keyword("const") {
            return self.parse_const();
        }
        match self.peek() {
            Some(spanned) => Err(self.error(format!("expected a definition, found {}", spanned.token))),
            None => Err(self.error("expected a definition, found end of input")),
        }
    }

    fn parse_module(&mut self) -> Result<()> {
        let name = self.expect_identifier()?;
        self.expect(&Token::LBrace)?;
        self.scope.push(name);
        while !self.eat(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.error("unterminated module body"));
            }
            self.parse_item()?;
        }
        self.scope.pop();
        self.expect(&Token::Semicolon)?;
        Ok(())
    }

    // --------------------------------------------------------------
    // Annotations
    // --------------------------------------------------------------

    fn parse_annotations(&mut self) -> Result<Annotations> {
        let mut out = Annotations::default();
        while self.eat(&Token::At) {
            let name = self.expect_identifier()?;
            match name.as_str() {
                "key" => out.key = true,
                "optional" => out.optional = true,
                "must_understand" => out.must_understand = true,
                "external" => out.external = true,
                "nested" => out.nested = true,
                "default_literal" => out.default_literal = true,
                "topic" => {}
                "id" => out.id = Some(self.parse_paren_u32()?),
                "bit_bound" => out.bit_bound = Some(self.parse_paren_u32()?),
                "final" => out.extensibility = Some(Extensibility::Final),
                "appendable" => out.extensibility = Some(Extensibility::Appendable),
                "mutable" => out.extensibility = Some(Extensibility::Mutable),
                "extensibility" => {
                    self.expect(&Token::LParen)?;
                    let kind = self.expect_identifier()?;
                    out.extensibility = Some(match kind.as_str() {
                        "FINAL" => Extensibility::Final,
                        "APPENDABLE" => Extensibility::Appendable,
                        "MUTABLE" => Extensibility::Mutable,
                        other => {
                            return Err(
                                self.error(format!("unknown extensibility kind `{}`", other))
                            )
                        }
                    });
                    self.expect(&Token::RParen)?;
                }
                "autoid" => {
                    self.expect(&Token::LParen)?;
                    let kind = self.expect_identifier()?;
                    if kind != "SEQUENTIAL" {
                        return Err(
                            self.error(format!("unsupported autoid kind `{}`", kind))
                        );
                    }
                    self.expect(&Token::RParen)?;
                }
                other => return Err(self.error(format!("unknown annotation `@{}`", other))),
            }
        }
        Ok(out)
    }

    fn parse_paren_u32(&mut self) -> Result<u32> {
        self.expect(&Token::LParen)?;
        let value = self.parse_const_u32()?;
        self.expect(&Token::RParen)?;
        Ok(value)
    }

    // --------------------------------------------------------------
    // Types
    // --------------------------------------------------------------

    fn parse_type_spec(&mut self) -> Result<TypeSpec> {
        if self.eat_keyword("sequence") {
            self.expect(&Token::LAngle)?;
            let element = self.parse_type_spec()?;
            let bound = if self.eat(&Token::Comma) {
                self.parse_const_u32()?
            } else {
                0
            };
            self.expect(&Token::RAngle)?;
            return Ok(TypeSpec::Sequence {
                element: Box::new(element),
                bound,
            });
        }
        if self.eat_keyword("string") {
            let bound = if self.eat(&Token::LAngle) {
                let bound = self.parse_const_u32()?;
                self.expect(&Token::RAngle)?;
                bound
            } else {
                0
            };
            return Ok(TypeSpec::String { bound });
        }
        if self.eat_keyword("unsigned") {
            if self.eat_keyword("short") {
                return Ok(TypeSpec::Primitive(Primitive::Uint16));
            }
            if self.eat_keyword("long") {
                if self.eat_keyword("long") {
                    return Ok(TypeSpec::Primitive(Primitive::Uint64));
                }
                return Ok(TypeSpec::Primitive(Primitive::Uint32));
            }
            return Err(self.error("expected `short` or `long` after `unsigned`"));
        }
        if self.eat_keyword("long") {
            if self.eat_keyword("long") {
                return Ok(TypeSpec::Primitive(Primitive::Int64));
            }
            if self.peek_keyword("double") {
                return Err(self.error("`long double` has no mapping"));
            }
            return Ok(TypeSpec::Primitive(Primitive::Int32));
        }
        let simple = [
            ("boolean", Primitive::Bool),
            ("octet", Primitive::Octet),
            ("char", Primitive::Char),
            ("short", Primitive::Int16),
            ("float", Primitive::Float32),
            ("double", Primitive::Float64),
            ("int8", Primitive::Int8),
            ("uint8", Primitive::Uint8),
            ("int16", Primitive::Int16),
            ("uint16", Primitive::Uint16),
            ("int32", Primitive::Int32),
            ("uint32", Primitive::Uint32),
            ("int64", Primitive::Int64),
            ("uint64", Primitive::Uint64),
        ];
        for (keyword, primitive) in simple {
            if self.eat_keyword(keyword) {
                return Ok(TypeSpec::Primitive(primitive));
            }
        }
        let raw = self.parse_scoped_name()?;
        let resolved = self.resolve_name(&raw)?;
        Ok(TypeSpec::Named(resolved))
    }

    fn parse_scoped_name(&mut self) -> Result<String> {
        let mut parts = Vec::new();
        if self.eat(&Token::DoubleColon) {
            parts.push(String::new()); // rooted name
        }
        parts.push(self.expect_identifier()?);
        while self.eat(&Token::DoubleColon) {
            parts.push(self.expect_identifier()?);
        }
        Ok(parts.join("::"))
    }

    /// Resolve a possibly-relative reference against the enclosing scopes.
    fn resolve_name(&self, raw: &str) -> Result<String> {
        if let Some(rooted) = raw.strip_prefix("::") {
            if self.known.iter().any(|k| k == rooted) {
                return Ok(rooted.to_string());
            }
            return Err(self.error(format!("unknown type `{}`", raw)));
        }
        for depth in (0..=self.scope.len()).rev() {
            let mut candidate = self.scope[..depth].join("::");
            if !candidate.is_empty() {
                candidate.push_str("::");
            }
            candidate.push_str(raw);
            if self.known.iter().any(|k| k == &candidate) {
                return Ok(candidate);
            }
        }
        Err(self.error(format!("unknown type `{}`", raw)))
    }

    fn parse_const_u32(&mut self) -> Result<u32> {
        let value = self.parse_const_i64()?;
        u32::try_from(value).map_err(|_| self.error("constant out of range"))
    }

    fn parse_const_i64(&mut self) -> Result<i64> {
        match self.bump() {
            Some(Spanned {
                token: Token::IntLiteral(value),
                ..
            }) => Ok(value),
            Some(Spanned {
                token: Token::CharLiteral(value),
                ..
            }) => Ok(i64::from(value)),
            Some(Spanned {
                token: Token::Identifier(name),
                ..
            }) => {
                if name == "TRUE" {
                    return Ok(1);
                }
                if name == "FALSE" {
                    return Ok(0);
                }
                self.pos -= 1;
                let raw = self.parse_scoped_name()?;
                self.lookup_const(&raw)
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected a constant expression"))
            }
            None => Err(self.error("expected a constant expression")),
        }
    }

    fn lookup_const(&self, raw: &str) -> Result<i64> {
        for depth in (0..=self.scope.len()).rev() {
            let mut candidate = self.scope[..depth].join("::");
            if !candidate.is_empty() {
                candidate.push_str("::");
            }
            candidate.push_str(raw);
            if let Some(value) = self.consts.get(&candidate) {
                return Ok(*value);
            }
            if let Some(value) = self.enum_values.get(&candidate) {
                return Ok(*value);
            }
        }
        Err(self.error(format!("unknown constant `{}`", raw)))
    }

    fn scoped(&self, name: &str) -> String {
        let mut parts = self.scope.clone();
        parts.push(name.to_string());
        parts.join("::")
    }

    // --------------------------------------------------------------
    // Definitions
    // --------------------------------------------------------------

    fn parse_const(&mut self) -> Result<()> {
        let _type_spec = self.parse_type_spec()?;
        let name = self.expect_identifier()?;
        self.expect(&Token::Equals)?;
        let value = self.parse_const_i64()?;
        self.expect(&Token::Semicolon)?;
        self.consts.insert(self.scoped(&name), value);
        Ok(())
    }

    fn parse_typedef(&mut self) -> Result<()> {
        let type_spec = self.parse_type_spec()?;
        let name = self.expect_identifier()?;
        let array_dims = self.parse_array_dims()?;
        self.expect(&Token::Semicolon)?;
        self.known.push(self.scoped(&name));
        self.file.definitions.push(Definition::Typedef(TypedefDef {
            name,
            scope: self.scope.clone(),
            type_spec,
            array_dims,
        }));
        Ok(())
    }

    fn parse_array_dims(&mut self) -> Result<Vec<u32>> {
        let mut dims = Vec::new();
        while self.eat(&Token::LBracket) {
            dims.push(self.parse_const_u32()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(dims)
    }

    fn parse_struct(&mut self, annotations: Annotations) -> Result<()> {
        let name = self.expect_identifier()?;
        // forward declaration
        if self.eat(&Token::Semicolon) {
            let scoped = self.scoped(&name);
            if !self.known.contains(&scoped) {
                self.known.push(scoped);
            }
            return Ok(());
        }
        let scoped = self.scoped(&name);
        if !self.known.contains(&scoped) {
            self.known.push(scoped);
        }
        self.expect(&Token::LBrace)?;

        let mut members = Vec::new();
        let mut next_id = 0u32;
        while !self.eat(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.error("unterminated struct body"));
            }
            let member_annotations = self.parse_annotations()?;
            let type_spec = self.parse_type_spec()?;
            loop {
                let member_name = self.expect_identifier()?;
                let array_dims = self.parse_array_dims()?;
                let id = member_annotations.id.unwrap_or(next_id);
                next_id = id + 1;
                members.push(Member {
                    name: member_name,
                    type_spec: type_spec.clone(),
                    array_dims,
                    id,
                    is_key: member_annotations.key,
                    is_optional: member_annotations.optional,
                    must_understand: member_annotations.must_understand,
                    is_external: member_annotations.external,
                });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semicolon)?;
        }
        self.expect(&Token::Semicolon)?;

        self.file.definitions.push(Definition::Struct(StructDef {
            name,
            scope: self.scope.clone(),
            extensibility: annotations.extensibility.unwrap_or_default(),
            members,
            nested: annotations.nested,
            keylist: Vec::new(),
        }));
        Ok(())
    }

    fn parse_union(&mut self, annotations: Annotations) -> Result<()> {
        let name = self.expect_identifier()?;
        let scoped = self.scoped(&name);
        if !self.known.contains(&scoped) {
            self.known.push(scoped);
        }
        if !self.eat_keyword("switch") {
            return Err(self.error("expected `switch` after the union name"));
        }
        self.expect(&Token::LParen)?;
        let switch_annotations = self.parse_annotations()?;
        let discriminator = self.parse_type_spec()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::LBrace)?;

        let mut cases: Vec<UnionCase> = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.error("unterminated union body"));
            }
            let mut labels = Vec::new();
            let mut is_default = false;
            loop {
                if self.eat_keyword("case") {
                    labels.push(self.parse_const_i64()?);
                    self.expect(&Token::Colon)?;
                } else if self.eat_keyword("default") {
                    is_default = true;
                    self.expect(&Token::Colon)?;
                } else {
                    break;
                }
            }
            if labels.is_empty() && !is_default {
                return Err(self.error("expected `case` or `default`"));
            }
            let type_spec = self.parse_type_spec()?;
            let case_name = self.expect_identifier()?;
            let array_dims = self.parse_array_dims()?;
            self.expect(&Token::Semicolon)?;
            cases.push(UnionCase {
                labels,
                is_default,
                name: case_name,
                type_spec,
                array_dims,
            });
        }
        self.expect(&Token::Semicolon)?;

        self.file.definitions.push(Definition::Union(UnionDef {
            name,
            scope: self.scope.clone(),
            extensibility: annotations.extensibility.unwrap_or_default(),
            discriminator,
            discriminator_is_key: switch_annotations.key,
            cases,
            nested: annotations.nested,
        }));
        Ok(())
    }

    fn parse_enum(&mut self, annotations: Annotations) -> Result<()> {
        let name = self.expect_identifier()?;
        let scoped = self.scoped(&name);
        if !self.known.contains(&scoped) {
            self.known.push(scoped.clone());
        }
        self.expect(&Token::LBrace)?;
        let mut enumerators = Vec::new();
        let mut value = 0u32;
        loop {
            let enumerator_annotations = self.parse_annotations()?;
            let enumerator = self.expect_identifier()?;
            // enumerators live in the scope enclosing the enum
            self.enum_values
                .insert(self.scoped(&enumerator), i64::from(value));
            enumerators.push(Enumerator {
                name: enumerator,
                value,
                is_default: enumerator_annotations.default_literal,
            });
            value += 1;
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        self.expect(&Token::Semicolon)?;
        self.file.definitions.push(Definition::Enum(EnumDef {
            name,
            scope: self.scope.clone(),
            bit_bound: annotations.bit_bound.unwrap_or(32),
            enumerators,
        }));
        Ok(())
    }

    fn parse_bitmask(&mut self, annotations: Annotations) -> Result<()> {
        let name = self.expect_identifier()?;
        let scoped = self.scoped(&name);
        if !self.known.contains(&scoped) {
            self.known.push(scoped);
        }
        self.expect(&Token::LBrace)?;
        let mut bits = Vec::new();
        let mut position = 0u32;
        loop {
            let mut bit_position = position;
            if self.eat(&Token::At) {
                let annotation = self.expect_identifier()?;
                if annotation != "position" {
                    return Err(
                        self.error(format!("unknown annotation `@{}` on bit flag", annotation))
                    );
                }
                bit_position = self.parse_paren_u32()?;
            }
            let flag = self.expect_identifier()?;
            bits.push((flag, bit_position));
            position = bit_position + 1;
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        self.expect(&Token::Semicolon)?;
        self.file.definitions.push(Definition::Bitmask(BitmaskDef {
            name,
            scope: self.scope.clone(),
            bit_bound: annotations.bit_bound.unwrap_or(32),
            bits,
        }));
        Ok(())
    }

    // --------------------------------------------------------------
    // Pragmas
    // --------------------------------------------------------------

    fn parse_pragma(&mut self) -> Result<()> {
        let pragma_line = self.tokens.get(self.pos).map_or(0, |s| s.line);
        let kind = self.expect_identifier()?;
        if kind != "pragma" {
            return Err(self.error(format!("unknown directive `#{}`", kind)));
        }
        let pragma = self.expect_identifier()?;
        if pragma != "keylist" {
            // other pragmas are skipped to the end of the line
            while self
                .peek()
                .is_some_and(|s| s.line == pragma_line)
            {
                self.bump();
            }
            return Ok(());
        }
        let type_name = self.expect_identifier()?;
        let mut paths: Vec<Vec<String>> = Vec::new();
        while self.peek().is_some_and(|s| s.line == pragma_line) {
            let mut path = vec![self.expect_identifier()?];
            while self.eat(&Token::Dot) {
                path.push(self.expect_identifier()?);
            }
            paths.push(path);
        }
        let scope = self.scope.clone();
        let target = self.file.definitions.iter_mut().find_map(|def| match def {
            Definition::Struct(s) if s.name == type_name && s.scope == scope => Some(s),
            _ => None,
        });
        match target {
            Some(def) => {
                def.keylist = paths;
                Ok(())
            }
            None => Err(self.error(format!("keylist names unknown struct `{}`", type_name))),
        }
    }
}
