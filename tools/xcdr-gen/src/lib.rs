// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # xcdr-gen
//!
//! IDL-to-Rust code generator for the `xcdr` serialization core. For every
//! input IDL file it emits one Rust module containing:
//!
//! - the value types (structs with accessors, unions over a branch sum
//!   type, enums with wire conversion, bitmasks, typedefs),
//! - the `CdrStreamable` implementations whose bodies are property-driven
//!   switchboxes over member ids,
//! - the property-tree builders and key-endpoint maps,
//! - the `TopicType` traits and a registration helper.
//!
//! Container mappings (sequences, strings, arrays, optionals, external
//! members) are injectable through CLI template flags.

pub mod codegen;
pub mod config;
pub mod parser;

use anyhow::Context;
use std::path::Path;

/// Generate the Rust module for one IDL file and write it next to the
/// configured output directory. Returns the output path.
pub fn generate_file(
    input: &Path,
    config: &config::Config,
) -> anyhow::Result<std::path::PathBuf> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("generated");

    let parsed = parser::parse(&source).map_err(|err| {
        anyhow::anyhow!("{}:{}", input.display(), err)
    })?;
    tracing::info!(
        "parsed {}: {} definitions",
        input.display(),
        parsed.definitions.len()
    );

    let generated = codegen::generate(&parsed, config, &format!("{}.idl", stem));
    let output = config.output_dir.join(format!("{}.rs", stem));
    std::fs::write(&output, generated)
        .with_context(|| format!("cannot write {}", output.display()))?;
    tracing::info!("wrote {}", output.display());
    Ok(output)
}

/// Generate from in-memory IDL source; used by tests and embedders.
pub fn generate_source(source: &str, config: &config::Config) -> Result<String, parser::ParseError> {
    let parsed = parser::parse(source)?;
    Ok(codegen::generate(&parsed, config, "input.idl"))
}
