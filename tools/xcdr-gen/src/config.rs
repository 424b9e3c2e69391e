// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generator configuration: container type mappings and output placement.
//!
//! Every container mapping is a format string with `{TYPE}`, `{DIMENSION}`
//! and `{BOUND}` placeholders plus an optional `use` directive injected at
//! the top of the generated module. The defaults map to the standard
//! library; deployments with custom containers override them per flag.

/// One injectable container mapping.
#[derive(Clone, Debug)]
pub struct Template {
    /// Format string; `{TYPE}`, `{DIMENSION}` and `{BOUND}` are expanded.
    pub format: String,
    /// `use` line emitted once when the mapping is used, if any.
    pub include: Option<String>,
}

impl Template {
    fn new(format: &str) -> Self {
        Template {
            format: format.to_string(),
            include: None,
        }
    }

    /// Expand the placeholders against a concrete element type.
    pub fn expand(&self, element: &str, dimension: &str, bound: u32) -> String {
        self.format
            .replace("{TYPE}", element)
            .replace("{DIMENSION}", dimension)
            .replace("{BOUND}", &bound.to_string())
    }
}

/// The full set of container mappings plus output options.
#[derive(Clone, Debug)]
pub struct Config {
    pub sequence: Template,
    pub bounded_sequence: Template,
    pub string: Template,
    pub bounded_string: Template,
    pub array: Template,
    pub optional: Template,
    pub external: Template,
    /// Union branch getters return `&T` when set; cloned values otherwise.
    pub union_getter_by_ref: bool,
    pub output_dir: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sequence: Template::new("Vec<{TYPE}>"),
            bounded_sequence: Template::new("Vec<{TYPE}>"),
            string: Template::new("String"),
            bounded_string: Template::new("String"),
            array: Template::new("[{TYPE}; {DIMENSION}]"),
            optional: Template::new("Option<{TYPE}>"),
            external: Template::new("Box<{TYPE}>"),
            union_getter_by_ref: true,
            output_dir: std::path::PathBuf::from("."),
        }
    }
}

impl Config {
    /// Apply one `--flag value` pair; returns false for unknown flags.
    pub fn apply_flag(&mut self, flag: &str, value: &str) -> bool {
        match flag {
            "sequence-template" => self.sequence.format = value.to_string(),
            "sequence-include" => self.sequence.include = Some(value.to_string()),
            "bounded-sequence-template" => self.bounded_sequence.format = value.to_string(),
            "bounded-sequence-include" => self.bounded_sequence.include = Some(value.to_string()),
            "string-template" => self.string.format = value.to_string(),
            "string-include" => self.string.include = Some(value.to_string()),
            "bounded-string-template" => self.bounded_string.format = value.to_string(),
            "bounded-string-include" => self.bounded_string.include = Some(value.to_string()),
            "array-template" => self.array.format = value.to_string(),
            "array-include" => self.array.include = Some(value.to_string()),
            "optional-template" => self.optional.format = value.to_string(),
            "optional-include" => self.optional.include = Some(value.to_string()),
            "external-template" => self.external.format = value.to_string(),
            "external-include" => self.external.include = Some(value.to_string()),
            "union-getter-by-ref" => self.union_getter_by_ref = value != "false",
            "output-dir" => self.output_dir = std::path::PathBuf::from(value),
            _ => return false,
        }
        true
    }

    /// The `use` directives required by the active mappings.
    pub fn includes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for template in [
            &self.sequence,
            &self.bounded_sequence,
            &self.string,
            &self.bounded_string,
            &self.array,
            &self.optional,
            &self.external,
        ] {
            if let Some(include) = template.include.as_deref() {
                if !out.contains(&include) {
                    out.push(include);
                }
            }
        }
        out
    }
}
