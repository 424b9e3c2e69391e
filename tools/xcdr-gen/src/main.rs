// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::env;
use std::path::PathBuf;
use xcdr_gen::config::Config;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_help();
        return;
    }

    let mut config = Config::default();
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return;
            }
            flag if flag.starts_with("--") => {
                let Some(value) = iter.next() else {
                    eprintln!("[ERROR] flag {} expects a value", flag);
                    std::process::exit(2);
                };
                if !config.apply_flag(&flag[2..], value) {
                    eprintln!("[ERROR] unknown flag {}", flag);
                    std::process::exit(2);
                }
            }
            input => inputs.push(PathBuf::from(input)),
        }
    }

    if inputs.is_empty() {
        eprintln!("[ERROR] no input IDL files given");
        print_help();
        std::process::exit(2);
    }

    for input in &inputs {
        if let Err(e) = xcdr_gen::generate_file(input, &config) {
            eprintln!("[ERROR] {:#}", e);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!("xcdr-gen");
    println!();
    println!("USAGE:");
    println!("    xcdr-gen [OPTIONS] <FILE.idl>...");
    println!();
    println!("OPTIONS:");
    println!("    --output-dir <DIR>                   Where generated .rs files land (default .)");
    println!("    --sequence-template <FMT>            Mapping for sequence<T> ({{TYPE}})");
    println!("    --sequence-include <USE>             `use` line for the sequence mapping");
    println!("    --bounded-sequence-template <FMT>    Mapping for sequence<T, N> ({{TYPE}}, {{BOUND}})");
    println!("    --bounded-sequence-include <USE>");
    println!("    --string-template <FMT>              Mapping for string");
    println!("    --string-include <USE>");
    println!("    --bounded-string-template <FMT>      Mapping for string<N> ({{BOUND}})");
    println!("    --bounded-string-include <USE>");
    println!("    --array-template <FMT>               Mapping for T[N] ({{TYPE}}, {{DIMENSION}})");
    println!("    --array-include <USE>");
    println!("    --optional-template <FMT>            Mapping for @optional members ({{TYPE}})");
    println!("    --optional-include <USE>");
    println!("    --external-template <FMT>            Mapping for @external members ({{TYPE}})");
    println!("    --external-include <USE>");
    println!("    --union-getter-by-ref <BOOL>         Union branch getters return &T (default true)");
    println!();
    println!("EXAMPLES:");
    println!("    xcdr-gen --output-dir src/generated sensors.idl");
    println!();
}
