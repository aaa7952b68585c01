//! Brio
//!
//! A statically checked scripting language with structural interfaces,
//! function overloading and generic enums, executed by a tree-walking
//! evaluator.

mod frontend;
mod interp;
mod scope;
mod stdlib;
mod types;
mod utils;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use frontend::ast::SourceFile;
use frontend::{parse_source, Sources, TypeChecker, TypeError};
use interp::Interpreter;

/// Brio interpreter
#[derive(Parser, Debug)]
#[command(name = "brio")]
#[command(version = "0.1.0")]
#[command(about = "Brio - a statically checked scripting language")]
struct Cli {
    /// Input source file (.brio)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Type-check only, without evaluating
    #[arg(long)]
    check: bool,

    /// Print diagnostics as JSON on stdout instead of text on stderr
    #[arg(long)]
    emit_diagnostics_json: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut sources = Sources::new();
    let root = load_program(&cli.input, &mut sources)?;
    let sources = Rc::new(sources);

    let mut checker = TypeChecker::new(Rc::clone(&sources));
    checker.check_file(&root);
    debug!("checked {} with {} diagnostic(s)", cli.input.display(), checker.diagnostics.len());

    if !checker.diagnostics.is_empty() {
        report_diagnostics(&checker.diagnostics, cli.emit_diagnostics_json)?;
        process::exit(1);
    }
    if cli.check {
        return Ok(());
    }

    let mut interpreter = Interpreter::new(sources);
    interpreter
        .run_file(&root)
        .map_err(|e| anyhow!("{e}").context(format!("evaluating {}", cli.input.display())))
}

fn report_diagnostics(diagnostics: &[TypeError], as_json: bool) -> Result<()> {
    if as_json {
        let reports: Vec<_> = diagnostics.iter().map(TypeError::report).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for diagnostic in diagnostics {
            eprintln!("{diagnostic}");
        }
    }
    Ok(())
}

/// Parse the entry file and, recursively, every file its imports name.
/// A dotted import path `a.b.c` maps to `a/b/c.brio` relative to the
/// entry file's directory.
fn load_program(input: &Path, sources: &mut Sources) -> Result<Rc<SourceFile>> {
    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let root = parse_file(input)?;
    let mut pending: Vec<String> = root.imports.iter().map(|i| i.path.clone()).collect();
    let mut loaded = 0usize;
    while let Some(path) = pending.pop() {
        if sources.contains(&path) {
            continue;
        }
        let file_path = base.join(path.replace('.', "/")).with_extension("brio");
        let file = parse_file(&file_path)
            .with_context(|| format!("resolving import {path}"))?;
        pending.extend(file.imports.iter().map(|i| i.path.clone()));
        sources.register(path, file);
        loaded += 1;
    }
    debug!("loaded {loaded} imported source file(s)");
    Ok(root)
}

fn parse_file(path: &Path) -> Result<Rc<SourceFile>> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match parse_source(&source) {
        Ok(file) => Ok(Rc::new(file)),
        Err(e) => bail!("{}: {e}", path.display()),
    }
}
