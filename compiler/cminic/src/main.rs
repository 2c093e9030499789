//! CLI entry point: reads a C-subset source file, lexes, parses, and emits
//! x86-64 assembly, mirroring the source compiler's `argv[1]`-driven
//! pipeline with an actual argument parser bolted on.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, ValueEnum};
use cminic_session::{Diagnostic, Source};
use tracing::instrument;

/// What kind of output to produce. A closed enum so adding a future kind
/// (e.g. an object file) doesn't change the shape of existing call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmitKind {
    Asm,
}

/// A C-subset-to-x86-64 compiler.
#[derive(Debug, ClapParser)]
#[command(name = "cminic", version, about)]
struct Cli {
    /// Path to the C source file to compile.
    source: PathBuf,

    /// Where to write the output. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to emit.
    #[arg(long, value_enum, default_value_t = EmitKind::Asm)]
    emit: EmitKind,
}

fn main() -> ExitCode {
    if let Err(err) = cminic_log::Logger::init_logger(cminic_log::LoggerConfig::from_env("CMINIC")) {
        eprintln!("cminic: failed to initialize logging: {err}");
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Fatal::Diagnostic(source, diag)) => {
            eprintln!("{}", diag.render(&source));
            ExitCode::FAILURE
        }
        Err(Fatal::Io(msg)) => {
            eprintln!("cminic: {msg}");
            ExitCode::FAILURE
        }
    }
}

enum Fatal {
    Diagnostic(Source, Diagnostic),
    Io(String),
}

#[instrument(skip(cli))]
fn run(cli: &Cli) -> Result<(), Fatal> {
    let EmitKind::Asm = cli.emit;

    let text = fs::read_to_string(&cli.source)
        .map_err(|e| Fatal::Io(format!("cannot read '{}': {e}", cli.source.display())))?;
    let source = Source::new(cli.source.clone(), text.clone());

    let asm = compile(&text).map_err(|diag| Fatal::Diagnostic(source, diag))?;

    match &cli.output {
        Some(path) => {
            fs::write(path, asm)
                .map_err(|e| Fatal::Io(format!("cannot write '{}': {e}", path.display())))?;
        }
        None => {
            std::io::stdout()
                .write_all(asm.as_bytes())
                .map_err(|e| Fatal::Io(format!("cannot write to stdout: {e}")))?;
        }
    }
    Ok(())
}

/// Lex, parse, and generate code for a full translation unit's text.
fn compile(text: &str) -> Result<String, Diagnostic> {
    let (tokens, strings) = cminic_lexer::tokenize(text)?;
    let program = cminic_parser::parse(&tokens, strings)?;
    cminic_codegen::codegen(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_program() {
        let asm = compile("int main() { return 42; }").unwrap();
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("mov rax, 42"));
    }

    #[test]
    fn reports_a_diagnostic_for_undeclared_identifiers() {
        let err = compile("int main() { return x; }").unwrap_err();
        assert!(err.message.contains("not declared"));
    }
}
