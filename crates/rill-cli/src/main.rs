use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use rill_ast::Module;
use rill_lexer::{LineIndex, Span};
use rill_resolve::SymbolTable;

#[derive(Parser)]
#[command(name = "rill", about = "The Rill programming language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a .rill file and dump the AST
    Parse {
        /// Path to the .rill source file
        file: PathBuf,
    },
    /// Resolve and type-check a .rill file
    Check {
        /// Path to the .rill source file
        file: PathBuf,
    },
    /// Lower a .rill file and dump the block IR
    Ir {
        /// Path to the .rill source file
        file: PathBuf,
        /// Write the dump here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Delete instructions whose results are never read
        #[arg(long)]
        dce: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse { file } => {
            let source = read_file(&file);
            let reporter = Reporter::new(&file, &source);

            let (module, errors) = rill_parser::parse(&source);
            for error in &errors {
                reporter.error(error.span, &error.message);
            }
            print!("{}", rill_ast::pretty_print(&module));
            if !errors.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Check { file } => {
            let source = read_file(&file);
            let reporter = Reporter::new(&file, &source);
            check_source(&source, &reporter);
        }
        Command::Ir { file, output, dce } => {
            let source = read_file(&file);
            let reporter = Reporter::new(&file, &source);
            let (module, table) = check_source(&source, &reporter);

            let mut lowered = rill_anf::lower_module(&module, &table);
            for warning in &lowered.warnings {
                reporter.warning(warning.span, &warning.message);
            }
            if let Err(error) = rill_anf::verify_module(&lowered.module) {
                eprintln!("error: malformed lowering: {}", error);
                std::process::exit(1);
            }
            if dce {
                rill_anf::eliminate_dead_code(&mut lowered.module, &mut lowered.ref_counts);
            }

            let text = rill_anf::print_anf(&lowered.module);
            match output {
                Some(path) => {
                    if let Err(error) = std::fs::write(&path, text) {
                        eprintln!("error: could not write {}: {}", path.display(), error);
                        std::process::exit(1);
                    }
                }
                None => print!("{}", text),
            }
        }
    }
}

/// Parse, resolve, and typecheck, exiting after the first stage that
/// reports anything.
fn check_source(source: &str, reporter: &Reporter) -> (Module, SymbolTable) {
    let (mut module, errors) = rill_parser::parse(source);
    if !errors.is_empty() {
        for error in &errors {
            reporter.error(error.span, &error.message);
        }
        std::process::exit(1);
    }

    let resolved = rill_resolve::resolve(&mut module);
    if !resolved.errors.is_empty() {
        for error in &resolved.errors {
            reporter.error(error.span, &error.message);
        }
        std::process::exit(1);
    }

    match rill_typeck::check(&module, &resolved.table) {
        Ok(_) => (module, resolved.table),
        Err(error) => {
            reporter.error(error.span, &error.message);
            for note in &error.notes {
                reporter.info(note.span, &note.message);
            }
            std::process::exit(1);
        }
    }
}

fn read_file(file: &Path) -> String {
    match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: could not read {}: {}", file.display(), error);
            std::process::exit(1);
        }
    }
}

/// Renders diagnostics as `<file>:<line>:<col>: <severity>: <message>`.
/// Notes without a location drop the prefix entirely.
struct Reporter<'a> {
    file: &'a Path,
    index: LineIndex,
}

impl<'a> Reporter<'a> {
    fn new(file: &'a Path, source: &str) -> Reporter<'a> {
        Reporter {
            file,
            index: LineIndex::new(source),
        }
    }

    fn location(&self, span: Span) -> String {
        let (line, col) = self.index.line_col(span.start);
        format!("{}:{}:{}", self.file.display(), line, col)
    }

    fn error(&self, span: Span, message: &str) {
        eprintln!("{}: error: {}", self.location(span), message);
    }

    fn info(&self, span: Option<Span>, message: &str) {
        match span {
            Some(span) => eprintln!("{}: info: {}", self.location(span), message),
            None => eprintln!("info: {}", message),
        }
    }

    fn warning(&self, span: Span, message: &str) {
        eprintln!("{}: warning: {}", self.location(span), message);
    }
}
