use std::{
    env, fs,
    io::{self, Read},
    path::PathBuf,
    str::FromStr,
};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use venice::{analyzer, lexer, parser, util::fmt::tree, CompileOptions};

fn main() -> anyhow::Result<()> {
    initialize_logging();

    let cli = Venice::parse();

    match cli.subcmd {
        Subcommand::Tokenize(input) => {
            let src = input.read()?;
            let tokens = lexer::tokenize(&src).map_err(|error| diagnostic(error.into()))?;
            for token in tokens {
                println!("{token:?}");
            }
        }
        Subcommand::Parse(input) => {
            let src = input.read()?;
            let program = parser::parse_program(&src).map_err(diagnostic)?;
            print!("{}", tree::print_program_string(&program, None));
        }
        Subcommand::Check(input) => {
            let src = input.read()?;
            let program = parser::parse_program(&src).map_err(diagnostic)?;
            let types = analyzer::check(&program).map_err(diagnostic)?;
            print!("{}", tree::print_program_string(&program, Some(&types)));
        }
        Subcommand::Compile(build) => compile(build)?,
    }

    Ok(())
}

fn compile(build: Build) -> anyhow::Result<()> {
    let src = build.input.read()?;
    let options = CompileOptions {
        backend: build.backend.into(),
    };
    let code = venice::compile(&src, &options).map_err(diagnostic)?;
    debug!(backend = %options.backend, bytes = code.len(), "compiled");

    match build.output {
        Some(path) => {
            fs::write(&path, code).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => print!("{code}"),
    }
    Ok(())
}

/// Types in diagnostics share `Rc`s, so they are rendered before crossing
/// threads inside `anyhow`.
fn diagnostic(error: venice::Error) -> anyhow::Error {
    anyhow::anyhow!("{error}")
}

fn initialize_logging() {
    let env_filter = env::var("RUST_LOG").unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(EnvFilter::from_str(&env_filter).unwrap()),
        )
        .init();
}

#[derive(clap::Parser)]
#[clap(about = "Compiles Venice programs to Python, JavaScript or C.")]
struct Venice {
    #[clap(subcommand)]
    subcmd: Subcommand,
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Prints the tokens of the program.
    Tokenize(Input),
    /// Prints the syntax tree of the program.
    Parse(Input),
    /// Type checks the program, printing its typed syntax tree.
    Check(Input),
    /// Compiles the program to the selected backend.
    Compile(Build),
}

#[derive(clap::Parser)]
struct Input {
    /// Source file, or standard input if not provided.
    source: Option<PathBuf>,
}

impl Input {
    fn read(&self) -> anyhow::Result<String> {
        match &self.source {
            Some(path) => {
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
            }
            None => {
                let mut src = String::new();
                io::stdin().read_to_string(&mut src)?;
                Ok(src)
            }
        }
    }
}

#[derive(clap::Parser)]
struct Build {
    #[clap(flatten)]
    input: Input,

    #[clap(short, long, default_value = "python")]
    backend: Backend,

    /// Output file path (optional, prints to stdout if not provided).
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
enum Backend {
    Python,
    #[value(alias = "js")]
    Javascript,
    #[value(alias = "c")]
    Native,
}

impl From<Backend> for venice::codegen::Backend {
    fn from(value: Backend) -> Self {
        match value {
            Backend::Python => venice::codegen::Backend::Python,
            Backend::Javascript => venice::codegen::Backend::JavaScript,
            Backend::Native => venice::codegen::Backend::Native,
        }
    }
}
