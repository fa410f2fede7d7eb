use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for wonderlands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run fmt, clippy, tests and doc in order
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Run the fluid and frame benchmarks in release mode
    Bench,
}

/// Step label and cargo arguments.
type Step = (&'static str, &'static [&'static str]);

const FMT: Step = ("fmt --check", &["fmt", "--all", "--", "--check"]);
const CLIPPY: Step = (
    "clippy",
    &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
);
const TEST: Step = ("test", &["test", "--workspace"]);
const DOC: Step = ("doc", &["doc", "--workspace", "--no-deps"]);
const BUILD: Step = ("build", &["build", "--workspace"]);
const BENCH_FLUID: Step = (
    "bench (fluid)",
    &["bench", "-p", "wonderlands-fluid", "--bench", "bench_fluid_step"],
);
const BENCH_FRAME: Step = (
    "bench (frame)",
    &["bench", "-p", "wonderlands-render", "--bench", "bench_frame"],
);

impl Commands {
    fn steps(self) -> &'static [Step] {
        match self {
            Commands::Check => &[FMT, CLIPPY, TEST, DOC],
            Commands::Fmt => &[FMT],
            Commands::Clippy => &[CLIPPY],
            Commands::Test => &[TEST],
            Commands::Doc => &[DOC],
            Commands::Build => &[BUILD],
            Commands::Bench => &[BENCH_FLUID, BENCH_FRAME],
        }
    }
}

fn run_cargo((label, args): Step) -> Result<()> {
    println!("==> Running cargo {label}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {label} failed");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    for step in cli.command.steps() {
        run_cargo(*step)?;
    }
    Ok(())
}
