//! Yangc CLI - Command-line interface for the YANG schema compiler

mod commands;

use clap::{Parser, Subcommand};
use commands::UnitArgs;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "yangc")]
#[command(version)]
#[command(about = "YANG schema compiler - resolves, links and validates schema trees")]
#[command(long_about = r#"
Yangc compiles the parse events of a set of YANG files into linked schema
trees, checks them, and publishes a single schema artifact.

Example usage:
  yangc init
  yangc check yang/
  yangc compile yang/ --output-dir out --metadata-dir out/meta
  yangc compile ext/ -d out/schema.json --output-dir ext-out --metadata-dir ext-out/meta
  yangc show out/schema.json --module ietf-interfaces
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a unit and publish its artifact
    Compile {
        #[command(flatten)]
        unit: UnitArgs,

        /// Directory receiving the artifact
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Directory receiving the module manifest
        #[arg(long)]
        metadata_dir: Option<PathBuf>,

        /// File name of the artifact
        #[arg(long)]
        artifact_name: Option<String>,
    },

    /// Compile a unit without writing anything
    Check {
        #[command(flatten)]
        unit: UnitArgs,
    },

    /// Print the trees stored in an artifact
    Show {
        /// Artifact to read
        artifact: PathBuf,

        /// Only this module or submodule
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Write a starter yangc.toml
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = "yangc.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// Report a failed batch; the caller still exits non-zero
pub fn emit_failure(output_mode: OutputMode, command: &str, err: &yangc::Error) -> anyhow::Result<()> {
    let diagnostic = err.diagnostic();
    match output_mode {
        OutputMode::Human => yangc::ui::diagnostic(&diagnostic),
        OutputMode::Json => {
            let envelope = serde_json::json!({
                "ok": false,
                "command": command,
                "kind": if err.is_schema_error() { "schema" } else { "tool" },
                "diagnostics": [diagnostic],
            });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    match cli.command {
        Commands::Compile {
            unit,
            output_dir,
            metadata_dir,
            artifact_name,
        } => commands::run_compile(unit, output_dir, metadata_dir, artifact_name, output_mode),
        Commands::Check { unit } => commands::run_check(unit, output_mode),
        Commands::Show { artifact, module } => commands::run_show(&artifact, module.as_deref(), output_mode),
        Commands::Init { path, force } => commands::run_init(&path, force, output_mode),
        Commands::Version => commands::run_version(output_mode),
    }
}
