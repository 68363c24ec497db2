//! CLI binary entry point for geo-import

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use geo_import_sdk::cli::commands::InputArgs;
#[cfg(feature = "cli")]
use geo_import_sdk::cli::commands::init::handle_init;
#[cfg(feature = "cli")]
use geo_import_sdk::cli::commands::inspect::handle_inspect;
#[cfg(feature = "cli")]
use geo_import_sdk::cli::commands::reconcile::handle_reconcile;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "geo-import")]
#[command(about = "Inspect geodata files before importing them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(clap::Args)]
struct FileArgs {
    /// CSV, GeoJSON, KML or GPX file
    input: PathBuf,
    /// Declared MIME type, used when the extension is ambiguous
    #[arg(long)]
    content_type: Option<String>,
    /// Directory holding .geo-import.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
    /// CSV delimiter, overriding the configuration
    #[arg(short, long)]
    delimiter: Option<char>,
    /// Human-readable output instead of JSON
    #[arg(short, long)]
    pretty: bool,
}

#[cfg(feature = "cli")]
impl FileArgs {
    fn input_args(&self) -> InputArgs {
        InputArgs {
            input: self.input.clone(),
            content_type: self.content_type.clone(),
            config_dir: self.config_dir.clone(),
            delimiter: self.delimiter,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Read a file and show its format, record count and inferred fields
    Inspect {
        #[command(flatten)]
        file: FileArgs,
    },
    /// Compare a file's inferred fields with a category definition
    Reconcile {
        #[command(flatten)]
        file: FileArgs,
        /// JSON array of category field definitions
        #[arg(short, long)]
        fields: PathBuf,
    },
    /// Write a sample .geo-import.toml
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { file } => handle_inspect(&file.input_args(), file.pretty),
        Commands::Reconcile { file, fields } => {
            handle_reconcile(&file.input_args(), &fields, file.pretty)
        }
        Commands::Init { dir, force } => handle_init(&dir, force).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
