//! jarsmith CLI - Build and inspect JAR archives
//!
//! Commands:
//! - `jarsmith build` - Package a directory or archive into a JAR
//! - `jarsmith list` - List the entries of a JAR
//! - `jarsmith versions` - Show the Multi-Release layout of a JAR
//! - `jarsmith view` - Flatten a Multi-Release JAR for one release
//! - `jarsmith digest` - Print content digests of a JAR

use clap::{ArgAction, Parser, Subcommand};
use jarsmith_core::LogLevel;
use std::path::PathBuf;

mod build;
mod inspect;
mod settings;

#[derive(Parser)]
#[command(name = "jarsmith")]
#[command(author, version, about = "Build and inspect JAR archives", long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a directory or an existing archive
    Build {
        /// Directory or archive to package
        source: PathBuf,

        /// Output JAR path
        #[arg(short, long)]
        output: PathBuf,

        /// Output timestamp: true, false, epoch seconds or RFC 3339
        #[arg(long)]
        reproducible: Option<String>,

        /// Store entries without compression
        #[arg(long)]
        store: bool,

        /// Record per-entry digests in the manifest (repeatable)
        #[arg(long = "digest")]
        digests: Vec<String>,

        /// Manifest file to use instead of the source's
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Path to jarsmith.toml (default: ./jarsmith.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List entries with their sizes
    List {
        jar: PathBuf,
    },

    /// Show the Multi-Release layout
    Versions {
        jar: PathBuf,
    },

    /// Write the archive as seen by one Java release
    View {
        jar: PathBuf,

        /// Java release; 0 selects the highest available
        #[arg(short, long)]
        release: u32,

        /// Output JAR path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print length, SHA-256 and timeless digest
    Digest {
        jar: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    jarsmith_logging::init_logging(LogLevel::from_verbosity(cli.verbose));

    match cli.command {
        Commands::Build {
            source,
            output,
            reproducible,
            store,
            digests,
            manifest,
            config,
        } => {
            let options = build::BuildOptions {
                source,
                output,
                config,
                manifest,
                overrides: settings::Overrides {
                    reproducible,
                    store,
                    digests,
                },
            };
            build::run(&options)?;
        }
        Commands::List { jar } => print_lines(inspect::list(&jar)?),
        Commands::Versions { jar } => print_lines(inspect::versions(&jar)?),
        Commands::View {
            jar,
            release,
            output,
        } => {
            inspect::view(&jar, release, &output)?;
        }
        Commands::Digest { jar } => print_lines(inspect::digest(&jar)?),
    }

    Ok(())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
