//! Command-line arguments for the wizard

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build nginx virtual hosts from wizard answers", long_about = None)]
pub struct Args {
    /// Wizard config file; defaults to the per-user config
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the recipe presets
    Recipes,

    /// List catalog modules grouped by scope
    Modules {
        /// Catalog file to read instead of the configured one
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },

    /// Run the wizard non-interactively from an answers file
    Synth {
        /// TOML file with one table per wizard step
        #[arg(short, long, value_name = "FILE")]
        answers: PathBuf,

        /// Catalog file to read instead of the configured one
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Write the document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Overwrite a non-empty output file
        #[arg(short, long)]
        force: bool,

        /// Run `nginx -t` on the result before writing it
        #[arg(long)]
        check: bool,
    },

    /// Extract wizard fields from an existing document as JSON
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Treat the document as an existing host: its name is not taken
        #[arg(long)]
        edit: bool,
    },

    /// Syntax-check a document with the local nginx binary
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Name used in log output
        #[arg(long)]
        name: Option<String>,

        /// nginx binary to run
        #[arg(long, default_value = "nginx")]
        nginx: String,
    },
}
