use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "pacyard")]
#[command(about = "Keep a bounded local mirror of the installed pacman packages")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "PACYARD_CONFIG",
        default_value = "pacyard.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Re-import the installed package lists and exit
    #[arg(short, long)]
    pub import: bool,

    /// Override `paths.work_dir` from the configuration
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch one file for the package manager, local mirror first
    Xfer {
        /// Local file to write
        output: PathBuf,

        /// Upstream URL of the file
        url: String,

        /// Base URL of the local mirror (overrides `xfer.local_mirror`)
        #[arg(long, env = "PACYARD_LOCAL_MIRROR")]
        local_mirror: Option<String>,

        /// Architecture segment to collapse from upstream URLs
        #[arg(long)]
        arch: Option<String>,
    },
}

impl Cli {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "info,pacyard_core=debug,pacyard=debug"
        } else {
            "info"
        }
    }
}
