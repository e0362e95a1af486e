//! CLI Module
//!
//! Command-line harness that drives the editor against patch documents.

pub mod commands;
pub mod document;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Patchwire - edit modular patches from the command line
#[derive(Parser, Debug)]
#[command(name = "patchwire")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Editor configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty patch document
    #[command(name = "new")]
    New {
        /// Path for the new document
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a JSON edit script against a patch document
    #[command(name = "apply")]
    Apply {
        /// Path to the patch document
        path: PathBuf,

        /// Edit script (JSON array of operations)
        #[arg(short, long)]
        script: PathBuf,

        /// Write the result here instead of back to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Auto-layout every module of a patch document
    #[command(name = "layout")]
    Layout {
        /// Path to the patch document
        path: PathBuf,
    },

    /// Print modules, links and layout
    #[command(name = "inspect")]
    Inspect {
        /// Path to the patch document
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
