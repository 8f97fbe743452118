//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pennywise - Scan receipts and check your financial health
#[derive(Parser)]
#[command(name = "pennywise")]
#[command(about = "AI-assisted receipt scanning and financial health analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Model settings file (defaults to the user override, then built-in settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract an expense from a receipt image
    Scan {
        /// Receipt image (jpg, jpeg, png, webp, heic, heif)
        #[arg(short, long)]
        image: PathBuf,

        /// JSON file with categories, paymentApps and banks (built-in lists if omitted)
        #[arg(short, long)]
        references: Option<PathBuf>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Produce a financial health report from a profile bundle
    Analyze {
        /// JSON file with expenses, goals and recurring expenses
        #[arg(short, long)]
        bundle: PathBuf,

        /// Print the raw JSON report
        #[arg(long)]
        json: bool,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory of static UI files to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// JSON reference lists for receipt extraction
        #[arg(short, long)]
        references: Option<PathBuf>,
    },

    /// Show the reference lists (categories, payment apps, banks)
    Reference {
        /// JSON file to show instead of the built-in lists
        #[arg(short, long)]
        references: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert an amount between currencies
    Convert {
        amount: f64,
        from: String,
        to: String,
    },

    /// List supported currency codes
    Currencies,

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// Show effective model settings
    Config,

    /// Show or change the theme preference
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,

        /// Theme cache file (defaults to the data directory)
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show a prompt's content
    Show {
        /// Prompt ID (scan_receipt, analyze_finances)
        id: String,
    },

    /// Print the override directory
    Path,
}

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Show the current theme
    Get,

    /// Set the theme (light, dark, system)
    Set { theme: String },
}
