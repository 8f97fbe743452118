//! Pennywise CLI - Receipt scanning and financial health analysis
//!
//! Usage:
//!   pennywise scan --image receipt.jpg     Extract an expense from a receipt
//!   pennywise analyze --bundle me.json     Financial health report
//!   pennywise serve --port 3000            Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Scan {
            image,
            references,
            json,
        } => {
            let settings = commands::load_settings(cli.config.as_deref())?;
            commands::cmd_scan(settings, &image, references.as_deref(), json).await
        }
        Commands::Analyze { bundle, json } => {
            let settings = commands::load_settings(cli.config.as_deref())?;
            commands::cmd_analyze(settings, &bundle, json).await
        }
        Commands::Serve {
            port,
            host,
            static_dir,
            references,
        } => {
            let settings = commands::load_settings(cli.config.as_deref())?;
            commands::cmd_serve(
                settings,
                &host,
                port,
                static_dir.as_deref(),
                references.as_deref(),
            )
            .await
        }
        Commands::Reference { references, json } => {
            commands::cmd_reference(references.as_deref(), json)
        }
        Commands::Convert { amount, from, to } => commands::cmd_convert(amount, &from, &to).await,
        Commands::Currencies => commands::cmd_currencies().await,
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
        Commands::Config => commands::cmd_config(cli.config.as_deref()),
        Commands::Theme { action, cache } => {
            let cache = commands::theme_cache(cache)?;
            match action {
                None | Some(ThemeAction::Get) => commands::cmd_theme_get(&cache).await,
                Some(ThemeAction::Set { theme }) => commands::cmd_theme_set(&cache, &theme).await,
            }
        }
    }
}
