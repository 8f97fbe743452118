//! `pennywise prompts` subcommands

use anyhow::{bail, Context, Result};
use pennywise_core::prompts::{default_prompts_dir, Prompt, PromptId, PromptLibrary};

/// Table of prompts with version and where each one is loaded from
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("📝 Prompts\n");
    println!("{:<18} {:>3}  {:<10}  SOURCE", "ID", "V", "TASK");

    for info in library.list() {
        let source = match &info.override_path {
            Some(path) => format!("override ({})", path.display()),
            None => "built-in".to_string(),
        };
        println!(
            "{:<18} {:>3}  {:<10}  {}",
            info.id, info.version, info.task_type, source
        );
    }

    println!();
    println!("Drop <id>.md into the override directory to replace a prompt.");
    println!("Run `pennywise prompts path` to see where that is.");

    Ok(())
}

/// Print one prompt split into its sections, plus the variables it expects
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id: PromptId = match prompt_id.parse() {
        Ok(id) => id,
        Err(_) => {
            let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
            bail!(
                "Unknown prompt '{}' (expected one of: {})",
                prompt_id,
                known.join(", ")
            );
        }
    };

    let mut library = PromptLibrary::new();
    let prompt = library
        .get(id)
        .with_context(|| format!("Failed to load prompt '{}'", id.as_str()))?;

    print_prompt(prompt);
    Ok(())
}

fn print_prompt(prompt: &Prompt) {
    let origin = match &prompt.override_path {
        Some(path) => path.display().to_string(),
        None => "built-in".to_string(),
    };
    println!(
        "📝 {} v{} ({})",
        prompt.metadata.id, prompt.metadata.version, prompt.metadata.task_type
    );
    println!("   from {}", origin);

    let vars = prompt.placeholders();
    if !vars.is_empty() {
        println!("   variables: {}", vars.join(", "));
    }

    match (prompt.system_section(), prompt.user_section()) {
        (None, None) => {
            println!();
            println!("{}", prompt.content);
        }
        (system, user) => {
            if let Some(system) = system {
                println!("\n── system ──\n{}", system);
            }
            if let Some(user) = user {
                println!("\n── user ──\n{}", user);
            }
        }
    }
}

/// Print the override directory and which prompts currently have overrides there
pub fn cmd_prompts_path() -> Result<()> {
    let Some(dir) = default_prompts_dir() else {
        bail!("No local data directory on this system; prompt overrides are unavailable");
    };

    println!("{}", dir.display());

    if !dir.is_dir() {
        println!("   (does not exist yet)");
        return Ok(());
    }

    let library = PromptLibrary::with_override_dir(dir);
    for id in PromptId::all() {
        let mark = if library.has_override(*id) { "✓" } else { "·" };
        println!("   {} {}.md", mark, id.as_str());
    }

    Ok(())
}
