//! Reference list command

use std::path::Path;

use anyhow::Result;
use pennywise_core::reference::ReferenceKind;

use super::load_reference;

/// Print the reference lists used to constrain receipt extraction
pub fn cmd_reference(path: Option<&Path>, json: bool) -> Result<()> {
    let reference = load_reference(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reference)?);
        return Ok(());
    }

    for (title, kind) in [
        ("Categories", ReferenceKind::Category),
        ("Payment apps", ReferenceKind::PaymentApp),
        ("Banks", ReferenceKind::Bank),
    ] {
        let names = reference.names(kind);
        println!("{} ({}):", title, names.len());
        if names.is_empty() {
            println!("  (none - extracted as free text)");
        }
        for name in names {
            println!("  - {}", name);
        }
        println!();
    }

    Ok(())
}
