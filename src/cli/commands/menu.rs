use crate::cli::commands;
use crate::errors::{Result, StacksmithError};
use dialoguer::{theme::ColorfulTheme, Select};

const ITEMS: &[(&str, &str)] = &[
    ("tree", "Show the branch stack tree"),
    ("stack", "Create a new stacked branch"),
    ("sync", "Rebase and push the current stack"),
    ("push", "Push the current branch"),
    ("fix-pr", "Rebase one branch onto a new base"),
    ("graph", "Show the commit graph"),
    ("quit", "Quit"),
];

/// Interactive menu shown when stacksmith runs without a subcommand.
pub fn run() -> Result<()> {
    let labels: Vec<String> = ITEMS
        .iter()
        .map(|(name, help)| format!("{name:<8} {help}"))
        .collect();

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(|e| StacksmithError::branch(format!("Prompt failed: {e}")))?;

    match choice.map(|i| ITEMS[i].0) {
        Some("tree") => commands::tree::run(),
        Some("stack") => commands::stack::run(None, None),
        Some("sync") => commands::sync::run(Vec::new()),
        Some("push") => commands::push::run(),
        Some("fix-pr") => commands::fixpr::run(None, None),
        Some("graph") => commands::graph::run(),
        _ => Ok(()),
    }
}
