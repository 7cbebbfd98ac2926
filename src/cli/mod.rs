pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "stacksmith")]
#[command(about = "Stacksmith - artisan CLI for stacked Git branches")]
#[command(version)]
pub struct Cli {
    /// Without a subcommand the interactive menu is shown
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new branch atop a parent branch
    Stack {
        /// Name of the branch to create
        new_branch: Option<String>,
        /// Branch to stack on top of
        parent_branch: Option<String>,
    },

    /// Show the reconstructed branch stack tree
    Tree,

    /// Rebase and push a chain of branches in sequence
    Sync {
        /// Branches in parent-to-child order; with fewer than two, the
        /// chain is derived from the stack (ending at the named branch,
        /// or at the current one)
        branches: Vec<String>,
    },

    /// Push the current branch, setting upstream on first push
    Push,

    /// Rebase one branch onto a new base and remind to retarget the PR
    FixPr {
        /// Branch to rebase
        branch: Option<String>,
        /// New base branch
        target: Option<String>,
    },

    /// Show the commit graph (git log --graph)
    Graph,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            None => commands::menu::run(),
            Some(Commands::Stack {
                new_branch,
                parent_branch,
            }) => commands::stack::run(new_branch, parent_branch),
            Some(Commands::Tree) => commands::tree::run(),
            Some(Commands::Sync { branches }) => commands::sync::run(branches),
            Some(Commands::Push) => commands::push::run(),
            Some(Commands::FixPr { branch, target }) => commands::fixpr::run(branch, target),
            Some(Commands::Graph) => commands::graph::run(),
            Some(Commands::Completions { shell }) => commands::completions::run(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
