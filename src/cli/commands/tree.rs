use crate::cli::output::Output;
use crate::errors::Result;
use crate::git;
use crate::stack::{FileRelationshipStore, StackBuilder};

/// Reconstruct the branch stack and print it.
pub fn run() -> Result<()> {
    let repo = git::get_current_repository()?;
    let store = FileRelationshipStore::new(repo.git_dir());

    let stack = StackBuilder::new(&store).build(&repo)?;
    Output::print_stack(&stack);

    if stack.main_branch.is_none() {
        Output::tip("No main/master branch found; every stack is shown as its own root");
    }

    Ok(())
}
