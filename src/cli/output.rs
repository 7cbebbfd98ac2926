use crate::stack::{BranchNode, BranchStack};
use console::style;
use std::fmt::Display;

/// Centralized output formatting for consistent CLI presentation.
pub struct Output;

impl Output {
    pub fn success<T: Display>(message: T) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error<T: Display>(message: T) {
        println!("{} {}", style("✗").red(), message);
    }

    pub fn warning<T: Display>(message: T) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info<T: Display>(message: T) {
        println!("{} {}", style("ℹ").cyan(), message);
    }

    pub fn tip<T: Display>(message: T) {
        println!("{} {}", style("TIP:").cyan(), style(message).dim());
    }

    pub fn divider() {
        println!("{}", style("─".repeat(50)).dim());
    }

    /// Message for a freshly forged stacked branch.
    pub fn forge_success(new_branch: &str, parent_branch: &str) {
        Self::success(format!(
            "Forged new branch {} atop {}",
            style(new_branch).cyan(),
            style(parent_branch).cyan()
        ));
    }

    pub fn push_success(branch: &str) {
        Self::success(format!("Lifted {} to remote", style(branch).cyan()));
    }

    pub fn new_upstream_success(branch: &str) {
        Self::success(format!(
            "First lift for {} - upstream set",
            style(branch).cyan()
        ));
    }

    pub fn retarget_reminder(branch: &str, target: &str) {
        Self::warning(format!(
            "Don't forget to retarget the PR for {} to {}",
            style(branch).cyan(),
            style(target).cyan()
        ));
    }

    /// Print the reconstructed stack as a connector tree.
    pub fn print_stack(stack: &BranchStack) {
        if stack.nodes.is_empty() {
            Self::info("No local branches found");
            return;
        }

        println!("{}", style("Branch stack").bold().underlined());
        print!("{}", render_stack(stack));
    }
}

/// Render the stack tree as plain text: roots flush left, children with
/// box-drawing connectors, orphans listed separately.
pub fn render_stack(stack: &BranchStack) -> String {
    let mut out = String::new();

    for root in &stack.roots {
        if let Some(node) = stack.node(root) {
            out.push_str(&label(node));
            out.push('\n');
            render_subtree(stack, root, "", &mut out);
        }
    }

    if !stack.orphans.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Orphans (no parent, no children):\n");
        for orphan in &stack.orphans {
            if let Some(node) = stack.node(orphan) {
                out.push_str("  • ");
                out.push_str(&label(node));
                out.push('\n');
            }
        }
    }

    out
}

fn render_subtree(stack: &BranchStack, name: &str, prefix: &str, out: &mut String) {
    let Some(node) = stack.node(name) else {
        return;
    };

    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let Some(child_node) = stack.node(child) else {
            continue;
        };

        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&label(child_node));
        out.push('\n');

        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_subtree(stack, child, &child_prefix, out);
    }
}

fn label(node: &BranchNode) -> String {
    let mut text = node.name.clone();
    if node.is_head {
        text.push_str(" *");
    }
    if node.parent.is_some() {
        if node.ahead > 0 || node.behind > 0 {
            text.push_str(&format!(" (↑{} ↓{})", node.ahead, node.behind));
        }
        if node.is_merged {
            text.push_str(" [merged]");
        }
    }
    text
}
