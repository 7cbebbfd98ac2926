pub mod completions;
pub mod fixpr;
pub mod graph;
pub mod menu;
pub mod push;
pub mod stack;
pub mod sync;
pub mod tree;
