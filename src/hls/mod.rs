pub mod detect;
pub mod rewriter;
