//! Yes/no confirmation seam for interactive runs.

/// Asks the operator whether to proceed.
pub trait Prompt: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Answers yes to everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Prompt for AutoConfirm {
    fn confirm(&self, _question: &str) -> bool {
        true
    }
}
