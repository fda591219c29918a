//! Terminal confirmation prompts.

use dialoguer::Confirm;
use native_migrate::Prompt;
use tracing::warn;

/// Asks on the terminal; a prompt that cannot be shown counts as "no".
///
/// Must be called from the multi-threaded runtime: the blocking terminal read
/// runs under `block_in_place` so other tasks keep their worker threads.
pub struct DialoguerPrompt;

impl Prompt for DialoguerPrompt {
    fn confirm(&self, question: &str) -> bool {
        let answer = tokio::task::block_in_place(|| {
            Confirm::new().with_prompt(question).default(false).interact()
        });
        match answer {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Could not read confirmation ({}), use --silent for unattended runs", e);
                false
            }
        }
    }
}
