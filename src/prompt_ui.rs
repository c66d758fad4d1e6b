//! The operator prompt: an external, serialized resource. `prompt` never
//! holds two dialogs open at once even if several indices are queued, so the
//! trait itself takes `&self` behind a single `Mutex`-guarded implementation
//! rather than relying on callers to serialize.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use tokio::sync::Mutex;

/// One round of filename curation: show `default` as the editable suggestion,
/// return whatever the operator confirms. Boxes its future by hand (rather
/// than pulling in a helper macro) so the trait stays object-safe for tests
/// to substitute a fixed responder behind `Arc<dyn PromptProvider>`.
pub trait PromptProvider: Send + Sync {
    fn suggest<'a>(&'a self, default: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>>;
}

/// Reads a line from stdin, serialized behind a mutex so concurrent callers
/// queue rather than interleave prompts.
pub struct StdinPrompt {
    lock: Mutex<()>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptProvider for StdinPrompt {
    fn suggest<'a>(&'a self, default: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            // Serialize concurrent callers on the async mutex (not std's --
            // its guard would have to cross the `spawn_blocking` await
            // below, which needs a Send guard).
            let _guard = self.lock.lock().await;
            let default_owned = default.to_string();
            // The actual read blocks the whole run waiting on the operator,
            // which must happen off the async executor -- otherwise, under
            // the single-threaded runtime main.rs selects, it would also
            // block the ctrl-c watcher task from ever being polled.
            let result = tokio::task::spawn_blocking(move || {
                print!("filename [{default_owned}]: ");
                std::io::stdout().flush().ok();
                let mut line = String::new();
                if std::io::stdin().read_line(&mut line).is_err() {
                    return default_owned;
                }
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    default_owned.clone()
                } else {
                    trimmed.to_string()
                }
            })
            .await;
            result.unwrap_or_else(|_| default.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrompt(String);

    impl PromptProvider for FixedPrompt {
        fn suggest<'a>(
            &'a self,
            _default: &'a str,
        ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    #[tokio::test]
    async fn fixed_prompt_returns_configured_value() {
        let p = FixedPrompt("confirmed-name".into());
        assert_eq!(p.suggest("guess").await, "confirmed-name");
    }
}
