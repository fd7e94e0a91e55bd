//! Second generation pass that forces an actionable verdict into a draft.

use crate::config::{RetryPolicy, VerdictConfig};
use crate::error::{OracleError, OracleResult};
use crate::generation::ConstrainedGenerator;
use tracing::{info, warn};

pub struct VerdictEnforcer {
    generator: ConstrainedGenerator,
    config: VerdictConfig,
}

impl VerdictEnforcer {
    pub fn new(generator: ConstrainedGenerator, config: VerdictConfig) -> Self {
        Self { generator, config }
    }

    /// Rewrite `draft` so it carries a labelled buy/sell verdict within budget.
    ///
    /// A rewrite over `max_chars` is rejected and retried like one missing
    /// its keywords. Returns `None` when every attempt failed; no fallback
    /// text is produced.
    pub async fn enforce_verdict(&self, draft: &str) -> Option<String> {
        let prompt = self.build_prompt(draft);
        let policy = RetryPolicy::default()
            .with_max_attempts(self.config.max_attempts)
            .with_required(self.config.required_substrings());
        let budget = self.config.max_chars;

        match self
            .generator
            .generate_validated(&prompt, &policy, |text| fit_budget(text, budget))
            .await
        {
            Some(text) => {
                info!(length = text.chars().count(), budget, "verdict enforced");
                Some(text)
            }
            None => {
                warn!("no verdict could be produced for the draft");
                None
            }
        }
    }

    pub fn build_prompt(&self, draft: &str) -> String {
        let markers = quoted(&self.config.markers, ":");
        let actions = quoted(&self.config.actions, "");
        let budget = self.config.max_chars;

        format!(
            r#"Current post:
{draft}

Task:
Validate and fix the post to meet ALL of the following requirements:
1. Must include a clear verdict starting with {markers}
2. Verdict must explicitly state {actions} with reasoning
3. TOTAL LENGTH MUST BE UNDER {budget} CHARACTERS
4. If any requirement is not met, add or modify the post to comply

Do not show intermediate results. Send nothing but the final post with the verdict, under {budget} characters.

Example:
Current post:
$btc is holding its crown, and the cards say the king isn't ready to fall:
1. king of pentacles - dominance and stability.
2. wheel of fortune - cycles are turning.
3. knight of swords - momentum is building.

Result:
$btc is holding its crown, and the cards say the king isn't ready to fall:
1. king of pentacles - dominance and stability.
2. wheel of fortune - cycles are turning.
3. knight of swords - momentum is building.
verdict: buy now or watch the king reclaim the throne without you."#
        )
    }
}

/// Lowercased, trimmed `text`, or a rejection when it exceeds `budget` chars.
fn fit_budget(text: &str, budget: usize) -> OracleResult<String> {
    let text = text.trim().to_lowercase();
    let length = text.chars().count();
    if length > budget {
        return Err(OracleError::ValidationFailed(format!(
            "verdict is {length} characters, over the {budget} character budget"
        )));
    }
    Ok(text)
}

fn quoted(words: &[String], suffix: &str) -> String {
    words
        .iter()
        .map(|word| format!("\"{word}{suffix}\""))
        .collect::<Vec<_>>()
        .join(" or ")
}
