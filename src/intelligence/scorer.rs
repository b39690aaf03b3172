use crate::providers::llm::{CompletionRequest, LlmProvider};
use crate::providers::CallGuard;

/// Score used whenever the model cannot give a usable answer.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Rate how well a piece of content matches `topic`, in `[0.0, 1.0]`.
///
/// Never fails: a provider error, timeout, cancellation, or unparseable reply
/// all yield [`NEUTRAL_SCORE`].
pub async fn score_relevance(
    llm: &dyn LlmProvider,
    guard: &CallGuard,
    topic: &str,
    title: &str,
    snippet: &str,
) -> f64 {
    let request = CompletionRequest::prompt(relevance_prompt(topic, title, snippet), 10, 0.1);

    match guard.run(llm.complete(request)).await {
        Ok(response) => parse_score(&response.content).unwrap_or_else(|| {
            tracing::debug!("Unparseable relevance score {:?} for {:?}", response.content, title);
            NEUTRAL_SCORE
        }),
        Err(e) => {
            tracing::warn!("Relevance scoring failed for {:?}: {}", title, e);
            NEUTRAL_SCORE
        }
    }
}

/// Parse a bare numeric reply, clamped into `[0.0, 1.0]`.
pub fn parse_score(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|score| !score.is_nan())
        .map(|score| score.clamp(0.0, 1.0))
}

fn relevance_prompt(topic: &str, title: &str, snippet: &str) -> String {
    format!(
        r#"You are evaluating if a piece of content is relevant to a user's topic subscription.

Topic: {}
Content Title: {}
Content Snippet: {}

Rate the relevance from 0.0 to 1.0 where:
- 0.0-0.3: Not relevant
- 0.4-0.6: Somewhat relevant
- 0.7-0.9: Highly relevant
- 1.0: Perfectly relevant

Respond with only a number between 0.0 and 1.0."#,
        topic, title, snippet
    )
}
