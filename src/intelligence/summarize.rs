use crate::providers::llm::{CompletionRequest, LlmProvider};
use crate::providers::CallGuard;

/// Two or three sentence summary aimed at a reader following `topic`.
/// Returns an empty string if the model call fails.
pub async fn summarize(
    llm: &dyn LlmProvider,
    guard: &CallGuard,
    topic: &str,
    title: &str,
    content: &str,
) -> String {
    let prompt = format!(
        r#"Summarize the following article in 2-3 sentences for a developer interested in "{}".
Focus on the key technical insights and why it matters.

Title: {}
Content: {}

Summary:"#,
        topic, title, content
    );

    match guard.run(llm.complete(CompletionRequest::prompt(prompt, 200, 0.5))).await {
        Ok(response) => response.content.trim().to_string(),
        Err(e) => {
            tracing::warn!("Summarization failed for {:?}: {}", title, e);
            String::new()
        }
    }
}

/// A handful of short lowercase tags. Returns no tags if the model call fails.
pub async fn extract_tags(
    llm: &dyn LlmProvider,
    guard: &CallGuard,
    title: &str,
    content: &str,
) -> Vec<String> {
    let prompt = format!(
        r#"Extract 2-4 relevant technical tags from this content. Return only lowercase tags separated by commas.

Title: {}
Content: {}

Tags:"#,
        title, content
    );

    match guard.run(llm.complete(CompletionRequest::prompt(prompt, 50, 0.3))).await {
        Ok(response) => parse_tags(&response.content),
        Err(e) => {
            tracing::warn!("Tag extraction failed for {:?}: {}", title, e);
            Vec::new()
        }
    }
}

/// Split a comma separated reply into clean tags.
pub fn parse_tags(text: &str) -> Vec<String> {
    text.trim()
        .split(',')
        .map(|tag| {
            let tag = tag.trim().to_lowercase();
            tag.strip_prefix('#').map(str::to_string).unwrap_or(tag)
        })
        .filter(|tag| !tag.is_empty())
        .collect()
}
