use crate::error::Result;
use crate::models::{Candidate, TimeRange};
use crate::providers::llm::{CompletionRequest, LlmProvider, Message};
use crate::providers::search::{SearchProvider, SearchRequest};
use crate::providers::CallGuard;

pub const ASK_MAX_SOURCES: usize = 5;

const ASK_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate, well-researched answers. Use the provided sources to inform your response. Be concise but thorough.";

#[derive(Debug, Clone)]
pub struct AskResult {
    pub answer: String,
    pub sources: Vec<Candidate>,
}

/// Search results from the past week to ground an answer. Empty when no
/// search backend is usable or the search fails.
pub async fn gather_sources(
    search: Option<&dyn SearchProvider>,
    guard: &CallGuard,
    question: &str,
    max_sources: usize,
) -> Vec<Candidate> {
    let Some(search) = search.filter(|s| s.available()) else {
        return Vec::new();
    };

    let request = SearchRequest {
        query: question.to_string(),
        max_results: max_sources,
        time_range: TimeRange::Week,
    };

    match guard.run(search.search(request)).await {
        Ok(sources) => sources,
        Err(e) => {
            tracing::warn!("Search for {:?} failed, answering without sources: {}", question, e);
            Vec::new()
        }
    }
}

pub fn build_ask_request(question: &str, sources: &[Candidate]) -> CompletionRequest {
    let mut prompt = String::new();

    if !sources.is_empty() {
        prompt.push_str("Use the following sources to inform your answer:\n\n");
        for (i, source) in sources.iter().enumerate() {
            prompt.push_str(&format!("Source {}: {}\n", i + 1, source.title));
            prompt.push_str(&format!("URL: {}\n", source.url));
            if !source.snippet.is_empty() {
                prompt.push_str(&format!("Content: {}\n", source.snippet));
            }
            prompt.push('\n');
        }
        prompt.push_str("---\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);

    CompletionRequest {
        messages: vec![Message::system(ASK_SYSTEM_PROMPT), Message::user(prompt)],
        max_tokens: 2048,
        temperature: 0.7,
    }
}

/// Answer a one-off question, grounded in up to `max_sources` search
/// results when available.
pub async fn ask(
    llm: &dyn LlmProvider,
    search: Option<&dyn SearchProvider>,
    guard: &CallGuard,
    question: &str,
    max_sources: usize,
) -> Result<AskResult> {
    let sources = gather_sources(search, guard, question, max_sources).await;
    let response = guard
        .run(llm.complete(build_ask_request(question, &sources)))
        .await?;

    Ok(AskResult {
        answer: response.content,
        sources,
    })
}
