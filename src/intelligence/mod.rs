//! LLM-backed curation: relevance scoring, summaries, tags, ranking, and
//! one-off questions.

mod ask;
mod curator;
mod scorer;
mod summarize;

pub use ask::{ask, build_ask_request, gather_sources, AskResult, ASK_MAX_SOURCES};
pub use curator::{sort_by_relevance_and_recency, Curator, RELEVANCE_THRESHOLD};
pub use scorer::{parse_score, score_relevance, NEUTRAL_SCORE};
pub use summarize::{extract_tags, parse_tags, summarize};
