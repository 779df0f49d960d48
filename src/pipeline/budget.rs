//! Token-budget trimming for the summarizer input.

/// Default token budget for one summarizer call.
pub const DEFAULT_TOKEN_BUDGET: f64 = 4097.0;

/// Rough characters-per-token ratio for GPT-like models.
const AVG_CHARS_PER_TOKEN: f64 = 4.0;

/// Estimate the token cost of a text from its character length.
pub fn estimate_tokens(text: &str) -> f64 {
    text.chars().count() as f64 / AVG_CHARS_PER_TOKEN
}

/// Drop articles from the end until the estimated total fits `budget`.
///
/// The result is always a prefix of `articles`. An article that alone
/// exceeds the budget is dropped like any other, so a non-positive budget
/// yields an empty batch for non-empty texts.
pub fn trim_to_budget(mut articles: Vec<String>, budget: f64) -> Vec<String> {
    let mut total: f64 = articles.iter().map(|a| estimate_tokens(a)).sum();

    while total > budget {
        let Some(removed) = articles.pop() else {
            break;
        };
        total -= estimate_tokens(&removed);
    }

    articles
}
