//! Web-search request enrichment.
//!
//! An optional [`Enricher`] that detects time-sensitive questions, runs
//! them through the DuckDuckGo instant-answer API, and appends the results
//! to the user text before prompt composition. Every failure path degrades
//! to the unenriched text; enrichment must never cost the user a reply.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use counsel_core::Enricher;

/// Maximum search results appended to a request.
const MAX_RESULTS: usize = 5;

/// Phrases that suggest the answer lives outside the model's weights.
const SEARCH_KEYWORDS: &[&str] = &[
    "current", "latest", "today", "right now", "this week", "news", "price of", "exchange rate",
    "weather", "schedule", "opening hours", "when is", "when does", "where is",
    "what is happening", "look it up", "search the web",
];

/// Explicit client-side markers requesting a search.
const SEARCH_MARKERS: &[&str] = &["[web_search]", "[search]"];

/// A DuckDuckGo-backed [`Enricher`].
pub struct WebSearchEnricher {
    client: reqwest::Client,
    api_url: String,
}

impl WebSearchEnricher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            api_url: "https://api.duckduckgo.com".into(),
        }
    }

    /// Point the enricher at a different instant-answer endpoint (tests).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Whether the request looks like it needs fresh external information.
    fn needs_search(text: &str) -> bool {
        let lower = text.to_lowercase();
        SEARCH_MARKERS.iter().any(|m| lower.contains(m))
            || SEARCH_KEYWORDS.iter().any(|k| lower.contains(k))
    }

    /// Strip explicit search markers from the query text.
    fn clean_query(text: &str) -> String {
        let mut query = text.to_string();
        for marker in SEARCH_MARKERS {
            query = query.replace(marker, "");
        }
        query.trim().to_string()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, reqwest::Error> {
        let response = self
            .client
            .get(format!("{}/", self.api_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let answer: InstantAnswer = response.json().await?;
        Ok(answer.into_results(MAX_RESULTS))
    }
}

impl Default for WebSearchEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Enricher for WebSearchEnricher {
    async fn enrich(&self, user_text: &str) -> String {
        if !Self::needs_search(user_text) {
            return user_text.to_string();
        }

        let query = Self::clean_query(user_text);
        if query.is_empty() {
            return user_text.to_string();
        }

        let results = match self.search(&query).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                debug!("web search returned no results");
                return user_text.to_string();
            }
            Err(e) => {
                warn!(error = %e, "web search failed, continuing without enrichment");
                return user_text.to_string();
            }
        };

        format_enriched(user_text, &results)
    }
}

/// Append formatted search results to the user text.
fn format_enriched(user_text: &str, results: &[SearchResult]) -> String {
    let mut out = String::from(user_text);
    out.push_str("\n\n[WEB SEARCH RESULTS]\n");
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("Result {}:\n{}\n\n", i + 1, result.format()));
    }
    out.push_str(
        "Use this information to answer the question. If it does not help, answer from your own knowledge.",
    );
    out
}

/// One search hit.
#[derive(Debug, Clone, Default)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

impl SearchResult {
    fn format(&self) -> String {
        let mut parts = Vec::new();
        if !self.title.is_empty() {
            parts.push(format!("Title: {}", self.title));
        }
        if !self.snippet.is_empty() {
            parts.push(format!("Content: {}", self.snippet));
        }
        if !self.url.is_empty() {
            parts.push(format!("URL: {}", self.url));
        }
        parts.join("\n")
    }
}

// --- DuckDuckGo instant-answer types (internal) ---

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Abstract", default)]
    abstract_title: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "Answer", default)]
    answer: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

impl InstantAnswer {
    fn into_results(self, max: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if !self.abstract_text.is_empty() {
            results.push(SearchResult {
                title: self.abstract_title,
                url: self.abstract_url,
                snippet: self.abstract_text,
            });
        }

        if !self.answer.is_empty() {
            results.push(SearchResult {
                title: "Instant Answer".into(),
                snippet: self.answer,
                ..SearchResult::default()
            });
        }

        for topic in self.related_topics {
            if results.len() >= max {
                break;
            }
            if !topic.text.is_empty() {
                results.push(SearchResult {
                    title: topic.text,
                    url: topic.first_url,
                    ..SearchResult::default()
                });
            }
        }

        results.truncate(max);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_questions_do_not_trigger_search() {
        assert!(!WebSearchEnricher::needs_search(
            "how should I structure my pricing?"
        ));
    }

    #[test]
    fn time_sensitive_phrases_trigger_search() {
        assert!(WebSearchEnricher::needs_search(
            "what is the current exchange rate?"
        ));
        assert!(WebSearchEnricher::needs_search("any news about VAT changes?"));
    }

    #[test]
    fn explicit_markers_trigger_search_and_are_stripped() {
        let text = "[web_search] best invoicing tools";
        assert!(WebSearchEnricher::needs_search(text));
        assert_eq!(
            WebSearchEnricher::clean_query(text),
            "best invoicing tools"
        );
    }

    #[test]
    fn instant_answer_parsing_and_conversion() {
        let data = r#"{
            "Abstract": "VAT",
            "AbstractText": "Value-added tax is a consumption tax.",
            "AbstractURL": "https://example.com/vat",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "VAT rates by country", "FirstURL": "https://example.com/rates"},
                {"Text": "", "FirstURL": "https://example.com/empty"}
            ]
        }"#;
        let answer: InstantAnswer = serde_json::from_str(data).unwrap();
        let results = answer.into_results(5);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].snippet, "Value-added tax is a consumption tax.");
        assert_eq!(results[1].title, "VAT rates by country");
    }

    #[test]
    fn results_are_capped() {
        let topics: Vec<RelatedTopic> = (0..10)
            .map(|i| RelatedTopic {
                text: format!("topic {i}"),
                first_url: String::new(),
            })
            .collect();
        let answer = InstantAnswer {
            abstract_title: String::new(),
            abstract_text: String::new(),
            abstract_url: String::new(),
            answer: String::new(),
            related_topics: topics,
        };
        assert_eq!(answer.into_results(MAX_RESULTS).len(), MAX_RESULTS);
    }

    #[test]
    fn formatting_keeps_original_text_first() {
        let results = vec![SearchResult {
            title: "Rates".into(),
            url: "https://example.com".into(),
            snippet: "1 EUR = 1.08 USD".into(),
        }];
        let enriched = format_enriched("what is the current rate?", &results);

        assert!(enriched.starts_with("what is the current rate?"));
        assert!(enriched.contains("[WEB SEARCH RESULTS]"));
        assert!(enriched.contains("Result 1:"));
        assert!(enriched.contains("1 EUR = 1.08 USD"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_degrades_to_original_text() {
        let enricher =
            WebSearchEnricher::new().with_api_url("http://127.0.0.1:1/unreachable");
        let text = "[web_search] anything";
        assert_eq!(enricher.enrich(text).await, text);
    }
}
