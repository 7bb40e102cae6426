//! Generated year-in-review text
//!
//! One chat-completions request to a hosted model, with a prompt built from
//! the dataset aggregates.

use crate::error::{Result, WrapupError};
use crate::stats::{Aggregates, BOOK_PRICE_USD};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Persona sent as the system message ahead of the statistics
pub const SYSTEM_PROMPT: &str = "You are an expert librarian advocate who loves books and economics. \
     Only output the recap that is asked of you, without any reasoning. Have fun advocating for libraries \
     and tell the reader how much money they saved this year by borrowing books instead of buying them.";

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://inference.do-ai.run/v1/chat/completions".to_string(),
            model: "llama3.3-70b-instruct".to_string(),
            temperature: 0.2,
            max_tokens: 500,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    /// Text of the first choice, if it has any
    pub fn text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.trim()).filter(|text| !text.is_empty())
    }
}

/// Prompt asking for an upbeat, library-minded recap of the year
pub fn build_prompt(aggregates: &Aggregates, year: Option<i32>) -> String {
    let period = year.map(|y| y.to_string()).unwrap_or_else(|| "this year".to_string());
    let books = &aggregates.books;
    let activities = &aggregates.activities;
    let library = &aggregates.library;

    let mut prompt = format!("Write a short, warm recap of {} for the reader based on these statistics.\n\n", period);

    let _ = writeln!(prompt, "Books: {}", books.count);
    let _ = writeln!(prompt, "Library checkouts: {}", library.checkouts);
    if let Some(rating) = books.average_rating {
        let _ = writeln!(prompt, "Average rating: {:.2} out of 5", rating);
    }
    if books.total_pages > 0 {
        let _ = writeln!(prompt, "Pages read: {}", books.total_pages);
    }
    if let Some(longest) = &books.longest {
        let _ = writeln!(prompt, "Longest book: {} ({} pages)", longest.title, longest.pages);
    }
    if !books.top_authors.is_empty() {
        let authors: Vec<&str> = books.top_authors.iter().map(|a| a.author.as_str()).collect();
        let _ = writeln!(prompt, "Favorite authors: {}", authors.join(", "));
    }
    if activities.count > 0 {
        let _ = writeln!(
            prompt,
            "Workouts: {} covering {:.2} miles over {:.2} hours",
            activities.count, activities.total_distance_miles, activities.total_hours
        );
        if activities.total_elevation_gain_m > 0.0 {
            let _ = writeln!(prompt, "Elevation climbed: {:.0} m", activities.total_elevation_gain_m);
        }
    }

    let _ = write!(
        prompt,
        "\nAssume each library book would have cost ${:.0} to buy and estimate how much the reader saved \
         (about ${:.2}). Keep it under 150 words.",
        BOOK_PRICE_USD, library.estimated_savings_usd
    );

    prompt
}

pub struct InferenceClient {
    config: InferenceConfig,
    api_key: String,
    client: Client,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl InferenceClient {
    pub fn new(config: InferenceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WrapupError::InferenceFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, api_key: api_key.into(), client })
    }

    pub fn request_for(&self, prompt: impl Into<String>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Send one prompt and return the generated text
    pub fn complete(&self, prompt: impl Into<String>) -> Result<String> {
        let request = self.request_for(prompt);
        log::info!("Requesting summary from {} ({})", self.config.endpoint, self.config.model);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| WrapupError::InferenceFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WrapupError::InferenceFailed(format!("HTTP {}: {}", status, body.trim())));
        }

        let parsed: ChatResponse =
            response.json().map_err(|e| WrapupError::InferenceFailed(format!("Invalid response: {}", e)))?;

        parsed
            .text()
            .map(str::to_string)
            .ok_or_else(|| WrapupError::InferenceFailed("response contained no text".to_string()))
    }

    pub fn summarize(&self, aggregates: &Aggregates, year: Option<i32>) -> Result<String> {
        self.complete(build_prompt(aggregates, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{AuthorCount, LongestBook};

    fn aggregates() -> Aggregates {
        let mut aggregates = Aggregates::default();
        aggregates.books.count = 12;
        aggregates.books.average_rating = Some(4.25);
        aggregates.books.longest = Some(LongestBook { title: "Anathem".to_string(), pages: 937 });
        aggregates.books.top_authors = vec![AuthorCount { author: "Ursula K. Le Guin".to_string(), books: 3 }];
        aggregates.library.checkouts = 10;
        aggregates.library.estimated_savings_usd = 230.0;
        aggregates
    }

    #[test]
    fn test_prompt_mentions_stats() {
        let prompt = build_prompt(&aggregates(), Some(2025));

        assert!(prompt.contains("recap of 2025"));
        assert!(prompt.contains("Books: 12"));
        assert!(prompt.contains("Library checkouts: 10"));
        assert!(prompt.contains("Average rating: 4.25"));
        assert!(prompt.contains("Anathem (937 pages)"));
        assert!(prompt.contains("Ursula K. Le Guin"));
        assert!(prompt.contains("$23"));
        assert!(prompt.contains("$230.00"));
        assert!(!prompt.contains("Workouts"));
        assert!(!prompt.contains("librarian"));
    }

    #[test]
    fn test_request_payload() {
        let client = InferenceClient::new(InferenceConfig::default(), "sk-test").unwrap();
        let value = serde_json::to_value(client.request_for("hello")).unwrap();

        assert_eq!(value["model"], "llama3.3-70b-instruct");
        assert_eq!(value["max_tokens"], 500);
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value["messages"][0]["content"].as_str().unwrap().contains("librarian"));
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = InferenceClient::new(InferenceConfig::default(), "sk-test").unwrap();
        assert!(!format!("{:?}", client).contains("sk-test"));
    }

    #[test]
    fn test_response_text() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  What a year!  "}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), Some("What a year!"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn test_unreachable_endpoint_is_inference_failure() {
        let config = InferenceConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout: Duration::from_secs(2),
            ..InferenceConfig::default()
        };
        let client = InferenceClient::new(config, "sk-test").unwrap();

        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, WrapupError::InferenceFailed(_)));
    }
}
