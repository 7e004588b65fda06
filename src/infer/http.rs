//! OpenAI-compatible HTTP inference adapter.
//!
//! Talks to a chat-completions endpoint (vLLM, llama.cpp server, or any
//! OpenAI-compatible gateway) over synchronous `ureq`. Association lookups
//! sample at the configured temperature; scoring runs at temperature 0 with
//! token logprobs enabled and searches the generated tokens plus their
//! top-candidate lists for the target word.

use std::time::Duration;

use serde::Deserialize;

use crate::error::InferError;

use super::{InferResult, InferenceEngine, ScoreOutcome, parse_associations};

/// Configuration for the HTTP inference adapter.
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Base URL of the OpenAI-compatible API, e.g. `http://127.0.0.1:8000/v1`.
    pub base_url: String,
    /// Model identifier passed through in each request.
    pub model: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Sampling temperature for association generation.
    pub temperature: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Candidate list depth requested when scoring.
    pub top_logprobs: u32,
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/v1".into(),
            model: "default".into(),
            api_key: None,
            temperature: 0.7,
            timeout_secs: 60,
            top_logprobs: 20,
        }
    }
}

/// Token budget for an association reply (a short comma-separated list).
const ASSOCIATION_MAX_TOKENS: u32 = 100;
/// Token budget when scoring; a few tokens in case the target is multi-token.
const SCORE_MAX_TOKENS: u32 = 5;

/// HTTP-backed [`InferenceEngine`].
pub struct HttpEngine {
    agent: ureq::Agent,
    config: HttpEngineConfig,
}

impl HttpEngine {
    /// Create an engine from the given configuration.
    pub fn new(config: HttpEngineConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent, config }
    }

    fn completions(&self, body: serde_json::Value) -> InferResult<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut request = self.agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref key) = self.config.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }
        let response = request.send_json(body).map_err(|e| InferError::Transport {
            message: e.to_string(),
        })?;
        response
            .into_json()
            .map_err(|e| InferError::MalformedResponse {
                message: format!("failed to parse JSON: {e}"),
            })
    }

    fn first_choice(response: ChatResponse) -> InferResult<Choice> {
        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferError::MalformedResponse {
                message: "response contained no choices".into(),
            })
    }
}

impl InferenceEngine for HttpEngine {
    fn associations(&self, word: &str, n: usize) -> InferResult<Vec<String>> {
        let prompt = format!(
            "List {n} single-word associations for the word '{word}'. \
             Provide only the words, separated by commas."
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": ASSOCIATION_MAX_TOKENS,
        });
        let choice = Self::first_choice(self.completions(body)?)?;
        let content = choice.message.content.unwrap_or_default();
        Ok(parse_associations(&content, word, n))
    }

    fn score(&self, source: &str, target: &str) -> InferResult<ScoreOutcome> {
        let prompt = format!("Word: {source}. Association:");
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
            "max_tokens": SCORE_MAX_TOKENS,
            "logprobs": true,
            "top_logprobs": self.config.top_logprobs,
        });
        let choice = Self::first_choice(self.completions(body)?)?;
        let token_logprobs = choice
            .logprobs
            .and_then(|lp| lp.content)
            .ok_or(InferError::MissingLogprobs)?;
        Ok(best_target_logprob(&token_logprobs, target))
    }
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Search every generated token position (and its candidate list) for the
/// target word; the best match wins. The target may legitimately appear at
/// any position of the short completion, so all positions are scanned.
fn best_target_logprob(positions: &[TokenLogprob], target: &str) -> ScoreOutcome {
    let wanted = target.trim().to_lowercase();
    let mut best: Option<f64> = None;

    let mut consider = |token: &str, logprob: f64| {
        if token.trim().to_lowercase() == wanted && best.is_none_or(|b| logprob > b) {
            best = Some(logprob);
        }
    };

    for position in positions {
        consider(&position.token, position.logprob);
        for candidate in position.top_logprobs.iter().flatten() {
            consider(&candidate.token, candidate.logprob);
        }
    }

    match best {
        // Clamp: a proper log-probability is never positive.
        Some(logprob) => ScoreOutcome::Found {
            logprob: logprob.min(0.0),
        },
        None => ScoreOutcome::NotInCandidates,
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    logprobs: Option<Logprobs>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Logprobs {
    content: Option<Vec<TokenLogprob>>,
}

#[derive(Debug, Deserialize)]
struct TokenLogprob {
    token: String,
    logprob: f64,
    top_logprobs: Option<Vec<TopLogprob>>,
}

#[derive(Debug, Deserialize)]
struct TopLogprob {
    token: String,
    logprob: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(token: &str, logprob: f64, candidates: &[(&str, f64)]) -> TokenLogprob {
        TokenLogprob {
            token: token.into(),
            logprob,
            top_logprobs: Some(
                candidates
                    .iter()
                    .map(|(t, lp)| TopLogprob {
                        token: (*t).into(),
                        logprob: *lp,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn finds_target_in_generated_token() {
        let positions = vec![position(" gravity", -0.3, &[("space", -2.0)])];
        assert_eq!(
            best_target_logprob(&positions, "gravity"),
            ScoreOutcome::Found { logprob: -0.3 }
        );
    }

    #[test]
    fn finds_target_in_candidate_list() {
        let positions = vec![position("space", -0.5, &[("Gravity", -1.2), ("mass", -2.0)])];
        assert_eq!(
            best_target_logprob(&positions, "gravity"),
            ScoreOutcome::Found { logprob: -1.2 }
        );
    }

    #[test]
    fn takes_best_of_repeated_matches() {
        let positions = vec![
            position("gravity", -2.5, &[]),
            position("gravity", -0.8, &[]),
        ];
        assert_eq!(
            best_target_logprob(&positions, "gravity"),
            ScoreOutcome::Found { logprob: -0.8 }
        );
    }

    #[test]
    fn missing_target_reports_not_in_candidates() {
        let positions = vec![position("space", -0.5, &[("mass", -2.0)])];
        assert_eq!(
            best_target_logprob(&positions, "banana"),
            ScoreOutcome::NotInCandidates
        );
    }

    #[test]
    fn positive_logprob_clamped_to_zero() {
        // Some backends emit tiny positive values from float error.
        let positions = vec![position("gravity", 1e-7, &[])];
        match best_target_logprob(&positions, "gravity") {
            ScoreOutcome::Found { logprob } => assert!(logprob <= 0.0),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
