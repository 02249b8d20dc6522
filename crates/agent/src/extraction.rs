use regex::Regex;
use shelfdesk_core::domain::conversation::ChatMessage;
use shelfdesk_core::domain::order::OrderNumber;
use tracing::debug;

use crate::llm::LlmClient;

pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Order-ID recognizer. Patterns are tried in priority order, first match wins.
///
/// 1. `BW` followed by exactly twelve digits.
/// 2. `UR` followed by ten or more digits.
/// 3. `BW` or `UR` followed by any number of digits.
///
/// When nothing matches, the backend may be asked to pull an ID out of the text.
/// Its answer is only accepted if it passes the same shape check.
pub struct IdentifierExtractor {
    exact_bw: Regex,
    long_ur: Regex,
    loose: Regex,
    generated: Regex,
}

impl IdentifierExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            exact_bw: Regex::new(r"(?i)(BW[0-9]{12})(?:[^0-9]|$)")?,
            long_ur: Regex::new(r"(?i)UR[0-9]{10,}")?,
            loose: Regex::new(r"(?i)(?:BW|UR)[0-9]+")?,
            generated: Regex::new(r"(?i)^(?:BW|UR)[0-9]+$")?,
        })
    }

    /// Pattern stages only. Never calls the backend.
    pub fn match_pattern(&self, text: &str) -> Option<OrderNumber> {
        let raw = self
            .exact_bw
            .captures(text)
            .and_then(|captures| captures.get(1))
            .or_else(|| self.long_ur.find(text))
            .or_else(|| self.loose.find(text))?;

        OrderNumber::parse(raw.as_str()).ok()
    }

    /// Validation gate for backend output: trimmed, uppercased, and shaped like an order ID.
    pub fn accept_generated(&self, raw: &str) -> Option<OrderNumber> {
        let candidate = raw.trim().trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.'));
        if !self.generated.is_match(candidate) {
            return None;
        }
        OrderNumber::parse(candidate).ok()
    }

    /// Full extraction. When no pattern matches and `generative` is set, the backend is asked once.
    pub async fn extract(
        &self,
        text: &str,
        llm: &dyn LlmClient,
        generative: bool,
    ) -> Option<OrderNumber> {
        if let Some(order_number) = self.match_pattern(text) {
            return Some(order_number);
        }

        if !generative {
            return None;
        }

        match llm.complete(&extraction_messages(text), EXTRACTION_TEMPERATURE).await {
            Ok(answer) => {
                let accepted = self.accept_generated(&answer);
                debug!(
                    event_name = "agent.extraction.fallback",
                    accepted = accepted.is_some(),
                    "generative order id extraction finished"
                );
                accepted
            }
            Err(error) => {
                debug!(
                    event_name = "agent.extraction.fallback",
                    error = %error,
                    "generative order id extraction failed"
                );
                None
            }
        }
    }
}

pub fn extraction_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "Extract a Bookswagon order ID from the user text. Order IDs start with UR or BW \
             followed by digits, for example BW123456789012 or UR1234567890. Reply with the ID \
             only, or with the word None if there is no order ID.",
        ),
        ChatMessage::user(format!("Extract the order ID from this text: \"{text}\"")),
    ]
}
