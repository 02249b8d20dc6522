use shelfdesk_core::domain::conversation::{ChatMessage, Language};
use shelfdesk_core::knowledge::Lexicon;
use tracing::debug;

use crate::llm::LlmClient;

pub const CLASSIFICATION_TEMPERATURE: f32 = 0.1;

/// Outcome of the checks that need no backend call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptSignal {
    /// Devanagari present.
    Secondary,
    /// Plain ASCII without any Hinglish loanword.
    Primary,
    /// Needs the backend to decide.
    Ambiguous,
}

pub fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

pub fn script_signal(text: &str, lexicon: &Lexicon) -> ScriptSignal {
    if text.chars().any(is_devanagari) {
        return ScriptSignal::Secondary;
    }

    if text.is_ascii() && !words(text).any(|word| lexicon.is_loanword(&word)) {
        return ScriptSignal::Primary;
    }

    ScriptSignal::Ambiguous
}

/// True when the message carries no language evidence at all: digits, punctuation,
/// order IDs and the word "all".
pub fn is_language_neutral(text: &str) -> bool {
    words(text).all(|word| {
        word == "all"
            || word.chars().all(|c| c.is_ascii_digit())
            || is_order_token(&word)
    })
}

/// Returns true when the message is Hindi or Hinglish.
pub async fn detect(text: &str, lexicon: &Lexicon, llm: &dyn LlmClient) -> bool {
    match script_signal(text, lexicon) {
        ScriptSignal::Secondary => true,
        ScriptSignal::Primary => false,
        ScriptSignal::Ambiguous => {
            match llm.complete(&classification_messages(text), CLASSIFICATION_TEMPERATURE).await {
                Ok(answer) => parse_classification(&answer).unwrap_or_else(|| {
                    debug!(
                        event_name = "agent.language.unexpected_answer",
                        answer = %answer,
                        "language classifier answer discarded"
                    );
                    false
                }),
                Err(error) => {
                    debug!(
                        event_name = "agent.language.failed",
                        error = %error,
                        "language classification failed, assuming english"
                    );
                    false
                }
            }
        }
    }
}

/// Language for this turn, keeping `previous` when the message is language-neutral.
pub async fn resolve(
    text: &str,
    previous: Language,
    lexicon: &Lexicon,
    llm: &dyn LlmClient,
) -> Language {
    if is_language_neutral(text) {
        return previous;
    }
    Language::from_secondary_flag(detect(text, lexicon, llm).await)
}

pub fn classification_messages(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Analyze the following text. Does it contain Hindi words mixed with English \
         (Hinglish), or is it purely English?\n\nText: \"{text}\"\n\nReturn ONLY the word \
         'hindi' if it contains Hindi or Hinglish. Otherwise, return ONLY the word 'english'."
    ))]
}

fn parse_classification(answer: &str) -> Option<bool> {
    let normalized =
        answer.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase();
    match normalized.as_str() {
        "hindi" | "hinglish" => Some(true),
        "english" => Some(false),
        _ => None,
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

fn is_order_token(word: &str) -> bool {
    let mut chars = word.chars();
    let prefix = chars.by_ref().take(2).collect::<String>();
    let rest = chars.as_str();
    matches!(prefix.as_str(), "bw" | "ur")
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_digit())
}
