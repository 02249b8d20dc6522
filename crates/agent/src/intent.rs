use std::collections::BTreeSet;

use shelfdesk_core::knowledge::Lexicon;

/// Independent signals read off a single message. The orchestrator resolves priority.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Intent {
    pub is_exit: bool,
    pub is_cancellation_query: bool,
    /// Valid 0-based book indices, sorted and unique.
    pub book_selection: Vec<usize>,
    /// The message was shaped like a selection, even if none of its indices were valid.
    pub selection_requested: bool,
}

impl Intent {
    /// The single index named by a message that is exactly one digit.
    pub fn single_digit_index(text: &str, book_count: usize) -> Option<usize> {
        let trimmed = text.trim();
        let mut chars = trimmed.chars();
        let digit = chars.next()?.to_digit(10)? as usize;
        if chars.next().is_some() || digit == 0 || digit > book_count {
            return None;
        }
        Some(digit - 1)
    }
}

pub fn classify(text: &str, book_count: usize, lexicon: &Lexicon) -> Intent {
    let normalized = text.to_lowercase();

    let is_exit = lexicon.exit_phrases.iter().any(|phrase| normalized.contains(phrase.as_str()));
    let is_cancellation_query = lexicon
        .cancellation_keywords
        .iter()
        .any(|keyword| normalized.contains(keyword.as_str()));

    let tokens = tokenize(&normalized);
    let selection_requested = is_selection_shaped(&tokens, lexicon);
    let book_selection =
        if selection_requested { parse_selection(&tokens, book_count) } else { Vec::new() };

    Intent { is_exit, is_cancellation_query, book_selection, selection_requested }
}

fn tokenize(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| c == ',' || c == ';' || c == '.' || c == '#' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Every token is an integer, "all" or a filler word, and at least one is not a filler.
fn is_selection_shaped(tokens: &[&str], lexicon: &Lexicon) -> bool {
    let mut has_index = false;
    for token in tokens {
        if *token == "all" || is_integer(token) {
            has_index = true;
        } else if !lexicon.is_selection_filler(token) {
            return false;
        }
    }
    has_index
}

fn parse_selection(tokens: &[&str], book_count: usize) -> Vec<usize> {
    let mut selected = BTreeSet::new();
    for token in tokens {
        if *token == "all" {
            selected.extend(0..book_count);
            continue;
        }
        if let Ok(position) = token.parse::<usize>() {
            if (1..=book_count).contains(&position) {
                selected.insert(position - 1);
            }
        }
    }
    selected.into_iter().collect()
}

fn is_integer(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}
