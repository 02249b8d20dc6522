//! Read-only reference data shared by the classifiers and the responder.
//!
//! Everything here is built once at startup and handed out behind an `Arc`.

use std::fs;

use crate::config::{AgentConfig, ConfigError};

const BUILTIN_FAQ: &str = include_str!("../knowledge/faq.md");

const EXIT_PHRASES: &[&str] = &[
    "exit",
    "quit",
    "bye",
    "goodbye",
    "thanks",
    "thank you",
    "ok bye",
    "tata",
    "ta ta",
    "धन्यवाद",
    "अलविदा",
    "बाय",
];

const CANCELLATION_KEYWORDS: &[&str] =
    &["cancel", "cancelled", "canceled", "cancellation", "why", "kyu", "kyun", "kyon", "रद्द"];

const HINGLISH_LOANWORDS: &[&str] = &[
    "mera", "meri", "mere", "mujhe", "kya", "kyu", "kyun", "kyon", "kab", "kaise", "kahan",
    "kitne", "kar", "karo", "kariye", "hai", "hain", "nahi", "nahin", "abhi", "tak", "batao",
    "bataiye", "aayega", "aayegi", "milega", "milegi", "hua", "hui", "kripya", "dhanyavaad",
    "shukriya", "bhai", "wala", "wali", "kitna", "paisa",
];

const SELECTION_FILLERS: &[&str] = &[
    "and", "&", "book", "books", "item", "items", "number", "numbers", "no", "show", "me", "please",
    "details", "of", "the", "select", "choose",
];

/// Keyword sets used by the language and intent classifiers. Entries are lowercase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lexicon {
    pub exit_phrases: Vec<String>,
    pub cancellation_keywords: Vec<String>,
    pub loanwords: Vec<String>,
    pub selection_fillers: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        fn owned(words: &[&str]) -> Vec<String> {
            words.iter().map(|word| word.to_string()).collect()
        }

        Self {
            exit_phrases: owned(EXIT_PHRASES),
            cancellation_keywords: owned(CANCELLATION_KEYWORDS),
            loanwords: owned(HINGLISH_LOANWORDS),
            selection_fillers: owned(SELECTION_FILLERS),
        }
    }
}

impl Lexicon {
    pub fn is_loanword(&self, token: &str) -> bool {
        self.loanwords.iter().any(|word| word == token)
    }

    pub fn is_selection_filler(&self, token: &str) -> bool {
        self.selection_fillers.iter().any(|word| word == token)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeBase {
    pub store_name: String,
    pub assistant_name: String,
    pub faq: String,
    pub lexicon: Lexicon,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            store_name: "Bookswagon".to_string(),
            assistant_name: "Paige".to_string(),
            faq: BUILTIN_FAQ.trim().to_string(),
            lexicon: Lexicon::default(),
        }
    }
}

impl KnowledgeBase {
    /// Builds the knowledge base from config, reading the FAQ override file when one is set.
    pub fn from_config(agent: &AgentConfig) -> Result<Self, ConfigError> {
        let faq = match &agent.faq_path {
            Some(path) => fs::read_to_string(path)
                .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?,
            None => BUILTIN_FAQ.to_string(),
        };

        if faq.trim().is_empty() {
            return Err(ConfigError::Validation("agent.faq_path points to an empty file".into()));
        }

        Ok(Self {
            store_name: agent.store_name.trim().to_string(),
            assistant_name: agent.assistant_name.trim().to_string(),
            faq: faq.trim().to_string(),
            lexicon: Lexicon::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{KnowledgeBase, Lexicon};
    use crate::config::{AppConfig, ConfigError};

    #[test]
    fn builtin_faq_covers_return_and_cancellation_policy() {
        let knowledge = KnowledgeBase::default();
        assert!(knowledge.faq.contains("15 days"));
        assert!(knowledge.faq.contains("at most 2 days"));
        assert!(knowledge.faq.contains("7-10 business days"));
    }

    #[test]
    fn lexicon_entries_are_lowercase() {
        let lexicon = Lexicon::default();
        for word in lexicon
            .exit_phrases
            .iter()
            .chain(&lexicon.cancellation_keywords)
            .chain(&lexicon.loanwords)
            .chain(&lexicon.selection_fillers)
        {
            assert_eq!(word, &word.to_lowercase(), "{word}");
        }
        assert!(lexicon.is_loanword("kab"));
        assert!(!lexicon.is_loanword("order"));
    }

    #[test]
    fn faq_override_is_read_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("faq.md");
        fs::write(&path, "## Hours\n- Support is open 9-5.\n").expect("write faq");

        let mut agent = AppConfig::default().agent;
        agent.faq_path = Some(path);
        agent.store_name = " Corner Books ".to_string();

        let knowledge = KnowledgeBase::from_config(&agent).expect("knowledge base");
        assert_eq!(knowledge.faq, "## Hours\n- Support is open 9-5.");
        assert_eq!(knowledge.store_name, "Corner Books");
    }

    #[test]
    fn missing_faq_override_is_a_read_error() {
        let mut agent = AppConfig::default().agent;
        agent.faq_path = Some("/definitely/not/here/faq.md".into());

        let error = KnowledgeBase::from_config(&agent).expect_err("missing file");
        assert!(matches!(error, ConfigError::ReadFile { .. }));
    }
}
