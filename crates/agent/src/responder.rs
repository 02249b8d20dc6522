use std::sync::Arc;

use serde::Serialize;
use shelfdesk_core::domain::conversation::{ChatMessage, Language};
use shelfdesk_core::domain::order::OrderRecord;
use shelfdesk_core::knowledge::KnowledgeBase;
use tracing::{debug, warn};

use crate::language::is_devanagari;
use crate::llm::{LlmClient, LlmError, ResilientLlm};

pub const ORDER_ANSWER_TEMPERATURE: f32 = 0.3;
pub const GENERAL_ANSWER_TEMPERATURE: f32 = 0.5;
pub const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// What the customer seems to be asking about an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryFocus {
    Status,
    Tracking,
    Cancellation,
    General,
}

impl QueryFocus {
    pub fn of(query: &str) -> Self {
        let query = query.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| query.contains(word));

        if mentions(&["cancel", "रद्द", "kyu", "why"]) {
            Self::Cancellation
        } else if mentions(&["track", "tracking"]) {
            Self::Tracking
        } else if mentions(&["status", "where is", "kab tak", "kahan hai"]) {
            Self::Status
        } else {
            Self::General
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Cancellation => {
                "The customer is asking about cancellation. If the order is cancelled, give the \
                 recorded reason or say that none was recorded. If it is not cancelled, state the \
                 current status and briefly mention the cancellation policy from the FAQ."
            }
            Self::Tracking => {
                "The customer is asking about tracking. Give the tracking number if there is one, \
                 otherwise say it is not yet available."
            }
            Self::Status => "The customer is asking about the order status. State the current status.",
            Self::General => {
                "Give the most relevant facts for the question, such as status and expected delivery."
            }
        }
    }
}

#[derive(Serialize)]
struct OrderFacts<'a> {
    order_number: &'a str,
    purchase_date: Option<String>,
    expected_delivery: Option<String>,
    status: &'a str,
    payment_status: Option<&'a str>,
    tracking: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancellation_reason: Option<&'a str>,
    products: Vec<&'a str>,
}

impl<'a> OrderFacts<'a> {
    fn new(order: &'a OrderRecord) -> Self {
        Self {
            order_number: order.order_number.as_str(),
            purchase_date: order.purchase_date.map(|date| date.format("%d %b %Y").to_string()),
            expected_delivery: order.promise_date.map(|date| date.format("%d %b %Y").to_string()),
            status: order.status.label(),
            payment_status: order.payment_status.as_deref(),
            tracking: order.tracking_number.as_deref().unwrap_or("Not yet available"),
            cancellation_reason: if order.status.is_cancelled() {
                Some(order.cancellation_reason().unwrap_or("Not recorded"))
            } else {
                None
            },
            products: order.books.iter().map(|book| book.product_name.as_str()).collect(),
        }
    }
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::Primary => "Respond in English.",
        Language::Secondary => "Respond in Hindi or Hinglish.",
    }
}

/// Grounded prompt for a question about a known order.
pub fn order_messages(
    knowledge: &KnowledgeBase,
    order: &OrderRecord,
    query: &str,
    language: Language,
) -> Vec<ChatMessage> {
    let facts = serde_json::to_string_pretty(&OrderFacts::new(order))
        .unwrap_or_else(|_| format!("{{\"order_number\": \"{}\"}}", order.order_number));

    let prompt = format!(
        "Use the Order Details and FAQ Knowledge below to answer the customer's question.\n\
         {language}\n\n\
         FAQ Knowledge:\n{faq}\n\n\
         Order Details:\n{facts}\n\n\
         Customer Query: \"{query}\"\n\n\
         Instructions:\n\
         - {focus}\n\
         - Answer only from the facts above. Never invent order details.\n\
         - Never claim to cancel, refund or change the order yourself.\n\
         - If the details contradict the customer's premise, politely state the actual facts.\n\
         - Keep the answer to about 3 sentences.",
        language = language_instruction(language),
        faq = knowledge.faq,
        focus = QueryFocus::of(query).instruction(),
    );

    vec![
        ChatMessage::system(format!(
            "You are '{}', a {} customer support assistant. You answer questions using the order \
             details and FAQ knowledge you are given.",
            knowledge.assistant_name, knowledge.store_name
        )),
        ChatMessage::user(prompt),
    ]
}

/// Prompt for a question with no order in focus. `history` is the bounded session history
/// before this turn.
pub fn general_messages<'h>(
    knowledge: &KnowledgeBase,
    history: impl IntoIterator<Item = &'h ChatMessage>,
    query: &str,
    language: Language,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are '{assistant}', a customer service assistant for {store}. Answer general \
         questions using the FAQ Knowledge. If the question is about a specific order, ask the \
         customer for their order ID (it starts with BW or UR). Never invent order details and \
         never claim to cancel or refund anything yourself. Keep the answer to about 3 \
         sentences. {language}\n\nFAQ Knowledge:\n{faq}",
        assistant = knowledge.assistant_name,
        store = knowledge.store_name,
        language = language_instruction(language),
        faq = knowledge.faq,
    );

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(history.into_iter().cloned());
    messages.push(ChatMessage::user(query));
    messages
}

pub fn translation_messages(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Translate the following English customer service response to conversational Hindi or \
         Hinglish (a natural mix of Hindi and English). Keep order numbers, book titles and \
         tracking numbers unchanged.\n\nEnglish Response:\n\"{text}\"\n\nProvide ONLY the \
         translated text."
    ))]
}

/// True when the text already reads as Hindi or Hinglish.
pub fn shows_secondary_signal(text: &str, knowledge: &KnowledgeBase) -> bool {
    text.chars().any(is_devanagari)
        || text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| knowledge.lexicon.is_loanword(&word.to_lowercase()))
}

/// Open-ended answers from the generative backend.
#[derive(Clone)]
pub struct GenerativeResponder {
    knowledge: Arc<KnowledgeBase>,
    llm: ResilientLlm,
}

impl GenerativeResponder {
    pub fn new(knowledge: Arc<KnowledgeBase>, llm: ResilientLlm) -> Self {
        Self { knowledge, llm }
    }

    pub async fn answer_order(
        &self,
        order: &OrderRecord,
        query: &str,
        language: Language,
    ) -> Result<String, LlmError> {
        let messages = order_messages(&self.knowledge, order, query, language);
        let answer = self.llm.complete(&messages, ORDER_ANSWER_TEMPERATURE).await?;
        Ok(self.localize(answer, language).await)
    }

    pub async fn answer_general<'h>(
        &self,
        history: impl IntoIterator<Item = &'h ChatMessage>,
        query: &str,
        language: Language,
    ) -> Result<String, LlmError> {
        let messages = general_messages(&self.knowledge, history, query, language);
        let answer = self.llm.complete(&messages, GENERAL_ANSWER_TEMPERATURE).await?;
        Ok(self.localize(answer, language).await)
    }

    /// One translation pass when a secondary-language answer came back in English.
    /// The untranslated text is kept if translation fails.
    async fn localize(&self, answer: String, language: Language) -> String {
        if !language.is_secondary() || shows_secondary_signal(&answer, &self.knowledge) {
            return answer;
        }

        debug!(event_name = "agent.responder.translate", "translating generated answer");
        match self.llm.complete(&translation_messages(&answer), TRANSLATION_TEMPERATURE).await {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => answer,
            Err(error) => {
                warn!(
                    event_name = "agent.responder.translate_failed",
                    error = %error,
                    "translation failed, keeping original answer"
                );
                answer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use shelfdesk_core::domain::conversation::{ChatMessage, Language, Role};
    use shelfdesk_core::domain::order::{Book, OrderNumber, OrderRecord, OrderStatus};
    use shelfdesk_core::knowledge::KnowledgeBase;

    use super::{general_messages, order_messages, shows_secondary_signal, QueryFocus};

    fn cancelled_order() -> OrderRecord {
        let mut order = OrderRecord::new(
            OrderNumber::parse("BW202403150002").expect("id"),
            OrderStatus::Cancelled,
        );
        order.recorded_cancellation_reason = Some("Customer requested cancellation".to_string());
        order.with_books([Book::new("Wings of Fire"), Book::new("The Guide")])
    }

    #[test]
    fn general_prompts_differ_only_in_the_query() {
        let knowledge = KnowledgeBase::default();
        let fresh: Vec<ChatMessage> = Vec::new();
        let first =
            general_messages(&knowledge, &fresh, "What is your return policy?", Language::Primary);
        let second =
            general_messages(&knowledge, &fresh, "How long does delivery take?", Language::Primary);

        assert_eq!(first.len(), 2);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0], second[0]);
        assert_eq!(first[1].role, Role::User);
        assert_eq!(first[1].content, "What is your return policy?");
        assert_eq!(second[1].content, "How long does delivery take?");
    }

    #[test]
    fn general_prompts_carry_bounded_history_in_order() {
        let knowledge = KnowledgeBase::default();
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello!")];
        let messages = general_messages(&knowledge, &history, "refunds?", Language::Secondary);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "Hello!");
        assert!(messages[0].content.contains("Respond in Hindi or Hinglish."));
        assert!(messages[0].content.contains(&knowledge.faq));
    }

    #[test]
    fn order_prompt_embeds_facts_faq_and_literal_query() {
        let knowledge = KnowledgeBase::default();
        let messages = order_messages(&knowledge, &cancelled_order(), "why?", Language::Primary);

        assert_eq!(messages.len(), 2);
        let prompt = &messages[1].content;
        assert!(prompt.contains("\"order_number\": \"BW202403150002\""));
        assert!(prompt.contains("Customer requested cancellation"));
        assert!(prompt.contains("Wings of Fire"));
        assert!(prompt.contains("Customer Query: \"why?\""));
        assert!(prompt.contains(&knowledge.faq));
        assert!(prompt.contains("Never claim to cancel"));
    }

    #[test]
    fn non_cancelled_orders_omit_the_reason_field() {
        let knowledge = KnowledgeBase::default();
        let mut order = cancelled_order();
        order.status = OrderStatus::Shipped;

        let messages = order_messages(&knowledge, &order, "where is it", Language::Primary);
        assert!(!messages[1].content.contains("cancellation_reason"));
    }

    #[test]
    fn query_focus_prefers_cancellation() {
        assert_eq!(QueryFocus::of("why not tracking"), QueryFocus::Cancellation);
        assert_eq!(QueryFocus::of("tracking number?"), QueryFocus::Tracking);
        assert_eq!(QueryFocus::of("Where is my parcel"), QueryFocus::Status);
        assert_eq!(QueryFocus::of("is it gift wrapped"), QueryFocus::General);
    }

    #[test]
    fn secondary_signal_detects_script_and_loanwords() {
        let knowledge = KnowledgeBase::default();
        assert!(shows_secondary_signal("Aapka order ship ho gaya hai", &knowledge));
        assert!(shows_secondary_signal("आपका ऑर्डर", &knowledge));
        assert!(!shows_secondary_signal("Your order has shipped.", &knowledge));
    }
}
