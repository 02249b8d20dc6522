use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shelfdesk_agent::extraction::extraction_messages;
use shelfdesk_agent::llm::{LlmClient, LlmError, RetryPolicy};
use shelfdesk_agent::runtime::{AgentRuntime, RuntimeSettings};
use shelfdesk_core::domain::conversation::{
    ChatMessage, Language, SessionId, TurnReply, TurnRequest,
};
use shelfdesk_core::domain::order::{Book, OrderNumber, OrderRecord, OrderStatus};
use shelfdesk_core::knowledge::KnowledgeBase;
use shelfdesk_db::repositories::{
    InMemoryOrderRepository, InMemorySessionRepository, OrderRepository, RepositoryError,
    SessionRepository,
};

/// Backend double that replays canned answers and keeps every prompt it was sent.
///
/// Order-ID extraction requests are answered with `None` and counted on their own, so
/// `calls` only sees classification, answer and translation requests.
#[derive(Default)]
struct ScriptedLlm {
    answers: Mutex<Vec<Result<String, LlmError>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
    extraction_calls: AtomicUsize,
}

impl ScriptedLlm {
    fn answering(answers: Vec<Result<&str, LlmError>>) -> Arc<Self> {
        let mut answers = answers
            .into_iter()
            .map(|answer| answer.map(str::to_string))
            .collect::<Vec<_>>();
        answers.reverse();
        Arc::new(Self { answers: Mutex::new(answers), ..Self::default() })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
    ) -> Result<String, LlmError> {
        let extraction_prompt = &extraction_messages("")[0];
        if messages.first() == Some(extraction_prompt) {
            self.extraction_calls.fetch_add(1, Ordering::SeqCst);
            return Ok("None".to_string());
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("prompt lock").push(messages.to_vec());
        self.answers
            .lock()
            .expect("answer lock")
            .pop()
            .unwrap_or_else(|| Err(LlmError::Network("script exhausted".to_string())))
    }
}

fn order_number(raw: &str) -> OrderNumber {
    OrderNumber::parse(raw).expect("valid order number")
}

fn demo_orders() -> Vec<OrderRecord> {
    let mut shipped = OrderRecord::new(order_number("UR1234567890"), OrderStatus::Shipped);
    shipped.tracking_number = Some("DTDC7700112233".to_string());
    let shipped = shipped.with_books([Book::new("The Midnight Library")
        .with_isbn("9780525559474")
        .with_tracking_number("DTDC7700112233")]);

    let processing = OrderRecord::new(order_number("BW202405120001"), OrderStatus::Processing)
        .with_books([
            Book::new("Atomic Habits"),
            Book::new("Sapiens: A Brief History of Humankind"),
            Book::new("The Alchemist"),
        ]);

    let mut cancelled = OrderRecord::new(order_number("BW202403150002"), OrderStatus::Cancelled);
    cancelled.recorded_cancellation_reason = Some("Customer requested cancellation".to_string());
    let cancelled = cancelled.with_books([Book::new("Wings of Fire"), Book::new("The Guide")]);

    vec![shipped, processing, cancelled]
}

/// How `UnreliableOrders` misbehaves for its troubled order number.
#[derive(Clone, Copy)]
enum Trouble {
    StoreError,
    Stall,
}

/// Serves the demo orders, except that one order number fails or hangs.
struct UnreliableOrders {
    inner: InMemoryOrderRepository,
    troubled: OrderNumber,
    trouble: Trouble,
}

#[async_trait]
impl OrderRepository for UnreliableOrders {
    async fn lookup_order(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<OrderRecord>, RepositoryError> {
        if *order_number != self.troubled {
            return self.inner.lookup_order(order_number).await;
        }
        match self.trouble {
            Trouble::StoreError => Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)),
            Trouble::Stall => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                self.inner.lookup_order(order_number).await
            }
        }
    }
}

struct Harness {
    runtime: AgentRuntime,
    sessions: Arc<InMemorySessionRepository>,
    llm: Arc<ScriptedLlm>,
}

impl Harness {
    fn new(llm: Arc<ScriptedLlm>) -> Self {
        Self::with_orders(llm, Arc::new(InMemoryOrderRepository::with_orders(demo_orders())))
    }

    fn with_orders(llm: Arc<ScriptedLlm>, orders: Arc<dyn OrderRepository>) -> Self {
        let sessions = Arc::new(InMemorySessionRepository::default());
        let settings = RuntimeSettings {
            lookup_timeout: Duration::from_millis(100),
            retry: RetryPolicy {
                max_attempts: 1,
                attempt_timeout: Duration::from_secs(1),
                backoff: Duration::ZERO,
            },
            ..RuntimeSettings::default()
        };
        let runtime = AgentRuntime::new(
            orders,
            sessions.clone(),
            llm.clone(),
            Arc::new(KnowledgeBase::default()),
            settings,
        )
        .expect("runtime builds");

        Self { runtime, sessions, llm }
    }

    async fn say(&self, session: &str, message: &str) -> TurnReply {
        self.runtime
            .handle_turn(TurnRequest {
                session_id: SessionId(session.to_string()),
                message: message.to_string(),
            })
            .await
            .expect("turn succeeds")
    }

    async fn history_len(&self, session: &str) -> usize {
        self.sessions
            .load(&SessionId(session.to_string()))
            .await
            .expect("load session")
            .map_or(0, |session| session.history_len())
    }

    async fn active_order(&self, session: &str) -> Option<String> {
        self.sessions
            .load(&SessionId(session.to_string()))
            .await
            .expect("load session")
            .and_then(|session| session.active_order)
            .map(|order| order.order_number.to_string())
    }
}

#[tokio::test]
async fn shipped_order_lookup_then_cancellation_question_then_unknown_id() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    let found = harness.say("s-1", "Where is my order UR1234567890").await;
    assert!(found.response.contains("The Midnight Library"));
    assert!(found.response.contains("DTDC7700112233"));
    assert_eq!(
        found.follow_up.as_deref(),
        Some("Is there anything else you'd like to know about this order?")
    );
    assert!(!found.end_chat);
    assert_eq!(harness.active_order("s-1").await.as_deref(), Some("UR1234567890"));

    let why = harness.say("s-1", "why was it cancelled").await;
    assert_eq!(
        why.response,
        "Your order UR1234567890 is not cancelled. Its current status is: shipped."
    );

    let missing = harness.say("s-1", "BW000000000000").await;
    assert!(missing.response.contains("couldn't find any order with ID BW000000000000"));
    assert_eq!(missing.follow_up, None);
    assert_eq!(harness.active_order("s-1").await.as_deref(), Some("UR1234567890"));

    assert_eq!(harness.llm.calls(), 0, "every reply above is deterministic");
    assert_eq!(harness.llm.extraction_calls(), 1, "only the question without an ID asked for one");
}

#[tokio::test]
async fn cancelled_order_reason_is_answered_without_the_backend() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    let first = harness.say("s-2", "why was BW202403150002 cancelled?").await;
    assert_eq!(
        first.response,
        "Your order BW202403150002 was cancelled due to: Customer requested cancellation."
    );

    let again = harness.say("s-2", "and why cancel it").await;
    assert_eq!(again.response, first.response);
    assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn multi_book_orders_list_books_and_reject_out_of_range_numbers() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    let listed = harness.say("s-3", "status of BW202405120001").await;
    assert!(listed.response.contains("1. Atomic Habits"));
    assert!(listed.response.contains("3. The Alchemist"));
    assert!(listed
        .follow_up
        .as_deref()
        .is_some_and(|text| text.starts_with("Which specific book")));

    let invalid = harness.say("s-3", "5").await;
    assert_eq!(invalid.response, "Please select a valid book number between 1 and 3.");
    assert_eq!(invalid.follow_up, None);

    let picked = harness.say("s-3", "2").await;
    assert!(picked.response.contains("Sapiens: A Brief History of Humankind"));
    assert!(!picked.response.contains("Atomic Habits"));

    let several = harness.say("s-3", "1,3").await;
    assert!(several.response.contains("1. Atomic Habits"));
    assert!(several.response.contains("3. The Alchemist"));
    assert!(!several.response.contains("Sapiens"));

    assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn history_never_exceeds_three_exchanges() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    for message in ["UR1234567890", "why cancelled", "1", "BW000000000000", "why"] {
        harness.say("s-4", message).await;
    }

    let session = harness
        .sessions
        .load(&SessionId("s-4".to_string()))
        .await
        .expect("load")
        .expect("session stored");
    assert_eq!(session.history_len(), 6);
    let latest = session.history().last().map(|message| message.content.clone());
    assert_eq!(
        latest.as_deref(),
        Some("Your order UR1234567890 is not cancelled. Its current status is: shipped.")
    );
}

#[tokio::test]
async fn general_prompts_do_not_leak_between_sessions() {
    let harness = Harness::new(ScriptedLlm::answering(vec![
        Ok("Returns are accepted within 7 days."),
        Ok("Delivery takes 5 to 7 business days."),
    ]));

    let first = harness.say("alpha", "What is your return policy?").await;
    let second = harness.say("beta", "How long does delivery take?").await;
    assert_eq!(first.response, "Returns are accepted within 7 days.");
    assert_eq!(second.response, "Delivery takes 5 to 7 business days.");

    let prompts = harness.llm.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].len(), 2);
    assert_eq!(prompts[1].len(), 2);
    assert_eq!(prompts[0][0], prompts[1][0]);
    assert_eq!(prompts[1][1].content, "How long does delivery take?");
    assert!(prompts[1].iter().all(|message| message.content != "What is your return policy?"));
}

#[tokio::test]
async fn hinglish_sessions_get_localized_deterministic_replies() {
    let harness = Harness::new(ScriptedLlm::answering(vec![Ok("Hinglish")]));

    let reply = harness.say("s-5", "mera order UR1234567890 kab aayega").await;
    assert!(reply.response.contains("Book: The Midnight Library"));
    assert_eq!(
        reply.follow_up.as_deref(),
        Some("Kya aap is order ke baare mein kuch aur jaanna chahenge?")
    );

    let neutral = harness.say("s-5", "BW000000000000").await;
    assert!(neutral.response.starts_with("Mujhe order ID BW000000000000"));
    assert_eq!(harness.llm.calls(), 1, "only the first message needed classification");

    let session = harness
        .sessions
        .load(&SessionId("s-5".to_string()))
        .await
        .expect("load")
        .expect("stored");
    assert_eq!(session.language, Language::Secondary);
}

#[tokio::test]
async fn backend_failure_degrades_to_a_retry_message() {
    let harness = Harness::new(ScriptedLlm::answering(vec![Err(LlmError::Api {
        status: 503,
        message: "overloaded".to_string(),
    })]));

    let reply = harness.say("s-6", "Do you ship internationally?").await;
    assert_eq!(reply.response, "I'm having trouble connecting right now. Please try again.");
    assert!(!reply.end_chat);

    let session = harness
        .sessions
        .load(&SessionId("s-6".to_string()))
        .await
        .expect("load")
        .expect("turn still recorded");
    assert_eq!(session.history_len(), 2);
}

#[tokio::test]
async fn exit_ends_the_chat_and_drops_the_session() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    harness.say("s-7", "UR1234567890").await;
    assert_eq!(harness.sessions.len().await, 1);

    let bye = harness.say("s-7", "ok bye").await;
    assert!(bye.end_chat);
    assert_eq!(bye.response, "Thank you for using Bookswagon support. Have a good day!");
    assert!(harness.sessions.is_empty().await);
}

#[tokio::test]
async fn blank_messages_are_refused_without_touching_the_session() {
    let harness = Harness::new(ScriptedLlm::answering(Vec::new()));

    let reply = harness.say("s-8", "   ").await;
    assert_eq!(reply.response, "Please enter a message.");
    assert!(harness.sessions.is_empty().await);
    assert_eq!(harness.llm.calls(), 0);
}

async fn failed_lookup_keeps_the_previous_order(trouble: Trouble) {
    let orders = UnreliableOrders {
        inner: InMemoryOrderRepository::with_orders(demo_orders()),
        troubled: order_number("BW202405120001"),
        trouble,
    };
    let harness = Harness::with_orders(ScriptedLlm::answering(Vec::new()), Arc::new(orders));

    harness.say("s-9", "UR1234567890").await;
    let failed = harness.say("s-9", "what about BW202405120001").await;

    assert_eq!(
        failed.response,
        "I couldn't find any order with ID BW202405120001. Please check the order number and try again."
    );
    assert_eq!(failed.follow_up, None);
    assert!(!failed.end_chat);
    assert_eq!(harness.active_order("s-9").await.as_deref(), Some("UR1234567890"));
    assert_eq!(harness.history_len("s-9").await, 4, "the failed turn is still recorded");
}

#[tokio::test]
async fn store_errors_read_as_not_found() {
    failed_lookup_keeps_the_previous_order(Trouble::StoreError).await;
}

#[tokio::test]
async fn stalled_lookups_time_out_as_not_found() {
    failed_lookup_keeps_the_previous_order(Trouble::Stall).await;
}
