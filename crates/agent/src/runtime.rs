use std::sync::Arc;
use std::time::Duration;

use shelfdesk_core::config::{AppConfig, ConfigError};
use shelfdesk_core::domain::conversation::{
    Language, Session, SessionId, TurnReply, TurnRequest, DEFAULT_HISTORY_LIMIT,
};
use shelfdesk_core::domain::order::{OrderNumber, OrderRecord};
use shelfdesk_core::errors::ApplicationError;
use shelfdesk_core::knowledge::KnowledgeBase;
use shelfdesk_db::repositories::{
    OrderRepository, SessionRepository, SqlOrderRepository, SqlSessionRepository,
};
use shelfdesk_db::DbPool;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::decision::{
    cancellation_answer, decide, found_reply, CancellationAnswer, FoundReply, LookupOutcome,
    TurnDecision,
};
use crate::extraction::IdentifierExtractor;
use crate::intent::{classify, Intent};
use crate::language;
use crate::llm::{ChatCompletionsClient, LlmClient, LlmError, ResilientLlm, RetryPolicy};
use crate::phrases::{Phrasebook, EMPTY_MESSAGE};
use crate::render::{RenderError, ReplyRenderer};
use crate::responder::GenerativeResponder;

#[derive(Debug, Error)]
pub enum RuntimeBuildError {
    #[error("order id patterns failed to compile: {0}")]
    Pattern(#[from] regex::Error),
    #[error("reply templates failed to load: {0}")]
    Templates(#[from] RenderError),
    #[error(transparent)]
    Knowledge(#[from] ConfigError),
    #[error("generative backend is misconfigured: {0}")]
    Backend(#[from] LlmError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub history_limit: usize,
    pub lookup_timeout: Duration,
    pub generative_extraction: bool,
    pub retry: RetryPolicy,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_limit: config.session.history_limit,
            lookup_timeout: Duration::from_secs(config.database.lookup_timeout_secs.max(1)),
            generative_extraction: config.agent.generative_extraction,
            retry: RetryPolicy::from_config(&config.llm),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            lookup_timeout: Duration::from_secs(5),
            generative_extraction: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs one conversation turn at a time against the order and session stores.
///
/// A turn loads the session, works on a private copy and saves it once at the end,
/// so a failure part-way through leaves the stored session untouched.
pub struct AgentRuntime {
    orders: Arc<dyn OrderRepository>,
    sessions: Arc<dyn SessionRepository>,
    knowledge: Arc<KnowledgeBase>,
    llm: ResilientLlm,
    extractor: IdentifierExtractor,
    renderer: ReplyRenderer,
    responder: GenerativeResponder,
    phrases: Phrasebook,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        sessions: Arc<dyn SessionRepository>,
        backend: Arc<dyn LlmClient>,
        knowledge: Arc<KnowledgeBase>,
        settings: RuntimeSettings,
    ) -> Result<Self, RuntimeBuildError> {
        let llm = ResilientLlm::new(backend, settings.retry);
        Ok(Self {
            orders,
            sessions,
            extractor: IdentifierExtractor::new()?,
            renderer: ReplyRenderer::new()?,
            responder: GenerativeResponder::new(knowledge.clone(), llm.clone()),
            phrases: Phrasebook::new(knowledge.store_name.clone()),
            knowledge,
            llm,
            settings,
        })
    }

    /// Wires the SQL stores, the configured chat-completions backend and the knowledge base.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, RuntimeBuildError> {
        let sessions = SqlSessionRepository::new(pool.clone())
            .with_idle_ttl(Duration::from_secs(config.session.idle_timeout_secs));
        let backend = ChatCompletionsClient::from_config(&config.llm)?;
        let knowledge = KnowledgeBase::from_config(&config.agent)?;

        Self::new(
            Arc::new(SqlOrderRepository::new(pool)),
            Arc::new(sessions),
            Arc::new(backend),
            Arc::new(knowledge),
            RuntimeSettings::from_config(config),
        )
    }

    pub fn greeting(&self) -> String {
        self.phrases.greeting()
    }

    pub fn phrases(&self) -> &Phrasebook {
        &self.phrases
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply, ApplicationError> {
        let TurnRequest { session_id, message } = request;
        let message = message.trim();
        if message.is_empty() {
            return Ok(TurnReply::message(EMPTY_MESSAGE));
        }

        let mut session = self
            .sessions
            .load(&session_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
            .unwrap_or_else(|| Session::new(session_id.clone(), self.settings.history_limit));

        let lexicon = &self.knowledge.lexicon;
        session.language =
            language::resolve(message, session.language, lexicon, &self.llm).await;
        let language = session.language;

        let book_count = session.active_order.as_ref().map_or(0, OrderRecord::book_count);
        let intent = classify(message, book_count, lexicon);

        let extracted = if intent.is_exit {
            None
        } else {
            self.extractor.extract(message, &self.llm, self.settings.generative_extraction).await
        };

        let decision = decide(&intent, extracted, session.active_order.as_ref(), message);
        let decision_name = decision.name();

        if decision == TurnDecision::Exit {
            self.sessions
                .clear(&session_id)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            info!(
                event_name = "agent.session.ended",
                session_id = %session_id,
                "session closed by the customer"
            );
            return Ok(TurnReply::ending(self.phrases.farewell(language)));
        }

        let reply = self.respond(decision, &intent, &mut session, message, language).await;

        session.record_exchange(message, reply.response.clone());
        self.sessions
            .save(&session)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "agent.turn.completed",
            session_id = %session_id,
            decision = decision_name,
            language = language.as_str(),
            order_number = session
                .active_order
                .as_ref()
                .map(|order| order.order_number.as_str())
                .unwrap_or("none"),
            "turn completed"
        );

        Ok(reply)
    }

    pub async fn reset(&self, session_id: &SessionId) -> Result<(), ApplicationError> {
        self.sessions
            .clear(session_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }

    async fn respond(
        &self,
        decision: TurnDecision,
        intent: &Intent,
        session: &mut Session,
        message: &str,
        language: Language,
    ) -> TurnReply {
        match decision {
            TurnDecision::LookupOrder(order_number) => {
                match self.lookup(&order_number).await {
                    LookupOutcome::Found(order) => {
                        let reply = self.present_found(&order, intent, language);
                        session.active_order = Some(order);
                        reply
                    }
                    LookupOutcome::NotFound => TurnReply::message(
                        self.phrases.order_not_found(order_number.as_str(), language),
                    ),
                }
            }
            TurnDecision::GeneralAnswer => {
                match self.responder.answer_general(session.history(), message, language).await {
                    Ok(answer) => TurnReply::message(answer),
                    Err(failure) => self.generation_failed(&failure, language),
                }
            }
            TurnDecision::Exit => TurnReply::ending(self.phrases.farewell(language)),
            decision => {
                let Some(order) = session.active_order.as_ref() else {
                    return TurnReply::message(self.phrases.service_unavailable(language));
                };
                self.answer_about_active(decision, order, message, language).await
            }
        }
    }

    async fn answer_about_active(
        &self,
        decision: TurnDecision,
        order: &OrderRecord,
        message: &str,
        language: Language,
    ) -> TurnReply {
        let follow_up = self.phrases.single_book_follow_up(language);
        let rendered = match decision {
            TurnDecision::CancellationStatus => {
                return TurnReply::message(self.cancellation_text(order, language))
                    .with_follow_up(follow_up);
            }
            TurnDecision::InvalidSelection { book_count } => {
                return TurnReply::message(self.phrases.invalid_selection(book_count, language));
            }
            TurnDecision::OrderAnswer => {
                return match self.responder.answer_order(order, message, language).await {
                    Ok(answer) => TurnReply::message(answer).with_follow_up(follow_up),
                    Err(failure) => self.generation_failed(&failure, language),
                };
            }
            TurnDecision::RenderBook(index) => self.renderer.book_detail(order, index, language),
            TurnDecision::RenderSelection(indices) => {
                self.renderer.selected_books(order, &indices, language)
            }
            TurnDecision::Exit | TurnDecision::LookupOrder(_) | TurnDecision::GeneralAnswer => {
                return TurnReply::message(self.phrases.service_unavailable(language));
            }
        };

        self.rendered_reply(rendered, language).with_follow_up(follow_up)
    }

    fn present_found(&self, order: &OrderRecord, intent: &Intent, language: Language) -> TurnReply {
        match found_reply(order, intent) {
            FoundReply::CancellationReason => {
                TurnReply::message(self.cancellation_text(order, language))
                    .with_follow_up(self.phrases.single_book_follow_up(language))
            }
            FoundReply::SingleBook => self
                .rendered_reply(self.renderer.book_detail(order, 0, language), language)
                .with_follow_up(self.phrases.single_book_follow_up(language)),
            FoundReply::BookList => self
                .rendered_reply(self.renderer.order_summary(order, language), language)
                .with_follow_up(self.phrases.book_selection_follow_up(language)),
            FoundReply::NoBooks => {
                warn!(
                    event_name = "agent.order.no_books",
                    order_number = %order.order_number,
                    "order has no line items"
                );
                TurnReply::message(self.phrases.order_without_books(&order.order_number, language))
            }
        }
    }

    fn cancellation_text(&self, order: &OrderRecord, language: Language) -> String {
        match cancellation_answer(order) {
            CancellationAnswer::Reason(reason) => {
                self.phrases.cancelled_with_reason(&order.order_number, reason, language)
            }
            CancellationAnswer::NoReasonRecorded => {
                self.phrases.cancelled_without_reason(&order.order_number, language)
            }
            CancellationAnswer::NotCancelled { status } => {
                self.phrases.not_cancelled(&order.order_number, status, language)
            }
        }
    }

    fn rendered_reply(
        &self,
        rendered: Result<String, RenderError>,
        language: Language,
    ) -> TurnReply {
        match rendered {
            Ok(text) => TurnReply::message(text),
            Err(failure) => {
                error!(
                    event_name = "agent.render.failed",
                    error = %failure,
                    "deterministic reply could not be rendered"
                );
                TurnReply::message(self.phrases.service_unavailable(language))
            }
        }
    }

    fn generation_failed(&self, failure: &LlmError, language: Language) -> TurnReply {
        warn!(
            event_name = "agent.answer.unavailable",
            error = %failure,
            retryable = failure.is_retryable(),
            "generative answer unavailable"
        );
        TurnReply::message(self.phrases.service_unavailable(language))
    }

    /// Store errors, timeouts and IDs too short to be real all read as not found.
    async fn lookup(&self, order_number: &OrderNumber) -> LookupOutcome {
        if !order_number.is_lookup_eligible() {
            return LookupOutcome::NotFound;
        }

        let lookup = self.orders.lookup_order(order_number);
        match tokio::time::timeout(self.settings.lookup_timeout, lookup).await {
            Ok(Ok(Some(order))) => LookupOutcome::Found(order),
            Ok(Ok(None)) => LookupOutcome::NotFound,
            Ok(Err(error)) => {
                warn!(
                    event_name = "agent.order.lookup_failed",
                    order_number = %order_number,
                    error = %error,
                    "order lookup failed"
                );
                LookupOutcome::NotFound
            }
            Err(_) => {
                warn!(
                    event_name = "agent.order.lookup_timeout",
                    order_number = %order_number,
                    timeout_ms = self.settings.lookup_timeout.as_millis() as u64,
                    "order lookup timed out"
                );
                LookupOutcome::NotFound
            }
        }
    }
}
