//! Per-turn decision tree. Pure functions over the classified message and session state.

use shelfdesk_core::domain::order::{OrderNumber, OrderRecord};

use crate::intent::Intent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnDecision {
    /// Say goodbye and drop the session.
    Exit,
    /// A new order ID was mentioned; look it up.
    LookupOrder(OrderNumber),
    /// Answer a cancellation question from the active order.
    CancellationStatus,
    /// Render several books of the active order.
    RenderSelection(Vec<usize>),
    /// Render one book of the active order.
    RenderBook(usize),
    /// A selection was attempted but named no valid book.
    InvalidSelection { book_count: usize },
    /// Open question about the active order.
    OrderAnswer,
    /// No order in focus.
    GeneralAnswer,
}

impl TurnDecision {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::LookupOrder(_) => "lookup_order",
            Self::CancellationStatus => "cancellation_status",
            Self::RenderSelection(_) => "render_selection",
            Self::RenderBook(_) => "render_book",
            Self::InvalidSelection { .. } => "invalid_selection",
            Self::OrderAnswer => "order_answer",
            Self::GeneralAnswer => "general_answer",
        }
    }
}

pub fn decide(
    intent: &Intent,
    extracted: Option<OrderNumber>,
    active_order: Option<&OrderRecord>,
    text: &str,
) -> TurnDecision {
    if intent.is_exit {
        return TurnDecision::Exit;
    }

    if let Some(order_number) = extracted {
        return TurnDecision::LookupOrder(order_number);
    }

    let Some(order) = active_order else {
        return TurnDecision::GeneralAnswer;
    };

    if intent.is_cancellation_query {
        return TurnDecision::CancellationStatus;
    }

    let book_count = order.book_count();
    match intent.book_selection.as_slice() {
        [] => {}
        [only] => return TurnDecision::RenderBook(*only),
        many if book_count > 1 => return TurnDecision::RenderSelection(many.to_vec()),
        _ => {}
    }

    if let Some(index) = Intent::single_digit_index(text, book_count) {
        return TurnDecision::RenderBook(index);
    }

    if intent.selection_requested && book_count > 0 {
        return TurnDecision::InvalidSelection { book_count };
    }

    if !intent.selection_requested && book_count > 1 {
        if let Some(index) = order.find_book_mentioned_in(text) {
            return TurnDecision::RenderBook(index);
        }
    }

    TurnDecision::OrderAnswer
}

/// Result of a new-ID lookup, after timeouts and store errors have been folded in.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    Found(OrderRecord),
    NotFound,
}

/// What to say right after a successful lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoundReply {
    CancellationReason,
    SingleBook,
    BookList,
    NoBooks,
}

pub fn found_reply(order: &OrderRecord, intent: &Intent) -> FoundReply {
    if order.status.is_cancelled() && intent.is_cancellation_query {
        return FoundReply::CancellationReason;
    }
    match order.book_count() {
        0 => FoundReply::NoBooks,
        1 => FoundReply::SingleBook,
        _ => FoundReply::BookList,
    }
}

/// Deterministic answer to "was it cancelled, and why".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancellationAnswer<'a> {
    Reason(&'a str),
    NoReasonRecorded,
    NotCancelled { status: &'a str },
}

pub fn cancellation_answer(order: &OrderRecord) -> CancellationAnswer<'_> {
    if !order.status.is_cancelled() {
        return CancellationAnswer::NotCancelled { status: order.status.label() };
    }
    match order.cancellation_reason() {
        Some(reason) => CancellationAnswer::Reason(reason),
        None => CancellationAnswer::NoReasonRecorded,
    }
}
