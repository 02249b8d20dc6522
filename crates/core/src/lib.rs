pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;

pub use domain::conversation::{
    ChatMessage, Language, Role, Session, SessionId, TurnReply, TurnRequest, DEFAULT_HISTORY_LIMIT,
};
pub use domain::order::{
    dedupe_books, Book, OrderNumber, OrderRecord, OrderStatus, ShippingAddress,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use knowledge::{KnowledgeBase, Lexicon};
