//! Conversation runtime for the order-support assistant.
//!
//! A turn flows through a fixed pipeline:
//! 1. **Language** (`language`) - keep replies in English or Hindi/Hinglish
//! 2. **Intent** (`intent`, `extraction`) - exit, cancellation, book selection, order IDs
//! 3. **Decision** (`decision`) - pick exactly one action from the signals and session
//! 4. **Reply** (`render`, `phrases`, `responder`) - deterministic text where the facts allow,
//!    a grounded generative answer otherwise
//!
//! The generative backend (`llm`) only phrases answers and classifies text. Order facts,
//! cancellation reasons and book listings always come from the order store.

pub mod decision;
pub mod extraction;
pub mod intent;
pub mod language;
pub mod llm;
pub mod phrases;
pub mod render;
pub mod responder;
pub mod runtime;

pub use llm::{ChatCompletionsClient, LlmClient, LlmError, ResilientLlm, RetryPolicy};
pub use runtime::{AgentRuntime, RuntimeBuildError, RuntimeSettings};
