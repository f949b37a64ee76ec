//! Guided flows — field catalogs, conversation state and the step engine.
//!
//! A flow is a fixed list of questions. The engine walks the cursor through
//! it one validated answer at a time and, once everything is collected,
//! hands a frozen record to the submission gateway.

pub mod catalog;
pub mod engine;
pub mod normalize;
pub mod prompts;
pub mod state;
pub mod validate;

pub use catalog::{FieldDefinition, FieldKind, FlowKind, TextFormat, field_at};
pub use engine::{Advance, StepEngine};
pub use state::{ConversationRecord, ConversationState, FieldValue, PendingKind, Step};
