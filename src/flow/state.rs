//! Conversation state: where in the flow we are and what has been collected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::FlowKind;
use crate::gateway::AccountRecord;

/// Position of the cursor inside a flow.
///
/// Catalog steps are addressed by index; everything after the catalog is a
/// named virtual step, so no combination of ad hoc flags can be invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// No flow active: main menu and general questions.
    Home,
    /// Waiting for the answer to catalog field `index`.
    Field { index: usize },
    /// The "Other" option was picked for field `index`; waiting for its text.
    OtherText { index: usize },
    PhotoConfirm,
    AwaitingImage,
    AwaitingCompareSelection,
    /// Record submitted; follow-up questions only.
    Complete,
}

impl Step {
    /// Monotonic rank of the step within a flow. Transitions never lower it
    /// except through an explicit restart.
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Home => 0,
            Self::Field { index } => 1 + index * 2,
            Self::OtherText { index } => 2 + index * 2,
            Self::PhotoConfirm => 1_000,
            Self::AwaitingImage => 1_001,
            Self::AwaitingCompareSelection => 1_002,
            Self::Complete => 2_000,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Home
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Field { index } => write!(f, "field[{index}]"),
            Self::OtherText { index } => write!(f, "other_text[{index}]"),
            Self::PhotoConfirm => write!(f, "photo_confirm"),
            Self::AwaitingImage => write!(f, "awaiting_image"),
            Self::AwaitingCompareSelection => write!(f, "awaiting_compare_selection"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// A collected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text, verbatim.
    Text { value: String },
    /// A menu selection: the 1-based option and its label.
    Choice { option: usize, label: String },
    /// The "Other" escape with the user's own wording.
    Other { text: String },
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn choice(option: usize, label: impl Into<String>) -> Self {
        Self::Choice {
            option,
            label: label.into(),
        }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self::Other { text: text.into() }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text { value } => value.trim().is_empty(),
            Self::Choice { label, .. } => label.trim().is_empty(),
            Self::Other { text } => text.trim().is_empty(),
        }
    }
}

/// Renders as the stored string: the text, the choice label, or `other:<text>`.
impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { value } => write!(f, "{value}"),
            Self::Choice { label, .. } => write!(f, "{label}"),
            Self::Other { text } => write!(f, "other:{text}"),
        }
    }
}

/// Answers keyed by field key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ConversationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Store a value, returning the previous one if the key was already set.
    pub fn set(&mut self, key: &str, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(key.to_string(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Catalog keys of `flow` with no value or a blank value, in catalog order.
    pub fn missing_fields(&self, flow: FlowKind) -> Vec<&'static str> {
        flow.catalog()
            .iter()
            .filter(|def| self.get(def.key).is_none_or(FieldValue::is_blank))
            .map(|def| def.key)
            .collect()
    }

    /// Flattened view for rendering: key to displayed string.
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Kind of request outstanding against the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingKind {
    Emergency,
    AccountQuery { compare: bool },
    Compare,
    Question,
}

/// A request dispatched but not yet answered.
///
/// `staged` holds the answer that triggered the submission; it only lands in
/// the record once the service confirms.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: Uuid,
    pub kind: PendingKind,
    pub staged: Option<(&'static str, FieldValue)>,
}

/// Mutable state of one conversation, owned by a session.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub flow: Option<FlowKind>,
    pub step: Step,
    pub record: ConversationRecord,
    /// Records offered for comparison, in the order they were listed.
    pub candidates: Vec<AccountRecord>,
    pub pending: Option<PendingRequest>,
    /// Rotated on every reset so late replies can be recognised.
    pub epoch: Uuid,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            flow: None,
            step: Step::Home,
            record: ConversationRecord::new(),
            candidates: Vec::new(),
            pending: None,
            epoch: Uuid::new_v4(),
        }
    }
}

impl ConversationState {
    /// Reset to the first step of `flow`, or home when `None`.
    pub fn reset(&mut self, flow: Option<FlowKind>) {
        self.flow = flow;
        self.step = match flow {
            Some(_) => Step::Field { index: 0 },
            None => Step::Home,
        };
        self.record = ConversationRecord::new();
        self.candidates.clear();
        self.pending = None;
        self.epoch = Uuid::new_v4();
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}
