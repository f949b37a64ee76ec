//! StepEngine — the transition function of a guided flow.
//!
//! One engine per flow kind. `advance` validates a raw answer against the
//! step the cursor points at, updates the record, and returns the assistant
//! messages to show plus, at terminal steps, the request to send. Rejected
//! input never touches the record or the cursor.
//!
//! Submissions are two-phase: the answer that completes a flow is staged in
//! [`PendingRequest`] and only committed by [`StepEngine::apply_reply`] once
//! the service confirms. A failure leaves the cursor where it was so the user
//! can answer again.

use uuid::Uuid;

use super::catalog::{FieldDefinition, FieldKind, FlowKind, QUERY_COMPARE, field_at, keys};
use super::normalize::fold;
use super::prompts;
use super::state::{ConversationState, FieldValue, PendingKind, PendingRequest, Step};
use super::validate;
use crate::error::{SubmissionError, ValidationError};
use crate::gateway::{
    AccountQuery, EmergencyReport, GatewayReply, GatewayRequest, ImageAttachment,
};

/// Answers accepted while waiting for an image to mean "send without photo".
const SKIP_IMAGE_WORDS: &[&str] = &["omitir", "no", "2", "sin foto", "saltar"];

/// Outcome of one engine call.
#[derive(Debug, Default)]
pub struct Advance {
    /// Assistant messages to append, in order.
    pub messages: Vec<String>,
    /// Request to dispatch. When set, `state.pending` describes it.
    pub request: Option<GatewayRequest>,
    /// Why the input was refused, if it was.
    pub rejected: Option<ValidationError>,
}

impl Advance {
    fn say(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            ..Default::default()
        }
    }

    fn submit(message: impl Into<String>, request: GatewayRequest) -> Self {
        Self {
            messages: vec![message.into()],
            request: Some(request),
            rejected: None,
        }
    }

    fn reject(err: ValidationError, messages: Vec<String>) -> Self {
        Self {
            messages,
            request: None,
            rejected: Some(err),
        }
    }
}

/// Drives one flow kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEngine {
    flow: FlowKind,
}

impl StepEngine {
    pub fn new(flow: FlowKind) -> Self {
        Self { flow }
    }

    /// Reset `state` to the start of this flow and return the opening prompt.
    pub fn start(&self, state: &mut ConversationState) -> Vec<String> {
        state.reset(Some(self.flow));
        tracing::info!(flow = %self.flow, "Flow started");
        let first = match field_at(self.flow, 0) {
            Some(field) => prompts::question(field, None),
            None => String::new(),
        };
        vec![format!("{}\n\n{}", prompts::flow_intro(self.flow), first)]
    }

    /// Apply one raw user answer.
    pub fn advance(&self, state: &mut ConversationState, raw: &str) -> Advance {
        if state.is_busy() {
            return Advance::reject(
                ValidationError::SubmissionInFlight,
                vec![prompts::BUSY.to_string()],
            );
        }
        if state.flow != Some(self.flow) {
            tracing::warn!(flow = %self.flow, "Engine called with state of another flow");
            return Advance::default();
        }

        let before = state.step;
        let outcome = match state.step {
            Step::Field { index } => self.answer_field(state, index, raw),
            Step::OtherText { index } => self.answer_other(state, index, raw),
            Step::PhotoConfirm => self.answer_photo(state, raw),
            Step::AwaitingImage => self.answer_while_awaiting_image(state, raw),
            Step::AwaitingCompareSelection => self.answer_selection(state, raw),
            // Home and Complete carry no flow questions.
            Step::Home | Step::Complete => Advance::default(),
        };

        match &outcome.rejected {
            Some(err) => {
                tracing::debug!(flow = %self.flow, step = %before, error = %err, "Input rejected")
            }
            None => tracing::debug!(flow = %self.flow, from = %before, to = %state.step, "Step advanced"),
        }
        outcome
    }

    /// Accept an image while the flow is waiting for one.
    pub fn image_selected(&self, state: &mut ConversationState, image: ImageAttachment) -> Advance {
        if state.is_busy() {
            return Advance::reject(
                ValidationError::SubmissionInFlight,
                vec![prompts::BUSY.to_string()],
            );
        }
        if state.flow != Some(self.flow) || state.step != Step::AwaitingImage {
            let err = ValidationError::ImageNotExpected;
            return Advance::reject(err.clone(), vec![prompts::rejection(&err, None)]);
        }
        if image.bytes.is_empty() {
            let err = ValidationError::EmptyImage;
            return Advance::reject(err.clone(), vec![prompts::rejection(&err, None)]);
        }
        self.submit_emergency(state, Some(image))
    }

    /// Apply the service's answer to the request described by `pending`.
    ///
    /// The caller has already removed `pending` from the state and checked it
    /// belongs to the current epoch.
    pub fn apply_reply(
        &self,
        state: &mut ConversationState,
        pending: PendingRequest,
        result: Result<GatewayReply, SubmissionError>,
    ) -> Vec<String> {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => return failed(&err),
        };

        match (pending.kind, reply) {
            (PendingKind::Emergency, GatewayReply::EmergencyCreated(ack)) => {
                state.step = Step::Complete;
                tracing::info!(flow = %self.flow, report_id = ?ack.id, "Emergency report created");
                vec![prompts::emergency_sent(&ack), prompts::FOLLOW_UP_HINT.to_string()]
            }
            (PendingKind::AccountQuery { compare }, GatewayReply::Accounts(records)) => {
                if let Some((key, value)) = pending.staged {
                    state.record.set(key, value);
                }
                tracing::info!(flow = %self.flow, count = records.len(), compare, "Account records fetched");
                if records.is_empty() {
                    state.step = Step::Complete;
                    vec![
                        prompts::NO_RECORDS.to_string(),
                        prompts::FOLLOW_UP_HINT.to_string(),
                    ]
                } else if compare {
                    let message = prompts::compare_candidates(&records);
                    state.candidates = records;
                    state.step = Step::AwaitingCompareSelection;
                    vec![message]
                } else {
                    state.step = Step::Complete;
                    vec![
                        prompts::records_found(&records),
                        prompts::FOLLOW_UP_HINT.to_string(),
                    ]
                }
            }
            (PendingKind::Compare, GatewayReply::Compared(comparison)) => {
                state.step = Step::Complete;
                let mut messages = Vec::new();
                if !comparison.records.is_empty() {
                    messages.push(prompts::records_found(&comparison.records));
                }
                messages.push(prompts::comparison_summary(&comparison));
                messages.push(prompts::FOLLOW_UP_HINT.to_string());
                messages
            }
            (kind, reply) => failed(&SubmissionError::MalformedResponse {
                operation: format!("{kind:?}"),
                reason: format!("unexpected reply {reply:?}"),
            }),
        }
    }

    // ── Catalog steps ──────────────────────────────────────────────────

    fn answer_field(&self, state: &mut ConversationState, index: usize, raw: &str) -> Advance {
        let Some(field) = field_at(self.flow, index) else {
            tracing::warn!(flow = %self.flow, index, "Cursor points past the catalog");
            return Advance::default();
        };

        match field.kind {
            FieldKind::FreeText(format) => {
                let value = match validate::text(format, id_method(state), raw) {
                    Ok(value) => value,
                    Err(err) => return self.reprompt(state, field, err),
                };
                let is_last = index + 1 == self.flow.catalog().len();
                if is_last && self.flow == FlowKind::AccountLookup {
                    return self.submit_lookup(state, (field.key, FieldValue::text(value)));
                }
                state.record.set(field.key, FieldValue::text(value));
                self.move_to(state, index + 1, None)
            }
            FieldKind::Choice { choices, .. } => {
                let option = match validate::choice_index(raw, choices.len()) {
                    Ok(option) => option,
                    Err(err) => return self.reprompt(state, field, err),
                };
                let label = choices[option - 1];
                if field.is_other_option(option) {
                    state.step = Step::OtherText { index };
                    return Advance::say(format!(
                        "{}\n\n{}",
                        prompts::acknowledge(label),
                        prompts::other_prompt(field)
                    ));
                }
                state.record.set(field.key, FieldValue::choice(option, label));
                self.move_to(state, index + 1, Some(prompts::acknowledge(label)))
            }
        }
    }

    fn answer_other(&self, state: &mut ConversationState, index: usize, raw: &str) -> Advance {
        let Some(field) = field_at(self.flow, index) else {
            return Advance::default();
        };
        let text = match validate::non_blank(raw) {
            Ok(text) => text.to_string(),
            Err(err) => {
                return Advance::reject(
                    err.clone(),
                    vec![
                        prompts::rejection(&err, None),
                        prompts::other_prompt(field),
                    ],
                );
            }
        };
        let ack = format!("Entendido: {text}.");
        state.record.set(field.key, FieldValue::other(text));
        self.move_to(state, index + 1, Some(ack))
    }

    /// Point the cursor at `next` (or the post-catalog sequence) and phrase
    /// the next question, prefixed by `ack` when given.
    fn move_to(&self, state: &mut ConversationState, next: usize, ack: Option<String>) -> Advance {
        let question = match field_at(self.flow, next) {
            Some(field) => {
                state.step = Step::Field { index: next };
                prompts::question(field, id_method(state))
            }
            None => match self.flow {
                FlowKind::Emergency => {
                    state.step = Step::PhotoConfirm;
                    prompts::PHOTO_QUESTION.to_string()
                }
                // The last lookup field submits directly; nothing follows it.
                FlowKind::AccountLookup => String::new(),
            },
        };
        let message = match ack {
            Some(ack) if !question.is_empty() => format!("{ack}\n\n{question}"),
            Some(ack) => ack,
            None => question,
        };
        Advance::say(message)
    }

    fn reprompt(
        &self,
        state: &ConversationState,
        field: &FieldDefinition,
        err: ValidationError,
    ) -> Advance {
        let count = field.choices().map(|choices| choices.len());
        let messages = vec![
            prompts::rejection(&err, count),
            prompts::question(field, id_method(state)),
        ];
        Advance::reject(err, messages)
    }

    // ── Virtual steps ──────────────────────────────────────────────────

    fn answer_photo(&self, state: &mut ConversationState, raw: &str) -> Advance {
        match validate::yes_no(raw) {
            Ok(true) => {
                state.step = Step::AwaitingImage;
                Advance::say(prompts::AWAITING_IMAGE)
            }
            Ok(false) => self.submit_emergency(state, None),
            Err(err) => Advance::reject(
                err.clone(),
                vec![
                    prompts::rejection(&err, Some(2)),
                    prompts::PHOTO_QUESTION.to_string(),
                ],
            ),
        }
    }

    fn answer_while_awaiting_image(&self, state: &mut ConversationState, raw: &str) -> Advance {
        let folded = fold(raw);
        if SKIP_IMAGE_WORDS.contains(&folded.as_str()) {
            return self.submit_emergency(state, None);
        }
        let err = if folded.is_empty() {
            ValidationError::EmptyInput
        } else {
            ValidationError::ImageRequired
        };
        Advance::reject(err, vec![prompts::AWAITING_IMAGE.to_string()])
    }

    fn answer_selection(&self, state: &mut ConversationState, raw: &str) -> Advance {
        let picks = match validate::multi_selection(raw, state.candidates.len()) {
            Ok(picks) => picks,
            Err(err) => {
                return Advance::reject(
                    err.clone(),
                    vec![
                        prompts::rejection(&err, Some(state.candidates.len())),
                        prompts::compare_candidates(&state.candidates),
                    ],
                );
            }
        };
        let ids: Vec<String> = picks
            .into_iter()
            .map(|i| state.candidates[i].id.clone())
            .collect();
        begin(state, PendingKind::Compare, None);
        Advance::submit(prompts::COMPARING, GatewayRequest::Compare { ids })
    }

    // ── Finalisation ───────────────────────────────────────────────────

    fn submit_emergency(
        &self,
        state: &mut ConversationState,
        image: Option<ImageAttachment>,
    ) -> Advance {
        let missing = state.record.missing_fields(FlowKind::Emergency);
        if !missing.is_empty() {
            tracing::error!(flow = %self.flow, ?missing, "Emergency record incomplete at submission");
            return Advance::say(prompts::missing_fields(&missing));
        }
        let report = EmergencyReport::from_record(&state.record);
        begin(state, PendingKind::Emergency, None);
        Advance::submit(
            prompts::SENDING_EMERGENCY,
            GatewayRequest::CreateEmergency { report, image },
        )
    }

    fn submit_lookup(
        &self,
        state: &mut ConversationState,
        staged: (&'static str, FieldValue),
    ) -> Advance {
        let mut frozen = state.record.clone();
        frozen.set(staged.0, staged.1.clone());
        let missing = frozen.missing_fields(FlowKind::AccountLookup);
        if !missing.is_empty() {
            tracing::error!(flow = %self.flow, ?missing, "Lookup record incomplete at submission");
            return Advance::say(prompts::missing_fields(&missing));
        }
        let compare = matches!(
            frozen.get(keys::QUERY_TYPE),
            Some(FieldValue::Choice { option, .. }) if *option == QUERY_COMPARE
        );
        let query = AccountQuery::from_record(&frozen);
        begin(state, PendingKind::AccountQuery { compare }, Some(staged));
        Advance::submit(prompts::SEARCHING_RECORDS, GatewayRequest::QueryAccounts(query))
    }
}

/// Mark a request as outstanding.
fn begin(
    state: &mut ConversationState,
    kind: PendingKind,
    staged: Option<(&'static str, FieldValue)>,
) {
    state.pending = Some(PendingRequest {
        id: Uuid::new_v4(),
        kind,
        staged,
    });
}

/// Identification method chosen earlier in an account lookup.
fn id_method(state: &ConversationState) -> Option<usize> {
    match state.record.get(keys::ID_METHOD) {
        Some(FieldValue::Choice { option, .. }) => Some(*option),
        _ => None,
    }
}

fn failed(err: &SubmissionError) -> Vec<String> {
    if err.is_malformed() {
        tracing::error!(operation = err.operation(), error = %err, "Malformed service response");
    } else {
        tracing::warn!(operation = err.operation(), error = %err, "Submission failed");
    }
    vec![prompts::submission_failed(err)]
}
