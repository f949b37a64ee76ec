//! Session — one conversation: its state, transcript and outstanding request.
//!
//! [`Session`] is synchronous and owns everything a single user sees. It
//! turns input into transcript entries and, when a step finalizes, into a
//! [`Ticket`] naming the request to send. [`SessionController`] is the async
//! driver: it runs tickets against the gateway without holding the session
//! lock, then feeds the reply back through [`Session::apply_reply`], which
//! drops replies that belong to a conversation the user already left.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result, SubmissionError, ValidationError};
use crate::flow::normalize::fold;
use crate::flow::prompts;
use crate::flow::state::PendingRequest;
use crate::flow::{ConversationState, FlowKind, PendingKind, Step, StepEngine};
use crate::gateway::{
    AccountRecord, GatewayReply, GatewayRequest, ImageAttachment, QuestionContext,
    SubmissionGateway, dispatch,
};
use crate::transcript::{TranscriptEntry, TranscriptLog};

/// Transcript entries sent along with a free-form question.
const QUESTION_HISTORY: usize = 20;

/// A request ready to be dispatched, tagged with the conversation it
/// belongs to.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: Uuid,
    pub epoch: Uuid,
    pub request: GatewayRequest,
}

/// What happened to a reply handed to [`Session::apply_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Applied,
    /// The conversation was reset or moved on; the reply was discarded.
    Stale,
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub flow: Option<FlowKind>,
    pub step: Step,
    pub record: BTreeMap<String, String>,
    pub transcript: Vec<TranscriptEntry>,
    pub busy: bool,
    pub awaiting_image: bool,
    pub candidates: Vec<AccountRecord>,
}

pub struct Session {
    state: ConversationState,
    transcript: TranscriptLog,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session showing the main menu.
    pub fn new() -> Self {
        let mut transcript = TranscriptLog::new();
        transcript.append(TranscriptEntry::assistant(prompts::home_menu()));
        Self {
            state: ConversationState::default(),
            transcript,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    fn engine(&self) -> Option<StepEngine> {
        self.state.flow.map(StepEngine::new)
    }

    fn say(&mut self, text: impl Into<String>) {
        self.transcript.append(TranscriptEntry::assistant(text));
    }

    fn say_all(&mut self, messages: Vec<String>) {
        for message in messages.into_iter().filter(|m| !m.is_empty()) {
            self.say(message);
        }
    }

    /// Start `flow` from its first question. Clears the transcript.
    pub fn start_flow(&mut self, flow: FlowKind) {
        let messages = StepEngine::new(flow).start(&mut self.state);
        self.transcript.clear();
        self.say_all(messages);
    }

    /// Start the active flow over, or go home when none is active. Any
    /// outstanding reply becomes stale.
    pub fn restart(&mut self) {
        tracing::info!(flow = ?self.state.flow, step = %self.state.step, "Session restart");
        match self.state.flow {
            Some(flow) => self.start_flow(flow),
            None => self.go_home(),
        }
    }

    /// Leave any flow and show the main menu.
    pub fn go_home(&mut self) {
        self.state.reset(None);
        self.transcript.clear();
        self.say(prompts::home_menu());
    }

    /// Handle one line of user text. Returns a ticket when the input
    /// finalized something that must be sent.
    pub fn handle_user_input(&mut self, text: &str) -> Option<Ticket> {
        let text = text.trim();
        if text.is_empty() {
            self.say(prompts::TRY_AGAIN_EMPTY);
            return None;
        }
        if self.state.is_busy() {
            self.say(prompts::BUSY);
            return None;
        }

        match (self.state.step, self.engine()) {
            (Step::Home, _) | (_, None) => match home_option(text) {
                Some(flow) => {
                    self.start_flow(flow);
                    None
                }
                None => {
                    self.transcript.append(TranscriptEntry::user(text));
                    Some(self.ask(text))
                }
            },
            (step, Some(_)) if step.is_terminal() => {
                self.transcript.append(TranscriptEntry::user(text));
                Some(self.ask(text))
            }
            (_, Some(engine)) => {
                let advance = engine.advance(&mut self.state, text);
                // Refused answers only get the corrective messages.
                if advance.rejected.is_none() {
                    self.transcript.append(TranscriptEntry::user(text));
                }
                self.say_all(advance.messages);
                advance.request.and_then(|request| self.ticket(request))
            }
        }
    }

    /// Handle an image picked by the user.
    pub fn handle_image_selected(&mut self, image: ImageAttachment) -> Option<Ticket> {
        let Some(engine) = self.engine() else {
            self.say(prompts::rejection(&ValidationError::ImageNotExpected, None));
            return None;
        };
        if !self.state.is_busy() && self.state.step == Step::AwaitingImage {
            self.transcript
                .append(TranscriptEntry::user(format!("📎 {}", image.file_name)));
        }
        let advance = engine.image_selected(&mut self.state, image);
        self.say_all(advance.messages);
        advance.request.and_then(|request| self.ticket(request))
    }

    /// Apply the reply to `ticket`. Replies for an earlier epoch, or for a
    /// request that is no longer outstanding, are discarded.
    pub fn apply_reply(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<GatewayReply, SubmissionError>,
    ) -> ReplyOutcome {
        let outstanding = self.state.pending.as_ref().map(|p| p.id);
        if ticket.epoch != self.state.epoch || outstanding != Some(ticket.id) {
            tracing::info!(
                operation = ticket.request.operation(),
                request_id = %ticket.id,
                "Discarding stale reply"
            );
            return ReplyOutcome::Stale;
        }
        let Some(pending) = self.state.pending.take() else {
            return ReplyOutcome::Stale;
        };

        let messages = if pending.kind == PendingKind::Question {
            answer_messages(result)
        } else {
            match self.engine() {
                Some(engine) => engine.apply_reply(&mut self.state, pending, result),
                None => Vec::new(),
            }
        };
        self.say_all(messages);
        ReplyOutcome::Applied
    }

    /// Append an assistant notice outside the normal flow.
    pub fn notice(&mut self, text: impl Into<String>) {
        self.say(text);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            flow: self.state.flow,
            step: self.state.step,
            record: self.state.record.to_display_map(),
            transcript: self.transcript.all().to_vec(),
            busy: self.state.is_busy(),
            awaiting_image: self.state.step == Step::AwaitingImage,
            candidates: self.state.candidates.clone(),
        }
    }

    /// Forward free text to the question endpoint.
    fn ask(&mut self, question: &str) -> Ticket {
        let context = QuestionContext {
            flow: self.state.flow,
            record: self.state.record.to_display_map(),
            history: self.transcript.tail(QUESTION_HISTORY).to_vec(),
        };
        let id = Uuid::new_v4();
        self.state.pending = Some(PendingRequest {
            id,
            kind: PendingKind::Question,
            staged: None,
        });
        Ticket {
            id,
            epoch: self.state.epoch,
            request: GatewayRequest::Ask {
                question: question.to_string(),
                context,
            },
        }
    }

    fn ticket(&self, request: GatewayRequest) -> Option<Ticket> {
        let Some(pending) = &self.state.pending else {
            tracing::error!(operation = request.operation(), "Request emitted without a pending entry");
            return None;
        };
        Some(Ticket {
            id: pending.id,
            epoch: self.state.epoch,
            request,
        })
    }
}

/// Main-menu option named by `text`: its number or its label.
fn home_option(text: &str) -> Option<FlowKind> {
    let folded = fold(text);
    prompts::HOME_OPTIONS
        .iter()
        .enumerate()
        .find(|(i, (label, _))| folded == (i + 1).to_string() || folded == fold(label))
        .map(|(_, (_, flow))| *flow)
}

fn answer_messages(result: std::result::Result<GatewayReply, SubmissionError>) -> Vec<String> {
    match result {
        Ok(GatewayReply::Answer(text)) if !text.trim().is_empty() => vec![text],
        Ok(other) => {
            tracing::error!(reply = ?other, "Unexpected reply to a question");
            vec![prompts::submission_failed(&SubmissionError::MalformedResponse {
                operation: "ask".into(),
                reason: "empty or mismatched answer".into(),
            })]
        }
        Err(err) => {
            tracing::warn!(error = %err, "Question failed");
            vec![prompts::submission_failed(&err)]
        }
    }
}

/// Async driver for one [`Session`].
///
/// The session lock is held only while state changes; network calls run
/// with the lock released, so restart and home stay responsive and the
/// staleness check in [`Session::apply_reply`] handles the late reply.
pub struct SessionController {
    session: Arc<Mutex<Session>>,
    gateway: Arc<dyn SubmissionGateway>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn SubmissionGateway>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            gateway,
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }

    /// Handle user text; if it finalizes a step, wait for the reply.
    pub async fn handle_user_input(&self, text: &str) -> Option<ReplyOutcome> {
        let ticket = self.session.lock().await.handle_user_input(text);
        match ticket {
            Some(ticket) => Some(self.run(ticket).await),
            None => None,
        }
    }

    pub async fn handle_image(&self, image: ImageAttachment) -> Option<ReplyOutcome> {
        let ticket = self.session.lock().await.handle_image_selected(image);
        match ticket {
            Some(ticket) => Some(self.run(ticket).await),
            None => None,
        }
    }

    /// Read an image from disk and hand it to the session. Read failures
    /// are reported in the transcript and returned.
    pub async fn handle_image_file(&self, path: impl AsRef<Path>) -> Result<Option<ReplyOutcome>> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read image");
                self.session
                    .lock()
                    .await
                    .notice(format!("No pude leer la imagen {}.", path.display()));
                return Err(Error::Io(e));
            }
        };
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("foto")
            .to_string();
        let content_type = ImageAttachment::content_type_for(&file_name);
        let image = ImageAttachment::new(file_name, content_type, bytes);
        Ok(self.handle_image(image).await)
    }

    pub async fn start_flow(&self, flow: FlowKind) {
        self.session.lock().await.start_flow(flow);
    }

    pub async fn restart(&self) {
        self.session.lock().await.restart();
    }

    pub async fn go_home(&self) {
        self.session.lock().await.go_home();
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    async fn run(&self, ticket: Ticket) -> ReplyOutcome {
        let result = dispatch(self.gateway.as_ref(), &ticket.request).await;
        self.session.lock().await.apply_reply(&ticket, result)
    }
}
