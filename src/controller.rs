//! Owns one conversation: sends user turns, folds the event stream into the
//! timeline and notifies subscribers.
//!
//! Event application is strictly sequential in arrival order. `send` takes
//! `&mut self`, so a second turn cannot start on the same controller while a
//! stream is being consumed.

use std::time::Duration;

use agent_wire::{
    decode_body, AgentMessageRequest, AgentPhase, AgentWireConfig, CancellationSignal,
    ClaimsValidation, FrontendData, WireEvent,
};
use serde_json::Value;
use session_store::SessionPersistence;

use crate::guardrail::{self, GuardrailEvent, GuardrailPhase, GuardrailState};
use crate::product::{normalize_products, DefaultProductNormalizer, ProductNormalizer, ToolOutput};
use crate::timeline::{new_entry_id, Timeline, TimelineEntry, TimelineStore};
use crate::transport::Transport;

pub const THINKING_LABEL: &str = "Thinking…";
pub const VALIDATING_LABEL: &str = "Checking the answer…";
pub const REGENERATING_LABEL: &str = "Improving the answer…";

pub fn default_phase_label(phase: AgentPhase) -> &'static str {
    match phase {
        AgentPhase::Thinking => THINKING_LABEL,
        AgentPhase::Validating => VALIDATING_LABEL,
        AgentPhase::Regenerating => REGENERATING_LABEL,
    }
}

/// Per-conversation settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub local_language: String,
    pub thread_token_ttl: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            local_language: "en".to_string(),
            thread_token_ttl: None,
        }
    }
}

impl From<&AgentWireConfig> for SessionOptions {
    fn from(config: &AgentWireConfig) -> Self {
        Self {
            local_language: config.local_language.clone(),
            thread_token_ttl: config.thread_token_ttl,
        }
    }
}

/// How a `send` ended. Failures are already logged; the timeline keeps its
/// last consistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ran to the end of the body.
    Completed,
    /// Blank input; nothing was sent.
    Ignored,
    TransportFailed(String),
}

pub type SubscriptionId = u64;

type Observer = Box<dyn FnMut(&Timeline) + Send>;

pub struct SessionController<T, P, N = DefaultProductNormalizer> {
    transport: T,
    persistence: P,
    normalizer: N,
    options: SessionOptions,
    store: TimelineStore,
    guardrail: Option<GuardrailState>,
    last_thread_token: Option<String>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl<T, P> SessionController<T, P>
where
    T: Transport,
    P: SessionPersistence,
{
    pub fn new(transport: T, persistence: P, options: SessionOptions) -> Self {
        Self::with_normalizer(transport, persistence, options, DefaultProductNormalizer)
    }
}

impl<T, P, N> SessionController<T, P, N>
where
    T: Transport,
    P: SessionPersistence,
    N: ProductNormalizer,
{
    pub fn with_normalizer(
        transport: T,
        persistence: P,
        options: SessionOptions,
        normalizer: N,
    ) -> Self {
        Self {
            transport,
            persistence,
            normalizer,
            options,
            store: TimelineStore::default(),
            guardrail: None,
            last_thread_token: None,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Current snapshot.
    pub fn timeline(&self) -> Timeline {
        self.store.snapshot()
    }

    /// Working guardrail state of the current turn.
    pub fn guardrail(&self) -> Option<&GuardrailState> {
        self.guardrail.as_ref()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&Timeline) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub async fn send(&mut self, text: &str) -> TurnOutcome {
        self.send_with_cancel(text, None).await
    }

    /// Send one user turn and consume its stream to the end.
    pub async fn send_with_cancel(
        &mut self,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> TurnOutcome {
        let Some(request) = self.begin_turn(text) else {
            return TurnOutcome::Ignored;
        };

        let body = match self.transport.open(&request, cancellation).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(%error, "agent request failed");
                return TurnOutcome::TransportFailed(error.to_string());
            }
        };

        let applied = match decode_body(body, cancellation, |event| self.apply_event(event)).await
        {
            Ok(applied) => applied,
            Err(error) => {
                tracing::warn!(%error, "agent stream interrupted");
                return TurnOutcome::TransportFailed(error.to_string());
            }
        };

        tracing::info!(applied, "agent turn finished");
        TurnOutcome::Completed
    }

    /// Record the human turn locally and build its request.
    ///
    /// Returns `None` for blank input.
    pub fn begin_turn(&mut self, text: &str) -> Option<AgentMessageRequest> {
        let message = text.trim();
        if message.is_empty() {
            return None;
        }

        self.guardrail = guardrail::transition(self.guardrail.take(), GuardrailEvent::TurnStarted);
        self.store.append(TimelineEntry::human(message));
        self.store.set_placeholder(TimelineEntry::placeholder(
            AgentPhase::Thinking,
            THINKING_LABEL,
        ));
        self.notify();

        self.last_thread_token = self.persistence.thread_token();
        let jwt = self.persistence.session_token().unwrap_or_else(|| {
            tracing::warn!("no session token available; sending an empty jwt");
            String::new()
        });

        tracing::info!(
            continuing = self.last_thread_token.is_some(),
            "agent turn started"
        );
        Some(
            AgentMessageRequest::new(message, jwt, self.options.local_language.clone())
                .with_thread_token(self.last_thread_token.clone()),
        )
    }

    /// Fold one decoded record into the timeline.
    pub fn apply_event(&mut self, event: WireEvent) {
        tracing::debug!(event = event.type_name(), "applying agent event");
        let before = self.store.snapshot();

        if let Some(token) = event.thread_token() {
            self.forward_thread_token(token);
        }

        match event {
            WireEvent::Phase { phase, msg } => self.apply_phase(phase, msg),
            WireEvent::AssistantOutputStart => {
                self.store.remove_placeholder();
                self.guardrail =
                    guardrail::transition(self.guardrail.take(), GuardrailEvent::OutputStarted);
            }
            WireEvent::Delta { delta } => self.apply_delta(delta),
            WireEvent::Item { name, item } => self.apply_item(name, item),
            WireEvent::AssistantOutputEnd => {
                self.finish_answer();
                self.store.remove_placeholder();
            }
            WireEvent::SessionState { .. } => {}
            WireEvent::Done {
                claims_validation,
                frontend_data,
                ..
            } => self.apply_done(claims_validation, frontend_data),
            WireEvent::Error { msg } => {
                self.store.remove_placeholder();
                // The turn is over; an unverified rewrite must not linger.
                self.clear_answer_guardrail(|state| state.phase != GuardrailPhase::Done);
                self.guardrail =
                    guardrail::transition(self.guardrail.take(), GuardrailEvent::Finished);
                if let Some(message) = msg.filter(|message| !message.trim().is_empty()) {
                    tracing::warn!(%message, "agent reported an error");
                    self.store.append(TimelineEntry::finished_assistant(message));
                }
            }
            WireEvent::Unknown { event_type } => {
                tracing::debug!(%event_type, "ignoring unknown agent event");
            }
        }

        if !before.same_snapshot(self.store.timeline()) {
            self.notify();
        }
    }

    fn apply_phase(&mut self, phase: AgentPhase, msg: Option<String>) {
        match phase {
            AgentPhase::Thinking => {
                self.guardrail =
                    guardrail::transition(self.guardrail.take(), GuardrailEvent::Thinking);
                if self.guardrail.is_none() {
                    self.clear_answer_guardrail(|_| true);
                }
            }
            AgentPhase::Validating => {
                let content = self.current_answer_content();
                self.guardrail = guardrail::transition(
                    self.guardrail.take(),
                    GuardrailEvent::Validating {
                        content: content.as_deref(),
                    },
                );
                self.attach_guardrail();
            }
            AgentPhase::Regenerating => {
                self.store
                    .remove_where(TimelineEntry::is_synthetic_attachment);
                let content = self.current_answer_content();
                self.guardrail = guardrail::transition(
                    self.guardrail.take(),
                    GuardrailEvent::Regenerating {
                        content: content.as_deref(),
                    },
                );
                self.attach_guardrail();
            }
        }

        let label = msg
            .map(|msg| msg.trim().to_owned())
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| default_phase_label(phase).to_owned());
        self.store
            .set_placeholder(TimelineEntry::placeholder(phase, label));
    }

    /// Fresh-start rule: a regenerated answer replaces the original on its
    /// first delta, every other delta appends.
    fn apply_delta(&mut self, delta: String) {
        self.store.remove_placeholder();

        let regenerating = guardrail::is_regenerating(self.guardrail.as_ref());
        let target = if regenerating {
            self.store.timeline().current_answer_index()
        } else {
            let timeline = self.store.timeline();
            timeline
                .last_content_index()
                .filter(|index| {
                    let entry = &timeline.entries()[*index];
                    entry.is_answer() && !entry.stream_done
                })
        };

        let Some(index) = target else {
            let mut entry = TimelineEntry::streaming_assistant(delta);
            if regenerating {
                self.guardrail =
                    guardrail::transition(self.guardrail.take(), GuardrailEvent::FreshStartApplied);
            }
            entry.guardrail = self.guardrail.clone();
            self.store.append(entry);
            return;
        };

        if guardrail::replaces_next_delta(self.guardrail.as_ref()) {
            self.guardrail =
                guardrail::transition(self.guardrail.take(), GuardrailEvent::FreshStartApplied);
            let snapshot = self.guardrail.clone();
            self.store.update(index, |entry| {
                entry.content = delta;
                entry.stream_done = false;
                entry.guardrail = snapshot;
            });
        } else {
            self.store.update(index, |entry| {
                entry.content.push_str(&delta);
                entry.stream_done = false;
            });
        }
    }

    fn apply_item(&mut self, name: Option<String>, item: Value) {
        let content = match &item {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let output = ToolOutput::classify(item, &self.normalizer);
        self.store
            .insert_before_placeholder(TimelineEntry::tool(name, content, output));
    }

    fn apply_done(
        &mut self,
        claims_validation: Option<ClaimsValidation>,
        frontend_data: Option<FrontendData>,
    ) {
        self.finish_answer();
        self.store.remove_placeholder();

        if let Some(report) = claims_validation.as_ref() {
            if report.was_regenerated {
                self.remove_turn_attachments();
            }
            let final_content = self.current_answer_content().unwrap_or_default();
            self.guardrail = guardrail::transition(
                self.guardrail.take(),
                GuardrailEvent::Completed {
                    report,
                    final_content: &final_content,
                },
            );
            self.attach_guardrail();
        }

        let raw_products = frontend_data
            .map(|data| data.products)
            .unwrap_or_default();
        let products = normalize_products(&self.normalizer, &raw_products);
        if !products.is_empty() {
            let group_id = new_entry_id();
            for product in products {
                self.store
                    .append(TimelineEntry::product_attachment(product, group_id.clone()));
            }
        }

        if claims_validation.is_none() {
            self.clear_answer_guardrail(|state| state.phase != GuardrailPhase::Done);
        }
        // The entry keeps its frozen copy of the final state.
        self.guardrail = guardrail::transition(self.guardrail.take(), GuardrailEvent::Finished);
    }

    /// Drop the answer's guardrail copy when `stale` holds for it.
    fn clear_answer_guardrail(&mut self, stale: impl Fn(&GuardrailState) -> bool) {
        let timeline = self.store.timeline();
        let Some(index) = timeline.current_answer_index() else {
            return;
        };
        if timeline.entries()[index].guardrail.as_ref().is_some_and(stale) {
            self.store.update(index, |entry| entry.guardrail = None);
        }
    }

    fn finish_answer(&mut self) {
        let timeline = self.store.timeline();
        let Some(index) = timeline.current_answer_index() else {
            return;
        };
        if !timeline.entries()[index].stream_done {
            self.store.update(index, |entry| entry.stream_done = true);
        }
    }

    /// Drop product cards of the current turn; they belong to the superseded answer.
    fn remove_turn_attachments(&mut self) {
        let turn_start = self
            .store
            .timeline()
            .last_human_index()
            .map_or(0, |index| index + 1);
        let superseded: Vec<String> = self.store.timeline().entries()[turn_start..]
            .iter()
            .filter(|entry| entry.is_synthetic_attachment())
            .filter_map(|entry| entry.product_group_id.clone())
            .collect();
        if superseded.is_empty() {
            return;
        }
        self.store.remove_where(|entry| {
            entry
                .product_group_id
                .as_ref()
                .is_some_and(|group| superseded.contains(group))
        });
    }

    fn current_answer_content(&self) -> Option<String> {
        let timeline = self.store.timeline();
        timeline
            .current_answer_index()
            .map(|index| timeline.entries()[index].content.clone())
    }

    fn attach_guardrail(&mut self) {
        let Some(state) = self.guardrail.clone() else {
            return;
        };
        if let Some(index) = self.store.timeline().current_answer_index() {
            self.store
                .update(index, |entry| entry.guardrail = Some(state));
        }
    }

    fn forward_thread_token(&mut self, token: &str) {
        let token = token.trim();
        if token.is_empty() || self.last_thread_token.as_deref() == Some(token) {
            return;
        }
        if let Err(error) = self
            .persistence
            .set_thread_token(token, self.options.thread_token_ttl)
        {
            tracing::warn!(%error, "failed to persist thread token");
        }
        self.last_thread_token = Some(token.to_owned());
    }

    fn notify(&mut self) {
        let snapshot = self.store.snapshot();
        for (_, observer) in &mut self.observers {
            observer(&snapshot);
        }
    }
}
