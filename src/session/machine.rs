//! Pure session state transitions
//!
//! `transition` takes the current [`ChatState`] and an [`Event`] and returns the
//! next state plus the effects the caller must perform. It does no I/O, so the
//! optimistic view, the rollback view and the reconciliation rules can all be
//! checked without a runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::log::{MessageLog, Turn};
use super::store::ConversationStore;
use crate::utils::ExchangeError;

/// What to do with a response that arrives after the user switched away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateResponsePolicy {
    /// Store the result under the conversation it was sent from
    #[default]
    Apply,
    /// Drop the result; the stored entry keeps its previous state
    Discard,
}

/// Why a submission was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("Nothing to send")]
    EmptyInput,
    #[error("A message is already being sent")]
    Busy,
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Rejected(#[from] SubmitRejected),
    #[error("No outstanding exchange with ticket {0}")]
    UnknownExchange(u64),
}

/// Snapshot taken when a submission starts
///
/// Everything reconciliation and rollback need is fixed here, so neither
/// depends on what the user did while the exchange was outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    pub ticket: u64,
    /// Active conversation at submission time (`None` = new conversation)
    pub conversation_id: Option<String>,
    pub view_epoch: u64,
    pub base_log: MessageLog,
    pub user_turn: Turn,
}

impl PendingExchange {
    /// Exactly what is sent to the responder
    pub fn outbound(&self) -> MessageLog {
        self.base_log.append(self.user_turn.clone())
    }

    /// What the user sees while waiting
    pub fn optimistic_view(&self) -> MessageLog {
        self.outbound().append(Turn::placeholder())
    }

    /// What the user sees after a failure
    pub fn rollback_view(&self) -> MessageLog {
        self.optimistic_view().without_placeholder()
    }
}

/// Complete session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub store: ConversationStore,
    /// Log currently shown to the user, possibly optimistic
    pub visible: MessageLog,
    pub input: String,
    pub in_flight: Option<PendingExchange>,
    /// Bumped whenever the user switches to a different conversation
    pub view_epoch: u64,
    pub last_error: Option<String>,
    pub late_responses: LateResponsePolicy,
    next_ticket: u64,
}

impl ChatState {
    pub fn new(late_responses: LateResponsePolicy) -> Self {
        Self {
            late_responses,
            ..Self::default()
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.store.active_id()
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Text typed into the input box
    InputChanged { text: String },
    Submit { text: String },
    Resolved { ticket: u64, messages: MessageLog },
    Failed { ticket: u64, error: ExchangeError },
    /// The driver stopped waiting; release without surfacing an error
    Abandoned { ticket: u64 },
    /// Switch to a conversation, `None` for a new one
    Select { id: Option<String> },
}

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the outbound log to the responder
    SendConversation(PendingExchange),
    /// An authoritative log was stored under `id`
    ConversationSaved { id: String, created: bool },
    /// Show this message to the user
    SurfaceError(String),
    /// A late result was dropped by policy
    ResponseDiscarded { ticket: u64 },
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function
pub fn transition(state: &ChatState, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::InputChanged { text } => {
            let mut next = state.clone();
            next.input = text;
            Ok(TransitionResult::new(next))
        }
        Event::Submit { text } => begin_submit(state, text),
        Event::Resolved { ticket, messages } => {
            let pending = take_pending(state, ticket)?;
            Ok(resolve(state, pending, messages))
        }
        Event::Failed { ticket, error } => {
            let pending = take_pending(state, ticket)?;
            let mut result = release(state, &pending);
            let message = error.to_string();
            result.new_state.last_error = Some(message.clone());
            Ok(result.with_effect(Effect::SurfaceError(message)))
        }
        Event::Abandoned { ticket } => {
            let pending = take_pending(state, ticket)?;
            Ok(release(state, &pending))
        }
        Event::Select { id } => {
            let mut next = state.clone();
            let same_conversation = id.is_some() && id.as_deref() == state.active_id();
            let awaiting_this = state
                .in_flight
                .as_ref()
                .is_some_and(|pending| pending.conversation_id == id);
            if same_conversation && awaiting_this {
                // Keep the optimistic view of the outstanding exchange
                return Ok(TransitionResult::new(next));
            }

            let (log, store) = state.store.select(id.as_deref());
            next.store = store;
            next.visible = log;
            if !same_conversation {
                next.view_epoch += 1;
            }
            Ok(TransitionResult::new(next))
        }
    }
}

fn begin_submit(state: &ChatState, text: String) -> Result<TransitionResult, TransitionError> {
    if text.trim().is_empty() {
        return Err(SubmitRejected::EmptyInput.into());
    }
    if state.is_submitting() {
        return Err(SubmitRejected::Busy.into());
    }

    let pending = PendingExchange {
        ticket: state.next_ticket,
        conversation_id: state.store.active_id().map(str::to_string),
        view_epoch: state.view_epoch,
        base_log: state.store.active_log(),
        user_turn: Turn::user(text),
    };

    let mut next = state.clone();
    next.next_ticket += 1;
    next.visible = pending.optimistic_view();
    next.input.clear();
    next.last_error = None;
    next.in_flight = Some(pending.clone());

    Ok(TransitionResult::new(next).with_effect(Effect::SendConversation(pending)))
}

fn take_pending(state: &ChatState, ticket: u64) -> Result<PendingExchange, TransitionError> {
    match &state.in_flight {
        Some(pending) if pending.ticket == ticket => Ok(pending.clone()),
        _ => Err(TransitionError::UnknownExchange(ticket)),
    }
}

fn resolve(state: &ChatState, pending: PendingExchange, messages: MessageLog) -> TransitionResult {
    let authoritative = messages.normalized();
    let navigated_away = state.view_epoch != pending.view_epoch;

    let mut next = state.clone();
    next.in_flight = None;

    if navigated_away && state.late_responses == LateResponsePolicy::Discard {
        return TransitionResult::new(next).with_effect(Effect::ResponseDiscarded {
            ticket: pending.ticket,
        });
    }

    let created = pending.conversation_id.is_none();
    let (id, store) = state
        .store
        .upsert(pending.conversation_id.as_deref(), authoritative.clone());

    if !navigated_away {
        next.store = store.with_active(Some(id.clone()));
        next.visible = authoritative;
    } else {
        // The user may have come back to the same conversation
        if store.active_id() == Some(id.as_str()) {
            next.visible = authoritative;
        }
        next.store = store;
    }

    TransitionResult::new(next).with_effect(Effect::ConversationSaved { id, created })
}

/// Clear the in-flight flag and roll the view back if it is still ours
fn release(state: &ChatState, pending: &PendingExchange) -> TransitionResult {
    let mut next = state.clone();
    next.in_flight = None;
    if state.view_epoch == pending.view_epoch {
        next.visible = pending.rollback_view();
    }
    TransitionResult::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::log::Role;
    use pretty_assertions::assert_eq;

    fn submit(state: &ChatState, text: &str) -> (ChatState, PendingExchange) {
        let result = transition(
            state,
            Event::Submit {
                text: text.to_string(),
            },
        )
        .unwrap();
        let pending = match result.effects.as_slice() {
            [Effect::SendConversation(pending)] => pending.clone(),
            other => panic!("Expected a single send effect, got {:?}", other),
        };
        (result.new_state, pending)
    }

    fn apply(state: &ChatState, event: Event) -> ChatState {
        transition(state, event).unwrap().new_state
    }

    fn reply(outbound: &MessageLog, content: &str) -> MessageLog {
        outbound.append(Turn::assistant(content))
    }

    #[test]
    fn test_submit_builds_optimistic_view() {
        let mut state = ChatState::default();
        state.input = "hello".to_string();

        let (next, pending) = submit(&state, "hello");

        assert!(next.is_submitting());
        assert!(next.input.is_empty());
        assert_eq!(next.visible.len(), 2);
        assert_eq!(next.visible.turns()[0].role, Role::User);
        assert_eq!(next.visible.turns()[0].content, "hello");
        assert!(next.visible.turns()[1].is_placeholder());
        assert_eq!(pending.outbound(), next.visible.without_placeholder());
        assert!(!pending.outbound().is_pending());
        // Store is not touched until the exchange resolves
        assert_eq!(next.store, state.store);
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let state = ChatState::default();
        for text in ["", "   ", "\n\t"] {
            let err = transition(
                &state,
                Event::Submit {
                    text: text.to_string(),
                },
            )
            .unwrap_err();
            assert!(matches!(
                err,
                TransitionError::Rejected(SubmitRejected::EmptyInput)
            ));
        }
    }

    #[test]
    fn test_second_submit_while_busy_is_rejected() {
        let (busy, _) = submit(&ChatState::default(), "first");
        let err = transition(
            &busy,
            Event::Submit {
                text: "second".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::Rejected(SubmitRejected::Busy)));
    }

    #[test]
    fn test_resolve_new_conversation_creates_entry() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let returned = reply(&pending.outbound(), "hi there");

        let result = transition(
            &busy,
            Event::Resolved {
                ticket: pending.ticket,
                messages: returned.clone(),
            },
        )
        .unwrap();
        let next = result.new_state;

        assert!(!next.is_submitting());
        assert_eq!(next.visible, returned);
        assert_eq!(next.store.len(), 1);
        let entry = &next.store.entries()[0];
        assert_eq!(entry.title, "hello...");
        assert_eq!(entry.messages, returned);
        assert_eq!(next.active_id(), Some(entry.id.as_str()));
        assert_eq!(
            result.effects,
            vec![Effect::ConversationSaved {
                id: entry.id.clone(),
                created: true
            }]
        );
    }

    #[test]
    fn test_resolve_trusts_responder_sequence() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let summarized = MessageLog::from(vec![Turn::assistant("summary of earlier chat")]);

        let next = apply(
            &busy,
            Event::Resolved {
                ticket: pending.ticket,
                messages: summarized.clone(),
            },
        );

        assert_eq!(next.visible, summarized);
        assert_eq!(next.store.entries()[0].title, "summary of earlier chat...");
    }

    #[test]
    fn test_failure_rolls_back_and_leaves_store() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let store_before = busy.store.clone();

        let result = transition(
            &busy,
            Event::Failed {
                ticket: pending.ticket,
                error: ExchangeError::TransportError("status 500".to_string()),
            },
        )
        .unwrap();
        let next = result.new_state;

        assert!(!next.is_submitting());
        assert_eq!(next.visible, pending.outbound());
        assert_eq!(next.store, store_before);
        assert_eq!(
            next.last_error.as_deref(),
            Some("Transport error: status 500")
        );
        assert_eq!(
            result.effects,
            vec![Effect::SurfaceError("Transport error: status 500".to_string())]
        );
    }

    #[test]
    fn test_existing_conversation_is_updated_in_place() {
        let (busy, pending) = submit(&ChatState::default(), "first");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: pending.ticket,
                messages: reply(&pending.outbound(), "one"),
            },
        );
        let id = state.active_id().unwrap().to_string();

        let (busy, pending) = submit(&state, "second");
        assert_eq!(pending.conversation_id.as_deref(), Some(id.as_str()));
        assert_eq!(pending.base_log.len(), 2);

        let next = apply(
            &busy,
            Event::Resolved {
                ticket: pending.ticket,
                messages: reply(&pending.outbound(), "two"),
            },
        );

        assert_eq!(next.store.len(), 1);
        assert_eq!(next.store.entries()[0].title, "first...");
        assert_eq!(next.store.entries()[0].messages.len(), 4);
        assert_eq!(next.active_id(), Some(id.as_str()));
    }

    #[test]
    fn test_base_log_comes_from_store_not_failed_view() {
        let (busy, pending) = submit(&ChatState::default(), "lost");
        let failed = apply(
            &busy,
            Event::Failed {
                ticket: pending.ticket,
                error: ExchangeError::NotConfigured,
            },
        );
        assert_eq!(failed.visible.len(), 1);

        let (_, retry) = submit(&failed, "again");
        assert!(retry.base_log.is_empty());
        assert!(failed.last_error.is_some());
    }

    #[test]
    fn test_switching_mid_flight_keeps_other_conversation_intact() {
        // Two saved conversations, A active
        let (busy, p) = submit(&ChatState::default(), "about b");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: p.ticket,
                messages: reply(&p.outbound(), "b reply"),
            },
        );
        let b = state.active_id().unwrap().to_string();
        let state = apply(&state, Event::Select { id: None });
        let (busy, p) = submit(&state, "about a");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: p.ticket,
                messages: reply(&p.outbound(), "a reply"),
            },
        );
        let a = state.active_id().unwrap().to_string();

        // Submit in A, then switch to B before the response arrives
        let (busy, pending) = submit(&state, "more a");
        let on_b = apply(&busy, Event::Select { id: Some(b.clone()) });
        let entry_b_before = on_b.store.get(&b).cloned();
        let visible_before = on_b.visible.clone();

        let next = apply(
            &on_b,
            Event::Resolved {
                ticket: pending.ticket,
                messages: reply(&pending.outbound(), "late a reply"),
            },
        );

        assert_eq!(next.active_id(), Some(b.as_str()));
        assert_eq!(next.visible, visible_before);
        assert_eq!(next.store.get(&b).cloned(), entry_b_before);
        assert_eq!(next.store.get(&a).map(|e| e.messages.len()), Some(4));
        assert!(!next.is_submitting());
    }

    #[test]
    fn test_late_failure_does_not_touch_new_view() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let moved = apply(&busy, Event::Select { id: None });
        assert!(moved.visible.is_empty());

        let next = apply(
            &moved,
            Event::Failed {
                ticket: pending.ticket,
                error: ExchangeError::MalformedResponse("missing `messages`".to_string()),
            },
        );

        assert!(next.visible.is_empty());
        assert!(!next.is_submitting());
        assert!(next.last_error.is_some());
    }

    #[test]
    fn test_late_new_conversation_is_saved_but_not_activated() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let moved = apply(&busy, Event::Select { id: None });

        let next = apply(
            &moved,
            Event::Resolved {
                ticket: pending.ticket,
                messages: reply(&pending.outbound(), "hi"),
            },
        );

        assert_eq!(next.store.len(), 1);
        assert_eq!(next.active_id(), None);
        assert!(next.visible.is_empty());
    }

    #[test]
    fn test_discard_policy_drops_late_result() {
        let (busy, pending) = submit(&ChatState::new(LateResponsePolicy::Discard), "hello");
        let moved = apply(&busy, Event::Select { id: None });

        let result = transition(
            &moved,
            Event::Resolved {
                ticket: pending.ticket,
                messages: reply(&pending.outbound(), "hi"),
            },
        )
        .unwrap();

        assert!(result.new_state.store.is_empty());
        assert!(!result.new_state.is_submitting());
        assert_eq!(
            result.effects,
            vec![Effect::ResponseDiscarded {
                ticket: pending.ticket
            }]
        );
    }

    #[test]
    fn test_reselecting_current_conversation_keeps_late_result() {
        let (busy, p) = submit(&ChatState::new(LateResponsePolicy::Discard), "hello");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: p.ticket,
                messages: reply(&p.outbound(), "hi"),
            },
        );
        let a = state.active_id().unwrap().to_string();

        let (busy, pending) = submit(&state, "again");
        let reselected = apply(&busy, Event::Select { id: Some(a.clone()) });
        assert_eq!(reselected.view_epoch, busy.view_epoch);
        assert_eq!(reselected.visible, pending.optimistic_view());

        let returned = reply(&pending.outbound(), "still here");
        let result = transition(
            &reselected,
            Event::Resolved {
                ticket: pending.ticket,
                messages: returned.clone(),
            },
        )
        .unwrap();

        assert_eq!(
            result.effects,
            vec![Effect::ConversationSaved {
                id: a.clone(),
                created: false
            }]
        );
        assert_eq!(result.new_state.visible, returned);
        assert_eq!(result.new_state.store.get(&a).unwrap().messages.len(), 4);
    }

    #[test]
    fn test_reselecting_idle_conversation_does_not_count_as_leaving() {
        let (busy, p) = submit(&ChatState::default(), "hello");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: p.ticket,
                messages: reply(&p.outbound(), "hi"),
            },
        );
        let a = state.active_id().unwrap().to_string();

        let same = apply(&state, Event::Select { id: Some(a) });
        assert_eq!(same.view_epoch, state.view_epoch);
        assert_eq!(same.visible, state.visible);

        let fresh = apply(&same, Event::Select { id: None });
        assert_eq!(fresh.view_epoch, state.view_epoch + 1);
        assert!(fresh.visible.is_empty());
    }

    #[test]
    fn test_returning_to_conversation_refreshes_view() {
        let (busy, p) = submit(&ChatState::default(), "hello");
        let state = apply(
            &busy,
            Event::Resolved {
                ticket: p.ticket,
                messages: reply(&p.outbound(), "hi"),
            },
        );
        let a = state.active_id().unwrap().to_string();

        let (busy, pending) = submit(&state, "again");
        let away = apply(&busy, Event::Select { id: None });
        let back = apply(&away, Event::Select { id: Some(a.clone()) });
        assert_eq!(back.visible.len(), 2);

        let returned = reply(&pending.outbound(), "welcome back");
        let next = apply(
            &back,
            Event::Resolved {
                ticket: pending.ticket,
                messages: returned.clone(),
            },
        );

        assert_eq!(next.visible, returned);
        assert_eq!(next.active_id(), Some(a.as_str()));
    }

    #[test]
    fn test_abandoned_releases_without_error() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let next = apply(
            &busy,
            Event::Abandoned {
                ticket: pending.ticket,
            },
        );

        assert!(!next.is_submitting());
        assert_eq!(next.visible, pending.rollback_view());
        assert_eq!(next.last_error, None);
    }

    #[test]
    fn test_stale_ticket_is_an_error() {
        let (busy, pending) = submit(&ChatState::default(), "hello");
        let err = transition(
            &busy,
            Event::Abandoned {
                ticket: pending.ticket + 1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::UnknownExchange(_)));
    }

    #[test]
    fn test_input_changed() {
        let next = apply(
            &ChatState::default(),
            Event::InputChanged {
                text: "draft".to_string(),
            },
        );
        assert_eq!(next.input, "draft");
    }
}
