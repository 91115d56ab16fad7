use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::log::MessageLog;
use super::machine::{
    transition, ChatState, Effect, Event, LateResponsePolicy, PendingExchange, SubmitRejected,
    TransitionError,
};
use super::store::ConversationEntry;
use crate::exchange::RemoteExchange;
use crate::utils::ExchangeError;

/// How a call to [`SessionController::submit`] ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing was sent
    Rejected(SubmitRejected),
    /// The responder answered and the result was stored under `conversation_id`
    Resolved {
        conversation_id: String,
        messages: MessageLog,
    },
    /// The responder answered after the user switched away and the policy dropped it
    Discarded,
    /// The exchange failed; the view was rolled back to the outbound log
    Failed(ExchangeError),
    /// The session refused to start the exchange for a reason other than a rejection
    Aborted(String),
}

/// Drives submissions against a remote exchange
///
/// State changes go through the pure [`transition`] function under a short
/// lock. The lock is never held across the exchange call, so the user can
/// switch conversations while a submission is outstanding.
pub struct SessionController {
    state: Mutex<ChatState>,
    exchange: Arc<dyn RemoteExchange>,
}

impl SessionController {
    pub fn new(exchange: Arc<dyn RemoteExchange>, late_responses: LateResponsePolicy) -> Self {
        Self {
            state: Mutex::new(ChatState::new(late_responses)),
            exchange,
        }
    }

    fn apply(&self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let mut state = self.state.lock();
        let result = transition(&state, event)?;
        *state = result.new_state;
        Ok(result.effects)
    }

    /// Submit `text` as a new user turn and wait for the exchange to settle
    pub async fn submit(&self, text: impl Into<String>) -> SubmitOutcome {
        let pending = match self.begin(text.into()) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        let guard = InFlightGuard::new(self, pending.ticket);
        self.complete(pending, guard).await
    }

    /// Start a submission now and finish the exchange on a spawned task
    ///
    /// The optimistic view and the in-flight flag are in place when this
    /// returns, so a following submit is rejected as busy. Aborting the task
    /// releases the flag like dropping [`SessionController::submit`] does.
    pub fn spawn_submit(
        self: &Arc<Self>,
        text: impl Into<String>,
    ) -> Result<JoinHandle<SubmitOutcome>, SubmitOutcome> {
        let pending = self.begin(text.into())?;
        let guard = InFlightGuard::new(Arc::clone(self), pending.ticket);
        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            controller.complete(pending, guard).await
        }))
    }

    fn begin(&self, text: String) -> Result<PendingExchange, SubmitOutcome> {
        pending_exchange(self.apply(Event::Submit { text }))
    }

    async fn complete<C>(&self, pending: PendingExchange, mut guard: InFlightGuard<C>) -> SubmitOutcome
    where
        C: Deref<Target = SessionController>,
    {
        let result = self.exchange_for(&pending).await;
        guard.disarm();

        match result {
            Ok(messages) => self.reconcile(pending.ticket, messages),
            Err(error) => {
                warn!("Exchange failed ({}): {}", error.kind(), error);
                if let Err(err) = self.apply(Event::Failed {
                    ticket: pending.ticket,
                    error: error.clone(),
                }) {
                    error!("Could not record failed exchange: {}", err);
                }
                SubmitOutcome::Failed(error)
            }
        }
    }

    async fn exchange_for(&self, pending: &PendingExchange) -> Result<MessageLog, ExchangeError> {
        if !self.exchange.is_configured() {
            return Err(ExchangeError::NotConfigured);
        }
        self.exchange.send_conversation(&pending.outbound()).await
    }

    fn reconcile(&self, ticket: u64, messages: MessageLog) -> SubmitOutcome {
        let effects = match self.apply(Event::Resolved { ticket, messages }) {
            Ok(effects) => effects,
            Err(err) => {
                error!("Could not reconcile exchange: {}", err);
                return SubmitOutcome::Discarded;
            }
        };

        for effect in effects {
            match effect {
                Effect::ConversationSaved { id, created } => {
                    if created {
                        info!("Started conversation {}", id);
                    } else {
                        debug!("Updated conversation {}", id);
                    }
                    let messages = self
                        .state
                        .lock()
                        .store
                        .get(&id)
                        .map(|entry| entry.messages.clone())
                        .unwrap_or_default();
                    return SubmitOutcome::Resolved {
                        conversation_id: id,
                        messages,
                    };
                }
                Effect::ResponseDiscarded { ticket } => {
                    info!("Discarded late response for exchange {}", ticket);
                    return SubmitOutcome::Discarded;
                }
                _ => {}
            }
        }
        SubmitOutcome::Discarded
    }

    /// Switch to a saved conversation, or to a new one with `None`
    pub fn select(&self, id: Option<&str>) -> MessageLog {
        match self.apply(Event::Select {
            id: id.map(str::to_string),
        }) {
            Ok(_) => debug!("Active conversation: {:?}", self.active_id()),
            Err(err) => error!("Could not switch conversation: {}", err),
        }
        self.visible_log()
    }

    pub fn new_conversation(&self) {
        self.select(None);
    }

    pub fn set_input(&self, text: impl Into<String>) {
        if let Err(err) = self.apply(Event::InputChanged { text: text.into() }) {
            error!("Could not update input: {}", err);
        }
    }

    /// Copy of the whole state
    pub fn snapshot(&self) -> ChatState {
        self.state.lock().clone()
    }

    pub fn visible_log(&self) -> MessageLog {
        self.state.lock().visible.clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.state.lock().active_id().map(str::to_string)
    }

    pub fn conversations(&self) -> Vec<ConversationEntry> {
        self.state.lock().store.entries().to_vec()
    }

    pub fn is_submitting(&self) -> bool {
        self.state.lock().is_submitting()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn exchange(&self) -> &Arc<dyn RemoteExchange> {
        &self.exchange
    }
}

/// Pick the exchange to run out of a submit transition
fn pending_exchange(
    applied: Result<Vec<Effect>, TransitionError>,
) -> Result<PendingExchange, SubmitOutcome> {
    match applied {
        Ok(effects) => effects
            .into_iter()
            .find_map(|effect| match effect {
                Effect::SendConversation(pending) => Some(pending),
                _ => None,
            })
            .ok_or_else(|| {
                error!("Submit transition produced no exchange");
                SubmitOutcome::Aborted("no exchange was started".to_string())
            }),
        Err(TransitionError::Rejected(reason)) => {
            debug!("Submission rejected: {}", reason);
            Err(SubmitOutcome::Rejected(reason))
        }
        Err(err) => {
            error!("Unexpected transition error on submit: {}", err);
            Err(SubmitOutcome::Aborted(err.to_string()))
        }
    }
}

/// Releases the in-flight flag if the submit future is dropped mid-exchange
struct InFlightGuard<C>
where
    C: Deref<Target = SessionController>,
{
    controller: C,
    ticket: u64,
    armed: bool,
}

impl<C> InFlightGuard<C>
where
    C: Deref<Target = SessionController>,
{
    fn new(controller: C, ticket: u64) -> Self {
        Self {
            controller,
            ticket,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C> Drop for InFlightGuard<C>
where
    C: Deref<Target = SessionController>,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self
            .controller
            .apply(Event::Abandoned { ticket: self.ticket })
        {
            Ok(_) => warn!("Exchange {} abandoned before it finished", self.ticket),
            Err(err) => debug!("Nothing to release for exchange {}: {}", self.ticket, err),
        }
    }
}
