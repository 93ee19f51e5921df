use super::insights::{InsightPicker, InsightPool, RngPicker};
use super::scheduler::{Scheduler, TimerId};
use super::{CommandTable, Resolution, presets};
use crate::config::AssistantConfig;
use crate::types::{Message, MessageId, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info};

/// What the host renders: visibility, transcript and the unsent draft.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub visible: bool,
    pub transcript: Vec<Message>,
    pub pending_input: String,
}

struct SessionState {
    visible: bool,
    transcript: Vec<Message>,
    pending_input: String,
    next_message: u64,
    insight_timer: Option<TimerId>,
    // keyed by a per-submission sequence so a resolution can clear its own entry
    pending_resolutions: HashMap<u64, TimerId>,
    next_resolution: u64,
    picker: Box<dyn InsightPicker>,
}

impl SessionState {
    fn append(&mut self, sender: Sender, content: impl Into<String>, at: OffsetDateTime) {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        self.transcript.push(Message::new(id, content, sender, at));
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            visible: self.visible,
            transcript: self.transcript.clone(),
            pending_input: self.pending_input.clone(),
        }
    }
}

struct Shared {
    config: AssistantConfig,
    commands: CommandTable,
    insights: InsightPool,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }

    fn tick_insight(&self) {
        let mut state = self.lock();
        if !state.visible {
            return;
        }
        if state.transcript.len() >= self.config.insight_cap {
            debug!(
                len = state.transcript.len(),
                cap = self.config.insight_cap,
                "transcript at insight cap, skipping tick"
            );
            return;
        }
        let Some(insight) = self
            .insights
            .sample(state.picker.as_mut())
            .map(str::to_owned)
        else {
            return;
        };
        debug!(%insight, "emitting insight");
        state.append(Sender::Assistant, insight, self.scheduler.now());
        self.publish(&state);
    }

    fn resolve(&self, seq: u64, text: &str) {
        let resolution = self.commands.resolve(text);
        match resolution {
            Resolution::Matched { trigger, .. } => debug!(trigger, "submission matched command"),
            Resolution::Fallback(_) => debug!("no command matched, sending fallback"),
        }

        let mut state = self.lock();
        state.pending_resolutions.remove(&seq);
        state.append(Sender::Assistant, resolution.response(), self.scheduler.now());
        self.publish(&state);
    }

    fn cancel_timers(scheduler: &dyn Scheduler, state: &mut SessionState) {
        if let Some(id) = state.insight_timer.take() {
            scheduler.cancel(id);
        }
        for (_, id) in state.pending_resolutions.drain() {
            scheduler.cancel(id);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        Self::cancel_timers(self.scheduler.as_ref(), state);
    }
}

/// One assistant panel's conversation.
///
/// Cloning yields another handle to the same session. Timers hold only weak
/// references, so dropping the last handle cancels everything still scheduled.
#[derive(Clone)]
pub struct AssistantSession {
    shared: Arc<Shared>,
}

impl AssistantSession {
    pub fn builder(scheduler: Arc<dyn Scheduler>) -> SessionBuilder {
        SessionBuilder::new(scheduler)
    }

    pub fn state(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receives a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Opening starts the insight timer, closing cancels it. Asking for the
    /// current state again changes nothing.
    pub fn set_visible(&self, open: bool) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if state.visible == open {
            return;
        }
        state.visible = open;

        if open {
            if state.insight_timer.is_none() {
                let weak: Weak<Shared> = Arc::downgrade(shared);
                let id = shared.scheduler.schedule_every(
                    shared.config.insight_interval,
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.tick_insight();
                        }
                    }),
                );
                state.insight_timer = Some(id);
            }
        } else if let Some(id) = state.insight_timer.take() {
            shared.scheduler.cancel(id);
        }

        info!(visible = open, "assistant panel toggled");
        shared.publish(&state);
    }

    pub fn set_pending_input(&self, text: impl Into<String>) {
        let mut state = self.shared.lock();
        state.pending_input = text.into();
        self.shared.publish(&state);
    }

    /// Commit the current draft. Blank drafts are ignored and left in place.
    pub fn submit(&self) {
        let mut state = self.shared.lock();
        let text = state.pending_input.clone();
        self.commit(&mut state, text);
    }

    /// Commit `text` as a user message and schedule its reply.
    pub fn submit_text(&self, text: &str) {
        let mut state = self.shared.lock();
        self.commit(&mut state, text.to_string());
    }

    fn commit(&self, state: &mut SessionState, text: String) {
        if text.trim().is_empty() {
            debug!("ignoring blank submission");
            return;
        }
        let shared = &self.shared;

        state.append(Sender::User, text.as_str(), shared.scheduler.now());
        state.pending_input.clear();

        let seq = state.next_resolution;
        state.next_resolution += 1;
        let weak = Arc::downgrade(shared);
        // State stays locked until the timer id is recorded, so the reply
        // cannot land before its bookkeeping exists.
        let timer = shared.scheduler.schedule_once(
            shared.config.response_delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.resolve(seq, &text);
                }
            }),
        );
        state.pending_resolutions.insert(seq, timer);

        debug!(seq, delay_ms = shared.config.response_delay.as_millis() as u64, "submission queued");
        shared.publish(state);
    }

    /// Teardown for an unmounting panel: cancels the insight timer and every
    /// reply still waiting, and hides the panel.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        Shared::cancel_timers(self.shared.scheduler.as_ref(), &mut state);
        state.visible = false;
        info!("assistant session closed");
        self.shared.publish(&state);
    }
}

pub struct SessionBuilder {
    scheduler: Arc<dyn Scheduler>,
    config: AssistantConfig,
    commands: Option<CommandTable>,
    insights: InsightPool,
    picker: Option<Box<dyn InsightPicker>>,
    greeting: String,
}

impl SessionBuilder {
    fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            config: AssistantConfig::default(),
            commands: None,
            insights: presets::insight_pool(),
            picker: None,
            greeting: presets::GREETING.to_string(),
        }
    }

    pub fn config(mut self, config: AssistantConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the built-in table. The table's own match policy is used as is.
    pub fn commands(mut self, commands: CommandTable) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn insights(mut self, insights: InsightPool) -> Self {
        self.insights = insights;
        self
    }

    pub fn picker(mut self, picker: impl InsightPicker + 'static) -> Self {
        self.picker = Some(Box::new(picker));
        self
    }

    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    pub fn build(self) -> AssistantSession {
        let commands = self.commands.unwrap_or_else(|| {
            presets::command_table().with_policy(self.config.match_policy)
        });
        let picker: Box<dyn InsightPicker> = match self.picker {
            Some(picker) => picker,
            None => Box::new(RngPicker::from_os_rng()),
        };

        let greeting = Message::new(
            MessageId::GREETING,
            self.greeting,
            Sender::Assistant,
            self.scheduler.now(),
        );
        let state = SessionState {
            visible: false,
            transcript: vec![greeting],
            pending_input: String::new(),
            next_message: MessageId::GREETING.0 + 1,
            insight_timer: None,
            pending_resolutions: HashMap::new(),
            next_resolution: 0,
            picker,
        };
        let (updates, _) = watch::channel(state.snapshot());

        AssistantSession {
            shared: Arc::new(Shared {
                config: self.config,
                commands,
                insights: self.insights,
                scheduler: self.scheduler,
                state: Mutex::new(state),
                updates,
            }),
        }
    }
}
