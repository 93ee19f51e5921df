use crate::assistant::{AssistantSession, Scheduler, TokioScheduler, presets};
use crate::config::AssistantConfig;
use crate::types::{Message, Sender};
use dioxus::events::Key;
use dioxus::prelude::*;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

/// Used only when the platform launcher did not enter a tokio runtime.
static TIMER_RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("nexus-timers")
        .enable_time()
        .build()
        .expect("failed to start timer runtime")
});

fn timer_scheduler() -> Arc<dyn Scheduler> {
    match TokioScheduler::try_current() {
        Ok(scheduler) => Arc::new(scheduler),
        Err(err) => {
            warn!(%err, "using dedicated timer runtime");
            Arc::new(TokioScheduler::with_handle(TIMER_RUNTIME.handle().clone()))
        }
    }
}

fn mount_session() -> AssistantSession {
    let config = AssistantConfig::from_env().unwrap_or_else(|err| {
        warn!(%err, "invalid assistant config, using defaults");
        AssistantConfig::default()
    });
    let commands = config.command_table().unwrap_or_else(|err| {
        warn!(%err, "falling back to built-in commands");
        presets::command_table().with_policy(config.match_policy)
    });

    AssistantSession::builder(timer_scheduler())
        .config(config)
        .commands(commands)
        .build()
}

#[component]
pub fn AssistantPanel() -> Element {
    let session = use_hook(mount_session);
    let mut snapshot = use_signal(|| session.state());

    use_hook({
        let session = session.clone();
        move || {
            let mut updates = session.subscribe();
            spawn(async move {
                while updates.changed().await.is_ok() {
                    let next = updates.borrow_and_update().clone();
                    snapshot.set(next);
                }
            });
        }
    });

    use_drop({
        let session = session.clone();
        move || session.close()
    });

    let state = snapshot();
    let open = state.visible;
    let panel_class = if open {
        "assistant-panel open"
    } else {
        "assistant-panel"
    };
    let toggle_label = if open { "›" } else { "‹" };

    let toggle = session.clone();
    let draft = session.clone();
    let on_enter = session.clone();
    let on_send = session.clone();

    rsx! {
        div { class: "{panel_class}",
            div { class: "assistant-header",
                div { class: "assistant-title",
                    span { class: "avatar assistant", "AI" }
                    h3 { "AI Assistant" }
                }
                button {
                    class: "btn btn-ghost", r#type: "button",
                    onclick: move |_| toggle.set_visible(!open),
                    "{toggle_label}"
                }
            }
            if open {
                div { class: "assistant-messages",
                    for msg in state.transcript.iter() {
                        MessageBubble { key: "{msg.id}", message: msg.clone() }
                    }
                }
                div { class: "composer",
                    input {
                        class: "composer-input",
                        placeholder: "Ask me anything...",
                        value: "{state.pending_input}",
                        oninput: move |ev| draft.set_pending_input(ev.value()),
                        onkeydown: move |ev| {
                            if ev.key() == Key::Enter {
                                ev.prevent_default();
                                on_enter.submit();
                            }
                        },
                    }
                    button {
                        class: "btn btn-primary", r#type: "button",
                        onclick: move |_| on_send.submit(),
                        "Send"
                    }
                }
            }
        }
    }
}

#[component]
fn MessageBubble(message: Message) -> Element {
    let side = match message.sender {
        Sender::Assistant => "assistant",
        Sender::User => "user",
    };
    let shown_at = message.display_time();

    rsx! {
        div { class: "message-row {side}",
            div { class: "bubble {side}",
                p { "{message.content}" }
                span { class: "message-timestamp", "{shown_at}" }
            }
        }
    }
}
