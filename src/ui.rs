use crate::views::AssistantPanel;
use dioxus::prelude::*;

const NEXUS_CSS: Asset = asset!("/assets/nexus.css");

/// Minimal host page: the dashboards live elsewhere, this shell only mounts
/// the assistant panel.
#[component]
pub fn App() -> Element {
    rsx! {
        document::Link { rel: "stylesheet", href: NEXUS_CSS }
        div { class: "app-shell",
            div { class: "header",
                h1 { class: "header-wordmark", "Canonical Nexus" }
            }
            div { class: "main-container" }
            AssistantPanel {}
        }
    }
}
