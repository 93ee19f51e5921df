use nexus::config;

fn main() {
    let source = config::load_env();
    tracing_subscriber::fmt().with_target(false).init();
    tracing::info!(?source, "environment loaded");
    dioxus::launch(nexus::ui::App);
}
