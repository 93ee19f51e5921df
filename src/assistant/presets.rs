//! Built-in content of the Canonical Nexus assistant panel.

use super::{CommandTable, InsightPool};
use once_cell::sync::Lazy;

pub const GREETING: &str =
    "Hello! I'm your Canonical Nexus AI assistant. How can I help you today?";

pub const FALLBACK: &str = "I'm not sure how to help with that. Try asking me to check instance logs, show updates, or system status.";

// Order matters: the first contained trigger wins.
const COMMANDS: &[(&str, &str)] = &[
    (
        "check instance logs",
        "Fetching logs for all instances. Everything looks normal with the exception of instance-03 which shows increased error rates.",
    ),
    (
        "show updates",
        "Ubuntu 24.04: Security patch (critical). Docker: Version 25.0.3 available.",
    ),
    (
        "system status",
        "All systems operational. Load balancer health: 100%, Database response time: 42ms.",
    ),
    (
        "predict resource needs",
        "Based on current growth pattern, you'll need 20% more storage and 15% more compute within 30 days.",
    ),
    (
        "help",
        "You can ask me to check instance logs, show updates, system status, or predict resource needs.",
    ),
];

const INSIGHTS: &[&str] = &[
    "Your server load is increasing — consider scaling up.",
    "2 updates available for Ubuntu 24.04.",
    "CPU usage on node-01 has exceeded 80% for the last 15 minutes.",
    "Database backup completed successfully.",
    "Memory usage is optimal across all instances.",
    "Security scan complete: No vulnerabilities detected.",
];

static COMMAND_TABLE: Lazy<CommandTable> = Lazy::new(|| {
    // built-in triggers are never blank, so the fold cannot fail
    COMMANDS
        .iter()
        .try_fold(CommandTable::new(FALLBACK), |table, (trigger, response)| {
            table.with_command(*trigger, *response)
        })
        .unwrap_or_else(|_| CommandTable::new(FALLBACK))
});

pub fn command_table() -> CommandTable {
    COMMAND_TABLE.clone()
}

pub fn insight_pool() -> InsightPool {
    InsightPool::new(INSIGHTS.iter().copied())
}
