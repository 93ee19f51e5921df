use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a submission is matched against the command table when more than one
/// trigger is contained in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First trigger in table order wins, even if a later one is more specific.
    #[default]
    FirstDeclared,
    /// Longest matching trigger wins; equal lengths fall back to table order.
    LongestTrigger,
}

impl std::str::FromStr for MatchPolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first" | "first_declared" => Ok(Self::FirstDeclared),
            "longest" | "longest_trigger" => Ok(Self::LongestTrigger),
            other => Err(ConfigError::UnknownMatchPolicy(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub trigger: String,
    pub response: String,
}

/// Outcome of matching one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Matched { trigger: &'a str, response: &'a str },
    Fallback(&'a str),
}

impl<'a> Resolution<'a> {
    pub fn response(&self) -> &'a str {
        match self {
            Resolution::Matched { response, .. } | Resolution::Fallback(response) => *response,
        }
    }
}

#[derive(Deserialize)]
struct CommandFile {
    fallback: String,
    commands: Vec<Command>,
}

/// Ordered trigger phrases with their canned responses. Table order is
/// significant: it decides which trigger wins under [`MatchPolicy::FirstDeclared`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandTable {
    commands: Vec<Command>,
    // lowercased triggers, same indices as `commands`
    normalized: Vec<String>,
    fallback: String,
    policy: MatchPolicy,
}

impl CommandTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            normalized: Vec::new(),
            fallback: fallback.into(),
            policy: MatchPolicy::default(),
        }
    }

    /// Append a trigger after every existing one.
    pub fn with_command(
        mut self,
        trigger: impl Into<String>,
        response: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let trigger = trigger.into();
        if trigger.trim().is_empty() {
            return Err(ConfigError::EmptyTrigger);
        }
        self.normalized.push(trigger.to_lowercase());
        self.commands.push(Command {
            trigger,
            response: response.into(),
        });
        Ok(self)
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse `{"fallback": "...", "commands": [{"trigger": "...", "response": "..."}]}`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: CommandFile = serde_json::from_str(raw)?;
        file.commands
            .into_iter()
            .try_fold(Self::new(file.fallback), |table, cmd| {
                table.with_command(cmd.trigger, cmd.response)
            })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CommandFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn resolve(&self, text: &str) -> Resolution<'_> {
        let lowered = text.to_lowercase();
        let mut matches = self
            .normalized
            .iter()
            .enumerate()
            .filter(|(_, trigger)| lowered.contains(trigger.as_str()));

        let winner = match self.policy {
            MatchPolicy::FirstDeclared => matches.next(),
            // max_by_key keeps the last maximum, so compare on reversed index
            // to let the earlier trigger win a length tie
            MatchPolicy::LongestTrigger => {
                matches.max_by_key(|(idx, trigger)| (trigger.len(), std::cmp::Reverse(*idx)))
            }
        };

        match winner {
            Some((idx, _)) => {
                let cmd = &self.commands[idx];
                Resolution::Matched {
                    trigger: &cmd.trigger,
                    response: &cmd.response,
                }
            }
            None => Resolution::Fallback(&self.fallback),
        }
    }
}
