//! Commands embedded in the local device's own client record.
//!
//! Entries look like `{ "command": "displayURI", "args": [uri, sender, title] }`.
//! Parsing is lenient: unknown names and malformed arguments are dropped, never
//! fatal to the pass that found them.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("Malformed command '{command}': {reason}")]
    Malformed { command: String, reason: String },
    #[error("Command sink failed: {0}")]
    Sink(String),
}

/// A command addressed to this device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Wipe all local data. Placeholder: acknowledged, no effect.
    WipeAll,
    /// Wipe one engine's local data. Placeholder: acknowledged, no effect.
    WipeEngine { engine: String },
    /// Reset sync state of every engine.
    ResetAll,
    /// Reset sync state of one engine, forcing a full refetch.
    ResetEngine { engine: String },
    /// Show a URI sent by another device.
    DisplayUri {
        uri: Url,
        sender: String,
        title: Option<String>,
    },
}

impl Command {
    /// Wire name of this command
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WipeAll => "wipeAll",
            Self::WipeEngine { .. } => "wipeEngine",
            Self::ResetAll => "resetAll",
            Self::ResetEngine { .. } => "resetEngine",
            Self::DisplayUri { .. } => "displayURI",
        }
    }

    /// Build a command from its name and positional arguments.
    pub fn from_name(name: &str, args: &[Value]) -> Result<Self, CommandError> {
        match name {
            "wipeAll" => Ok(Self::WipeAll),
            "wipeEngine" => Ok(Self::WipeEngine {
                engine: required_string(name, args, 0, "engine")?,
            }),
            "resetAll" => Ok(Self::ResetAll),
            "resetEngine" => Ok(Self::ResetEngine {
                engine: required_string(name, args, 0, "engine")?,
            }),
            "displayURI" => {
                let raw_uri = required_string(name, args, 0, "uri")?;
                let uri = Url::parse(&raw_uri).map_err(|error| CommandError::Malformed {
                    command: name.to_string(),
                    reason: format!("invalid uri: {error}"),
                })?;
                let sender = required_string(name, args, 1, "sender")?;
                let title = args
                    .get(2)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|title| !title.is_empty())
                    .map(ToString::to_string);
                Ok(Self::DisplayUri { uri, sender, title })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Build a command from a raw `commands` array entry.
    pub fn from_entry(entry: &Value) -> Result<Self, CommandError> {
        let name = entry
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::Malformed {
                command: String::new(),
                reason: "missing command name".to_string(),
            })?;
        let args = match entry.get("args") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(args)) => args.as_slice(),
            Some(_) => {
                return Err(CommandError::Malformed {
                    command: name.to_string(),
                    reason: "args must be an array".to_string(),
                })
            }
        };
        Self::from_name(name, args)
    }

    /// Positional arguments as sent on the wire
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::WipeAll | Self::ResetAll => Vec::new(),
            Self::WipeEngine { engine } | Self::ResetEngine { engine } => {
                vec![Value::from(engine.as_str())]
            }
            Self::DisplayUri { uri, sender, title } => {
                let mut args = vec![Value::from(uri.as_str()), Value::from(sender.as_str())];
                if let Some(title) = title {
                    args.push(Value::from(title.as_str()));
                }
                args
            }
        }
    }

    /// Execute the command against `sink`.
    pub async fn run<S: CommandSink>(&self, sink: &S) -> Result<CommandOutcome, CommandError> {
        match self {
            Self::WipeAll | Self::WipeEngine { .. } => {
                tracing::info!(command = self.name(), "Ignoring wipe command");
                Ok(CommandOutcome::Ignored)
            }
            Self::ResetAll => {
                sink.reset_engine(None).await?;
                Ok(CommandOutcome::Applied)
            }
            Self::ResetEngine { engine } => {
                sink.reset_engine(Some(engine)).await?;
                Ok(CommandOutcome::Applied)
            }
            Self::DisplayUri { uri, sender, title } => {
                sink.display_uri(uri, sender, title.as_deref()).await?;
                Ok(CommandOutcome::Applied)
            }
        }
    }
}

fn required_string(
    command: &str,
    args: &[Value],
    index: usize,
    field: &str,
) -> Result<String, CommandError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| CommandError::Malformed {
            command: command.to_string(),
            reason: format!("missing {field} argument"),
        })
}

/// Lazily decode a `commands` array, dropping entries that do not decode.
pub fn parse(entries: &[Value]) -> impl Iterator<Item = Command> + '_ {
    entries
        .iter()
        .filter_map(|entry| match Command::from_entry(entry) {
            Ok(command) => Some(command),
            Err(error) => {
                tracing::debug!("Dropping command entry: {error}");
                None
            }
        })
}

/// Where commands take effect
#[allow(async_fn_in_trait)]
pub trait CommandSink {
    /// Present `uri` to the user.
    async fn display_uri(
        &self,
        uri: &Url,
        sender: &str,
        title: Option<&str>,
    ) -> Result<(), CommandError>;

    /// Reset sync state for `engine`, or for every engine when `None`.
    async fn reset_engine(&self, engine: Option<&str>) -> Result<(), CommandError>;
}

/// Result of running a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandOutcome {
    Applied,
    Ignored,
}

/// A command whose run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandFailure {
    pub command: String,
    pub error: String,
}

/// Summary of the own-record commands handled during one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    /// Names of commands that ran successfully, in execution order
    pub executed: Vec<String>,
    /// Commands whose run failed; they are not retried
    pub failed: Vec<CommandFailure>,
    /// Entries that did not decode into a command
    pub dropped: usize,
    /// A successful `resetAll` ran
    pub reset_all: bool,
    /// Engines named by successful `resetEngine` commands
    pub reset_engines: Vec<String>,
}

impl CommandReport {
    pub fn is_empty(&self) -> bool {
        self.executed.is_empty() && self.failed.is_empty() && self.dropped == 0
    }

    /// Whether a reset command in this report covers `collection`.
    pub fn resets(&self, collection: &str) -> bool {
        self.reset_all || self.reset_engines.iter().any(|engine| engine == collection)
    }

    fn record_reset(&mut self, command: &Command) {
        match command {
            Command::ResetAll => self.reset_all = true,
            Command::ResetEngine { engine } => {
                if !self.reset_engines.contains(engine) {
                    self.reset_engines.push(engine.clone());
                }
            }
            _ => {}
        }
    }
}

/// Parse `entries` and run every decodable command once, in array order.
///
/// Failures are logged and collected; they never stop later commands.
pub async fn process_commands<S: CommandSink>(entries: &[Value], sink: &S) -> CommandReport {
    let mut report = CommandReport::default();
    let mut parsed = 0usize;

    for command in parse(entries) {
        parsed += 1;
        match command.run(sink).await {
            Ok(outcome) => {
                tracing::debug!(command = command.name(), ?outcome, "Command ran");
                report.record_reset(&command);
                report.executed.push(command.name().to_string());
            }
            Err(error) => {
                tracing::warn!(command = command.name(), "Command failed: {error}");
                report.failed.push(CommandFailure {
                    command: command.name().to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    report.dropped = entries.len() - parsed;
    report
}
