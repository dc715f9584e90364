use crate::utils::error::{ErrorKind, GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub const MIN_INTENSITY: i64 = 1;
pub const MAX_INTENSITY: i64 = 100;
pub const MIN_DURATION_MS: i64 = 300;
pub const MAX_DURATION_MS: i64 = 30_000;
pub const DEFAULT_BEEP_INTENSITY: i64 = 50;

/// Credential callers must present to the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

impl FromStr for AuthToken {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Credential the gateway presents to the device-control API.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredential(String);

impl DeviceCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceCredential(<redacted>)")
    }
}

impl FromStr for DeviceCredential {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Ceiling for SHOCK intensity. `0` leaves requests untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitPolicy {
    pub max_intensity: u8,
}

impl LimitPolicy {
    pub fn new(max_intensity: u8) -> Self {
        Self { max_intensity }
    }

    pub fn unrestricted() -> Self {
        Self { max_intensity: 0 }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.max_intensity == 0
    }
}

/// One addressable device plus the parameters for one command application.
///
/// Numeric fields stay wide and optional here; range checks happen in the
/// dispatcher so a bad value is reported against its target rather than
/// failing the whole request at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub intensity: Option<i64>,
    pub duration_ms: Option<i64>,
}

impl Target {
    pub fn new(id: impl Into<String>, intensity: Option<i64>, duration_ms: Option<i64>) -> Self {
        Self {
            id: id.into(),
            intensity,
            duration_ms,
        }
    }

    pub fn stop(id: impl Into<String>) -> Self {
        Self::new(id, None, None)
    }
}

/// A `shockers` entry whose JSON could not be read as a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTarget {
    pub id: String,
    pub field: String,
    pub reason: String,
}

impl MalformedTarget {
    pub fn to_error(&self) -> GatewayError {
        GatewayError::invalid_parameter(Some(&self.id), &self.field, self.reason.clone())
    }
}

/// One element of the `shockers` array.
///
/// Malformed entries are carried through to dispatch so they fail on their
/// own instead of taking the whole command down with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEntry {
    Valid(Target),
    Malformed(MalformedTarget),
}

impl TargetEntry {
    /// Reads one `shockers` element field by field. `duration_ms` is accepted
    /// as an alias of `duration`; `null` counts as absent.
    pub fn from_value(position: usize, value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return TargetEntry::Malformed(MalformedTarget {
                id: String::new(),
                field: format!("shockers[{}]", position),
                reason: format!("expected a target object, got {}", json_type(value)),
            });
        };

        let id = match object.get("id") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return TargetEntry::Malformed(MalformedTarget {
                    id: other.to_string(),
                    field: "id".to_string(),
                    reason: format!("expected a string, got {}", json_type(other)),
                })
            }
        };

        let read = || -> std::result::Result<Target, MalformedTarget> {
            Ok(Target {
                intensity: integer_field(object, &["intensity"], &id, "intensity")?,
                duration_ms: integer_field(object, &["duration", "duration_ms"], &id, "duration_ms")?,
                id: id.clone(),
            })
        };

        match read() {
            Ok(target) => TargetEntry::Valid(target),
            Err(malformed) => TargetEntry::Malformed(malformed),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TargetEntry::Valid(target) => &target.id,
            TargetEntry::Malformed(malformed) => &malformed.id,
        }
    }
}

impl From<Target> for TargetEntry {
    fn from(target: Target) -> Self {
        TargetEntry::Valid(target)
    }
}

fn integer_field(
    object: &Map<String, Value>,
    keys: &[&str],
    target_id: &str,
    field: &str,
) -> std::result::Result<Option<i64>, MalformedTarget> {
    let Some(value) = keys.iter().find_map(|key| object.get(*key)) else {
        return Ok(None);
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| MalformedTarget {
            id: target_id.to_string(),
            field: field.to_string(),
            reason: format!("expected an integer, got {}", n),
        }),
        other => Err(MalformedTarget {
            id: target_id.to_string(),
            field: field.to_string(),
            reason: format!("expected an integer, got {}", json_type(other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Shock,
    Vibrate,
    Beep,
    Stop,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Shock,
        CommandKind::Vibrate,
        CommandKind::Beep,
        CommandKind::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Shock => "SHOCK",
            CommandKind::Vibrate => "VIBRATE",
            CommandKind::Beep => "BEEP",
            CommandKind::Stop => "STOP",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GatewayError::UnknownCommand {
                kind: s.to_string(),
            })
    }
}

/// Physical action carried by apply-effect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Shock,
    Vibrate,
    Beep,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Shock => "shock",
            EffectKind::Vibrate => "vibrate",
            EffectKind::Beep => "beep",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Shock(Vec<TargetEntry>),
    Vibrate(Vec<TargetEntry>),
    Beep(Vec<TargetEntry>),
    Stop(Vec<TargetEntry>),
}

impl Command {
    pub fn new(kind: CommandKind, targets: Vec<Target>) -> Result<Self> {
        Self::from_entries(kind, targets.into_iter().map(TargetEntry::from).collect())
    }

    pub fn from_entries(kind: CommandKind, entries: Vec<TargetEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(GatewayError::invalid_parameter(
                None,
                "shockers",
                "must contain at least one target",
            ));
        }

        Ok(match kind {
            CommandKind::Shock => Command::Shock(entries),
            CommandKind::Vibrate => Command::Vibrate(entries),
            CommandKind::Beep => Command::Beep(entries),
            CommandKind::Stop => Command::Stop(entries),
        })
    }

    /// 從工具名稱與參數建立指令
    ///
    /// Only the list itself can fail the whole command; a bad element is
    /// kept as [`TargetEntry::Malformed`] and rejected on its own later.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self> {
        let kind: CommandKind = name.parse()?;

        let shockers = arguments
            .get("shockers")
            .ok_or_else(|| GatewayError::invalid_parameter(None, "shockers", "is required"))?
            .as_array()
            .ok_or_else(|| GatewayError::invalid_parameter(None, "shockers", "expected an array of targets"))?;

        let entries = shockers
            .iter()
            .enumerate()
            .map(|(position, value)| TargetEntry::from_value(position, value))
            .collect();

        Self::from_entries(kind, entries)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Shock(_) => CommandKind::Shock,
            Command::Vibrate(_) => CommandKind::Vibrate,
            Command::Beep(_) => CommandKind::Beep,
            Command::Stop(_) => CommandKind::Stop,
        }
    }

    pub fn entries(&self) -> &[TargetEntry] {
        match self {
            Command::Shock(t) | Command::Vibrate(t) | Command::Beep(t) | Command::Stop(t) => t,
        }
    }

    pub fn into_entries(self) -> Vec<TargetEntry> {
        match self {
            Command::Shock(t) | Command::Vibrate(t) | Command::Beep(t) | Command::Stop(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
}

impl From<&GatewayError> for TargetFailure {
    fn from(err: &GatewayError) -> Self {
        let status_code = match err {
            GatewayError::DownstreamFailure { status_code, .. } => *status_code,
            _ => None,
        };

        Self {
            kind: err.kind(),
            field: err.field().map(str::to_string),
            status_code,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TargetFailure>,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownstreamStatus {
    Success,
    PartialFailure,
    Failure,
}

impl DownstreamStatus {
    pub fn from_outcomes(outcomes: &[TargetOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();

        if succeeded == outcomes.len() {
            DownstreamStatus::Success
        } else if succeeded == 0 {
            DownstreamStatus::Failure
        } else {
            DownstreamStatus::PartialFailure
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub command: CommandKind,
    pub applied: Vec<TargetOutcome>,
    pub downstream_status: DownstreamStatus,
}

impl DispatchResult {
    pub fn new(command: CommandKind, applied: Vec<TargetOutcome>) -> Self {
        let downstream_status = DownstreamStatus::from_outcomes(&applied);
        Self {
            command,
            applied,
            downstream_status,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.applied.iter().filter(|o| o.succeeded()).count()
    }

    /// Human-readable one-liner per target, used as MCP text content.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} on {}/{} target(s): {}",
            self.command,
            self.succeeded_count(),
            self.applied.len(),
            match self.downstream_status {
                DownstreamStatus::Success => "success",
                DownstreamStatus::PartialFailure => "partial-failure",
                DownstreamStatus::Failure => "failure",
            }
        )];

        for outcome in &self.applied {
            let line = match (&outcome.error, outcome.effective_intensity) {
                (Some(err), _) => format!("- {}: failed ({})", outcome.id, err.message),
                (None, Some(effective)) if outcome.requested_intensity != Some(effective) => format!(
                    "- {}: ok (intensity {} clamped from {})",
                    outcome.id,
                    effective,
                    outcome.requested_intensity.unwrap_or(effective)
                ),
                (None, _) => format!("- {}: ok", outcome.id),
            };
            lines.push(line);
        }

        lines.join("\n")
    }
}
