//! Classification of free-form inspection output.
//!
//! Inspection procedures print a status token somewhere in their output,
//! surrounded by tool noise. This module is the only place that scrapes that
//! text; everything else sees an [`ObservedState`].

use crate::error::{Error, Result};
use crate::tool::{ToolError, ToolOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static BOOLEAN_REGEX: OnceLock<Regex> = OnceLock::new();
static ENUMERATED_REGEX: OnceLock<Regex> = OnceLock::new();
static DATABASE_LIST_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_boolean_regex() -> &'static Regex {
    BOOLEAN_REGEX
        .get_or_init(|| Regex::new(r"(?i)is_running=(true|false)").expect("static regex pattern is valid"))
}

fn get_enumerated_regex() -> &'static Regex {
    ENUMERATED_REGEX
        .get_or_init(|| Regex::new(r"db_status=([a-zA-Z]+)").expect("static regex pattern is valid"))
}

fn get_database_list_regex() -> &'static Regex {
    DATABASE_LIST_REGEX
        .get_or_init(|| Regex::new(r#"(?s)"msg":\s*\[(.*?)\]"#).expect("static regex pattern is valid"))
}

/// How a platform's inspection procedure reports status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGrammar {
    /// `is_running=true` / `is_running=false`
    BooleanFlag,
    /// `db_status=<word>`
    Enumerated,
}

/// Normalized result of one inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedState {
    Running,
    Stopped,
    /// Output carried no recognizable token.
    Unknown,
    /// The inspector itself could not be invoked.
    Error,
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedState::Running => write!(f, "running"),
            ObservedState::Stopped => write!(f, "stopped"),
            ObservedState::Unknown => write!(f, "unknown"),
            ObservedState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: ObservedState,
    /// Set when the inspection exited non-zero or could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn unknown() -> Self {
        Self {
            state: ObservedState::Unknown,
            error: None,
        }
    }

    /// The inspection could not be invoked at all.
    pub fn from_invocation_error(err: &ToolError) -> Self {
        Self {
            state: ObservedState::Error,
            error: Some(err.to_string()),
        }
    }
}

/// Drop advisory `[WARNING]` lines.
pub fn strip_warnings(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("[WARNING]"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn classify(text: &str, grammar: StatusGrammar) -> ObservedState {
    match grammar {
        StatusGrammar::BooleanFlag => {
            // Any node reporting true wins over nodes reporting false.
            let mut flags = get_boolean_regex().captures_iter(text).peekable();
            if flags.peek().is_none() {
                ObservedState::Unknown
            } else if flags.any(|caps| caps[1].eq_ignore_ascii_case("true")) {
                ObservedState::Running
            } else {
                ObservedState::Stopped
            }
        }
        StatusGrammar::Enumerated => get_enumerated_regex()
            .captures(text)
            .map(|caps| match caps[1].to_ascii_lowercase().as_str() {
                "running" | "up" | "active" | "ready" => ObservedState::Running,
                "stopped" | "down" | "inactive" | "exited" | "terminated" => {
                    ObservedState::Stopped
                }
                _ => ObservedState::Unknown,
            })
            .unwrap_or(ObservedState::Unknown),
    }
}

/// Classify inspection output.
///
/// Pure in `(text, exit_code)`. A non-zero (or missing) exit code keeps the
/// recognized state and attaches an error annotation.
pub fn interpret(text: &str, exit_code: Option<i32>, grammar: StatusGrammar) -> StatusReport {
    let clean = strip_warnings(text);
    let state = classify(&clean, grammar);
    let error = if exit_code == Some(0) {
        None
    } else {
        let trimmed = clean.trim();
        Some(if trimmed.is_empty() {
            match exit_code {
                Some(code) => format!("inspection exited with code {}", code),
                None => "inspection was terminated".to_string(),
            }
        } else {
            trimmed.to_string()
        })
    };
    StatusReport { state, error }
}

/// Classify a finished inspection run.
///
/// The token is searched in stdout; the error annotation prefers stderr.
pub fn interpret_output(output: &ToolOutput, grammar: StatusGrammar) -> StatusReport {
    let mut report = interpret(&output.stdout, output.exit_code, grammar);
    if report.error.is_some() {
        let stderr = strip_warnings(&output.stderr);
        if !stderr.trim().is_empty() {
            report.error = Some(stderr.trim().to_string());
        }
    }
    report
}

/// Extract the database names a list procedure printed as `"msg": [...]`.
///
/// No list in the output means no databases; a list that is not valid JSON
/// is a `ParseFailure`.
pub fn parse_database_list(text: &str) -> Result<Vec<String>> {
    let Some(caps) = get_database_list_regex().captures(text) else {
        return Ok(Vec::new());
    };
    let json = format!("[{}]", caps[1].trim());
    serde_json::from_str(&json).map_err(|e| Error::ParseFailure {
        what: "database list".to_string(),
        reason: e.to_string(),
    })
}
