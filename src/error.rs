//! Error types for tool invocation, output parsing and lifecycle actions

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ActionKind, LifecycleStep};

pub type Result<T, E = WslError> = std::result::Result<T, E>;

/// Output shape errors. These abort the whole parse; malformed rows do not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected a column header, found {found:?}")]
    MissingHeader { found: String },
}

#[derive(Debug, Error)]
pub enum WslError {
    #[error("`{command}` was not found. Make sure WSL is installed.")]
    ToolUnavailable { command: String },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command} {}` {}: {detail}", .args.join(" "), exit_label(.code))]
    CommandFailed {
        command: String,
        args: Vec<String>,
        code: Option<i32>,
        detail: String,
    },

    #[error("unexpected output: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    PartialLifecycleFailure(Box<PartialFailure>),

    #[error("distribution '{0}' is not installed")]
    NotFound(String),

    #[error("'{0}' is not in the online catalog")]
    NotInCatalog(String),

    #[error("a distribution named '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid distribution name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{action} of '{name}' finished but the listing does not reflect it")]
    NotConfirmed { action: ActionKind, name: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl WslError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The partial-failure report, when this error came from a multi-step action
    pub fn partial_failure(&self) -> Option<&PartialFailure> {
        match self {
            Self::PartialLifecycleFailure(report) => Some(report),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

/// A multi-step action that stopped part way through.
///
/// Nothing is rolled back. The report says which steps ran so the user can
/// reconcile by hand.
#[derive(Debug)]
pub struct PartialFailure {
    pub action: ActionKind,
    /// Name the sequence started from (the original, or the catalog name for installs)
    pub source_name: String,
    /// Name the sequence was producing
    pub destination_name: String,
    pub completed: Vec<LifecycleStep>,
    pub failed: LifecycleStep,
    pub cause: WslError,
}

impl PartialFailure {
    /// Whether the distribution registered under `source_name` still exists
    pub fn original_retained(&self) -> bool {
        let registered = self.action != ActionKind::Install
            || self.completed.contains(&LifecycleStep::Install);
        registered && !self.completed.contains(&LifecycleStep::Unregister)
    }

    /// Whether a copy under `destination_name` may have been registered
    pub fn destination_created(&self) -> bool {
        self.completed.contains(&LifecycleStep::Import)
    }

    /// Plain-language state of the machine after the failure
    pub fn reconciliation(&self) -> String {
        let source = &self.source_name;
        let destination = &self.destination_name;
        match (self.original_retained(), self.destination_created()) {
            (true, true) => format!(
                "Both '{source}' and '{destination}' are registered; unregister '{source}' manually once '{destination}' is verified."
            ),
            (true, false) => format!(
                "'{source}' has not been deleted; '{destination}' was not created."
            ),
            (false, true) => format!("'{destination}' is registered; '{source}' is gone."),
            (false, false) => format!("Nothing was installed for '{source}'."),
        }
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of '{}' to '{}' stopped at the {} step",
            self.action, self.source_name, self.destination_name, self.failed
        )?;
        if !self.completed.is_empty() {
            let done: Vec<String> = self.completed.iter().map(ToString::to_string).collect();
            write!(f, " (completed: {})", done.join(", "))?;
        }
        write!(f, ": {}. {}", self.cause, self.reconciliation())
    }
}

impl std::error::Error for PartialFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
