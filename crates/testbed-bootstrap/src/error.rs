//! Error types for the bootstrap planner

use std::path::{Path, PathBuf};

/// Bootstrap Result type
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Bootstrap errors
///
/// Every failure is fatal to the run. Command failures carry the rendered
/// command line so CI output shows exactly what to re-run by hand.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to parse plan {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid plan: {message}")]
    Validation { message: String },

    #[error("command `{command}` failed ({status}): {stderr}")]
    Exec {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("component {component}: {source}")]
    Component {
        component: String,
        #[source]
        source: Box<BootstrapError>,
    },

    #[error("{tool} not found. {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("post-bootstrap hook {hook} failed: {source}")]
    Hook {
        hook: String,
        #[source]
        source: Box<BootstrapError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        BootstrapError::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BootstrapError::Validation {
            message: message.into(),
        }
    }

    pub fn exec(
        command: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        BootstrapError::Exec {
            command: command.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    /// Attribute this error to a component of the plan.
    pub fn in_component(self, component: impl Into<String>) -> Self {
        BootstrapError::Component {
            component: component.into(),
            source: Box::new(self),
        }
    }

    /// Attribute this error to a post-bootstrap hook.
    pub fn in_hook(self, hook: impl Into<String>) -> Self {
        BootstrapError::Hook {
            hook: hook.into(),
            source: Box::new(self),
        }
    }

    /// The command line that failed, if this error came from an external command.
    pub fn failed_command(&self) -> Option<&str> {
        match self {
            BootstrapError::Exec { command, .. } | BootstrapError::Spawn { command, .. } => {
                Some(command)
            }
            BootstrapError::Component { source, .. } | BootstrapError::Hook { source, .. } => {
                source.failed_command()
            }
            _ => None,
        }
    }

    /// The component this error is attributed to, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            BootstrapError::Component { component, .. } => Some(component),
            _ => None,
        }
    }
}
