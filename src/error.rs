use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PxcError {
    #[error("failed to read settings from {path}")]
    SettingsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {path}: {message}")]
    #[diagnostic(help("fix or remove the file; pxc recreates it on the next write"))]
    SettingsParse { path: String, message: String },

    #[error("failed to write settings to {path}")]
    SettingsWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid setting key '{key}'. Valid keys: {valid}")]
    InvalidKey { key: String, valid: String },

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{message}")]
    Backend { message: String },

    #[error("{command} failed: {message}")]
    ExternalCommand { command: String, message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} needs an interactive terminal")]
    #[diagnostic(help("run it from a terminal, or pipe the key presses on stdin"))]
    NotInteractive { command: String },

    #[error("cancelled")]
    Cancelled,
}

impl PxcError {
    pub fn backend(message: impl Into<String>) -> Self {
        PxcError::Backend {
            message: message.into(),
        }
    }
}
