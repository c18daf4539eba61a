//! Error types for the vhost-wizard-core crate

use crate::wizard::{FieldError, WizardStep};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Step {step} is incomplete: {}", format_fields(.fields))]
    InvalidStep {
        step: WizardStep,
        fields: Vec<FieldError>,
    },

    #[error("Command execution failed: {cmd} - {message}")]
    Command { cmd: String, message: String },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Syntax check rejected the configuration: {0}")]
    Syntax(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field.as_str(), f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Error::Template(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Error::Collaborator(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Error::Session(msg.into())
    }

    /// Field errors carried by an `InvalidStep`, empty for every other variant
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::InvalidStep { fields, .. } => fields,
            _ => &[],
        }
    }
}
