//! VHost Wizard Core Library
//!
//! This crate turns proxy-wizard choices into a virtual-host configuration
//! document and reads existing documents back into wizard fields.

pub mod block;
pub mod collab;
pub mod config;
pub mod error;
pub mod model;
pub mod nginx;
pub mod parser;
pub mod patcher;
pub mod recipe;
pub mod synth;
pub mod templates;
pub mod wizard;

pub use collab::{
    persist, GeneratedTemplate, ProxyStore, SaveRequest, SyntaxReport, SyntaxValidator,
    TemplateOptions, TemplateProvider,
};
pub use config::{Catalogs, ModuleCatalog, PathsSection, WizardConfig};
pub use error::{Error, Result};
pub use model::*;
pub use nginx::NginxSyntaxCheck;
pub use parser::ParsedDocument;
pub use recipe::{Recipe, RECIPES};
pub use synth::Synthesizer;
pub use templates::BuiltinTemplates;
pub use wizard::{
    AdvancedOptions, ApplyOutcome, ApplyRequest, Field, FieldError, ProxySettings, SettingsForm,
    StepInput, TlsForm, WizardMode, WizardSession, WizardState, WizardStep,
};
