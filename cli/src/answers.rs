//! Answers file: the input of every wizard step, read from TOML.
//!
//! ```toml
//! recipe = "secure-api"
//! modules = ["hsts", "rate-limit"]
//!
//! [settings]
//! name = "Billing API"
//! domains = "api.example.com"
//! port = "3000"
//!
//! [tls]
//! enabled = true
//! certificate_id = "le-api"
//!
//! [advanced]
//! waf_profile_id = "strict"
//! ```
//!
//! Blank settings fields keep what the recipe chose. A missing `[tls]` table
//! or `modules` key keeps the recipe's choice too.

use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use vhost_wizard_core::{
    AdvancedOptions, Result, SettingsForm, StepInput, TemplateProvider, TlsForm, WizardSession,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Answers {
    pub recipe: String,
    pub settings: SettingsForm,
    pub tls: Option<TlsForm>,
    pub modules: Option<Vec<String>>,
    pub advanced: AdvancedOptions,
}

impl Answers {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Walk a fresh session through every step up to the preview
    pub fn drive(&self, session: &mut WizardSession, provider: &dyn TemplateProvider) -> Result<()> {
        session.next(StepInput::Recipe(Some(self.recipe.clone())), provider)?;

        let prefill = SettingsForm::from_settings(&session.state().settings);
        let form = overlay(prefill, &self.settings);
        session.next(StepInput::Settings(form), provider)?;

        let settings = &session.state().settings;
        let tls = self.tls.clone().unwrap_or_else(|| TlsForm {
            enabled: settings.tls_enabled,
            certificate_id: settings.certificate_id.clone(),
        });
        session.next(StepInput::Tls(tls), provider)?;

        let modules = self
            .modules
            .clone()
            .unwrap_or_else(|| session.state().modules.ids());
        session.next(StepInput::Modules(modules), provider)?;

        let step = session.next(StepInput::Advanced(self.advanced.clone()), provider)?;
        debug!("answers drove session {} to step {}", session.id(), step);
        Ok(())
    }
}

/// Non-blank fields of `given` replace those of `base`
fn overlay(base: SettingsForm, given: &SettingsForm) -> SettingsForm {
    let pick = |base: String, given: &str| {
        if given.trim().is_empty() {
            base
        } else {
            given.to_string()
        }
    };
    SettingsForm {
        name: pick(base.name, &given.name),
        proxy_type: given.proxy_type.or(base.proxy_type),
        domains: pick(base.domains, &given.domains),
        scheme: given.scheme.or(base.scheme),
        host: pick(base.host, &given.host),
        port: pick(base.port, &given.port),
        listen_port: pick(base.listen_port, &given.listen_port),
        target_port: pick(base.target_port, &given.target_port),
    }
}
