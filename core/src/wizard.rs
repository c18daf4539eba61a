//! Six-step proxy creation wizard: Recipe, Settings, TLS, Modules,
//! Advanced, Preview

use crate::collab::TemplateProvider;
use crate::config::{Catalogs, PathsSection};
use crate::parser::ParsedDocument;
use crate::synth::Synthesizer;
use crate::{recipe, split_domains, Backend, Error, ModuleScope, ModuleSnippet, ProxyType, Result, Scheme};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum WizardStep {
    #[default]
    Recipe,
    Settings,
    Tls,
    Modules,
    Advanced,
    Preview,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Recipe,
        WizardStep::Settings,
        WizardStep::Tls,
        WizardStep::Modules,
        WizardStep::Advanced,
        WizardStep::Preview,
    ];

    /// Position in the flow, 1 through 6
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::Recipe => 1,
            WizardStep::Settings => 2,
            WizardStep::Tls => 3,
            WizardStep::Modules => 4,
            WizardStep::Advanced => 5,
            WizardStep::Preview => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == n)
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Recipe => "Recipe",
            WizardStep::Settings => "Settings",
            WizardStep::Tls => "TLS",
            WizardStep::Modules => "Modules",
            WizardStep::Advanced => "Advanced",
            WizardStep::Preview => "Preview",
        }
    }

    fn following(&self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    fn preceding(&self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.title())
    }
}

/// Form field a validation error points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Recipe,
    Name,
    Domains,
    BackendHost,
    BackendPort,
    ListenPort,
    TargetPort,
    Certificate,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Recipe => "recipe",
            Field::Name => "name",
            Field::Domains => "domains",
            Field::BackendHost => "backend_host",
            Field::BackendPort => "backend_port",
            Field::ListenPort => "listen_port",
            Field::TargetPort => "target_port",
            Field::Certificate => "certificate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Committed settings of the virtual host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProxySettings {
    pub name: String,
    pub proxy_type: ProxyType,
    pub domains: Vec<String>,
    pub tls_enabled: bool,
    /// Only ever set while `tls_enabled` is true
    pub certificate_id: Option<String>,
    pub backend: Backend,
    pub listen_port: Option<u16>,
    pub target_port: Option<u16>,
}

/// Selected modules, unique by id, in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SelectedModules(Vec<ModuleSnippet>);

impl SelectedModules {
    /// Add a module; returns false if one with the same id is already selected
    pub fn insert(&mut self, module: ModuleSnippet) -> bool {
        if self.contains(&module.id) {
            return false;
        }
        self.0.push(module);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<ModuleSnippet> {
        let pos = self.0.iter().position(|m| m.id == id)?;
        Some(self.0.remove(pos))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|m| m.id == id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleSnippet> {
        self.0.iter()
    }

    pub fn with_scope(&self, scope: ModuleScope) -> impl Iterator<Item = &ModuleSnippet> {
        self.0.iter().filter(move |m| m.scope == scope)
    }

    pub fn ids(&self) -> Vec<String> {
        self.0.iter().map(|m| m.id.clone()).collect()
    }
}

/// Optional extras collected on the Advanced step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdvancedOptions {
    #[serde(default)]
    pub waf_profile_id: Option<String>,
    #[serde(default)]
    pub launch_url: Option<String>,
    #[serde(default)]
    pub custom_directives: String,
}

/// Everything one wizard session has committed so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WizardState {
    #[serde(skip)]
    pub step: WizardStep,
    pub recipe_id: Option<String>,
    pub settings: ProxySettings,
    pub modules: SelectedModules,
    pub advanced: AdvancedOptions,
}

/// Raw Settings step input, ports still as typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SettingsForm {
    pub name: String,
    pub proxy_type: Option<ProxyType>,
    /// Free text; split on whitespace and commas
    pub domains: String,
    pub scheme: Option<Scheme>,
    pub host: String,
    pub port: String,
    pub listen_port: String,
    pub target_port: String,
}

impl SettingsForm {
    /// Prefill from committed settings, e.g. after going back
    pub fn from_settings(settings: &ProxySettings) -> Self {
        Self {
            name: settings.name.clone(),
            proxy_type: Some(settings.proxy_type),
            domains: settings.domains.join(" "),
            scheme: Some(settings.backend.scheme),
            host: settings.backend.host.clone(),
            port: settings.backend.port.to_string(),
            listen_port: settings.listen_port.map(|p| p.to_string()).unwrap_or_default(),
            target_port: settings.target_port.map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsForm {
    pub enabled: bool,
    pub certificate_id: Option<String>,
}

/// Input for the step being left by `next`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Recipe(Option<String>),
    Settings(SettingsForm),
    Tls(TlsForm),
    Modules(Vec<String>),
    Advanced(AdvancedOptions),
}

impl StepInput {
    fn step(&self) -> WizardStep {
        match self {
            StepInput::Recipe(_) => WizardStep::Recipe,
            StepInput::Settings(_) => WizardStep::Settings,
            StepInput::Tls(_) => WizardStep::Tls,
            StepInput::Modules(_) => WizardStep::Modules,
            StepInput::Advanced(_) => WizardStep::Advanced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardMode {
    #[default]
    Create,
    Edit,
}

/// What the caller receives when the preview is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyRequest {
    pub config: String,
    pub name: String,
    pub proxy_type: ProxyType,
    pub launch_url: Option<String>,
    pub waf_profile_id: Option<String>,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Applied(ApplyRequest),
    /// Caller already holds content; call again with confirmation
    NeedsConfirmation(Box<WizardSession>),
    /// No preview has been rendered yet
    NotReady(Box<WizardSession>),
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

/// One wizard run. Owns its state exclusively; dropped on cancel or apply.
#[derive(Debug)]
pub struct WizardSession {
    id: Uuid,
    mode: WizardMode,
    state: WizardState,
    catalogs: Catalogs,
    paths: PathsSection,
    preview: Option<String>,
}

impl WizardSession {
    pub fn new(mode: WizardMode, catalogs: Catalogs, paths: PathsSection) -> Self {
        let id = Uuid::new_v4();
        debug!("wizard session {} started ({:?})", id, mode);
        Self {
            id,
            mode,
            state: WizardState::default(),
            catalogs,
            paths,
            preview: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Validate and commit the current step's input, then advance.
    ///
    /// On any error the committed state and step are left as they were.
    /// Leaving Advanced renders the preview through `provider`.
    pub fn next(&mut self, input: StepInput, provider: &dyn TemplateProvider) -> Result<WizardStep> {
        let step = self.state.step;
        if input.step() != step {
            return Err(Error::session(format!(
                "input for step {} given while on step {}",
                input.step(),
                step
            )));
        }

        let mut staged = self.state.clone();
        let errors = match input {
            StepInput::Recipe(id) => self.commit_recipe(&mut staged, id)?,
            StepInput::Settings(form) => Self::commit_settings(&mut staged, &form),
            StepInput::Tls(form) => self.commit_tls(&mut staged, form),
            StepInput::Modules(ids) => {
                self.commit_modules(&mut staged, &ids);
                Vec::new()
            }
            StepInput::Advanced(options) => {
                staged.advanced = options;
                Vec::new()
            }
        };

        if !errors.is_empty() {
            debug!("step {} rejected: {} field error(s)", step, errors.len());
            return Err(Error::InvalidStep {
                step,
                fields: errors,
            });
        }

        let Some(next) = step.following() else {
            return Err(Error::session("already on the last step"));
        };

        if next == WizardStep::Preview {
            let synthesizer = Synthesizer::new(&self.catalogs, &self.paths);
            let config = synthesizer.synthesize(&staged, provider)?;
            self.preview = Some(config);
        }

        staged.step = next;
        self.state = staged;
        debug!("session {} moved to step {}", self.id, next);
        Ok(next)
    }

    /// Step back without validating; committed data is kept
    pub fn back(&mut self) -> Result<WizardStep> {
        let prev = self
            .state
            .step
            .preceding()
            .ok_or_else(|| Error::session("cannot go back from the first step"))?;
        if self.state.step == WizardStep::Preview {
            self.preview = None;
        }
        self.state.step = prev;
        Ok(prev)
    }

    fn commit_recipe(
        &self,
        staged: &mut WizardState,
        recipe_id: Option<String>,
    ) -> Result<Vec<FieldError>> {
        let Some(id) = recipe_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(vec![FieldError::new(Field::Recipe, "Please select a recipe")]);
        };
        if recipe::find(&id).is_none() {
            return Ok(vec![FieldError::new(Field::Recipe, format!("Unknown recipe '{}'", id))]);
        }
        // Re-selecting the committed recipe keeps later edits
        if staged.recipe_id.as_deref() != Some(id.as_str()) {
            recipe::apply(staged, &id, &self.catalogs.modules)?;
        }
        Ok(Vec::new())
    }

    fn commit_settings(staged: &mut WizardState, form: &SettingsForm) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let settings = &mut staged.settings;
        let proxy_type = form.proxy_type.unwrap_or(settings.proxy_type);

        let name = form.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new(Field::Name, "Name cannot be empty"));
        }

        let domains = split_domains(&form.domains);
        if proxy_type.is_host_bound() && domains.is_empty() {
            errors.push(FieldError::new(Field::Domains, "At least one domain is required"));
        }

        let mut backend = settings.backend.clone();
        let host = form.host.trim();
        if proxy_type.uses_ports() && !host.is_empty() {
            // Stream targets fall back to the committed host when left blank
            backend.host = host.to_string();
        }
        if proxy_type.uses_backend() {
            if host.is_empty() {
                errors.push(FieldError::new(Field::BackendHost, "Backend host cannot be empty"));
            }
            backend.host = host.to_string();
            if let Some(scheme) = form.scheme {
                backend.scheme = scheme;
            }
            match parse_port(&form.port) {
                Some(port) => backend.port = port,
                None => errors.push(FieldError::new(
                    Field::BackendPort,
                    "Port must be between 1 and 65535",
                )),
            }
        }

        let (mut listen_port, mut target_port) = (settings.listen_port, settings.target_port);
        if proxy_type.uses_ports() {
            listen_port = parse_port(&form.listen_port);
            if listen_port.is_none() {
                errors.push(FieldError::new(
                    Field::ListenPort,
                    "Listen port must be between 1 and 65535",
                ));
            }
            target_port = parse_port(&form.target_port);
            if target_port.is_none() {
                errors.push(FieldError::new(
                    Field::TargetPort,
                    "Target port must be between 1 and 65535",
                ));
            }
        }

        if errors.is_empty() {
            settings.name = name.to_string();
            settings.proxy_type = proxy_type;
            settings.domains = domains;
            settings.backend = backend;
            settings.listen_port = listen_port;
            settings.target_port = target_port;
            if !proxy_type.supports_tls() {
                settings.tls_enabled = false;
                settings.certificate_id = None;
            }
        }
        errors
    }

    fn commit_tls(&self, staged: &mut WizardState, form: TlsForm) -> Vec<FieldError> {
        let settings = &mut staged.settings;
        let enabled = form.enabled && settings.proxy_type.supports_tls();

        if !enabled {
            settings.tls_enabled = false;
            settings.certificate_id = None;
            return Vec::new();
        }

        match form.certificate_id.filter(|id| !id.is_empty()) {
            None => vec![FieldError::new(Field::Certificate, "Please select a certificate")],
            Some(id) if self.catalogs.certificate(&id).is_none() => vec![FieldError::new(
                Field::Certificate,
                format!("Unknown certificate '{}'", id),
            )],
            Some(id) => {
                settings.tls_enabled = true;
                settings.certificate_id = Some(id);
                Vec::new()
            }
        }
    }

    fn commit_modules(&self, staged: &mut WizardState, ids: &[String]) {
        staged.modules.clear();
        for id in ids {
            match self.catalogs.modules.get(id) {
                Some(module) => {
                    staged.modules.insert(module.clone());
                }
                None => warn!("ignoring unknown module '{}'", id),
            }
        }
    }

    /// Pull fields out of an existing document into the committed settings.
    /// Only recognised fields change; the name is kept when editing.
    pub fn load_document(&mut self, text: &str) {
        let parsed = ParsedDocument::parse(text);
        parsed.apply_to(&mut self.state.settings, self.mode);
        if !self.state.settings.tls_enabled {
            self.state.settings.certificate_id = None;
        }
    }

    /// Hand the preview to the caller and end the session.
    ///
    /// If the caller already holds non-blank content and `confirmed` is
    /// false, the session comes back untouched for confirmation.
    pub fn apply(self, existing: Option<&str>, confirmed: bool) -> ApplyOutcome {
        let Some(config) = self.preview.clone() else {
            return ApplyOutcome::NotReady(Box::new(self));
        };
        if self.state.step != WizardStep::Preview {
            return ApplyOutcome::NotReady(Box::new(self));
        }

        let has_prior = existing.map(|e| !e.trim().is_empty()).unwrap_or(false);
        if has_prior && !confirmed {
            return ApplyOutcome::NeedsConfirmation(Box::new(self));
        }

        info!("session {} applied '{}'", self.id, self.state.settings.name);
        ApplyOutcome::Applied(ApplyRequest {
            config,
            name: self.state.settings.name,
            proxy_type: self.state.settings.proxy_type,
            launch_url: self.state.advanced.launch_url,
            waf_profile_id: self.state.advanced.waf_profile_id,
        })
    }

    /// Discard the session and everything it collected
    pub fn cancel(self) {
        debug!("session {} cancelled on step {}", self.id, self.state.step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{GeneratedTemplate, TemplateOptions};
    use crate::config::WizardConfig;
    use crate::{Certificate, WafProfile};

    struct StaticTemplate(&'static str);

    impl TemplateProvider for StaticTemplate {
        fn generate(&self, _: ProxyType, _: &str, _: TemplateOptions) -> Result<GeneratedTemplate> {
            Ok(GeneratedTemplate {
                config: self.0.to_string(),
            })
        }
    }

    struct Unreachable;

    impl TemplateProvider for Unreachable {
        fn generate(&self, _: ProxyType, _: &str, _: TemplateOptions) -> Result<GeneratedTemplate> {
            Err(Error::collaborator("template service unreachable"))
        }
    }

    const PLAIN: &str = "server {\n    listen 80;\n    server_name _;\n    location / {\n        proxy_pass http://127.0.0.1:1;\n    }\n}\n";

    fn catalogs() -> Catalogs {
        let mut catalogs = Catalogs::builtin();
        catalogs.certificates.push(Certificate {
            id: "c1".to_string(),
            name: "Example".to_string(),
            cert_path: "/etc/ssl/example.crt".to_string(),
            key_path: "/etc/ssl/example.key".to_string(),
        });
        catalogs.waf_profiles.push(WafProfile {
            id: "w1".to_string(),
            name: "Default".to_string(),
            paranoia_level: 1,
            rule_engine: crate::RuleEngine::On,
            enabled: true,
        });
        catalogs
    }

    fn session() -> WizardSession {
        WizardSession::new(WizardMode::Create, catalogs(), WizardConfig::default().paths)
    }

    fn settings_form() -> SettingsForm {
        SettingsForm {
            name: "svc".to_string(),
            proxy_type: Some(ProxyType::ReverseProxy),
            domains: "svc.example.com".to_string(),
            scheme: Some(Scheme::Http),
            host: "localhost".to_string(),
            port: "8080".to_string(),
            ..Default::default()
        }
    }

    fn run_to_preview(session: &mut WizardSession) {
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("basic-http".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();
        session.next(StepInput::Tls(TlsForm::default()), &provider).unwrap();
        session.next(StepInput::Modules(Vec::new()), &provider).unwrap();
        session
            .next(StepInput::Advanced(AdvancedOptions::default()), &provider)
            .unwrap();
    }

    #[test]
    fn test_step_numbers() {
        for (i, step) in WizardStep::ALL.iter().enumerate() {
            assert_eq!(step.number() as usize, i + 1);
            assert_eq!(WizardStep::from_number(step.number()), Some(*step));
        }
        assert!(WizardStep::from_number(0).is_none());
        assert!(WizardStep::from_number(7).is_none());
    }

    #[test]
    fn test_recipe_required() {
        let mut session = session();
        let err = session
            .next(StepInput::Recipe(None), &StaticTemplate(PLAIN))
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, Field::Recipe);
        assert_eq!(session.step(), WizardStep::Recipe);
    }

    #[test]
    fn test_wrong_input_for_step() {
        let mut session = session();
        let err = session
            .next(StepInput::Settings(settings_form()), &StaticTemplate(PLAIN))
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[test]
    fn test_settings_errors_per_field() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("basic-http".to_string())), &provider)
            .unwrap();

        let form = SettingsForm {
            proxy_type: Some(ProxyType::ReverseProxy),
            port: "70000".to_string(),
            ..Default::default()
        };
        let before = session.state().clone();
        let err = session.next(StepInput::Settings(form), &provider).unwrap_err();
        let fields: Vec<Field> = err.field_errors().iter().map(|f| f.field).collect();
        assert_eq!(
            fields,
            vec![Field::Name, Field::Domains, Field::BackendHost, Field::BackendPort]
        );
        assert_eq!(session.state(), &before);
        assert_eq!(session.step(), WizardStep::Settings);
    }

    #[test]
    fn test_stream_settings_need_ports_not_domains() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("tcp-stream".to_string())), &provider)
            .unwrap();

        let form = SettingsForm {
            name: "db".to_string(),
            proxy_type: Some(ProxyType::Stream),
            host: "10.0.0.5".to_string(),
            listen_port: "0".to_string(),
            target_port: "5432".to_string(),
            ..Default::default()
        };
        let err = session.next(StepInput::Settings(form.clone()), &provider).unwrap_err();
        let fields: Vec<Field> = err.field_errors().iter().map(|f| f.field).collect();
        assert_eq!(fields, vec![Field::ListenPort]);

        let form = SettingsForm {
            listen_port: "15432".to_string(),
            ..form
        };
        session.next(StepInput::Settings(form), &provider).unwrap();
        assert_eq!(session.state().settings.listen_port, Some(15432));
        assert_eq!(session.state().settings.target_port, Some(5432));
        assert_eq!(session.state().settings.backend.host, "10.0.0.5");
    }

    #[test]
    fn test_stream_settings_do_not_need_host() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("tcp-stream".to_string())), &provider)
            .unwrap();

        let form = SettingsForm {
            name: "db".to_string(),
            proxy_type: Some(ProxyType::Stream),
            host: "  ".to_string(),
            listen_port: "15432".to_string(),
            target_port: "5432".to_string(),
            ..Default::default()
        };
        session.next(StepInput::Settings(form), &provider).unwrap();
        // the recipe's host is kept
        assert_eq!(session.state().settings.backend.host, "localhost");
        assert_eq!(session.state().settings.listen_port, Some(15432));
    }

    #[test]
    fn test_tls_requires_known_certificate() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("secure-api".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();

        let err = session
            .next(
                StepInput::Tls(TlsForm {
                    enabled: true,
                    certificate_id: None,
                }),
                &provider,
            )
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, Field::Certificate);

        let err = session
            .next(
                StepInput::Tls(TlsForm {
                    enabled: true,
                    certificate_id: Some("missing".to_string()),
                }),
                &provider,
            )
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, Field::Certificate);

        session
            .next(
                StepInput::Tls(TlsForm {
                    enabled: true,
                    certificate_id: Some("c1".to_string()),
                }),
                &provider,
            )
            .unwrap();
        assert_eq!(session.state().settings.certificate_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_tls_disabled_drops_certificate() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("basic-http".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();
        session
            .next(
                StepInput::Tls(TlsForm {
                    enabled: false,
                    certificate_id: Some("c1".to_string()),
                }),
                &provider,
            )
            .unwrap();
        assert!(!session.state().settings.tls_enabled);
        assert!(session.state().settings.certificate_id.is_none());
    }

    #[test]
    fn test_modules_deduplicated_and_unknown_dropped() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("basic-http".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();
        session.next(StepInput::Tls(TlsForm::default()), &provider).unwrap();
        session
            .next(
                StepInput::Modules(vec![
                    "hsts".to_string(),
                    "nope".to_string(),
                    "hsts".to_string(),
                ]),
                &provider,
            )
            .unwrap();
        assert_eq!(session.state().modules.ids(), vec!["hsts"]);
    }

    #[test]
    fn test_full_run_and_apply() {
        let mut session = session();
        run_to_preview(&mut session);
        assert_eq!(session.step(), WizardStep::Preview);
        let preview = session.preview().unwrap();
        assert!(preview.contains("server_name svc.example.com;"));
        assert!(preview.contains("proxy_pass http://localhost:8080;"));

        match session.apply(None, false) {
            ApplyOutcome::Applied(request) => {
                assert_eq!(request.name, "svc");
                assert!(request.config.contains("svc.example.com"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_apply_asks_before_overwrite() {
        let mut session = session();
        run_to_preview(&mut session);

        let session = match session.apply(Some("server { listen 80; }"), false) {
            ApplyOutcome::NeedsConfirmation(session) => session,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(matches!(
            session.apply(Some("server { listen 80; }"), true),
            ApplyOutcome::Applied(_)
        ));
    }

    #[test]
    fn test_apply_blank_prior_needs_no_confirmation() {
        let mut session = session();
        run_to_preview(&mut session);
        assert!(matches!(
            session.apply(Some("  \n"), false),
            ApplyOutcome::Applied(_)
        ));
    }

    #[test]
    fn test_cancel_after_confirmation_prompt() {
        let mut session = session();
        run_to_preview(&mut session);
        match session.apply(Some("server { listen 80; }"), false) {
            ApplyOutcome::NeedsConfirmation(session) => {
                assert_eq!(session.step(), WizardStep::Preview);
                assert!(session.preview().is_some());
                session.cancel();
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_apply_before_preview() {
        let session = session();
        assert!(matches!(session.apply(None, true), ApplyOutcome::NotReady(_)));
    }

    #[test]
    fn test_back_keeps_data() {
        let mut session = session();
        run_to_preview(&mut session);
        assert_eq!(session.back().unwrap(), WizardStep::Advanced);
        assert!(session.preview().is_none());
        session.back().unwrap();
        session.back().unwrap();
        assert_eq!(session.back().unwrap(), WizardStep::Settings);
        assert_eq!(session.state().settings.name, "svc");
        assert_eq!(
            SettingsForm::from_settings(&session.state().settings).port,
            "8080"
        );
        session.back().unwrap();
        assert!(session.back().is_err());
        assert_eq!(session.step(), WizardStep::Recipe);
    }

    #[test]
    fn test_reselecting_recipe_keeps_modules() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("secure-api".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();
        session.back().unwrap();
        session.back().unwrap();
        let count = session.state().modules.len();
        session
            .next(StepInput::Recipe(Some("secure-api".to_string())), &provider)
            .unwrap();
        assert_eq!(session.state().modules.len(), count);
        assert_eq!(session.state().settings.name, "svc");
    }

    #[test]
    fn test_template_failure_keeps_state() {
        let mut session = session();
        let provider = StaticTemplate(PLAIN);
        session
            .next(StepInput::Recipe(Some("basic-http".to_string())), &provider)
            .unwrap();
        session.next(StepInput::Settings(settings_form()), &provider).unwrap();
        session.next(StepInput::Tls(TlsForm::default()), &provider).unwrap();
        session.next(StepInput::Modules(Vec::new()), &provider).unwrap();

        let before = session.state().clone();
        let err = session
            .next(
                StepInput::Advanced(AdvancedOptions {
                    launch_url: Some("https://svc.example.com".to_string()),
                    ..Default::default()
                }),
                &Unreachable,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator(_)));
        assert_eq!(session.state(), &before);
        assert_eq!(session.step(), WizardStep::Advanced);
        assert!(session.preview().is_none());
    }

    #[test]
    fn test_load_document_edit_mode_keeps_name() {
        let mut session =
            WizardSession::new(WizardMode::Edit, catalogs(), WizardConfig::default().paths);
        session.load_document("# other\nserver {\n    listen 80;\n    server_name a.com;\n}\n");
        assert_eq!(session.state().settings.name, "");
        assert_eq!(session.state().settings.domains, vec!["a.com"]);

        let mut session = self::session();
        session.load_document("# other\nserver {\n    listen 80;\n}\n");
        assert_eq!(session.state().settings.name, "other");
    }
}
