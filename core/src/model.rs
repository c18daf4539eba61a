//! Domain model types for the VHost Wizard

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of virtual host the wizard produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyType {
    #[default]
    ReverseProxy,
    StaticSite,
    Stream,
}

impl ProxyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::ReverseProxy => "reverse-proxy",
            ProxyType::StaticSite => "static-site",
            ProxyType::Stream => "stream",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProxyType::ReverseProxy => "Reverse Proxy",
            ProxyType::StaticSite => "Static Site",
            ProxyType::Stream => "TCP/UDP Stream",
        }
    }

    /// Types matched by virtual-host name, which need at least one domain
    pub fn is_host_bound(&self) -> bool {
        matches!(self, ProxyType::ReverseProxy | ProxyType::StaticSite)
    }

    pub fn supports_tls(&self) -> bool {
        matches!(self, ProxyType::ReverseProxy | ProxyType::StaticSite)
    }

    pub fn uses_backend(&self) -> bool {
        matches!(self, ProxyType::ReverseProxy)
    }

    pub fn uses_ports(&self) -> bool {
        matches!(self, ProxyType::Stream)
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme used to reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

/// Backend target a reverse proxy forwards to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Backend {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Render as the argument of a forwarding directive
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(Scheme::Http, "localhost", 8080)
    }
}

/// Where a module snippet belongs in the generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleScope {
    Server,
    Location,
    Redirect,
}

impl ModuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleScope::Server => "server",
            ModuleScope::Location => "location",
            ModuleScope::Redirect => "redirect",
        }
    }
}

/// A reusable configuration fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSnippet {
    pub id: String,
    pub name: String,
    pub scope: ModuleScope,
    /// Directive text the snippet file holds
    #[serde(default)]
    pub content: String,
    /// Qualifier for an additional listener next to each secure one (e.g. "quic reuseport")
    #[serde(default)]
    pub extra_listener: Option<String>,
    /// Module takes over the client address headers
    #[serde(default)]
    pub trusts_client_ip: bool,
}

impl ModuleSnippet {
    pub fn new(id: impl Into<String>, name: impl Into<String>, scope: ModuleScope) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope,
            content: String::new(),
            extra_listener: None,
            trusts_client_ip: false,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_extra_listener(mut self, qualifier: impl Into<String>) -> Self {
        self.extra_listener = Some(qualifier.into());
        self
    }

    pub fn trusting_client_ip(mut self) -> Self {
        self.trusts_client_ip = true;
        self
    }

    /// Path the include directive for this module points at
    pub fn include_path(&self, snippets_dir: &str) -> String {
        format!("{}/{}.conf", snippets_dir.trim_end_matches('/'), self.id)
    }
}

/// A TLS certificate known to the proxy host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub name: String,
    pub cert_path: String,
    pub key_path: String,
}

/// ModSecurity rule engine mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RuleEngine {
    #[default]
    On,
    DetectionOnly,
    Off,
}

impl RuleEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleEngine::On => "On",
            RuleEngine::DetectionOnly => "DetectionOnly",
            RuleEngine::Off => "Off",
        }
    }
}

/// A web application firewall profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WafProfile {
    pub id: String,
    pub name: String,
    pub paranoia_level: u8,
    #[serde(default)]
    pub rule_engine: RuleEngine,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Normalize a domain list typed as free text: split on whitespace and commas, drop blanks
pub fn split_domains(input: &str) -> Vec<String> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
