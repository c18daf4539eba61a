//! Configuration management for wizard settings and the read-only catalogs

use crate::{Certificate, Error, ModuleScope, ModuleSnippet, Result, WafProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current config version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Global configuration for the wizard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    pub version: u32,
    pub paths: PathsSection,
    /// Catalog file; the builtin catalog is used when unset
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Directory module snippets are installed to on the proxy host
    pub snippets_dir: String,
    /// Directory holding the ModSecurity main config, CRS setup and per-profile rules
    pub waf_dir: String,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            paths: PathsSection {
                snippets_dir: "/etc/nginx/snippets".to_string(),
                waf_dir: "/etc/nginx/modsec".to_string(),
            },
            catalog: None,
        }
    }
}

impl WizardConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vhost-wizard")
            .join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if absent
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.paths.snippets_dir.trim().is_empty() {
            return Err(Error::validation("Snippets directory cannot be empty"));
        }
        if self.paths.waf_dir.trim().is_empty() {
            return Err(Error::validation("WAF directory cannot be empty"));
        }
        Ok(())
    }

    /// Load the catalog this config points at, or the builtin one
    pub fn load_catalogs(&self) -> Result<Catalogs> {
        match &self.catalog {
            Some(path) => Catalogs::load(path),
            None => Ok(Catalogs::builtin()),
        }
    }
}

/// Module snippets available to a wizard session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ModuleCatalog {
    modules: Vec<ModuleSnippet>,
}

impl ModuleCatalog {
    pub fn new(modules: Vec<ModuleSnippet>) -> Self {
        Self { modules }
    }

    pub fn get(&self, id: &str) -> Option<&ModuleSnippet> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// First module carrying this display name
    pub fn find_by_name(&self, name: &str) -> Option<&ModuleSnippet> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn list(&self) -> &[ModuleSnippet] {
        &self.modules
    }

    /// Modules grouped by scope tag, catalog order kept within each group
    pub fn grouped(&self) -> BTreeMap<ModuleScope, Vec<&ModuleSnippet>> {
        let mut groups: BTreeMap<ModuleScope, Vec<&ModuleSnippet>> = BTreeMap::new();
        for module in &self.modules {
            groups.entry(module.scope).or_default().push(module);
        }
        groups
    }
}

/// Read-only catalogs fetched once per wizard session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Catalogs {
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub modules: ModuleCatalog,
    #[serde(default)]
    pub waf_profiles: Vec<WafProfile>,
}

impl Catalogs {
    /// Load catalogs from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalogs: Self = toml::from_str(&content)?;
        Ok(catalogs)
    }

    /// Save catalogs to a TOML file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn certificate(&self, id: &str) -> Option<&Certificate> {
        self.certificates.iter().find(|c| c.id == id)
    }

    pub fn waf_profile(&self, id: &str) -> Option<&WafProfile> {
        self.waf_profiles.iter().find(|w| w.id == id)
    }

    /// Catalog shipped with the binary; carries every module a recipe names
    pub fn builtin() -> Self {
        let modules = vec![
            ModuleSnippet::new("hsts", "HSTS", ModuleScope::Server).with_content(
                "add_header Strict-Transport-Security \"max-age=31536000; includeSubDomains\" always;",
            ),
            ModuleSnippet::new(
                "upgrade-insecure",
                "Upgrade Insecure Requests",
                ModuleScope::Server,
            )
            .with_content(
                "add_header Content-Security-Policy \"upgrade-insecure-requests\" always;",
            ),
            ModuleSnippet::new("security-headers", "Security Headers", ModuleScope::Server)
                .with_content(
                    "add_header X-Content-Type-Options nosniff always;\n\
                     add_header X-Frame-Options SAMEORIGIN always;\n\
                     add_header Referrer-Policy strict-origin-when-cross-origin always;",
                ),
            ModuleSnippet::new("http3", "HTTP/3 (QUIC)", ModuleScope::Server)
                .with_content("add_header Alt-Svc 'h3=\":443\"; ma=86400' always;")
                .with_extra_listener("quic reuseport"),
            ModuleSnippet::new("gzip", "Gzip Compression", ModuleScope::Server).with_content(
                "gzip on;\ngzip_vary on;\ngzip_types text/plain text/css application/json application/javascript;",
            ),
            ModuleSnippet::new("websocket", "WebSocket Support", ModuleScope::Location)
                .with_content(
                    "proxy_http_version 1.1;\n\
                     proxy_set_header Upgrade $http_upgrade;\n\
                     proxy_set_header Connection \"upgrade\";",
                ),
            ModuleSnippet::new("rate-limit", "Rate Limiting", ModuleScope::Location)
                .with_content("limit_req zone=default burst=20 nodelay;"),
            ModuleSnippet::new("trust-client-ip", "Trust Real Client IP", ModuleScope::Location)
                .with_content(
                    "proxy_set_header X-Real-IP $http_cf_connecting_ip;\n\
                     proxy_set_header X-Forwarded-For $http_cf_connecting_ip;\n\
                     proxy_set_header X-Forwarded-Proto https;",
                )
                .trusting_client_ip(),
            ModuleSnippet::new("force-https", "Force HTTPS Redirect", ModuleScope::Redirect)
                .with_content("return 301 https://$host$request_uri;"),
            ModuleSnippet::new("www-redirect", "WWW Redirect", ModuleScope::Redirect)
                .with_content("return 301 $scheme://www.$host$request_uri;"),
        ];

        Self {
            certificates: Vec::new(),
            modules: ModuleCatalog::new(modules),
            waf_profiles: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RECIPES;
    use tempfile::tempdir;

    #[test]
    fn test_wizard_config_default() {
        let config = WizardConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.paths.snippets_dir, "/etc/nginx/snippets");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wizard_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = WizardConfig::default();
        config.paths.waf_dir = "/opt/modsec".to_string();
        config.save_to(&path).unwrap();

        let loaded = WizardConfig::load(&path).unwrap();
        assert_eq!(loaded.paths.waf_dir, "/opt/modsec");
        assert!(loaded.catalog.is_none());
    }

    #[test]
    fn test_wizard_config_rejects_empty_dirs() {
        let mut config = WizardConfig::default();
        config.paths.snippets_dir = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalogs_load_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r#"
[[certificates]]
id = "c1"
name = "Example"
cert_path = "/etc/ssl/example.crt"
key_path = "/etc/ssl/example.key"

[[modules]]
id = "hsts"
name = "HSTS"
scope = "server"

[[modules]]
id = "ws"
name = "WebSocket Support"
scope = "location"

[[waf_profiles]]
id = "p1"
name = "Strict"
paranoia_level = 2
rule_engine = "DetectionOnly"
"#,
        )
        .unwrap();

        let catalogs = Catalogs::load(&path).unwrap();
        assert_eq!(catalogs.certificate("c1").unwrap().key_path, "/etc/ssl/example.key");
        assert_eq!(catalogs.modules.list().len(), 2);
        let waf = catalogs.waf_profile("p1").unwrap();
        assert!(waf.enabled);
        assert_eq!(waf.rule_engine, crate::RuleEngine::DetectionOnly);
    }

    #[test]
    fn test_module_catalog_grouping() {
        let catalog = Catalogs::builtin().modules;
        let groups = catalog.grouped();
        assert!(groups[&ModuleScope::Server].iter().any(|m| m.id == "hsts"));
        assert!(groups[&ModuleScope::Location].iter().any(|m| m.id == "websocket"));
        assert!(groups[&ModuleScope::Redirect].iter().any(|m| m.id == "force-https"));
    }

    #[test]
    fn test_builtin_catalog_covers_recipes() {
        let catalog = Catalogs::builtin().modules;
        for recipe in RECIPES {
            for name in recipe.module_names {
                assert!(
                    catalog.find_by_name(name).is_some(),
                    "recipe {} names unknown module {}",
                    recipe.id,
                    name
                );
            }
        }
    }
}
