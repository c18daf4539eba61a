//! Seams to the collaborators around the engine: template generation,
//! syntax checking and persistence

use crate::{Error, ProxyType, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Options passed to the template provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TemplateOptions {
    pub tls_enabled: bool,
}

/// Base document returned by the template provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTemplate {
    pub config: String,
}

/// Produces the base document synthesis starts from
pub trait TemplateProvider {
    fn generate(
        &self,
        proxy_type: ProxyType,
        name: &str,
        options: TemplateOptions,
    ) -> Result<GeneratedTemplate>;
}

/// Outcome of a syntax check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxReport {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl SyntaxReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Checks a document before it may be saved
pub trait SyntaxValidator {
    fn test(&self, config: &str, name: &str) -> Result<SyntaxReport>;
}

/// Payload for saving a proxy host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub proxy_id: Option<String>,
    pub name: String,
    pub proxy_type: ProxyType,
    pub config: String,
    pub enabled: bool,
    pub launch_url: Option<String>,
}

/// Stores proxy hosts and their WAF assignment
pub trait ProxyStore {
    /// Create or update a proxy host, returning its id
    fn save(&self, request: &SaveRequest) -> Result<String>;

    fn assign_waf(&self, proxy_id: &str, waf_profile_id: &str) -> Result<()>;
}

/// Syntax-check a document, then save it and attach its WAF profile.
///
/// A rejected check aborts before anything is saved.
pub fn persist(
    validator: &dyn SyntaxValidator,
    store: &dyn ProxyStore,
    request: &SaveRequest,
    waf_profile_id: Option<&str>,
) -> Result<String> {
    let report = validator.test(&request.config, &request.name)?;
    if !report.success {
        return Err(Error::Syntax(
            report
                .error
                .unwrap_or_else(|| "configuration test failed".to_string()),
        ));
    }

    let proxy_id = store.save(request)?;
    debug!("saved proxy host '{}' as {}", request.name, proxy_id);

    if let Some(waf_id) = waf_profile_id {
        store.assign_waf(&proxy_id, waf_id)?;
        info!("assigned WAF profile {} to {}", waf_id, proxy_id);
    }

    Ok(proxy_id)
}
