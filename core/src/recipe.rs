//! Recipe presets: a proxy type, default backend and a default module selection

use crate::config::ModuleCatalog;
use crate::wizard::WizardState;
use crate::{Backend, Error, ProxyType, Result, Scheme};
use log::debug;

/// A named preset, defined at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub id: &'static str,
    pub label: &'static str,
    pub proxy_type: ProxyType,
    pub tls_enabled: bool,
    pub scheme: Scheme,
    pub host: &'static str,
    pub port: u16,
    /// Display names of the modules this recipe selects
    pub module_names: &'static [&'static str],
}

impl Recipe {
    pub fn backend(&self) -> Backend {
        Backend::new(self.scheme, self.host, self.port)
    }
}

pub const RECIPES: &[Recipe] = &[
    Recipe {
        id: "basic-http",
        label: "Basic HTTP reverse proxy",
        proxy_type: ProxyType::ReverseProxy,
        tls_enabled: false,
        scheme: Scheme::Http,
        host: "localhost",
        port: 8080,
        module_names: &[],
    },
    Recipe {
        id: "secure-api",
        label: "HTTPS API with hardening",
        proxy_type: ProxyType::ReverseProxy,
        tls_enabled: true,
        scheme: Scheme::Http,
        host: "localhost",
        port: 3000,
        module_names: &[
            "HSTS",
            "Upgrade Insecure Requests",
            "Security Headers",
            "Rate Limiting",
            "Force HTTPS Redirect",
        ],
    },
    Recipe {
        id: "websocket-app",
        label: "Web app with WebSocket upgrade",
        proxy_type: ProxyType::ReverseProxy,
        tls_enabled: true,
        scheme: Scheme::Http,
        host: "localhost",
        port: 3000,
        module_names: &["HSTS", "WebSocket Support"],
    },
    Recipe {
        id: "modern-http3",
        label: "HTTPS with HTTP/3",
        proxy_type: ProxyType::ReverseProxy,
        tls_enabled: true,
        scheme: Scheme::Http,
        host: "localhost",
        port: 8080,
        module_names: &["HTTP/3 (QUIC)", "HSTS", "Gzip Compression"],
    },
    Recipe {
        id: "cdn-origin",
        label: "Origin behind a CDN",
        proxy_type: ProxyType::ReverseProxy,
        tls_enabled: true,
        scheme: Scheme::Http,
        host: "localhost",
        port: 8080,
        module_names: &["Trust Real Client IP", "Gzip Compression"],
    },
    Recipe {
        id: "static-site",
        label: "Static website",
        proxy_type: ProxyType::StaticSite,
        tls_enabled: true,
        scheme: Scheme::Http,
        host: "localhost",
        port: 80,
        module_names: &["Gzip Compression", "Security Headers"],
    },
    Recipe {
        id: "tcp-stream",
        label: "TCP/UDP passthrough",
        proxy_type: ProxyType::Stream,
        tls_enabled: false,
        scheme: Scheme::Http,
        host: "localhost",
        port: 5432,
        module_names: &[],
    },
];

/// Look up a recipe by id
pub fn find(id: &str) -> Option<&'static Recipe> {
    RECIPES.iter().find(|r| r.id == id)
}

/// Settings a recipe contributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDefaults {
    pub proxy_type: ProxyType,
    pub tls_enabled: bool,
    pub backend: Backend,
    pub module_names: Vec<&'static str>,
}

pub fn defaults_for(id: &str) -> Option<RecipeDefaults> {
    find(id).map(|r| RecipeDefaults {
        proxy_type: r.proxy_type,
        tls_enabled: r.tls_enabled,
        backend: r.backend(),
        module_names: r.module_names.to_vec(),
    })
}

/// Overwrite type, TLS flag, backend and module selection from a recipe.
///
/// Module names with no catalog entry are dropped. Domains and advanced
/// options are left alone; a certificate is cleared only when the recipe
/// turns TLS off.
pub fn apply(state: &mut WizardState, recipe_id: &str, catalog: &ModuleCatalog) -> Result<()> {
    let recipe =
        find(recipe_id).ok_or_else(|| Error::NotFound(format!("Recipe '{}'", recipe_id)))?;

    state.settings.proxy_type = recipe.proxy_type;
    state.settings.tls_enabled = recipe.tls_enabled;
    if !recipe.tls_enabled {
        state.settings.certificate_id = None;
    }
    state.settings.backend = recipe.backend();

    state.modules.clear();
    for name in recipe.module_names {
        match catalog.find_by_name(name) {
            Some(module) => {
                state.modules.insert(module.clone());
            }
            None => debug!("recipe {}: no module named '{}'", recipe.id, name),
        }
    }

    state.recipe_id = Some(recipe.id.to_string());
    debug!(
        "applied recipe {} ({} modules selected)",
        recipe.id,
        state.modules.len()
    );
    Ok(())
}
