//! Config synthesis: base template plus an ordered series of rewrites and
//! scope-confined injections

use crate::collab::{TemplateOptions, TemplateProvider};
use crate::config::{Catalogs, PathsSection};
use crate::patcher::{is_secure_listen, Anchor, Document, LineEdit, Occurrence, PatchOutcome};
use crate::wizard::WizardState;
use crate::{Backend, ModuleScope, ProxyType, Result, WafProfile};
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Forwarding headers the base templates set, normalized to lowercase
const DEFAULT_FORWARD_HEADERS: &[&str] = &[
    "proxy_set_header x-real-ip $remote_addr;",
    "proxy_set_header x-forwarded-for $proxy_add_x_forwarded_for;",
    "proxy_set_header x-forwarded-proto $scheme;",
];

fn server_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*server_name\s+)[^;]*;").expect("static regex"))
}

fn proxy_pass_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(\s*proxy_pass\s+)[a-z][a-z0-9+.-]*://[^/;\s]+").expect("static regex")
    })
}

fn proxy_pass_stream_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(\s*proxy_pass\s+)[^\s;:/]+:\d+;").expect("static regex")
    })
}

fn listen_port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*listen\s+(?:\S+:)?)\d+").expect("static regex"))
}

fn ssl_certificate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*ssl_certificate\s+)[^;]*;").expect("static regex"))
}

fn ssl_certificate_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(\s*ssl_certificate_key\s+)[^;]*;").expect("static regex")
    })
}

/// Replace every server name directive's arguments with `domains`
pub fn replace_server_name(text: &str, domains: &[String]) -> String {
    let joined = domains.join(" ");
    server_name_re()
        .replace_all(text, |caps: &Captures| format!("{}{};", &caps[1], joined))
        .into_owned()
}

/// Point every URL-style forwarding directive at `backend`, keeping any path
pub fn rewrite_backend(text: &str, backend: &Backend) -> String {
    let url = backend.url();
    proxy_pass_url_re()
        .replace_all(text, |caps: &Captures| format!("{}{}", &caps[1], url))
        .into_owned()
}

/// Rewrite stream listeners and `host:port` forwarding targets
pub fn rewrite_stream(text: &str, host: &str, listen_port: u16, target_port: u16) -> String {
    let text = listen_port_re()
        .replace_all(text, |caps: &Captures| format!("{}{}", &caps[1], listen_port));
    proxy_pass_stream_re()
        .replace_all(&text, |caps: &Captures| {
            format!("{}{}:{};", &caps[1], host, target_port)
        })
        .into_owned()
}

/// Point the certificate and key directives at a certificate pair
pub fn rewrite_certificate(text: &str, cert_path: &str, key_path: &str) -> String {
    let text = ssl_certificate_re()
        .replace_all(text, |caps: &Captures| format!("{}{};", &caps[1], cert_path));
    ssl_certificate_key_re()
        .replace_all(&text, |caps: &Captures| format!("{}{};", &caps[1], key_path))
        .into_owned()
}

/// Metadata comment followed by the three rule includes, in load order
pub fn waf_block(profile: &WafProfile, waf_dir: &str) -> Vec<String> {
    let dir = waf_dir.trim_end_matches('/');
    vec![
        format!(
            "# WAF profile: {} (paranoia level {}, rule engine {})",
            profile.name,
            profile.paranoia_level,
            profile.rule_engine.as_str()
        ),
        format!("include {}/modsecurity.conf;", dir),
        format!("include {}/crs-setup.conf;", dir),
        format!("include {}/profiles/{}.conf;", dir, profile.id),
    ]
}

fn normalize_directive(line: &str) -> String {
    line.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lines inside the encrypted block, braces excluded
fn secure_lines(doc: &Document) -> &[String] {
    match doc.secure_block() {
        Some(span) => doc.lines().get(span.open + 1..span.close).unwrap_or(&[]),
        None => &[],
    }
}

/// Builds the final document for a committed wizard state
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    catalogs: &'a Catalogs,
    paths: &'a PathsSection,
}

impl<'a> Synthesizer<'a> {
    pub fn new(catalogs: &'a Catalogs, paths: &'a PathsSection) -> Self {
        Self { catalogs, paths }
    }

    /// Run the full pipeline. The only failure is the template provider's.
    pub fn synthesize(&self, state: &WizardState, provider: &dyn TemplateProvider) -> Result<String> {
        let settings = &state.settings;
        let tls = settings.tls_enabled && settings.proxy_type.supports_tls();

        let template = provider.generate(
            settings.proxy_type,
            &settings.name,
            TemplateOptions { tls_enabled: tls },
        )?;
        let mut text = template.config;

        if !settings.domains.is_empty() {
            text = replace_server_name(&text, &settings.domains);
        }

        match settings.proxy_type {
            ProxyType::ReverseProxy => text = rewrite_backend(&text, &settings.backend),
            ProxyType::Stream => {
                if let (Some(listen), Some(target)) = (settings.listen_port, settings.target_port) {
                    text = rewrite_stream(&text, &settings.backend.host, listen, target);
                }
            }
            ProxyType::StaticSite => {}
        }

        for module in state.modules.with_scope(ModuleScope::Redirect) {
            debug!("redirect-scope module '{}' is not injected", module.id);
        }

        if !tls {
            if !state.modules.is_empty() || state.advanced.waf_profile_id.is_some() {
                debug!("TLS disabled: skipping encrypted-block injections");
            }
            return Ok(text);
        }

        if let Some(cert_id) = &settings.certificate_id {
            match self.catalogs.certificate(cert_id) {
                Some(cert) => text = rewrite_certificate(&text, &cert.cert_path, &cert.key_path),
                None => warn!("certificate '{}' not in catalog; paths left as templated", cert_id),
            }
        }

        let mut doc = Document::parse(&text);
        let waf_tail = self.inject_waf(&mut doc, state);
        self.add_extra_listeners(&mut doc, state);
        let location_tail = self.inject_modules(&mut doc, state, waf_tail);
        self.strip_forward_headers(&mut doc, state);
        self.inject_custom(&mut doc, state, location_tail);

        Ok(doc.render())
    }

    /// Returns the block's last line when it landed right after the server name
    fn inject_waf(&self, doc: &mut Document, state: &WizardState) -> Option<String> {
        let waf_id = state.advanced.waf_profile_id.as_deref()?;
        let Some(profile) = self.catalogs.waf_profile(waf_id) else {
            warn!("WAF profile '{}' not in catalog; skipping", waf_id);
            return None;
        };

        let block = waf_block(profile, &self.paths.waf_dir);
        let outcome = doc.inject(
            &[Anchor::directive("ssl_ciphers"), Anchor::directive("server_name")],
            Occurrence::Last,
            &block,
        );
        match outcome {
            PatchOutcome::Applied { anchor: 1, .. } => block.last().cloned(),
            PatchOutcome::Applied { .. } => None,
            PatchOutcome::Skipped(reason) => {
                warn!("WAF block not injected: {:?}", reason);
                None
            }
        }
    }

    fn add_extra_listeners(&self, doc: &mut Document, state: &WizardState) {
        let qualifiers: BTreeSet<&str> = state
            .modules
            .iter()
            .filter_map(|m| m.extra_listener.as_deref())
            .collect();
        if qualifiers.is_empty() {
            return;
        }

        let existing: BTreeSet<String> = secure_lines(doc)
            .iter()
            .map(|l| normalize_directive(l))
            .collect();

        let added = doc.edit_secure_block(|line| {
            if line.depth != 1 || !is_secure_listen(line.text) {
                return LineEdit::Keep;
            }
            let Some(address) = line.text.split_whitespace().nth(1) else {
                return LineEdit::Keep;
            };
            let extra: Vec<String> = qualifiers
                .iter()
                .map(|q| format!("listen {} {};", address, q))
                .filter(|l| !existing.contains(&normalize_directive(l)))
                .collect();
            if extra.is_empty() {
                LineEdit::Keep
            } else {
                LineEdit::InsertAfter(extra)
            }
        });
        debug!("extra listeners added: {:?}", added);
    }

    /// Returns the last location include when any were injected
    fn inject_modules(
        &self,
        doc: &mut Document,
        state: &WizardState,
        waf_tail: Option<String>,
    ) -> Option<String> {
        let snippets_dir = &self.paths.snippets_dir;
        let present: BTreeSet<String> = secure_lines(doc)
            .iter()
            .map(|l| l.trim().to_string())
            .collect();
        let includes = |scope: ModuleScope| -> Vec<String> {
            state
                .modules
                .with_scope(scope)
                .map(|m| format!("include {};", m.include_path(snippets_dir)))
                .filter(|l| !present.contains(l))
                .collect()
        };

        let server = includes(ModuleScope::Server);
        if !server.is_empty() {
            let mut anchors = Vec::new();
            if let Some(tail) = waf_tail {
                anchors.push(Anchor::line(tail));
            }
            anchors.push(Anchor::directive("server_name"));
            let outcome = doc.inject(&anchors, Occurrence::First, &server);
            if !outcome.is_applied() {
                warn!("server-scope modules not injected: {:?}", outcome);
            }
        }

        let location = includes(ModuleScope::Location);
        if location.is_empty() {
            return None;
        }
        match doc.inject(&[Anchor::RootLocation], Occurrence::First, &location) {
            PatchOutcome::Applied { .. } => location.last().cloned(),
            PatchOutcome::Skipped(reason) => {
                warn!("location-scope modules not injected: {:?}", reason);
                None
            }
        }
    }

    fn strip_forward_headers(&self, doc: &mut Document, state: &WizardState) {
        if !state.modules.iter().any(|m| m.trusts_client_ip) {
            return;
        }
        let removed = doc.edit_secure_block(|line| {
            if line.in_location
                && DEFAULT_FORWARD_HEADERS.contains(&normalize_directive(line.text).as_str())
            {
                LineEdit::Remove
            } else {
                LineEdit::Keep
            }
        });
        debug!("default forwarding headers removed: {:?}", removed);
    }

    fn inject_custom(&self, doc: &mut Document, state: &WizardState, location_tail: Option<String>) {
        let lines: Vec<String> = state
            .advanced
            .custom_directives
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            return;
        }

        let mut anchors = Vec::new();
        if let Some(tail) = location_tail {
            anchors.push(Anchor::line(tail));
        }
        anchors.push(Anchor::RootLocation);

        let outcome = doc.inject(&anchors, Occurrence::First, &lines);
        if !outcome.is_applied() {
            warn!("custom directives not injected: {:?}", outcome);
        }
    }
}
