//! Best-effort extraction of wizard fields from an existing document.
//!
//! Each rule stands alone. A rule that finds nothing leaves its field as it
//! was; nothing here returns an error.

use crate::block::{BlockTree, Node};
use crate::wizard::{ProxySettings, WizardMode};
use crate::{Backend, Scheme};
use serde::Serialize;

/// Fields recovered from a document; `None` means "not found"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParsedDocument {
    pub name: Option<String>,
    pub domains: Option<Vec<String>>,
    pub tls_enabled: Option<bool>,
    pub backend: Option<Backend>,
    /// Scheme-less `host:port` forwarding target of a stream host
    pub stream_target: Option<(String, u16)>,
    pub listen_port: Option<u16>,
}

impl ParsedDocument {
    pub fn parse(text: &str) -> Self {
        let tree = BlockTree::parse(text);
        let mut parsed = ParsedDocument {
            name: leading_name(text),
            ..Default::default()
        };

        if let Some(node) = tree.find("server_name") {
            if !node.args().is_empty() {
                parsed.domains = Some(node.args().to_vec());
            }
        }

        let listens = tree.find_all("listen");
        if !listens.is_empty() {
            parsed.tls_enabled = Some(listens.iter().any(|n| is_secure_listen(n)));
        }

        parsed.backend = root_location_backend(&tree).or_else(|| {
            tree.find_all("proxy_pass")
                .into_iter()
                .find_map(|n| n.args().first().and_then(|a| parse_backend_url(a)))
        });

        if parsed.backend.is_none() {
            parsed.stream_target = tree
                .find_all("proxy_pass")
                .into_iter()
                .find_map(|n| n.args().first().and_then(|a| parse_host_port(a)));
            if parsed.stream_target.is_some() {
                parsed.listen_port = listens
                    .iter()
                    .find_map(|n| n.args().first().and_then(|a| listen_port(a)));
            }
        }

        parsed
    }

    /// Copy recognised fields into `settings`. The name is taken only when
    /// creating; an edited entity keeps its own.
    pub fn apply_to(&self, settings: &mut ProxySettings, mode: WizardMode) {
        if mode == WizardMode::Create {
            if let Some(name) = &self.name {
                settings.name = name.clone();
            }
        }
        if let Some(domains) = &self.domains {
            settings.domains = domains.clone();
        }
        if let Some(tls) = self.tls_enabled {
            settings.tls_enabled = tls;
        }
        if let Some(backend) = &self.backend {
            settings.backend = backend.clone();
        }
        if let Some((host, port)) = &self.stream_target {
            settings.backend.host = host.clone();
            settings.target_port = Some(*port);
        }
        if let Some(port) = self.listen_port {
            settings.listen_port = Some(port);
        }
    }
}

/// Text of the first non-blank line when it is a comment, `name:` prefix dropped
fn leading_name(text: &str) -> Option<String> {
    let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let comment = first.strip_prefix('#')?.trim();
    let name = comment
        .strip_prefix("name:")
        .map(str::trim)
        .unwrap_or(comment);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn is_secure_listen(node: &&Node) -> bool {
    let args = node.args();
    let on_secure_port = args
        .first()
        .map(|a| listen_port(a) == Some(443))
        .unwrap_or(false);
    on_secure_port && args.iter().skip(1).any(|a| a == "ssl")
}

/// Port of a listen address: `443`, `10.0.0.1:443`, `[::]:443`
fn listen_port(address: &str) -> Option<u16> {
    let port = address.rsplit(':').next()?;
    port.parse().ok()
}

fn is_root_location(node: &Node) -> bool {
    if node.name() != "location" || !node.is_block() {
        return false;
    }
    match node.args() {
        [path] => path == "/",
        [modifier, path] => (modifier == "=" || modifier == "^~") && path == "/",
        _ => false,
    }
}

fn root_location_backend(tree: &BlockTree) -> Option<Backend> {
    tree.find_all("location")
        .into_iter()
        .filter(|n| is_root_location(n))
        .find_map(|loc| {
            loc.find_all("proxy_pass")
                .into_iter()
                .find_map(|n| n.args().first().and_then(|a| parse_backend_url(a)))
        })
}

/// `scheme://host[:port][/path]` with scheme http or https
pub fn parse_backend_url(url: &str) -> Option<Backend> {
    let (scheme, rest) = url.split_once("://")?;
    let scheme = Scheme::parse(scheme)?;
    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        return None;
    }

    let (host, port) = if let Some(stripped) = authority.strip_prefix('[') {
        // bracketed IPv6
        let (host, after) = stripped.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None => scheme.default_port(),
        };
        (format!("[{}]", host), port)
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().ok()?),
            None => (authority.to_string(), scheme.default_port()),
        }
    };

    if host.is_empty() {
        return None;
    }
    Some(Backend::new(scheme, host, port))
}

/// Scheme-less `host:port`
fn parse_host_port(target: &str) -> Option<(String, u16)> {
    if target.contains("://") {
        return None;
    }
    let (host, port) = target.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}
