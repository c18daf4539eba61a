//! Builtin base templates for each proxy type

use crate::collab::{GeneratedTemplate, TemplateOptions, TemplateProvider};
use crate::{ProxyType, Result};

/// Renders base documents locally instead of asking a backend.
///
/// Every value the synthesizer rewrites is present as a placeholder: the
/// server name, the backend, the certificate pair and the stream ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub fn new() -> Self {
        Self
    }

    /// Name reduced to characters safe in a filesystem path
    fn slug(name: &str) -> String {
        let slug: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let slug = slug.trim_matches('-').to_string();
        if slug.is_empty() {
            "site".to_string()
        } else {
            slug
        }
    }

    fn header(name: &str) -> String {
        let first_line = name.lines().next().unwrap_or("").trim();
        format!("# {}\n", first_line)
    }

    fn redirect_block() -> &'static str {
        r#"server {
    listen 80;
    listen [::]:80;
    server_name _;

    location /.well-known/acme-challenge/ {
        root /var/www/certbot;
    }

    location / {
        return 301 https://$host$request_uri;
    }
}
"#
    }

    fn tls_directives() -> &'static str {
        r#"    ssl_certificate /etc/ssl/certs/placeholder.crt;
    ssl_certificate_key /etc/ssl/private/placeholder.key;
    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_ciphers HIGH:!aNULL:!MD5;
    ssl_prefer_server_ciphers on;
"#
    }

    fn proxy_location() -> &'static str {
        r#"    location / {
        proxy_pass http://127.0.0.1:8080;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
"#
    }

    fn static_location(slug: &str) -> String {
        format!(
            r#"    root /var/www/{slug};
    index index.html;

    location / {{
        try_files $uri $uri/ =404;
    }}
"#,
            slug = slug
        )
    }

    fn render(proxy_type: ProxyType, name: &str, tls: bool) -> String {
        let mut out = Self::header(name);
        let slug = Self::slug(name);

        let body = match proxy_type {
            ProxyType::ReverseProxy => Self::proxy_location().to_string(),
            ProxyType::StaticSite => Self::static_location(&slug),
            ProxyType::Stream => {
                out.push_str(
                    r#"server {
    listen 10000;
    proxy_pass 127.0.0.1:10000;
    proxy_connect_timeout 5s;
    proxy_timeout 10m;
}
"#,
                );
                return out;
            }
        };

        if tls {
            out.push_str(Self::redirect_block());
            out.push('\n');
            out.push_str("server {\n");
            out.push_str("    listen 443 ssl;\n");
            out.push_str("    listen [::]:443 ssl;\n");
            out.push_str("    http2 on;\n");
            out.push_str("    server_name _;\n\n");
            out.push_str(Self::tls_directives());
            out.push('\n');
        } else {
            out.push_str("server {\n");
            out.push_str("    listen 80;\n");
            out.push_str("    listen [::]:80;\n");
            out.push_str("    server_name _;\n\n");
        }
        out.push_str(&body);
        out.push_str("}\n");
        out
    }
}

impl TemplateProvider for BuiltinTemplates {
    fn generate(
        &self,
        proxy_type: ProxyType,
        name: &str,
        options: TemplateOptions,
    ) -> Result<GeneratedTemplate> {
        let tls = options.tls_enabled && proxy_type.supports_tls();
        Ok(GeneratedTemplate {
            config: Self::render(proxy_type, name, tls),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockTree;
    use crate::patcher::secure_block;

    fn generate(proxy_type: ProxyType, tls: bool) -> String {
        BuiltinTemplates::new()
            .generate(proxy_type, "My App", TemplateOptions { tls_enabled: tls })
            .unwrap()
            .config
    }

    #[test]
    fn test_plain_reverse_proxy() {
        let config = generate(ProxyType::ReverseProxy, false);
        assert!(config.starts_with("# My App\n"));
        let lines: Vec<&str> = config.lines().collect();
        assert!(secure_block(&lines).is_none());
        assert_eq!(BlockTree::parse(&config).find_all("server").len(), 1);
        assert!(config.contains("proxy_pass http://127.0.0.1:8080;"));
    }

    #[test]
    fn test_tls_reverse_proxy_has_two_blocks() {
        let config = generate(ProxyType::ReverseProxy, true);
        let tree = BlockTree::parse(&config);
        assert_eq!(tree.find_all("server").len(), 2);
        let lines: Vec<&str> = config.lines().collect();
        let span = secure_block(&lines).unwrap();
        assert_eq!(lines[span.close], "}");
        assert_eq!(span.close, lines.len() - 1);
        assert!(config.contains("ssl_certificate /etc/ssl/certs/placeholder.crt;"));
    }

    #[test]
    fn test_static_site_root_uses_slug() {
        let config = generate(ProxyType::StaticSite, false);
        assert!(config.contains("root /var/www/my-app;"));
        assert!(!config.contains("proxy_pass"));
    }

    #[test]
    fn test_stream_ignores_tls() {
        let config = generate(ProxyType::Stream, true);
        assert!(!config.contains("ssl"));
        assert!(config.contains("proxy_pass 127.0.0.1:10000;"));
    }

    #[test]
    fn test_balanced_braces() {
        for proxy_type in [ProxyType::ReverseProxy, ProxyType::StaticSite, ProxyType::Stream] {
            for tls in [false, true] {
                let config = generate(proxy_type, tls);
                let lines: Vec<&str> = config.lines().collect();
                assert_eq!(crate::patcher::brace_balance(&lines), 0);
            }
        }
    }
}
