//! Syntax checking through the local `nginx -t`

use crate::collab::{SyntaxReport, SyntaxValidator};
use crate::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Output from a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Validates documents by running `nginx -t` against a throwaway main config
#[derive(Debug, Clone)]
pub struct NginxSyntaxCheck {
    pub binary: String,
    /// Where scratch files are written
    pub work_dir: PathBuf,
}

impl Default for NginxSyntaxCheck {
    fn default() -> Self {
        Self {
            binary: "nginx".to_string(),
            work_dir: std::env::temp_dir(),
        }
    }
}

impl NginxSyntaxCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command and capture output
    pub fn run_cmd(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(cmd).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::CommandNotFound(cmd.to_string())
            } else {
                Error::Command {
                    cmd: format!("{} {}", cmd, args.join(" ")),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(Self::parse_output(output))
    }

    fn parse_output(output: Output) -> CommandOutput {
        CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Main config wrapping a virtual-host file; stream hosts go in `stream {}`
    pub fn wrapper_config(vhost_path: &Path, stream: bool) -> String {
        let context = if stream { "stream" } else { "http" };
        format!(
            "pid /dev/null;\nerror_log /dev/stderr;\nevents {{}}\n{} {{\n    include {};\n}}\n",
            context,
            vhost_path.display()
        )
    }

    fn looks_like_stream(config: &str) -> bool {
        let tree = crate::block::BlockTree::parse(config);
        tree.find("server_name").is_none()
            && tree
                .find_all("proxy_pass")
                .iter()
                .any(|n| n.args().first().map(|a| !a.contains("://")).unwrap_or(false))
    }
}

impl SyntaxValidator for NginxSyntaxCheck {
    fn test(&self, config: &str, name: &str) -> Result<SyntaxReport> {
        // deleted with its contents on drop
        let scratch = tempfile::Builder::new()
            .prefix("vhost-wizard-")
            .tempdir_in(&self.work_dir)?;
        let vhost_path = scratch.path().join("vhost.conf");
        let main_path = scratch.path().join("nginx.conf");

        fs::write(&vhost_path, config)?;
        fs::write(
            &main_path,
            Self::wrapper_config(&vhost_path, Self::looks_like_stream(config)),
        )?;

        let main = main_path.to_string_lossy().to_string();
        let output = self.run_cmd(&self.binary, &["-t", "-q", "-c", &main])?;
        debug!("nginx -t for '{}' exited {}", name, output.exit_code);
        if output.success() {
            Ok(SyntaxReport::ok())
        } else {
            Ok(SyntaxReport::failed(output.stderr.trim().to_string()))
        }
    }
}
