//! VHost Wizard - command-line front end
//!
//! Drives the wizard engine from an answers file and exposes the parser and
//! syntax check for existing documents.

mod answers;
mod cli;

use answers::Answers;
use clap::Parser;
use cli::{Args, Command};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use vhost_wizard_core::{
    ApplyOutcome, BuiltinTemplates, Catalogs, Error, NginxSyntaxCheck, Result, SyntaxValidator,
    WizardConfig, WizardMode, WizardSession, RECIPES,
};

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    if let Err(err) = run(args) {
        error_handler(err);
    }
}

fn error_handler(err: Error) -> ! {
    eprintln!("Error: {}", err);
    for field in err.field_errors() {
        eprintln!("  {}: {}", field.field.as_str(), field.message);
    }
    std::process::exit(1);
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => WizardConfig::load(path)?,
        None => WizardConfig::load_or_default()?,
    };

    match args.command {
        Command::Recipes => list_recipes(),
        Command::Modules { catalog } => list_modules(&load_catalogs(&config, catalog)?),
        Command::Synth {
            answers,
            catalog,
            out,
            force,
            check,
        } => {
            let catalogs = load_catalogs(&config, catalog)?;
            synth(&config, catalogs, &answers, out.as_deref(), force, check)
        }
        Command::Parse { file, edit } => parse(&config, &file, edit),
        Command::Check { file, name, nginx } => {
            let checker = NginxSyntaxCheck {
                binary: nginx,
                ..Default::default()
            };
            let text = fs::read_to_string(&file)?;
            let name = name.unwrap_or_else(|| file.display().to_string());
            syntax_check(&checker, &text, &name)?;
            println!("{}: syntax ok", name);
            Ok(())
        }
    }
}

fn load_catalogs(config: &WizardConfig, overridden: Option<PathBuf>) -> Result<Catalogs> {
    match overridden {
        Some(path) => Catalogs::load(&path),
        None => config.load_catalogs(),
    }
}

fn list_recipes() -> Result<()> {
    for recipe in RECIPES {
        println!(
            "{:<14} {:<32} {:<14} tls={:<5} {}",
            recipe.id,
            recipe.label,
            recipe.proxy_type.as_str(),
            recipe.tls_enabled,
            recipe.module_names.join(", ")
        );
    }
    Ok(())
}

fn list_modules(catalogs: &Catalogs) -> Result<()> {
    for (scope, modules) in catalogs.modules.grouped() {
        println!("[{}]", scope.as_str());
        for module in modules {
            println!("  {:<18} {}", module.id, module.name);
        }
    }
    Ok(())
}

fn syntax_check(checker: &dyn SyntaxValidator, text: &str, name: &str) -> Result<()> {
    let report = checker.test(text, name)?;
    if report.success {
        Ok(())
    } else {
        Err(Error::Syntax(report.error.unwrap_or_default()))
    }
}

fn synth(
    config: &WizardConfig,
    catalogs: Catalogs,
    answers_path: &Path,
    out: Option<&Path>,
    force: bool,
    check: bool,
) -> Result<()> {
    let answers = Answers::load(answers_path)?;
    let mut session = WizardSession::new(WizardMode::Create, catalogs, config.paths.clone());
    answers.drive(&mut session, &BuiltinTemplates::new())?;

    if check {
        let preview = session.preview().unwrap_or_default();
        syntax_check(&NginxSyntaxCheck::new(), preview, &session.state().settings.name)?;
    }

    let existing = match out {
        Some(path) if path.exists() => Some(fs::read_to_string(path)?),
        _ => None,
    };

    match session.apply(existing.as_deref(), force) {
        ApplyOutcome::Applied(request) => {
            match out {
                Some(path) => {
                    fs::write(path, &request.config)?;
                    info!("wrote '{}' to {}", request.name, path.display());
                    println!("{} ({}): '{}'", request.name, request.proxy_type, path.display());
                }
                None => print!("{}", request.config),
            }
            if let Some(url) = &request.launch_url {
                println!("Launch URL: {}", url);
            }
            Ok(())
        }
        ApplyOutcome::NeedsConfirmation(session) => {
            session.cancel();
            let path = out.map(|p| p.display().to_string()).unwrap_or_default();
            Err(Error::AlreadyExists(format!(
                "{} is not empty (use --force to overwrite)",
                path
            )))
        }
        ApplyOutcome::NotReady(session) => {
            let step = session.step();
            session.cancel();
            Err(Error::session(format!(
                "wizard stopped on step {} before the preview",
                step
            )))
        }
    }
}

/// Print the fields a document fills in, as JSON
fn parse(config: &WizardConfig, file: &Path, edit: bool) -> Result<()> {
    let text = fs::read_to_string(file)?;
    let mode = if edit {
        WizardMode::Edit
    } else {
        WizardMode::Create
    };
    let mut session = WizardSession::new(mode, Catalogs::default(), config.paths.clone());
    session.load_document(&text);
    println!("{}", serde_json::to_string_pretty(&session.state().settings)?);
    session.cancel();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhost_wizard_core::SyntaxReport;

    struct Rejecting;

    impl SyntaxValidator for Rejecting {
        fn test(&self, _: &str, _: &str) -> Result<SyntaxReport> {
            Ok(SyntaxReport::failed("unexpected \"}\" in line 3"))
        }
    }

    #[test]
    fn test_syntax_failure_becomes_error() {
        let err = syntax_check(&Rejecting, "server {}", "x").unwrap_err();
        assert!(matches!(err, Error::Syntax(msg) if msg.contains("line 3")));
    }

    #[test]
    fn test_synth_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let answers = dir.path().join("answers.toml");
        fs::write(
            &answers,
            "recipe = \"basic-http\"\n[settings]\nname = \"shop\"\ndomains = \"shop.example.com\"\n",
        )
        .unwrap();
        let out = dir.path().join("shop.conf");
        fs::write(&out, "# hand edited\n").unwrap();

        let config = WizardConfig::default();
        let err = synth(&config, Catalogs::builtin(), &answers, Some(&out), false, false)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&out).unwrap(), "# hand edited\n");

        synth(&config, Catalogs::builtin(), &answers, Some(&out), true, false).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("# shop\n"));
        assert!(written.contains("server_name shop.example.com;"));
        assert!(written.contains("proxy_pass http://localhost:8080;"));
    }

    #[test]
    fn test_synth_into_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let answers = dir.path().join("answers.toml");
        fs::write(
            &answers,
            "recipe = \"tcp-stream\"\n[settings]\nname = \"db\"\nhost = \"db.internal\"\nlisten_port = \"15432\"\ntarget_port = \"5432\"\n",
        )
        .unwrap();
        let out = dir.path().join("db.conf");
        fs::write(&out, "\n").unwrap();

        synth(&WizardConfig::default(), Catalogs::builtin(), &answers, Some(&out), false, false)
            .unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("listen 15432;"));
        assert!(written.contains("proxy_pass db.internal:5432;"));
    }
}
