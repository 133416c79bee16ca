use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{Cli, LogFormat, LogLevel, RenderArgs};

pub const DEFAULT_CONFIG: &str = "problems-report.toml";
pub const TEMPLATE_ENV: &str = "PROBLEMS_REPORT_TEMPLATE";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub template: Option<String>,
    pub output: Option<String>,
    pub build_name: Option<String>,
    pub requested_tasks: Option<String>,
    pub cache_action: Option<String>,
    pub documentation_link: Option<String>,
    pub pretty_model: Option<bool>,
    pub fail_on_problems: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub log_path: Option<String>,
    pub no_color: Option<bool>,
    pub quiet: Option<bool>,
}

/// An explicit path must exist; the default file in the working directory is optional.
pub fn load_config(path: Option<&str>) -> Result<Option<AppConfig>> {
    let (p, required) = match path {
        Some(p) => (PathBuf::from(p), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let s = match std::fs::read_to_string(&p) {
        Ok(s) => s,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("cannot read config {}", p.to_string_lossy())),
    };
    let cfg = toml::from_str::<AppConfig>(&s).with_context(|| format!("invalid config {}", p.to_string_lossy()))?;
    Ok(Some(cfg))
}

/// Command-line values win; config only fills what was left unset.
pub fn apply_config(cli: &mut Cli, cfg: AppConfig) {
    if let crate::Command::Render(args) = &mut cli.command { apply_render(args, &cfg); }
    if cli.log_level.is_none() { cli.log_level = cfg.log_level; }
    if cli.log_format.is_none() { cli.log_format = cfg.log_format; }
    if cli.log_path.is_none() { cli.log_path = cfg.log_path; }
    if let Some(v) = cfg.no_color { cli.no_color |= v; }
    if let Some(v) = cfg.quiet { cli.quiet |= v; }
}

fn apply_render(args: &mut RenderArgs, cfg: &AppConfig) {
    if args.template.is_none() { args.template = cfg.template.clone(); }
    if args.output.is_none() { args.output = cfg.output.clone(); }
    if args.build_name.is_none() { args.build_name = cfg.build_name.clone(); }
    if args.requested_tasks.is_none() { args.requested_tasks = cfg.requested_tasks.clone(); }
    if args.cache_action.is_none() { args.cache_action = cfg.cache_action.clone(); }
    if args.documentation_link.is_none() { args.documentation_link = cfg.documentation_link.clone(); }
    if let Some(v) = cfg.pretty_model { args.pretty_model |= v; }
    if let Some(v) = cfg.fail_on_problems { args.fail_on_problems |= v; }
}

/// Flag or config first, then the environment.
pub fn resolve_template(flag: Option<&str>) -> Option<PathBuf> {
    template_path(flag, std::env::var_os(TEMPLATE_ENV))
}

/// An empty environment value counts as unset.
fn template_path(flag: Option<&str>, env: Option<OsString>) -> Option<PathBuf> {
    flag.map(PathBuf::from).or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}
