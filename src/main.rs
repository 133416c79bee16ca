use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, ColorChoice, Parser, Subcommand, ValueEnum};
use comfy_table::{ContentArrangement, Table};
use is_terminal::IsTerminal;
use problems_report::{BuiltinTemplate, DiagnosticKind, FileTemplate, HtmlReportWriter, JsonModelWriter, ProblemReportDetails, TemplateProvider};
use problems_report::model::StructuredMessage;
use serde::{Deserialize, Serialize};

mod config;
mod input;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

const DEFAULT_OUTPUT: &str = "problems-report.html";
const DEFAULT_CACHE_ACTION: &str = "storing";

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "problems-report",
    version,
    about = "Self-contained HTML problem reports with an embedded JSON model",
    after_long_help = "Examples:\n  problems-report render --input problems.ndjson --output report.html\n  problems-report render --input - --template shell.html --build-name app\n  problems-report extract report.html --pretty",
    color = ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true)]
    config: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false, global = true)]
    quiet: bool,
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,
    #[arg(long, global = true)]
    log_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an HTML report from NDJSON diagnostics
    Render(RenderArgs),
    /// Print the JSON model embedded in a report
    Extract {
        report: String,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// NDJSON file, one {"kind", "problem"} object per line; `-` for stdin
    #[arg(long, short = 'i')]
    input: String,
    #[arg(long, short = 'o')]
    output: Option<String>,
    /// HTML template containing the report-data insertion point (default: bundled template)
    #[arg(long, short = 't')]
    template: Option<String>,
    #[arg(long)]
    build_name: Option<String>,
    #[arg(long)]
    requested_tasks: Option<String>,
    #[arg(long)]
    cache_action: Option<String>,
    #[arg(long)]
    documentation_link: Option<String>,
    /// Override the problem count (default: number of `problem` diagnostics)
    #[arg(long)]
    total_problems: Option<usize>,
    #[arg(long, default_value_t = false)]
    pretty_model: bool,
    #[arg(long, default_value_t = false)]
    fail_on_problems: bool,
}

fn main() {
    let mut cli = Cli::parse();
    match config::load_config(cli.config.as_deref()) {
        Ok(Some(cfg)) => config::apply_config(&mut cli, cfg),
        Ok(None) => {}
        Err(e) => { eprintln!("{:#}", e); std::process::exit(2); }
    }
    init_logging(&cli);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let _ = ENABLE_COLOR.set(color_default && !cli.no_color);
    let res = match &cli.command {
        Command::Render(args) => render(args, cli.quiet).map(|problems| exit_code(args.fail_on_problems, problems)),
        Command::Extract { report, pretty } => extract(report, *pretty).map(|_| 0),
    };
    match res {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => { log::error!("{:#}", e); std::process::exit(2); }
    }
}

/// 1 when problems were reported and the caller asked to fail on them, else 0.
fn exit_code(fail_on_problems: bool, problems: usize) -> i32 {
    if fail_on_problems && problems > 0 { 1 } else { 0 }
}

/// `--quiet` wins over `--log-level`, which wins over `-v` counts.
fn log_filter(cli: &Cli) -> Option<log::LevelFilter> {
    if cli.quiet { return Some(log::LevelFilter::Error); }
    if let Some(lvl) = cli.log_level { return Some(lvl.into()); }
    match cli.verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if let Some(filter) = log_filter(cli) { builder.filter_level(filter); }
    match cli.log_format {
        Some(LogFormat::Json) => {
            builder.format(|buf, record| {
                use std::io::Write;
                let line = serde_json::json!({
                    "ts": chrono::Local::now().to_rfc3339(),
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "msg": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            });
        }
        Some(LogFormat::Text) => {
            builder.format(|buf, record| {
                use std::io::Write;
                writeln!(buf, "[{:<5} {} {}] {}", record.level(), chrono::Local::now().format("%H:%M:%S"), record.target(), record.args())
            });
        }
        None => {}
    }
    if let Some(path) = cli.log_path.as_ref() {
        match File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => eprintln!("cannot open log file {}: {}", path, e),
        }
    }
    builder.init();
}

/// Returns the number of `problem` diagnostics reported.
fn render(args: &RenderArgs, quiet: bool) -> Result<usize> {
    let output = PathBuf::from(args.output.as_deref().unwrap_or(DEFAULT_OUTPUT));
    let provider: Box<dyn TemplateProvider> = match config::resolve_template(args.template.as_deref()) {
        Some(p) => { log::info!("using template {}", p.to_string_lossy()); Box::new(FileTemplate::new(p)) }
        None => Box::new(BuiltinTemplate),
    };
    let diagnostics = input::open(&args.input)?;
    let serializer = JsonModelWriter::new().pretty(args.pretty_model);
    let mut writer = HtmlReportWriter::create(&output, provider.as_ref(), serializer)
        .with_context(|| format!("cannot start report {}", output.to_string_lossy()))?;
    let mut counts: BTreeMap<DiagnosticKind, usize> = BTreeMap::new();
    let details = match write_diagnostics(&mut writer, diagnostics, args, &mut counts) {
        Ok(d) => d,
        Err(e) => {
            drop(writer);
            discard_partial(&output);
            return Err(e);
        }
    };
    if !quiet {
        println!("{}", paint(&format!("HTML generated: {}", output.to_string_lossy()), "1;36"));
        print_counts(&counts, &details);
    }
    Ok(counts.get(&DiagnosticKind::Problem).copied().unwrap_or(0))
}

fn write_diagnostics(writer: &mut HtmlReportWriter<BufWriter<File>, JsonModelWriter>, diagnostics: input::DiagnosticReader<Box<dyn std::io::BufRead>>, args: &RenderArgs, counts: &mut BTreeMap<DiagnosticKind, usize>) -> Result<ProblemReportDetails> {
    writer.begin_report()?;
    for item in diagnostics {
        let (kind, problem) = item?;
        writer.write_diagnostic(kind, &problem)?;
        *counts.entry(kind).or_insert(0) += 1;
    }
    let details = build_details(args, counts);
    writer.end_report(&details)?;
    writer.close()?;
    Ok(details)
}

fn build_details(args: &RenderArgs, counts: &BTreeMap<DiagnosticKind, usize>) -> ProblemReportDetails {
    let total = args.total_problems.unwrap_or_else(|| counts.get(&DiagnosticKind::Problem).copied().unwrap_or(0));
    let action = args.cache_action.clone().unwrap_or_else(|| DEFAULT_CACHE_ACTION.to_string());
    let noun = if total == 1 { "problem" } else { "problems" };
    ProblemReportDetails {
        total_problem_count: total,
        build_name: args.build_name.clone().unwrap_or_else(|| "build".to_string()),
        requested_tasks: args.requested_tasks.clone(),
        cache_action_description: StructuredMessage::new().text(format!("Cache action '{}' reported {} {}.", action, total, noun)),
        cache_action: action,
        documentation_link: args.documentation_link.clone(),
    }
}

fn discard_partial(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(_) => log::warn!("removed incomplete report {}", output.to_string_lossy()),
        Err(e) => log::error!("incomplete report {} could not be removed: {}", output.to_string_lossy(), e),
    }
}

fn print_counts(counts: &BTreeMap<DiagnosticKind, usize>, details: &ProblemReportDetails) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![paint("Kind", "1"), paint("Count", "1")]);
    for kind in DiagnosticKind::ALL {
        let n = counts.get(&kind).copied().unwrap_or(0);
        let code = match (kind, n) { (_, 0) => "32", (DiagnosticKind::Problem, _) => "31", _ => "33" };
        table.add_row(vec![kind.key().to_string(), paint(&n.to_string(), code)]);
    }
    println!("{}", table);
    println!("{}", details.cache_action_description);
}

fn extract(report: &str, pretty: bool) -> Result<()> {
    let text = std::fs::read_to_string(report).with_context(|| format!("cannot read report {}", report))?;
    if pretty {
        let model = problems_report::extract::parse_model(&text).with_context(|| format!("no report data in {}", report))?;
        println!("{}", serde_json::to_string_pretty(&model)?);
    } else {
        println!("{}", problems_report::extract::extract_model(&text).with_context(|| format!("no report data in {}", report))?);
    }
    Ok(())
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&false) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}
