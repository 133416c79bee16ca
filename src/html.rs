//! Writes the HTML report.
//!
//! The JSON model sits between two marker lines, `// begin-report-data` and
//! `// end-report-data`, so tools can cut it out of the page with a plain text
//! search. In the browser the same text is the body of
//! `configurationCacheProblems()`, which the template's script calls to render.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::json_model::ModelSerializer;
use crate::model::{DecoratedReportProblem, DiagnosticKind, ProblemReportDetails};
use crate::template::{Template, TemplateProvider};

pub const BEGIN_MARKER: &str = "// begin-report-data";
pub const END_MARKER: &str = "// end-report-data";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportState { NotStarted, Open, Closed }

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportState::NotStarted => "not started",
            ReportState::Open => "open",
            ReportState::Closed => "closed",
        })
    }
}

/// Single-use writer for one report. Owns the sink until [`close`](Self::close) or drop.
///
/// Protocol: `begin_report`, `write_diagnostic`*, `end_report`, `close`. Any call out of
/// that order fails with [`ReportError::ProtocolViolation`] without touching the sink.
/// A failing sink or serializer closes the report; the partial output must be discarded.
pub struct HtmlReportWriter<W: Write, S: ModelSerializer> {
    sink: Option<W>,
    template: Template,
    serializer: S,
    state: ReportState,
    completed: bool,
    diagnostics: usize,
}

impl<S: ModelSerializer> HtmlReportWriter<BufWriter<File>, S> {
    /// Loads the template before creating `path`, so a bad template leaves no file behind.
    pub fn create(path: &Path, provider: &dyn TemplateProvider, serializer: S) -> Result<Self> {
        let template = provider.load()?;
        let file = File::create(path)?;
        log::debug!("writing report to {}", path.to_string_lossy());
        Ok(Self::with_template(BufWriter::new(file), template, serializer))
    }
}

impl<W: Write, S: ModelSerializer> HtmlReportWriter<W, S> {
    pub fn new(sink: W, provider: &dyn TemplateProvider, serializer: S) -> Result<Self> {
        Ok(Self::with_template(sink, provider.load()?, serializer))
    }

    pub fn with_template(sink: W, template: Template, serializer: S) -> Self {
        Self { sink: Some(sink), template, serializer, state: ReportState::NotStarted, completed: false, diagnostics: 0 }
    }

    pub fn state(&self) -> ReportState { self.state }

    pub fn diagnostics_written(&self) -> usize { self.diagnostics }

    pub fn begin_report(&mut self) -> Result<()> {
        self.step("begin_report", ReportState::NotStarted, ReportState::Open, |out, ser, tpl| {
            out.write_all(tpl.head.as_bytes())?;
            if !tpl.head.is_empty() && !tpl.head.ends_with('\n') { out.write_all(b"\n")?; }
            begin_report_data(out)?;
            ser.begin_model(out)
        })
    }

    pub fn write_diagnostic(&mut self, kind: DiagnosticKind, problem: &DecoratedReportProblem) -> Result<()> {
        self.step("write_diagnostic", ReportState::Open, ReportState::Open, |out, ser, _| {
            ser.write_diagnostic(out, kind, problem)
        })?;
        self.diagnostics += 1;
        Ok(())
    }

    pub fn end_report(&mut self, details: &ProblemReportDetails) -> Result<()> {
        self.step("end_report", ReportState::Open, ReportState::Closed, |out, ser, tpl| {
            ser.end_model(out, details)?;
            end_report_data(out)?;
            out.write_all(tpl.tail.as_bytes())?;
            Ok(())
        })?;
        self.completed = true;
        log::debug!("report completed with {} diagnostics", self.diagnostics);
        Ok(())
    }

    /// Flushes and releases the sink. Allowed in any state; closing before
    /// `end_report` leaves a truncated document without its end marker.
    /// Calls after the first are no-ops.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut sink) = self.sink.take() else { return Ok(()) };
        if !self.completed {
            log::warn!("report closed while {}; output is truncated and cannot be extracted", self.state);
        }
        self.state = ReportState::Closed;
        sink.flush()?;
        Ok(())
    }

    fn step<F>(&mut self, operation: &'static str, from: ReportState, to: ReportState, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write, &mut S, &Template) -> Result<()>,
    {
        if self.state != from {
            return Err(ReportError::ProtocolViolation { operation, state: self.state });
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(ReportError::ProtocolViolation { operation, state: ReportState::Closed });
        };
        let sink: &mut dyn Write = sink;
        match f(sink, &mut self.serializer, &self.template) {
            Ok(()) => {
                if from != to { log::debug!("report {} -> {}", from, to); }
                self.state = to;
                Ok(())
            }
            Err(e) => {
                log::error!("{} failed, abandoning report: {}", operation, e);
                self.state = ReportState::Closed;
                Err(e)
            }
        }
    }
}

impl<W: Write, S: ModelSerializer> Drop for HtmlReportWriter<W, S> {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if !self.completed { log::warn!("report writer dropped while {}; output is truncated", self.state); }
            if let Err(e) = sink.flush() { log::error!("flushing report sink failed: {}", e); }
        }
    }
}

fn begin_report_data(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, r#"<script type="text/javascript">"#)?;
    writeln!(out, "function configurationCacheProblems() {{ return (")?;
    writeln!(out, "{}", BEGIN_MARKER)
}

fn end_report_data(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", END_MARKER)?;
    writeln!(out, ");}}")?;
    writeln!(out, "</script>")
}

/// Runs the whole protocol over `diagnostics` and always releases the sink.
/// Returns the number of diagnostics written.
pub fn write_report<W, S, I>(sink: W, template: Template, serializer: S, diagnostics: I, details: &ProblemReportDetails) -> Result<usize>
where
    W: Write,
    S: ModelSerializer,
    I: IntoIterator<Item = (DiagnosticKind, DecoratedReportProblem)>,
{
    let mut writer = HtmlReportWriter::with_template(sink, template, serializer);
    let written = run_protocol(&mut writer, diagnostics, details);
    let closed = writer.close();
    written?;
    closed?;
    Ok(writer.diagnostics_written())
}

fn run_protocol<W, S, I>(writer: &mut HtmlReportWriter<W, S>, diagnostics: I, details: &ProblemReportDetails) -> Result<()>
where
    W: Write,
    S: ModelSerializer,
    I: IntoIterator<Item = (DiagnosticKind, DecoratedReportProblem)>,
{
    writer.begin_report()?;
    for (kind, problem) in diagnostics { writer.write_diagnostic(kind, &problem)?; }
    writer.end_report(details)
}
