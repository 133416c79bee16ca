use std::io::Write;

use serde::Serialize;
use serde::ser::Error as _;

use crate::error::{ReportError, Result};
use crate::model::{DecoratedReportProblem, DiagnosticKind, ProblemReportDetails};

/// Streams the report model into the sink owned by the report writer.
///
/// Calls arrive as `begin_model`, any number of `write_diagnostic`, then `end_model`.
/// Everything written across those calls, concatenated in order, must be a single JSON value.
/// Implementations must not buffer the whole diagnostic collection.
pub trait ModelSerializer {
    fn begin_model(&mut self, out: &mut dyn Write) -> Result<()>;
    fn write_diagnostic(&mut self, out: &mut dyn Write, kind: DiagnosticKind, problem: &DecoratedReportProblem) -> Result<()>;
    fn end_model(&mut self, out: &mut dyn Write, details: &ProblemReportDetails) -> Result<()>;
}

/// Default serializer: `{"diagnostics":[...], <summary members>}`.
#[derive(Debug, Default)]
pub struct JsonModelWriter {
    pretty: bool,
    written: usize,
}

impl JsonModelWriter {
    pub fn new() -> Self { Self::default() }

    /// One diagnostic per line. The model stays a single JSON value.
    pub fn pretty(mut self, on: bool) -> Self { self.pretty = on; self }

    pub fn written(&self) -> usize { self.written }
}

impl ModelSerializer for JsonModelWriter {
    fn begin_model(&mut self, out: &mut dyn Write) -> Result<()> {
        self.written = 0;
        out.write_all(b"{\"diagnostics\":[")?;
        Ok(())
    }

    fn write_diagnostic(&mut self, out: &mut dyn Write, kind: DiagnosticKind, problem: &DecoratedReportProblem) -> Result<()> {
        if self.written > 0 { out.write_all(b",")?; }
        if self.pretty { out.write_all(b"\n")?; }
        out.write_all(b"{\"trace\":")?;
        write_json(out, &problem.trace)?;
        write!(out, ",\"{}\":", kind.key())?;
        write_json(out, &problem.message)?;
        if let Some(link) = problem.documentation_link.as_ref() {
            out.write_all(b",\"documentationLink\":")?;
            write_json(out, link)?;
        }
        if let Some(failure) = problem.failure.as_ref() {
            out.write_all(b",\"error\":")?;
            write_json(out, failure)?;
        }
        out.write_all(b"}")?;
        self.written += 1;
        log::trace!("model diagnostic #{} ({})", self.written, kind.key());
        Ok(())
    }

    fn end_model(&mut self, out: &mut dyn Write, details: &ProblemReportDetails) -> Result<()> {
        if self.pretty && self.written > 0 { out.write_all(b"\n")?; }
        out.write_all(b"]")?;
        write_members(out, details)?;
        out.write_all(b"}")?;
        Ok(())
    }
}

/// Appends the members of `value` to an already-open JSON object.
fn write_members<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    let serde_json::Value::Object(fields) = serde_json::to_value(value)? else {
        return Err(ReportError::Serialization(serde_json::Error::custom("summary details must serialize to a JSON object")));
    };
    for (k, v) in fields {
        out.write_all(b",")?;
        write_json(out, &k)?;
        out.write_all(b":")?;
        write_json(out, &v)?;
    }
    Ok(())
}

/// The model is inlined in a `<script>` element, so no string may contain a raw `<`.
fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(ScriptSafe(out), value)?;
    Ok(())
}

/// Rewrites `<` as the JSON escape `\u003c`. Outside strings JSON never contains `<`.
struct ScriptSafe<'a>(&'a mut dyn Write);

impl Write for ScriptSafe<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut rest = buf;
        while let Some(i) = rest.iter().position(|&b| b == b'<') {
            self.0.write_all(&rest[..i])?;
            self.0.write_all(b"\\u003c")?;
            rest = &rest[i + 1..];
        }
        self.0.write_all(rest)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { self.0.flush() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecoratedFailure, StackTracePart, StructuredMessage, TraceElement};

    fn problem(msg: &str) -> DecoratedReportProblem {
        DecoratedReportProblem::new(
            vec![TraceElement::Task { path: ":app:build".into(), task_type: "DefaultTask".into() }],
            StructuredMessage::new().text(msg),
        )
    }

    fn details() -> ProblemReportDetails {
        ProblemReportDetails { total_problem_count: 2, build_name: "app".into(), cache_action: "storing".into(), ..Default::default() }
    }

    fn run(ser: &mut JsonModelWriter, items: &[(DiagnosticKind, DecoratedReportProblem)]) -> String {
        let mut out: Vec<u8> = Vec::new();
        ser.begin_model(&mut out).unwrap();
        for (k, p) in items { ser.write_diagnostic(&mut out, *k, p).unwrap(); }
        ser.end_model(&mut out, &details()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_model_is_valid_json() {
        let s = run(&mut JsonModelWriter::new(), &[]);
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["diagnostics"], serde_json::json!([]));
        assert_eq!(v["totalProblemCount"], 2);
        assert_eq!(v["buildName"], "app");
    }

    #[test]
    fn message_is_keyed_by_kind() {
        let s = run(&mut JsonModelWriter::new(), &[(DiagnosticKind::Problem, problem("a")), (DiagnosticKind::Input, problem("b"))]);
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["diagnostics"][0]["problem"][0]["text"], "a");
        assert_eq!(v["diagnostics"][1]["input"][0]["text"], "b");
        assert!(v["diagnostics"][1].get("problem").is_none());
        assert_eq!(v["diagnostics"][0]["trace"][0]["path"], ":app:build");
    }

    #[test]
    fn optional_members_only_when_present() {
        let mut p = problem("c");
        p.documentation_link = Some("https://docs.example/cc".into());
        p.failure = Some(DecoratedFailure {
            summary: StructuredMessage::new().text("NPE"),
            parts: vec![StackTracePart::Text("at A".into()), StackTracePart::InternalText("at internal.B".into())],
        });
        let s = run(&mut JsonModelWriter::new(), &[(DiagnosticKind::Incompatible, p), (DiagnosticKind::Problem, problem("d"))]);
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["diagnostics"][0]["documentationLink"], "https://docs.example/cc");
        assert_eq!(v["diagnostics"][0]["error"]["parts"][1]["internalText"], "at internal.B");
        assert!(v["diagnostics"][1].get("error").is_none());
        assert!(v["diagnostics"][1].get("documentationLink").is_none());
    }

    #[test]
    fn pretty_puts_one_diagnostic_per_line() {
        let mut ser = JsonModelWriter::new().pretty(true);
        let s = run(&mut ser, &[(DiagnosticKind::Problem, problem("a")), (DiagnosticKind::Problem, problem("b"))]);
        assert_eq!(ser.written(), 2);
        assert_eq!(s.lines().count(), 4);
        assert!(serde_json::from_str::<serde_json::Value>(&s).is_ok());
    }

    #[test]
    fn summary_members_keep_declaration_order() {
        let s = run(&mut JsonModelWriter::new(), &[]);
        assert!(s.starts_with("{\"diagnostics\":[],\"totalProblemCount\":2,\"buildName\":\"app\""));
    }

    #[test]
    fn angle_brackets_are_escaped_inside_strings() {
        let text = "</script><script>alert(1)</script>";
        let mut p = problem(text);
        p.trace = vec![TraceElement::BuildLogic { location: "<init>".into() }];
        let s = run(&mut JsonModelWriter::new(), &[(DiagnosticKind::Problem, p)]);
        assert!(!s.contains('<'));
        assert!(s.contains("\\u003c/script>"));
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["diagnostics"][0]["problem"][0]["text"], text);
        assert_eq!(v["diagnostics"][0]["trace"][0]["location"], "<init>");
    }

    #[test]
    fn non_object_summary_is_rejected() {
        let mut out: Vec<u8> = Vec::new();
        let err = write_members(&mut out, &42u32).unwrap_err();
        assert!(matches!(err, ReportError::Serialization(_)));
        assert!(out.is_empty());
    }
}
