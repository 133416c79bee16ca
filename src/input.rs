use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use problems_report::{DecoratedReportProblem, DiagnosticKind};
use serde::Deserialize;

/// One line of the diagnostics NDJSON input.
#[derive(Deserialize)]
struct DiagnosticLine {
    kind: DiagnosticKind,
    problem: DecoratedReportProblem,
}

/// Streams `(kind, problem)` pairs from NDJSON, one diagnostic per line.
pub struct DiagnosticReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    origin: String,
}

impl<R: BufRead> DiagnosticReader<R> {
    pub fn new(reader: R, origin: impl Into<String>) -> Self {
        Self { lines: reader.lines(), line_no: 0, origin: origin.into() }
    }
}

/// `-` reads standard input.
pub fn open(path: &str) -> Result<DiagnosticReader<Box<dyn BufRead>>> {
    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let f = File::open(path).with_context(|| format!("cannot open diagnostics {}", path))?;
        Box::new(BufReader::new(f))
    };
    Ok(DiagnosticReader::new(reader, path))
}

impl<R: BufRead> Iterator for DiagnosticReader<R> {
    type Item = Result<(DiagnosticKind, DecoratedReportProblem)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => return Some(Err(e).with_context(|| format!("{}:{}: read failed", self.origin, self.line_no))),
            };
            if line.trim().is_empty() { continue; }
            let parsed = serde_json::from_str::<DiagnosticLine>(&line)
                .map(|d| (d.kind, d.problem))
                .with_context(|| format!("{}:{}: malformed diagnostic", self.origin, self.line_no));
            return Some(parsed);
        }
    }
}
