use crate::error::{ReportError, Result};
use crate::html::{BEGIN_MARKER, END_MARKER};

/// Returns the model text embedded in a report: everything strictly between the
/// begin and end marker lines, without the line breaks around it.
pub fn extract_model(report: &str) -> Result<&str> {
    let (_, body_start) = find_line(report, BEGIN_MARKER, 0).ok_or(ReportError::MissingMarker(BEGIN_MARKER))?;
    let (body_end, _) = find_line(report, END_MARKER, body_start).ok_or(ReportError::MissingMarker(END_MARKER))?;
    Ok(report[body_start..body_end].trim_matches(['\n', '\r']))
}

pub fn parse_model(report: &str) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(extract_model(report)?)?)
}

/// Byte range `(start, end)` of the first line at or after `from` equal to `needle`;
/// `end` includes the line break.
fn find_line(text: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    let mut pos = from;
    for line in text[from..].split_inclusive('\n') {
        let start = pos;
        pos += line.len();
        if line.trim_end_matches(['\r', '\n']) == needle { return Some((start, pos)); }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html>\n<script type=\"text/javascript\">\nfunction configurationCacheProblems() { return (\n// begin-report-data\n{\"diagnostics\":[]}\n// end-report-data\n);}\n</script>\n</html>";

    #[test]
    fn slices_between_markers() {
        assert_eq!(extract_model(PAGE).unwrap(), "{\"diagnostics\":[]}");
        assert_eq!(parse_model(PAGE).unwrap()["diagnostics"], serde_json::json!([]));
    }

    #[test]
    fn handles_crlf_pages() {
        let page = PAGE.replace('\n', "\r\n");
        assert_eq!(extract_model(&page).unwrap(), "{\"diagnostics\":[]}");
    }

    #[test]
    fn marker_must_be_whole_line() {
        let page = "x // begin-report-data\n{}\n// end-report-data\n";
        assert!(matches!(extract_model(page), Err(ReportError::MissingMarker(BEGIN_MARKER))));
    }

    #[test]
    fn end_marker_before_begin_is_missing() {
        let page = "// end-report-data\n// begin-report-data\n{}\n";
        assert!(matches!(extract_model(page), Err(ReportError::MissingMarker(END_MARKER))));
    }

    #[test]
    fn invalid_payload_is_serialization_error() {
        let page = "// begin-report-data\n{\"diagnostics\":[\n// end-report-data\n";
        assert!(matches!(parse_model(page), Err(ReportError::Serialization(_))));
    }
}
