use std::path::PathBuf;

use crate::error::{ReportError, Result};

/// Line in a template file that marks where the generated report data goes.
pub const INSERTION_POINT: &str = r#"<script type="text/javascript" src="report-data.js"></script>"#;

const BUILTIN: &str = include_str!("../assets/report-template.html");

/// The HTML shell around the report data, split at the insertion point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    pub head: String,
    pub tail: String,
}

pub trait TemplateProvider {
    fn load(&self) -> Result<Template>;
}

/// Head and tail given directly, no insertion point involved.
#[derive(Clone, Debug)]
pub struct StaticTemplate(Template);

impl StaticTemplate {
    pub fn new(head: impl Into<String>, tail: impl Into<String>) -> Self {
        Self(Template { head: head.into(), tail: tail.into() })
    }
}

impl TemplateProvider for StaticTemplate {
    fn load(&self) -> Result<Template> { Ok(self.0.clone()) }
}

#[derive(Clone, Debug)]
pub struct FileTemplate { path: PathBuf }

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl TemplateProvider for FileTemplate {
    fn load(&self) -> Result<Template> {
        let src = std::fs::read_to_string(&self.path)
            .map_err(|e| ReportError::TemplateLoad(format!("{}: {}", self.path.to_string_lossy(), e)))?;
        log::debug!("loaded report template {} ({} bytes)", self.path.to_string_lossy(), src.len());
        split_template(&src, &self.path.to_string_lossy())
    }
}

/// The report page bundled with the binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinTemplate;

impl TemplateProvider for BuiltinTemplate {
    fn load(&self) -> Result<Template> { split_template(BUILTIN, "builtin template") }
}

/// Splits `src` around the single [`INSERTION_POINT`]. The line break ending the
/// placeholder line belongs to neither half.
pub fn split_template(src: &str, origin: &str) -> Result<Template> {
    let mut found = src.match_indices(INSERTION_POINT);
    let Some((at, _)) = found.next() else {
        return Err(ReportError::TemplateLoad(format!("{}: insertion point `{}` not found", origin, INSERTION_POINT)));
    };
    if found.next().is_some() {
        return Err(ReportError::TemplateLoad(format!("{}: insertion point appears more than once", origin)));
    }
    let head = &src[..at];
    let rest = &src[at + INSERTION_POINT.len()..];
    let tail = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')).unwrap_or(rest);
    Ok(Template { head: head.to_string(), tail: tail.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn splits_around_placeholder_line() {
        let src = format!("<html><body>\n{}\n</body></html>\n", INSERTION_POINT);
        let t = split_template(&src, "t").unwrap();
        assert_eq!(t.head, "<html><body>\n");
        assert_eq!(t.tail, "</body></html>\n");
    }

    #[test]
    fn crlf_after_placeholder_is_dropped() {
        let src = format!("<p>\r\n{}\r\n</p>", INSERTION_POINT);
        let t = split_template(&src, "t").unwrap();
        assert_eq!(t.head, "<p>\r\n");
        assert_eq!(t.tail, "</p>");
    }

    #[test]
    fn missing_placeholder_fails() {
        let err = split_template("<html></html>", "t").unwrap_err();
        assert!(matches!(err, ReportError::TemplateLoad(ref m) if m.contains("not found")));
    }

    #[test]
    fn duplicate_placeholder_fails() {
        let src = format!("{0}\n{0}\n", INSERTION_POINT);
        assert!(matches!(split_template(&src, "t"), Err(ReportError::TemplateLoad(_))));
    }

    #[test]
    fn builtin_template_splits() {
        let t = BuiltinTemplate.load().unwrap();
        assert!(t.head.contains("<html"));
        assert!(t.tail.contains("</html>"));
        assert!(t.tail.contains("configurationCacheProblems()"));
    }

    #[test]
    fn builtin_template_escapes_attributes_and_filters_links() {
        let t = BuiltinTemplate.load().unwrap();
        assert!(t.tail.contains(".replace(/\"/g,'&quot;')"));
        assert!(t.tail.contains(".replace(/'/g,'&#39;')"));
        assert!(t.tail.contains("/^https?:\\/\\//i.test("));
        assert!(t.tail.contains("link(model.documentationLink,"));
        assert!(t.tail.contains("link(d.documentationLink,"));
        assert!(!t.tail.contains("href=\"'+esc(d."));
    }

    #[test]
    fn file_template_reads_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "<html><body>\n{}\n</body></html>", INSERTION_POINT).unwrap();
        let t = FileTemplate::new(f.path()).load().unwrap();
        assert_eq!(t.head, "<html><body>\n");
        assert_eq!(t.tail, "</body></html>");
    }

    #[test]
    fn missing_file_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileTemplate::new(dir.path().join("nope.html")).load().unwrap_err();
        assert!(matches!(err, ReportError::TemplateLoad(_)));
    }

    #[test]
    fn static_template_is_verbatim() {
        let t = StaticTemplate::new("<a>", "</a>").load().unwrap();
        assert_eq!(t, Template { head: "<a>".into(), tail: "</a>".into() });
    }
}
