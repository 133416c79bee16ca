//! Self-contained HTML problem reports with an embedded, extractable JSON model.
//!
//! - `html`: the report writer and its lifecycle.
//! - `json_model`: the streaming model serializer trait and the default JSON writer.
//! - `template`: HTML template providers (static, file, bundled).
//! - `model`: diagnostic and summary types.
//! - `extract`: reading the model back out of a finished report.
pub mod error;
pub mod extract;
pub mod html;
pub mod json_model;
pub mod model;
pub mod template;

pub use error::{ReportError, Result};
pub use html::{HtmlReportWriter, ReportState, write_report};
pub use json_model::{JsonModelWriter, ModelSerializer};
pub use model::{DecoratedReportProblem, DiagnosticKind, ProblemReportDetails};
pub use template::{BuiltinTemplate, FileTemplate, StaticTemplate, Template, TemplateProvider};
