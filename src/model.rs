use serde::{Deserialize, Serialize};

/// Category of a diagnostic. The serializer uses it as the key of the diagnostic's message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind { Problem, Incompatible, Input }

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 3] = [DiagnosticKind::Problem, DiagnosticKind::Incompatible, DiagnosticKind::Input];

    pub fn key(self) -> &'static str {
        match self {
            DiagnosticKind::Problem => "problem",
            DiagnosticKind::Incompatible => "incompatible",
            DiagnosticKind::Input => "input",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageFragment {
    Text(String),
    /// A reference to a named thing (task path, type, property), rendered as code by the report UI.
    Name(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredMessage(pub Vec<MessageFragment>);

impl StructuredMessage {
    pub fn new() -> Self { Self::default() }
    pub fn text(mut self, s: impl Into<String>) -> Self { self.0.push(MessageFragment::Text(s.into())); self }
    pub fn reference(mut self, s: impl Into<String>) -> Self { self.0.push(MessageFragment::Name(s.into())); self }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl std::fmt::Display for StructuredMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for frag in &self.0 {
            match frag {
                MessageFragment::Text(t) => f.write_str(t)?,
                MessageFragment::Name(n) => write!(f, "'{}'", n)?,
            }
        }
        Ok(())
    }
}

/// One step of the location chain that led to a problem, outermost first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceElement {
    Task { path: String, #[serde(rename = "type")] task_type: String },
    Bean { #[serde(rename = "type")] bean_type: String },
    Field { name: String, #[serde(rename = "declaringType")] declaring_type: String },
    InputProperty { name: String },
    BuildLogic { location: String },
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackTracePart {
    Text(String),
    /// Frames from the tool's own internals, collapsed by default in the report UI.
    InternalText(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedFailure {
    pub summary: StructuredMessage,
    #[serde(default)]
    pub parts: Vec<StackTracePart>,
}

/// A diagnostic as produced by upstream analysis. Passed through to the serializer untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedReportProblem {
    #[serde(default)]
    pub trace: Vec<TraceElement>,
    pub message: StructuredMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DecoratedFailure>,
}

impl DecoratedReportProblem {
    pub fn new(trace: Vec<TraceElement>, message: StructuredMessage) -> Self {
        Self { trace, message, documentation_link: None, failure: None }
    }
}

/// Aggregate summary, only known once every diagnostic has been written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemReportDetails {
    pub total_problem_count: usize,
    pub build_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_tasks: Option<String>,
    pub cache_action: String,
    #[serde(default)]
    pub cache_action_description: StructuredMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_link: Option<String>,
}
