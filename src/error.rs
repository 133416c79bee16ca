use thiserror::Error;

use crate::html::ReportState;

#[derive(Debug, Error)]
pub enum ReportError {
    /// An operation was invoked outside the lifecycle state that allows it.
    #[error("report protocol violation: {operation} called while report is {state}")]
    ProtocolViolation { operation: &'static str, state: ReportState },
    #[error("report sink failed: {0}")]
    SinkIo(#[from] std::io::Error),
    #[error("template load failed: {0}")]
    TemplateLoad(String),
    #[error("model serialization failed: {0}")]
    Serialization(serde_json::Error),
    #[error("report data marker not found: {0}")]
    MissingMarker(&'static str),
}

// serde_json reports sink failures as its own error type; keep them classified as sink errors.
impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() { ReportError::SinkIo(e.into()) } else { ReportError::Serialization(e) }
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_from_serde_stay_sink_errors() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> { Err(std::io::Error::other("disk full")) }
            fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
        }
        let e = serde_json::to_writer(Broken, &vec![1, 2, 3]).unwrap_err();
        assert!(matches!(ReportError::from(e), ReportError::SinkIo(_)));
    }

    #[test]
    fn data_errors_are_serialization() {
        let e = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert!(matches!(ReportError::from(e), ReportError::Serialization(_)));
    }

    #[test]
    fn violation_message_names_operation_and_state() {
        let e = ReportError::ProtocolViolation { operation: "end_report", state: ReportState::NotStarted };
        assert_eq!(e.to_string(), "report protocol violation: end_report called while report is not started");
    }
}
