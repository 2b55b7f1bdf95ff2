use thiserror::Error;

/// Output formats the CLI collaborator may request. The core emits no
/// on-disk format itself (§6); this crate is the one place that decides
/// how a `ContributorResult` stream looks serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    PlainText,
}

#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}
