//! Export job and result types.
//!
//! Everything the exporter hands back to the CLI layer: single rendered
//! documents, bulk archives with their summary, and progress snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::models::{ConversationSummary, ExportFormat};

/// File name of the machine-readable summary inside every archive.
pub const SUMMARY_FILE_NAME: &str = "export_summary.json";

/// A bulk export request.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Conversations to export, in order.
    pub conversations: Vec<ConversationSummary>,
    pub format: ExportFormat,
    pub include_metadata: bool,
    /// Cancelled by the user to stop before the next batch.
    pub cancel: CancellationToken,
}

impl ExportJob {
    #[must_use]
    pub fn new(
        conversations: Vec<ConversationSummary>,
        format: ExportFormat,
        include_metadata: bool,
    ) -> Self {
        Self {
            conversations,
            format,
            include_metadata,
            cancel: CancellationToken::new(),
        }
    }
}

/// Running totals for a bulk export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportProgress {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    /// Names of conversations that could not be exported.
    pub failed_conversations: Vec<String>,
}

impl ExportProgress {
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            total,
            failed_conversations: Vec::new(),
        }
    }

    /// Conversations attempted so far.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// A single rendered document ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// One named file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Machine-readable summary stored alongside exported conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub exported_at: DateTime<Utc>,
    pub total_conversations: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub format: ExportFormat,
    pub include_metadata: bool,
    pub failed_conversations: Vec<String>,
}

/// Named collection of rendered conversations plus the summary entry.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    /// Conversation files followed by `export_summary.json`.
    pub entries: Vec<ArchiveEntry>,
    pub summary: ExportSummary,
}

impl ExportArchive {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Looks up an entry by file name.
    #[cfg(test)]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Final state of a bulk export.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// Every conversation was attempted.
    Completed(ExportArchive),
    /// The user cancelled; partial output was discarded.
    Cancelled(ExportProgress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_clone_shares_cancellation() {
        let job = ExportJob::new(Vec::new(), ExportFormat::Text, true);
        let handle = job.cancel.clone();
        assert!(!job.cancel.is_cancelled());
        handle.cancel();
        assert!(job.cancel.is_cancelled());
    }

    #[test]
    fn test_progress_processed() {
        let mut progress = ExportProgress::new(5);
        progress.succeeded = 3;
        progress.failed = 1;
        assert_eq!(progress.processed(), 4);
    }

    #[test]
    fn test_summary_serializes_format_lowercase() {
        let summary = ExportSummary {
            exported_at: Utc::now(),
            total_conversations: 2,
            succeeded: 1,
            failed: 1,
            format: ExportFormat::Markdown,
            include_metadata: false,
            failed_conversations: vec!["Broken".into()],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["format"], "markdown");
        assert_eq!(json["failed_conversations"][0], "Broken");
    }
}
