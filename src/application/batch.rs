//! Bulk export orchestration.
//!
//! Conversations are fetched and rendered in fixed-size batches. A batch runs
//! concurrently on the calling task and must settle completely before the
//! next one starts, which caps in-flight requests at the batch size. A
//! failing conversation is recorded and skipped; it never aborts the job.
//! Cancellation is only observed between batches.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::domain::{
    AppError, ArchiveEntry, BatchOutcome, ConversationSource, ConversationSummary, ExportArchive,
    ExportConfig, ExportJob, ExportProgress, ExportSummary, Result, TimelineEntry,
    SUMMARY_FILE_NAME,
};

use super::exporter::{render_record, sanitize_filename, ExportOptions};

/// Receives a progress snapshot after every settled batch.
pub trait ProgressReporter: Send + Sync {
    fn on_batch(&self, progress: &ExportProgress);
}

impl<F> ProgressReporter for F
where
    F: Fn(&ExportProgress) + Send + Sync,
{
    fn on_batch(&self, progress: &ExportProgress) {
        self(progress);
    }
}

/// Batching policy.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Conversations processed concurrently.
    pub batch_size: usize,
    /// Pause inserted between consecutive batches.
    pub delay: Duration,
}

impl From<&ExportConfig> for BatchSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

/// Drives a bulk export against a conversation source.
pub struct BatchExporter<'a> {
    source: &'a dyn ConversationSource,
    org_id: &'a str,
    timeline: &'a [TimelineEntry],
    settings: BatchSettings,
}

impl<'a> BatchExporter<'a> {
    #[must_use]
    pub fn new(
        source: &'a dyn ConversationSource,
        org_id: &'a str,
        timeline: &'a [TimelineEntry],
        settings: BatchSettings,
    ) -> Self {
        Self {
            source,
            org_id,
            timeline,
            settings,
        }
    }

    /// Exports every conversation of the job.
    ///
    /// Returns [`BatchOutcome::Cancelled`] when the job's cancellation token fired
    /// before all batches started; rendered output is discarded in that case.
    ///
    /// # Errors
    /// Only fails if the summary cannot be serialized. Per-conversation
    /// failures are reported inside the archive summary instead.
    pub async fn run(
        &self,
        job: &ExportJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchOutcome> {
        let options = ExportOptions {
            format: job.format,
            include_metadata: job.include_metadata,
            timeline: self.timeline.to_vec(),
        };
        let batch_size = self.settings.batch_size.max(1);
        let mut progress = ExportProgress::new(job.conversations.len());
        let mut rendered: Vec<(&ConversationSummary, String)> = Vec::new();

        tracing::info!(
            total = progress.total,
            batch_size,
            format = %job.format,
            "Starting bulk export"
        );

        for (index, batch) in job.conversations.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }

            if job.cancel.is_cancelled() {
                tracing::info!(
                    processed = progress.processed(),
                    total = progress.total,
                    "Bulk export cancelled"
                );
                return Ok(BatchOutcome::Cancelled(progress));
            }

            tracing::debug!(batch = index + 1, size = batch.len(), "Exporting batch");

            let results = join_all(
                batch
                    .iter()
                    .map(|summary| self.export_one(summary, &options)),
            )
            .await;

            for (summary, result) in batch.iter().zip(results) {
                match result {
                    Ok(text) => {
                        progress.succeeded += 1;
                        rendered.push((summary, text));
                    }
                    Err(e) => {
                        tracing::warn!(
                            conversation = %summary.uuid,
                            name = %summary.display_name(),
                            transport = e.is_transport(),
                            error = %e,
                            "Conversation export failed"
                        );
                        progress.failed += 1;
                        progress
                            .failed_conversations
                            .push(summary.display_name().to_string());
                    }
                }
            }

            reporter.on_batch(&progress);
        }

        let summary = ExportSummary {
            exported_at: Utc::now(),
            total_conversations: progress.total,
            succeeded: progress.succeeded,
            failed: progress.failed,
            format: job.format,
            include_metadata: job.include_metadata,
            failed_conversations: progress.failed_conversations,
        };

        let mut entries = archive_entries(rendered, job.format.extension());
        entries.push(ArchiveEntry {
            name: SUMMARY_FILE_NAME.to_string(),
            bytes: serde_json::to_vec_pretty(&summary).map_err(AppError::json_parse)?,
        });

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk export finished"
        );

        Ok(BatchOutcome::Completed(ExportArchive { entries, summary }))
    }

    async fn export_one(
        &self,
        summary: &ConversationSummary,
        options: &ExportOptions,
    ) -> Result<String> {
        let mut record = self.source.get_conversation(self.org_id, &summary.uuid).await?;
        render_record(&mut record, options)
    }
}

/// Names rendered conversations after their sanitized names.
///
/// Names that collide (with each other or with the summary file) get a
/// ` (n)` suffix so nothing is overwritten.
fn archive_entries(
    rendered: Vec<(&ConversationSummary, String)>,
    ext: &str,
) -> Vec<ArchiveEntry> {
    let mut used: HashSet<String> = HashSet::from([SUMMARY_FILE_NAME.to_string()]);

    rendered
        .into_iter()
        .map(|(summary, text)| {
            let mut base = sanitize_filename(summary.name.trim());
            if base.is_empty() {
                base = sanitize_filename(&summary.uuid);
            }

            let mut name = format!("{base}.{ext}");
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{base} ({n}).{ext}");
                n += 1;
            }

            ArchiveEntry {
                name,
                bytes: text.into_bytes(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::{AppConfig, ConversationRecord, ExportFormat};

    /// In-memory source that records every fetch and fails selected ids.
    struct FakeSource {
        failing: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| (*s).to_string()).collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConversationSource for FakeSource {
        async fn list_conversations(&self, _org_id: &str) -> Result<Vec<ConversationSummary>> {
            Ok(summaries(7))
        }

        async fn get_conversation(&self, _org_id: &str, id: &str) -> Result<ConversationRecord> {
            self.fetched.lock().unwrap().push(id.to_string());
            if self.failing.contains(id) {
                return Err(AppError::status(500, "internal error"));
            }
            let record = serde_json::from_value(json!({
                "uuid": id,
                "name": format!("Chat {id}"),
                "model": "claude-test",
                "current_leaf_message_uuid": "m2",
                "chat_messages": [
                    {"uuid": "m1", "sender": "human", "text": format!("question {id}")},
                    {"uuid": "m2", "parent_message_uuid": "m1", "sender": "assistant", "text": "answer"}
                ]
            }))
            .map_err(AppError::json_parse)?;
            Ok(record)
        }
    }

    fn summaries(n: usize) -> Vec<ConversationSummary> {
        (1..=n)
            .map(|i| {
                serde_json::from_value(json!({
                    "uuid": format!("c{i}"),
                    "name": format!("Chat c{i}")
                }))
                .unwrap()
            })
            .collect()
    }

    fn settings() -> BatchSettings {
        BatchSettings {
            batch_size: 3,
            delay: Duration::ZERO,
        }
    }

    fn timeline() -> Vec<TimelineEntry> {
        AppConfig::default().models.timeline
    }

    #[tokio::test]
    async fn test_batches_of_three_with_partial_failure() {
        let source = FakeSource::new(&["c5"]);
        let timeline = timeline();
        let exporter = BatchExporter::new(&source, "org", &timeline, settings());
        let job = ExportJob::new(summaries(7), ExportFormat::Text, false);

        let reports = Mutex::new(Vec::new());
        let reporter = |p: &ExportProgress| {
            reports.lock().unwrap().push((p.succeeded, p.failed, p.total));
        };

        let outcome = exporter.run(&job, &reporter).await.unwrap();

        assert_eq!(
            *reports.lock().unwrap(),
            [(3, 0, 7), (5, 1, 7), (6, 1, 7)]
        );

        let BatchOutcome::Completed(archive) = outcome else {
            panic!("expected completed export");
        };
        assert_eq!(archive.summary.succeeded, 6);
        assert_eq!(archive.summary.failed, 1);
        assert_eq!(archive.summary.failed_conversations, ["Chat c5"]);
        assert!(archive.has_failures());
        assert_eq!(archive.entries.len(), 7);
        assert!(archive.entry("Chat c5.txt").is_none());
        assert_eq!(
            String::from_utf8(archive.entry("Chat c1.txt").unwrap().bytes.clone()).unwrap(),
            "Human: question c1\n\nAssistant: answer"
        );

        let summary: serde_json::Value =
            serde_json::from_slice(&archive.entry(SUMMARY_FILE_NAME).unwrap().bytes).unwrap();
        assert_eq!(summary["succeeded"], 6);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["format"], "text");
        assert_eq!(summary["include_metadata"], false);
        assert_eq!(summary["failed_conversations"], json!(["Chat c5"]));
    }

    #[tokio::test]
    async fn test_cancel_after_first_batch_discards_results() {
        let source = FakeSource::new(&[]);
        let timeline = timeline();
        let exporter = BatchExporter::new(&source, "org", &timeline, settings());
        let job = ExportJob::new(summaries(7), ExportFormat::Markdown, true);

        let cancel = job.cancel.clone();
        let reporter = move |_: &ExportProgress| cancel.cancel();

        let outcome = exporter.run(&job, &reporter).await.unwrap();

        let BatchOutcome::Cancelled(progress) = outcome else {
            panic!("expected cancelled export");
        };
        assert_eq!(progress.succeeded, 3);
        assert_eq!(source.fetched().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start_fetches_nothing() {
        let source = FakeSource::new(&[]);
        let timeline = timeline();
        let exporter = BatchExporter::new(&source, "org", &timeline, settings());
        let job = ExportJob::new(summaries(2), ExportFormat::Json, true);
        job.cancel.cancel();

        let outcome = exporter.run(&job, &|_: &ExportProgress| {}).await.unwrap();
        assert!(matches!(outcome, BatchOutcome::Cancelled(_)));
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_empty_job_produces_summary_only() {
        let source = FakeSource::new(&[]);
        let timeline = timeline();
        let exporter = BatchExporter::new(&source, "org", &timeline, settings());
        let job = ExportJob::new(Vec::new(), ExportFormat::Json, true);

        let BatchOutcome::Completed(archive) =
            exporter.run(&job, &|_: &ExportProgress| {}).await.unwrap()
        else {
            panic!("expected completed export");
        };
        assert_eq!(archive.entries.len(), 1);
        assert_eq!(archive.entries[0].name, SUMMARY_FILE_NAME);
        assert!(!archive.has_failures());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_batches() {
        let source = FakeSource::new(&[]);
        let timeline = timeline();
        let settings = BatchSettings {
            batch_size: 2,
            delay: Duration::from_millis(200),
        };
        let exporter = BatchExporter::new(&source, "org", &timeline, settings);
        let job = ExportJob::new(summaries(5), ExportFormat::Text, false);

        let start = tokio::time::Instant::now();
        exporter.run(&job, &|_: &ExportProgress| {}).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_archive_entries_deduplicate_names() {
        let convs: Vec<ConversationSummary> = vec![
            serde_json::from_value(json!({"uuid": "a", "name": "Notes/2024"})).unwrap(),
            serde_json::from_value(json!({"uuid": "b", "name": "Notes:2024"})).unwrap(),
            serde_json::from_value(json!({"uuid": "c", "name": ""})).unwrap(),
            serde_json::from_value(json!({"uuid": "d", "name": "export_summary"})).unwrap(),
        ];
        let rendered = convs.iter().map(|c| (c, String::new())).collect();
        let names: Vec<String> = archive_entries(rendered, "json")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(
            names,
            [
                "Notes_2024.json",
                "Notes_2024 (2).json",
                "c.json",
                "export_summary (2).json"
            ]
        );
    }
}
