//! Single-conversation export.
//!
//! Fetch, infer the model, reconstruct the active branch and render. Any
//! transport failure is returned to the caller as-is.

use crate::domain::{
    ConversationRecord, ConversationSource, ExportFormat, ExportedDocument, Result, TimelineEntry,
};

use super::branch::reconstruct_branch;
use super::formatter::render;
use super::model_inference::apply_inferred_model;

/// Characters that are not allowed in file names on common platforms.
const ILLEGAL_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are illegal in file names with `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Options shared by single and bulk exports.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub include_metadata: bool,
    /// Default-model timeline used for conversations without a model.
    pub timeline: Vec<TimelineEntry>,
}

/// Runs the model-inference, branch and render steps over a fetched record.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render_record(record: &mut ConversationRecord, options: &ExportOptions) -> Result<String> {
    apply_inferred_model(record, &options.timeline);
    let branch = reconstruct_branch(record);
    tracing::debug!(
        conversation = %record.uuid,
        messages = record.chat_messages.len(),
        branch = branch.len(),
        "Reconstructed active branch"
    );
    render(record, &branch, options.format, options.include_metadata)
}

/// File name for a single-conversation download: `claude-<name-or-id>.<ext>`.
#[must_use]
pub fn single_export_filename(record: &ConversationRecord, format: ExportFormat) -> String {
    let base = if record.name.trim().is_empty() {
        record.uuid.as_str()
    } else {
        record.name.as_str()
    };
    format!("claude-{}.{}", sanitize_filename(base), format.extension())
}

/// Exports one conversation.
///
/// # Errors
/// Returns the data source's error when the conversation cannot be fetched,
/// or a JSON error if rendering fails.
pub async fn export_conversation(
    source: &dyn ConversationSource,
    org_id: &str,
    conversation_id: &str,
    options: &ExportOptions,
) -> Result<ExportedDocument> {
    let mut record = source.get_conversation(org_id, conversation_id).await?;
    let text = render_record(&mut record, options)?;

    let document = ExportedDocument {
        file_name: single_export_filename(&record, options.format),
        media_type: options.format.media_type(),
        bytes: text.into_bytes(),
    };

    tracing::info!(
        conversation = %conversation_id,
        file = %document.file_name,
        bytes = document.bytes.len(),
        "Exported conversation"
    );

    Ok(document)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::{AppConfig, AppError, ConversationSummary};

    struct FixedSource {
        records: HashMap<String, ConversationRecord>,
    }

    #[async_trait]
    impl ConversationSource for FixedSource {
        async fn list_conversations(&self, _org_id: &str) -> Result<Vec<ConversationSummary>> {
            Ok(self.records.values().map(|r| r.conversation.clone()).collect())
        }

        async fn get_conversation(&self, _org_id: &str, id: &str) -> Result<ConversationRecord> {
            self.records
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::status(404, "not found"))
        }
    }

    fn source() -> FixedSource {
        let record: ConversationRecord = serde_json::from_value(json!({
            "uuid": "c-1",
            "name": "Plans: Q3/Q4?",
            "model": null,
            "created_at": "2024-08-01T12:00:00Z",
            "current_leaf_message_uuid": "b",
            "chat_messages": [
                {"uuid": "a", "sender": "human", "text": "Plan it"},
                {"uuid": "b", "parent_message_uuid": "a", "sender": "assistant", "text": "Done"}
            ]
        }))
        .unwrap();
        FixedSource {
            records: HashMap::from([("c-1".to_string(), record)]),
        }
    }

    fn options(format: ExportFormat) -> ExportOptions {
        ExportOptions {
            format,
            include_metadata: true,
            timeline: AppConfig::default().models.timeline,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("plain name"), "plain name");
    }

    #[tokio::test]
    async fn test_export_markdown_document() {
        let doc = export_conversation(&source(), "org", "c-1", &options(ExportFormat::Markdown))
            .await
            .unwrap();
        assert_eq!(doc.file_name, "claude-Plans_ Q3_Q4_.md");
        assert_eq!(doc.media_type, "text/markdown");
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("**Model:** claude-3-5-sonnet-20240620"));
        assert!(text.contains("**You**\n\nPlan it"));
    }

    #[tokio::test]
    async fn test_export_json_contains_inferred_model() {
        let doc = export_conversation(&source(), "org", "c-1", &options(ExportFormat::Json))
            .await
            .unwrap();
        let parsed: ConversationRecord = serde_json::from_slice(&doc.bytes).unwrap();
        assert_eq!(parsed.model.as_deref(), Some("claude-3-5-sonnet-20240620"));
        assert_eq!(parsed.chat_messages.len(), 2);
    }

    #[tokio::test]
    async fn test_export_surfaces_transport_error() {
        let err = export_conversation(&source(), "org", "missing", &options(ExportFormat::Text))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_single_filename_falls_back_to_id() {
        let mut record = source().records.remove("c-1").unwrap();
        record.conversation.name = String::new();
        assert_eq!(single_export_filename(&record, ExportFormat::Text), "claude-c-1.txt");
    }
}
