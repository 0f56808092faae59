//! Model inference for conversations without a declared model.
//!
//! Older conversations were stored before the service recorded the model.
//! Those are mapped to whichever model was the default when they were created.

use chrono::{DateTime, Utc};

use crate::domain::{ConversationRecord, ConversationSummary, TimelineEntry};

/// Returns the model for a conversation, declared or inferred.
///
/// A non-empty declared model is returned unchanged. Otherwise the timeline
/// (ascending by date) is walked from the newest entry backward and the first
/// entry effective on or before `created_at` wins. Conversations older than
/// every entry, or without a creation date, get the earliest entry. An empty
/// timeline yields an empty string; configuration loading rejects that case.
#[must_use]
pub fn infer_model(conversation: &ConversationSummary, timeline: &[TimelineEntry]) -> String {
    if let Some(model) = conversation.declared_model() {
        return model.to_string();
    }

    default_model_at(conversation.created_at, timeline)
        .map(|entry| entry.model.clone())
        .unwrap_or_default()
}

/// Writes the inferred model into the record.
///
/// This is the only mutation ever applied to a fetched record.
pub fn apply_inferred_model(record: &mut ConversationRecord, timeline: &[TimelineEntry]) {
    if record.declared_model().is_some() {
        return;
    }
    let model = infer_model(&record.conversation, timeline);
    tracing::debug!(conversation = %record.uuid, %model, "Inferred model");
    record.conversation.model = Some(model);
}

/// Same as [`apply_inferred_model`] for listing summaries.
pub fn apply_inferred_model_to_summary(
    summary: &mut ConversationSummary,
    timeline: &[TimelineEntry],
) {
    if summary.declared_model().is_none() {
        summary.model = Some(infer_model(summary, timeline));
    }
}

fn default_model_at(
    created_at: Option<DateTime<Utc>>,
    timeline: &[TimelineEntry],
) -> Option<&TimelineEntry> {
    created_at
        .and_then(|at| timeline.iter().rev().find(|e| e.effective_at() <= at))
        .or_else(|| timeline.first())
}
