//! Output formatting for conversations.
//!
//! Renders a conversation's active branch as JSON, Markdown or plain text,
//! and formats conversation listings as tables.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{
    AppError, Branch, ConversationRecord, ConversationSummary, ExportFormat, Result, Sender,
};

/// Heading used when a conversation has no name.
const UNTITLED: &str = "Untitled Conversation";

/// Renders a conversation in the requested encoding.
///
/// JSON always carries the complete record; `include_metadata` only affects
/// Markdown and text output.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render(
    record: &ConversationRecord,
    branch: &Branch<'_>,
    format: ExportFormat,
    include_metadata: bool,
) -> Result<String> {
    match format {
        ExportFormat::Json => format_conversation_json(record),
        ExportFormat::Markdown => Ok(format_conversation_markdown(
            record,
            branch,
            include_metadata,
        )),
        ExportFormat::Text => Ok(format_conversation_text(record, branch, include_metadata)),
    }
}

/// Formats the received record as pretty-printed JSON.
///
/// Only the `model` field differs from what the service sent.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_conversation_json(record: &ConversationRecord) -> Result<String> {
    let value = record.to_json_value().map_err(AppError::json_parse)?;
    serde_json::to_string_pretty(&value).map_err(AppError::json_parse)
}

/// Formats a conversation branch as Markdown.
#[must_use]
pub fn format_conversation_markdown(
    record: &ConversationRecord,
    branch: &Branch<'_>,
    include_metadata: bool,
) -> String {
    let mut out = String::new();

    let title = if record.name.trim().is_empty() {
        UNTITLED
    } else {
        record.name.as_str()
    };
    out.push_str(&format!("# {title}\n\n"));

    if include_metadata {
        if let Some(dt) = record.created_at {
            out.push_str(&format!("**Created:** {}\n", display_timestamp(dt)));
        }
        if let Some(dt) = record.updated_at {
            out.push_str(&format!("**Updated:** {}\n", display_timestamp(dt)));
        }
        if let Some(model) = record.declared_model() {
            out.push_str(&format!("**Model:** {model}\n"));
        }
        out.push_str("\n---\n\n");
    }

    for message in branch {
        let label = match message.sender {
            Sender::Human => "**You**",
            Sender::Assistant => "**Claude**",
            Sender::Unknown => "**Unknown**",
        };
        out.push_str(&format!("{label}\n\n"));
        out.push_str(&message.body());
        out.push_str("\n\n");

        if include_metadata {
            if let Some(dt) = message.created_at {
                out.push_str(&format!("*{}*\n\n", display_timestamp(dt)));
            }
        }

        out.push_str("---\n\n");
    }

    out
}

/// Formats a conversation branch as a plain-text transcript.
///
/// Each sender is labelled with its full name the first time it speaks and
/// with a single letter afterwards.
#[must_use]
pub fn format_conversation_text(
    record: &ConversationRecord,
    branch: &Branch<'_>,
    include_metadata: bool,
) -> String {
    let mut out = String::new();

    if include_metadata {
        let name = if record.name.trim().is_empty() {
            UNTITLED
        } else {
            record.name.as_str()
        };
        out.push_str(&format!("Conversation: {name}\n"));
        if let Some(dt) = record.created_at {
            out.push_str(&format!("Created: {}\n", display_timestamp(dt)));
        }
        if let Some(dt) = record.updated_at {
            out.push_str(&format!("Updated: {}\n", display_timestamp(dt)));
        }
        if let Some(model) = record.declared_model() {
            out.push_str(&format!("Model: {model}\n"));
        }
        out.push('\n');
    }

    let mut seen = HashSet::new();
    for message in branch {
        let label = text_label(message.sender, seen.insert(message.sender));
        out.push_str(&format!("{label}: {}\n\n", message.body()));
    }

    out.trim_end().to_string()
}

const fn text_label(sender: Sender, first: bool) -> &'static str {
    match (sender, first) {
        (Sender::Human, true) => "Human",
        (Sender::Human, false) => "H",
        (Sender::Assistant, true) => "Assistant",
        (Sender::Assistant, false) => "A",
        (Sender::Unknown, true) => "Unknown",
        (Sender::Unknown, false) => "U",
    }
}

/// Formats a timestamp in the local time zone with a fixed
/// `M/D/YYYY, h:mm:ss AM` layout, independent of the system locale.
fn display_timestamp(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

/// Formats a table listing of conversations.
#[must_use]
pub fn format_conversations_table(conversations: &[ConversationSummary]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Updated", "Model", "Name"]);

    for conv in conversations {
        let updated = conv.updated_at.map_or_else(
            || "-".to_string(),
            |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        );

        let model = conv
            .declared_model()
            .map_or_else(|| "-".to_string(), |m| truncate(m, 28));

        table.add_row(vec![
            conv.short_id().to_string(),
            updated,
            model,
            truncate(conv.display_name(), 45),
        ]);
    }

    table.to_string()
}

/// Formats listing statistics: total count and conversations per model.
#[must_use]
pub fn format_listing_stats(
    shown: usize,
    total: usize,
    conversations: &[ConversationSummary],
) -> String {
    let mut per_model: BTreeMap<&str, usize> = BTreeMap::new();
    for conv in conversations {
        *per_model
            .entry(conv.declared_model().unwrap_or("unknown"))
            .or_default() += 1;
    }

    let mut out = format!(
        "{}\n  Showing: {} of {}",
        "📊 Conversations".bold(),
        shown.to_string().cyan(),
        total.to_string().cyan()
    );
    for (model, count) in per_model {
        out.push_str(&format!("\n  {model}: {}", count.to_string().green()));
    }
    out
}

/// Truncates a string to max length (in characters) with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
