//! Active-branch reconstruction.
//!
//! Edits and regenerations turn a conversation into a tree; only the path
//! ending at the current leaf is exported.

use std::collections::{HashMap, HashSet};

use crate::domain::{Branch, ConversationRecord, Message};

/// Returns the root-to-leaf path ending at the record's current leaf.
///
/// Empty when there are no messages or the leaf does not resolve. The walk
/// stops at a message whose parent is absent or unknown, so a dangling parent
/// reference yields a shorter branch instead of an error. A cycle in parent
/// pointers ends the walk at the first repeated message.
#[must_use]
pub fn reconstruct_branch(record: &ConversationRecord) -> Branch<'_> {
    let Some(leaf_id) = record.current_leaf_message_uuid.as_deref() else {
        return Vec::new();
    };
    if record.chat_messages.is_empty() {
        return Vec::new();
    }

    let by_id: HashMap<&str, &Message> = record
        .chat_messages
        .iter()
        .map(|m| (m.uuid.as_str(), m))
        .collect();

    let mut branch = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = by_id.get(leaf_id).copied();

    while let Some(message) = cursor {
        if !visited.insert(message.uuid.as_str()) {
            tracing::warn!(
                conversation = %record.uuid,
                message = %message.uuid,
                "Cycle in message parents, truncating branch"
            );
            break;
        }
        branch.push(message);
        cursor = message
            .parent_message_uuid
            .as_deref()
            .and_then(|parent| by_id.get(parent).copied());
    }

    branch.reverse();
    branch
}
