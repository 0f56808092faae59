//! Data source abstraction.
//!
//! The exporter only needs two reads from the conversation service; the HTTP
//! client and test fakes implement this trait.

use async_trait::async_trait;

use super::error::Result;
use super::models::{ConversationRecord, ConversationSummary};

/// Supplies conversation summaries and full records.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// Lists every conversation of an organization.
    ///
    /// # Errors
    /// Returns `AppError::Transport` on a non-success response or network failure.
    async fn list_conversations(&self, org_id: &str) -> Result<Vec<ConversationSummary>>;

    /// Fetches one conversation including its full message tree.
    ///
    /// # Errors
    /// Returns `AppError::Transport` on a non-success response or network failure.
    async fn get_conversation(
        &self,
        org_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationRecord>;
}
