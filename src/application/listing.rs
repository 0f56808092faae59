//! Searching, filtering and sorting conversation listings.

use std::cmp::Ordering;

use crate::domain::ConversationSummary;

/// Field used to order a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Last update time.
    #[default]
    Updated,
    /// Creation time.
    Created,
    /// Conversation name, case-insensitive.
    Name,
    /// Model identifier.
    Model,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "updated" | "updated_at" => Ok(Self::Updated),
            "created" | "created_at" => Ok(Self::Created),
            "name" => Ok(Self::Name),
            "model" => Ok(Self::Model),
            _ => Err(format!("Unknown sort key: {s}. Use: updated, created, name, model")),
        }
    }
}

/// Listing options.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring matched against name and summary.
    pub search: Option<String>,
    /// Case-insensitive substring matched against the model.
    pub model: Option<String>,
    pub sort: SortKey,
    /// Oldest / A-Z first instead of newest / Z-A first.
    pub ascending: bool,
    /// Maximum number of results (0 = no limit).
    pub limit: usize,
}

impl ListQuery {
    /// Filters, sorts and truncates conversations.
    ///
    /// Model matching looks at the `model` field as-is, so infer models
    /// first when undeclared ones should match too.
    #[must_use]
    pub fn apply(&self, conversations: Vec<ConversationSummary>) -> Vec<ConversationSummary> {
        let search = normalized(self.search.as_deref());
        let model = normalized(self.model.as_deref());

        let mut result: Vec<ConversationSummary> = conversations
            .into_iter()
            .filter(|c| search.as_deref().is_none_or(|q| matches_search(c, q)))
            .filter(|c| {
                model.as_deref().is_none_or(|q| {
                    c.declared_model()
                        .is_some_and(|m| m.to_lowercase().contains(q))
                })
            })
            .collect();

        result.sort_by(|a, b| {
            let ord = compare(a, b, self.sort);
            if self.ascending {
                ord
            } else {
                ord.reverse()
            }
        });

        if self.limit > 0 {
            result.truncate(self.limit);
        }

        tracing::debug!(matched = result.len(), "Applied listing query");
        result
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn matches_search(conv: &ConversationSummary, query: &str) -> bool {
    conv.name.to_lowercase().contains(query)
        || conv
            .summary
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(query))
}

fn compare(a: &ConversationSummary, b: &ConversationSummary, key: SortKey) -> Ordering {
    match key {
        SortKey::Updated => a.updated_at.cmp(&b.updated_at),
        SortKey::Created => a.created_at.cmp(&b.created_at),
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Model => a.declared_model().cmp(&b.declared_model()),
    }
    .then_with(|| a.uuid.cmp(&b.uuid))
}
