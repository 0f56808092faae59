//! Application layer - use cases and orchestration.
//!
//! This layer contains the export pipeline: model inference, branch
//! reconstruction, rendering, listing queries and bulk export.

pub mod batch;
pub mod branch;
pub mod exporter;
pub mod formatter;
pub mod listing;
pub mod model_inference;

pub use batch::{BatchExporter, BatchSettings};
pub use exporter::{export_conversation, ExportOptions};
pub use formatter::{format_conversations_table, format_listing_stats};
pub use listing::{ListQuery, SortKey};
pub use model_inference::apply_inferred_model_to_summary;
