//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models and error types
//! without any I/O of its own.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod source;

pub use config::{ApiConfig, AppConfig, ExportConfig, TimelineEntry};
pub use error::{AppError, Result};
pub use export::{
    ArchiveEntry, BatchOutcome, ExportArchive, ExportJob, ExportProgress, ExportSummary,
    ExportedDocument, SUMMARY_FILE_NAME,
};
pub use models::{Branch, ConversationRecord, ConversationSummary, ExportFormat, Message, Sender};
pub use source::ConversationSource;
