//! Infrastructure layer - external adapters (HTTP API, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod api_client;
pub mod archive_writer;
pub mod config;

pub use api_client::ClaudeClient;
pub use archive_writer::{archive_name, write_archive, write_document};
pub use config::{config_file_path, ensure_config_exists, load_config};
