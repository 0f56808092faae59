//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::{ListQuery, SortKey};
use crate::domain::ExportFormat;

/// Claude Chat Export - list, search and export Claude conversations.
#[derive(Parser, Debug)]
#[command(name = "claude-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config_path: Option<PathBuf>,

    /// Organization ID (overrides config and CLAUDE_ORG_ID).
    #[arg(long, global = true)]
    pub org: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List conversations (summary table).
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Sort by: updated, created, name, model.
        #[arg(short, long, default_value = "updated")]
        sort: String,

        /// Sort ascending instead of descending.
        #[arg(long)]
        asc: bool,

        /// Maximum number of conversations to show (0 = all).
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Export a single conversation.
    Export {
        /// Conversation ID.
        conversation_id: String,

        /// Output format: json, markdown, or text (config default if omitted).
        #[arg(short, long)]
        format: Option<String>,

        /// Output file or directory (current directory if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Omit created/updated/model metadata.
        #[arg(long)]
        no_metadata: bool,

        /// Print to stdout instead of writing a file.
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Export many conversations into a new .tar.gz archive.
    ExportAll {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output format: json, markdown, or text (config default if omitted).
        #[arg(short, long)]
        format: Option<String>,

        /// Parent directory for the archive (config default if omitted).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Omit created/updated/model metadata.
        #[arg(long)]
        no_metadata: bool,

        /// Export only the N most recently updated matches (0 = all).
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Search and model filters shared by listing and bulk export.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive text matched against name and summary.
    #[arg(short = 'q', long)]
    pub search: Option<String>,

    /// Case-insensitive text matched against the (inferred) model.
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file if none exists.
    Init,
    /// Print the effective configuration.
    Show,
    /// Print the configuration file path.
    Path,
}

impl FilterArgs {
    /// Builds a listing query from these filters.
    pub fn query(&self, sort: SortKey, ascending: bool, limit: usize) -> ListQuery {
        ListQuery {
            search: self.search.clone(),
            model: self.model.clone(),
            sort,
            ascending,
            limit,
        }
    }
}

/// Parses an optional format argument, falling back to `default`.
pub fn parse_format(value: Option<&str>, default: ExportFormat) -> Result<ExportFormat, String> {
    value.map_or(Ok(default), str::parse)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_all() {
        let cli = Cli::parse_from([
            "claude-export",
            "export-all",
            "-f",
            "text",
            "--search",
            "rust",
            "--no-metadata",
            "--org",
            "org-1",
        ]);
        assert_eq!(cli.org.as_deref(), Some("org-1"));
        match cli.command {
            Commands::ExportAll {
                filter,
                format,
                no_metadata,
                ..
            } => {
                assert_eq!(filter.search.as_deref(), Some("rust"));
                assert_eq!(format.as_deref(), Some("text"));
                assert!(no_metadata);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(None, ExportFormat::Json), Ok(ExportFormat::Json));
        assert_eq!(
            parse_format(Some("md"), ExportFormat::Json),
            Ok(ExportFormat::Markdown)
        );
        assert!(parse_format(Some("pdf"), ExportFormat::Json).is_err());
    }

    #[test]
    fn test_filter_query() {
        let filter = FilterArgs {
            search: Some("x".into()),
            model: None,
        };
        let query = filter.query(SortKey::Name, true, 5);
        assert_eq!(query.search.as_deref(), Some("x"));
        assert_eq!(query.sort, SortKey::Name);
        assert_eq!(query.limit, 5);
    }
}
