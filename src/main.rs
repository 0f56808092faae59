//! Claude Chat Export - list, search and export Claude conversations.
//!
//! Talks to the Claude conversation API, rebuilds the active branch of each
//! conversation and writes it as JSON, Markdown or plain text. Bulk exports
//! run in small concurrent batches and end with an `export_summary.json`.
//!
//! QUICK START:
//!   claude-export config init                # Write a config file to edit
//!   claude-export list --search rust         # Find conversations
//!   claude-export export <id> -f text        # Export one conversation
//!   claude-export export-all -f markdown     # Export everything into a .tar.gz

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::Path;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    apply_inferred_model_to_summary, export_conversation, format_conversations_table,
    format_listing_stats, BatchExporter, BatchSettings, ExportOptions, ListQuery, SortKey,
};
use cli::{parse_format, Cli, Commands, ConfigAction, FilterArgs};
use domain::{
    AppConfig, AppError, BatchOutcome, ConversationSource, ConversationSummary, ExportJob,
    ExportProgress, SUMMARY_FILE_NAME,
};
use infrastructure::{
    archive_name, config_file_path, ensure_config_exists, load_config, write_archive,
    write_document, ClaudeClient,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    if let Commands::Config { action } = &cli.command {
        return cmd_config(action, cli.config_path.as_deref());
    }

    let mut config = load_config(cli.config_path.as_deref())?;
    if let Some(org) = cli.org {
        config.api.organization_id = Some(org);
    }

    match cli.command {
        Commands::List {
            filter,
            sort,
            asc,
            limit,
        } => {
            let sort = sort
                .parse::<SortKey>()
                .map_err(|message| AppError::Config { message })?;
            cmd_list(&config, &filter.query(sort, asc, limit)).await?;
        }
        Commands::Export {
            conversation_id,
            format,
            output,
            no_metadata,
            stdout,
        } => {
            let options = export_options(&config, format.as_deref(), no_metadata)?;
            cmd_export(&config, &conversation_id, &options, output.as_deref(), stdout).await?;
        }
        Commands::ExportAll {
            filter,
            format,
            dir,
            no_metadata,
            limit,
        } => {
            let options = export_options(&config, format.as_deref(), no_metadata)?;
            let dir = dir.unwrap_or_else(|| config.export.output_dir.clone());
            cmd_export_all(&config, &filter, limit, &options, &dir).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Resolves format and metadata flags against configured defaults.
fn export_options(
    config: &AppConfig,
    format: Option<&str>,
    no_metadata: bool,
) -> domain::Result<ExportOptions> {
    Ok(ExportOptions {
        format: parse_format(format, config.export.format)
            .map_err(|message| AppError::Config { message })?,
        include_metadata: config.export.include_metadata && !no_metadata,
        timeline: config.models.timeline.clone(),
    })
}

fn require_org(config: &AppConfig) -> domain::Result<&str> {
    config
        .api
        .organization_id
        .as_deref()
        .filter(|org| !org.trim().is_empty())
        .ok_or_else(|| AppError::Config {
            message: "No organization ID. Pass --org, set CLAUDE_ORG_ID or api.organization_id"
                .into(),
        })
}

/// Fetches summaries and materializes their models.
async fn fetch_summaries(
    client: &dyn ConversationSource,
    config: &AppConfig,
    org: &str,
) -> domain::Result<Vec<ConversationSummary>> {
    let mut conversations = client.list_conversations(org).await?;
    for conv in &mut conversations {
        apply_inferred_model_to_summary(conv, &config.models.timeline);
    }
    Ok(conversations)
}

/// List conversations command.
async fn cmd_list(config: &AppConfig, query: &ListQuery) -> domain::Result<()> {
    let org = require_org(config)?;
    let client = ClaudeClient::new(&config.api)?;

    let conversations = fetch_summaries(&client, config, org).await?;
    let total = conversations.len();
    let shown = query.apply(conversations);

    println!("{}", format_conversations_table(&shown));
    println!();
    println!("{}", format_listing_stats(shown.len(), total, &shown));

    Ok(())
}

/// Export a single conversation to a file or stdout.
async fn cmd_export(
    config: &AppConfig,
    conversation_id: &str,
    options: &ExportOptions,
    output: Option<&Path>,
    stdout: bool,
) -> domain::Result<()> {
    let org = require_org(config)?;
    let client = ClaudeClient::new(&config.api)?;

    let document = export_conversation(&client, org, conversation_id, options).await?;

    if stdout {
        println!("{}", String::from_utf8_lossy(&document.bytes));
        return Ok(());
    }

    let written = write_document(&document, output.unwrap_or_else(|| Path::new(".")))?;
    println!(
        "{} Exported {} ({}) to {}",
        "✓".green().bold(),
        conversation_id,
        document.media_type,
        written.display()
    );

    Ok(())
}

/// Export many conversations into a timestamped `.tar.gz` archive.
async fn cmd_export_all(
    config: &AppConfig,
    filter: &FilterArgs,
    limit: usize,
    options: &ExportOptions,
    dir: &Path,
) -> domain::Result<()> {
    let org = require_org(config)?;
    let client = ClaudeClient::new(&config.api)?;

    let conversations = filter
        .query(SortKey::Updated, false, limit)
        .apply(fetch_summaries(&client, config, org).await?);

    if conversations.is_empty() {
        println!("{} No conversations match.", "!".yellow().bold());
        return Ok(());
    }

    let job = ExportJob::new(conversations, options.format, options.include_metadata);
    println!(
        "{} Exporting {} conversations as {} (Ctrl-C to cancel)",
        "📦".bold(),
        job.conversations.len().to_string().cyan(),
        options.format
    );

    let interrupts = tokio::spawn(watch_interrupts(
        Box::pin(ctrl_c_presses()),
        job.cancel.clone(),
        || {
            eprintln!("{} Aborted.", "✗".red().bold());
            std::process::exit(130);
        },
    ));

    let reporter = |p: &ExportProgress| {
        println!(
            "  {} {}/{} done, {} failed",
            "→".blue(),
            p.processed(),
            p.total,
            p.failed
        );
    };

    let exporter = BatchExporter::new(
        &client,
        org,
        &config.models.timeline,
        BatchSettings::from(&config.export),
    );
    let result = exporter
        .run(&job, &reporter)
        .await
        .and_then(|outcome| finish_export(outcome, dir));
    interrupts.abort();

    result
}

/// Writes a completed archive and prints the outcome.
fn finish_export(outcome: BatchOutcome, dir: &Path) -> domain::Result<()> {
    match outcome {
        BatchOutcome::Completed(archive) => {
            let file = write_archive(&archive, dir, &archive_name(Local::now()))?;
            let summary = &archive.summary;
            if archive.has_failures() {
                println!(
                    "\n{} Exported {} of {} conversations to {} ({} failed, see {})",
                    "⚠".yellow().bold(),
                    summary.succeeded,
                    summary.total_conversations,
                    file.display(),
                    summary.failed.to_string().red(),
                    SUMMARY_FILE_NAME
                );
            } else {
                println!(
                    "\n{} Exported {} conversations to {}",
                    "📁".bold(),
                    summary.succeeded,
                    file.display()
                );
            }
        }
        BatchOutcome::Cancelled(progress) => {
            println!(
                "\n{} Export cancelled after {} of {} conversations; nothing was written.",
                "✗".red().bold(),
                progress.processed(),
                progress.total
            );
        }
    }

    Ok(())
}

/// Every Ctrl-C received by the process, until the handler fails.
fn ctrl_c_presses() -> impl Stream<Item = ()> + Send {
    stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    })
}

/// The first interrupt cancels the job after its current batch; a second
/// one calls `force`.
async fn watch_interrupts<S>(mut interrupts: S, cancel: CancellationToken, force: impl FnOnce())
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return;
    }
    eprintln!(
        "{} Cancelling after the current batch (Ctrl-C again to abort)...",
        "!".yellow().bold()
    );
    cancel.cancel();

    if interrupts.next().await.is_some() {
        force();
    }
}

/// Configuration file commands.
fn cmd_config(action: &ConfigAction, path: Option<&Path>) -> domain::Result<()> {
    let path = path.map_or_else(config_file_path, Path::to_path_buf);

    match action {
        ConfigAction::Init => {
            if ensure_config_exists(&path)? {
                println!("{} Created {}", "✓".green().bold(), path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
        ConfigAction::Show => {
            let mut config = if path.exists() {
                load_config(Some(path.as_path()))?
            } else {
                load_config(None)?
            };
            if config.api.session_key.is_some() {
                config.api.session_key = Some("********".into());
            }
            let content = toml::to_string_pretty(&config).map_err(|e| AppError::Config {
                message: format!("Failed to serialize config: {e}"),
            })?;
            println!("{content}");
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
