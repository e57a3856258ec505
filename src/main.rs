//! storax - a crash-safe file-operation engine.
//!
//! Usage:
//!   storax ls <TARGET>               List a directory
//!   storax tree <TARGET>             Traverse recursively
//!   storax create <PARENT> <NAME>    Create a file or directory
//!   storax rename <SOURCE> <NAME>    Rename in place
//!   storax copy <SOURCE> <DEST>      Copy with integrity verification
//!   storax move <SOURCE> <DEST>      Move (atomic or transactional)
//!   storax rm <TARGET>               Move to trash (or delete permanently)
//!   storax trash <COMMAND>           Inspect and manage the trash
//!   storax undo | redo               Walk the undo log
//!   storax recover                   Drain pending journals and WALs

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing_subscriber::EnvFilter;

use storax_backend::{BackendRouter, DirTreeProvider, HandleBackend, PathBackend};
use storax_core::{ConflictPolicy, EngineConfig, NodeType};
use storax_ops::{CopyStarted, EngineEvent, Storax};

#[derive(Parser)]
#[command(
    name = "storax",
    version,
    about = "Crash-safe file operations with trash, undo, and resumable transfers",
    long_about = "storax drives create, rename, copy, move, and delete-to-trash through \
                  a durable transaction layer. Interrupted operations are recovered on \
                  the next start."
)]
struct Cli {
    /// App-private data directory (journal, WALs, undo, trash index)
    #[arg(long, default_value = ".storax")]
    data_dir: PathBuf,

    /// Root directory exposed as the doc:// handle tree
    #[arg(long)]
    doc_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls { target: String },

    /// Traverse a directory breadth-first
    Tree {
        target: String,

        /// Maximum depth (-1 = unlimited)
        #[arg(short, long, default_value = "-1")]
        depth: i32,
    },

    /// Create an empty file or directory
    Create {
        parent: String,
        name: String,

        /// Create a directory instead of a file
        #[arg(short, long)]
        dir: bool,

        /// Conflict policy code (0 fail, 1 replace, 2 rename-new, 3 manual)
        #[arg(short, long, default_value = "0")]
        policy: u8,

        /// Manual name for policy 3
        #[arg(short, long)]
        manual: Option<String>,
    },

    /// Rename a node in place
    Rename {
        source: String,
        new_name: String,

        #[arg(short, long, default_value = "0")]
        policy: u8,
    },

    /// Copy a node; large transfers stream progress
    Copy {
        source: String,
        dest_parent: String,

        /// Target name (defaults to the source name)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long, default_value = "0")]
        policy: u8,

        /// Force the transactional path with progress reporting
        #[arg(long)]
        progress: bool,
    },

    /// Move a node
    Move {
        source: String,
        dest_parent: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long, default_value = "0")]
        policy: u8,
    },

    /// Move a node to the trash, or delete it outright
    Rm {
        target: String,

        /// Bypass the trash
        #[arg(long)]
        permanent: bool,
    },

    /// Trash operations
    Trash {
        #[command(subcommand)]
        command: TrashCommand,
    },

    /// Undo the most recent operation
    Undo,

    /// Redo the most recently undone operation
    Redo,

    /// Drain pending journal records and resume interrupted transfers
    Recover,
}

#[derive(Subcommand)]
enum TrashCommand {
    /// List trash entries
    List,
    /// Restore an entry by id
    Restore { id: String },
    /// Permanently delete an entry by id
    Purge { id: String },
    /// Purge everything
    Empty,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::new(&cli.data_dir);
    let path_backend = Arc::new(PathBackend::new(config.trash_dir()));
    let handle_backend = cli.doc_root.as_ref().map(|root| {
        Arc::new(HandleBackend::new(Arc::new(DirTreeProvider::new(root, "tree"))))
            as Arc<dyn storax_backend::Backend>
    });
    let router = BackendRouter::new(path_backend, handle_backend);
    let engine = Storax::new(config, router)?;

    // Pending journal records and interrupted transfers are drained before
    // any new request; the explicit `recover` command reports verbosely.
    if !matches!(cli.command, Command::Recover) {
        let report = engine.recover_pending_operations().await?;
        for job in report.copies.into_iter().chain(report.moves) {
            let _ = engine.drive_recovered(job).await;
        }
    }

    run(&engine, cli.command).await
}

async fn run(engine: &Storax, command: Command) -> Result<()> {
    match command {
        Command::Ls { target } => {
            for node in engine.list_directory(&target).await? {
                println!(
                    "{:>10}  {}{}",
                    node.size,
                    node.name,
                    if node.is_directory { "/" } else { "" }
                );
            }
        }
        Command::Tree { target, depth } => {
            for node in engine.traverse_directory(&target, depth).await? {
                println!("{}", node.location);
            }
        }
        Command::Create {
            parent,
            name,
            dir,
            policy,
            manual,
        } => {
            let node_type = if dir { NodeType::Directory } else { NodeType::File };
            let outcome = engine
                .create(&parent, &name, node_type, parse_policy(policy)?, manual.as_deref())
                .await?;
            println!("created {}", outcome.location);
        }
        Command::Rename {
            source,
            new_name,
            policy,
        } => {
            let location = engine
                .rename(&source, &new_name, parse_policy(policy)?, None)
                .await?;
            println!("renamed to {location}");
        }
        Command::Copy {
            source,
            dest_parent,
            name,
            policy,
            progress,
        } => {
            let name = name.unwrap_or_else(|| storax_core::display_name(&source).to_string());
            let mut events = engine.subscribe();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let EngineEvent::TransferProgress { job_id, percent } = event {
                        eprintln!("{job_id}: {percent}%");
                    }
                }
            });

            match engine
                .copy(&source, &dest_parent, &name, parse_policy(policy)?, None, progress)
                .await?
            {
                CopyStarted::Completed { location } => println!("copied to {location}"),
                CopyStarted::Job { job_id } => {
                    println!("transfer started: {job_id}");
                    while !engine.active_jobs().is_empty() {
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                    println!("transfer finished");
                }
            }
            printer.abort();
        }
        Command::Move {
            source,
            dest_parent,
            name,
            policy,
        } => {
            let name = name.unwrap_or_else(|| storax_core::display_name(&source).to_string());
            let location = engine
                .move_item(&source, &dest_parent, &name, parse_policy(policy)?, None)
                .await?;
            println!("moved to {location}");
        }
        Command::Rm { target, permanent } => {
            if permanent {
                engine.permanently_delete(&target).await?;
                println!("deleted {target}");
            } else {
                engine.delete(&target).await?;
                println!("trashed {target}");
            }
        }
        Command::Trash { command } => run_trash(engine, command).await?,
        Command::Undo => {
            if engine.undo().await {
                println!("undone");
            } else {
                println!("nothing to undo");
            }
        }
        Command::Redo => {
            if engine.redo().await {
                println!("redone");
            } else {
                println!("nothing to redo");
            }
        }
        Command::Recover => {
            let report = engine.recover_pending_operations().await?;
            println!("journal records resolved: {}", report.journal_resolved);
            for job in report.copies {
                let id = job.job_id.clone();
                match engine.drive_recovered(job).await {
                    Ok(location) => println!("copy {id} resumed to {location}"),
                    Err(err) => println!("copy {id} failed: {err}"),
                }
            }
            for job in report.moves {
                let id = job.job_id.clone();
                match engine.drive_recovered(job).await {
                    Ok(location) => println!("move {id} resumed to {location}"),
                    Err(err) => println!("move {id} failed: {err}"),
                }
            }
        }
    }
    Ok(())
}

async fn run_trash(engine: &Storax, command: TrashCommand) -> Result<()> {
    match command {
        TrashCommand::List => {
            for entry in engine.list_trash().await? {
                println!(
                    "{}  {}  ({} -> {})",
                    entry.id, entry.display_name, entry.original_location, entry.parked_location
                );
            }
        }
        TrashCommand::Restore { id } => {
            let entry = find_entry(engine, &id).await?;
            engine.restore_from_trash(&entry).await?;
            println!("restored {}", entry.original_location);
        }
        TrashCommand::Purge { id } => {
            let entry = find_entry(engine, &id).await?;
            engine.permanently_delete_from_trash(&entry).await?;
            println!("purged {}", entry.display_name);
        }
        TrashCommand::Empty => {
            let clean = engine.empty_trash().await?;
            println!("trash emptied{}", if clean { "" } else { " (with errors)" });
        }
    }
    Ok(())
}

async fn find_entry(engine: &Storax, id: &str) -> Result<storax_store::TrashEntry> {
    engine
        .list_trash()
        .await?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| eyre!("no trash entry with id '{id}'"))
}

fn parse_policy(code: u8) -> Result<ConflictPolicy> {
    ConflictPolicy::from_code(code).ok_or_else(|| eyre!("invalid conflict policy code {code}"))
}
