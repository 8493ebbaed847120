//! notes: Offline-first notes client.
//!
//! Edits are committed to the local data directory immediately and queued;
//! `notes sync` pushes queued edits to the shared remote folder and pulls
//! changes made by other devices.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use note_sync::Note;
use note_sync_cli::config::{Config, expand_tilde};
use note_sync_cli::Client;

#[derive(Parser, Debug)]
#[command(name = "notes")]
#[command(about = "Offline-first notes with folder sync")]
struct Args {
    /// Local data directory (store, config)
    #[arg(long, global = true, env = "NOTES_DATA_DIR", default_value = "~/.notes-sync")]
    data_dir: String,

    /// Shared remote folder (overrides config)
    #[arg(long, global = true, env = "NOTES_REMOTE_DIR")]
    remote_dir: Option<String>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a note
    New {
        title: String,
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Change a note's title and/or body
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Delete a note
    Rm { id: String },
    /// Print one note
    Show { id: String },
    /// List notes, newest first
    Ls {
        /// Only notes whose title or body contains this text
        filter: Option<String>,
    },
    /// Push queued edits, then pull remote changes
    Sync,
    /// Show pending edits and sync state
    Status,
}

fn print_summary(note: &Note) {
    println!("{}  {}", note.note_id, note.title);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "info,note_sync=debug,note_sync_cli=debug,notes=debug"
    } else {
        "warn,note_sync=info,notes=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let data_dir = expand_tilde(&args.data_dir);
    let config = Config::load(&data_dir)?;
    let remote_dir = match &args.remote_dir {
        Some(dir) => expand_tilde(dir),
        None => config.remote_dir(&data_dir),
    };
    debug!("Data dir {:?}, remote dir {:?}", data_dir, remote_dir);

    let client = Client::open(&data_dir, &remote_dir, config.page_size);
    run(args.command, &client, &config, remote_dir).await
}

async fn run(command: Command, client: &Client, config: &Config, remote_dir: PathBuf) -> Result<()> {
    match command {
        Command::New { title, body } => {
            let note = client.notes.create(&title, &body).await?;
            println!("{}", note.note_id);
        }
        Command::Edit { id, title, body } => {
            if title.is_none() && body.is_none() {
                bail!("Nothing to change: pass --title and/or --body");
            }
            let note = client
                .notes
                .update(&id, title.as_deref(), body.as_deref())
                .await?;
            print_summary(&note);
        }
        Command::Rm { id } => {
            client.notes.delete(&id).await?;
        }
        Command::Show { id } => {
            let note = client
                .notes
                .get(&id)
                .await?
                .with_context(|| format!("No note with id {}", id))?;
            println!("{}\n\n{}", note.title, note.body);
        }
        Command::Ls { filter } => {
            for note in client.notes.list(filter.as_deref()).await? {
                print_summary(&note);
            }
        }
        Command::Sync => {
            let _events = client.engine.events().subscribe(|event| {
                if let Ok(json) = serde_json::to_string(&event) {
                    debug!("Sync event: {}", json);
                }
            });

            info!("Syncing {} with {:?}", config.device_name, remote_dir);
            let report = client.engine.sync_now().await.context("sync failed")?;
            println!("Pushed {}, pulled {}", report.pushed, report.pulled);
        }
        Command::Status => {
            let status = client.engine.status().await?;
            println!("Device:        {}", config.device_name);
            println!("Remote folder: {}", remote_dir.display());
            println!("Pending edits: {}", status.pending_ops);
            match status.last_sync_ms {
                Some(ms) => println!("Last sync:     {} ms since epoch", ms),
                None => println!("Last sync:     never"),
            }
            if !status.has_cursor {
                println!("Next sync performs a full listing");
            }
        }
    }
    Ok(())
}
