mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use slotkeeper_config::Config;
use slotkeeper_convert::Converter;
use slotkeeper_database::ContentRecord;
use slotkeeper_library::error::ErrorKind as LibraryErrorKind;
use slotkeeper_library::{IngestEvent, IngestRequest, Library, Report, SlotStatus, SyncStatus};
use slotkeeper_storage::{MAX_SLOT, SlotId};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "slotkeeper=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(root) = cli.root {
        config.store.root = root;
    }
    if let Some(database) = cli.database {
        config.store.database = Some(database);
    }
    tracing::debug!(root = %config.store.root.display(), database = %config.store.database_path().display(), "Configuration loaded");

    match cli.command {
        Command::List { no_heal } => list(&offline(&config)?, no_heal).await,
        Command::Verify => verify(&offline(&config)?).await,
        Command::Sync => sync(&offline(&config)?).await,
        Command::Next => next(&offline(&config)?).await,
        Command::Add { source, name, content_type, slot, secret, yes } => {
            let library = open(config).await?;
            let mut request = IngestRequest::new(source, name, content_type);
            request.slot = slot;
            request.secret = secret;
            add(&library, request, yes).await
        },
        Command::Delete { slot, yes } => {
            let slot = SlotId::new(slot).or_raise(|| ErrorKind::InvalidSlot)?;
            delete(&offline(&config)?, slot, yes).await
        },
        Command::Backends => backends(&config),
    }
}

/// A library that never converts, for commands that don't need to probe for
/// converter backends.
fn offline(config: &Config) -> Result<Library> {
    let converter = Converter::new(None, config.converter.timeout());
    Library::with_gateway(config, Arc::new(converter)).or_raise(|| ErrorKind::Library)
}

/// A library with a discovered converter. Probing runs external programs.
async fn open(config: Config) -> Result<Library> {
    tokio::task::spawn_blocking(move || Library::open(&config))
        .await
        .or_raise(|| ErrorKind::Library)?
        .or_raise(|| ErrorKind::Library)
}

async fn list(library: &Library, no_heal: bool) -> Result<ExitCode> {
    if !no_heal {
        let repaired = library.reconcile_silently().await.or_raise(|| ErrorKind::Library)?;
        if !repaired.is_empty() {
            eprintln!("Updated fingerprints of {} slot(s) changed outside slotkeeper.", repaired.len());
        }
    }
    let slots = library.list_slots_with_status().await.or_raise(|| ErrorKind::Library)?;
    if slots.is_empty() {
        println!("No slots in {}", library.root().display());
    } else {
        print_slots(&slots);
    }
    Ok(ExitCode::SUCCESS)
}

async fn verify(library: &Library) -> Result<ExitCode> {
    let report = library.reconcile_report().await.or_raise(|| ErrorKind::Library)?;
    print_slots(&report.slots);
    print_summary(&report);
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn sync(library: &Library) -> Result<ExitCode> {
    let repaired = library.reconcile_silently().await.or_raise(|| ErrorKind::Library)?;
    if repaired.is_empty() {
        println!("Nothing to repair.");
    }
    for slot in repaired {
        println!("Repaired {slot}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn next(library: &Library) -> Result<ExitCode> {
    let next = library.next_free_slot().await.or_raise(|| ErrorKind::Library)?;
    if next > u32::from(MAX_SLOT) {
        eprintln!("The store is full.");
        return Ok(ExitCode::FAILURE);
    }
    println!("{next:02}");
    Ok(ExitCode::SUCCESS)
}

async fn add(library: &Library, request: IngestRequest, yes: bool) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            on_interrupt.cancel();
        }
    });

    let confirm = move |slot: SlotId, record: Option<ContentRecord>| async move {
        if yes {
            return true;
        }
        let question = match record {
            Some(record) => format!(
                "Slot {slot} holds \"{}\" ({}, {} tracks). Replace it?",
                record.name, record.content_type, record.track_count
            ),
            None => format!("Slot {slot} already has files. Replace them?"),
        };
        ask(&question).await.unwrap_or(false)
    };

    let mut events = Box::pin(library.ingest(request, confirm, cancel));
    let mut unsaved = None;
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(err) if matches!(&*err, LibraryErrorKind::Persistence) => {
                unsaved = Some(err);
                break;
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Library),
        };
        match event {
            IngestEvent::Started { slot, inputs } => println!("Ingesting {inputs} file(s) into slot {slot}"),
            IngestEvent::Converting { source } => {
                println!("Converting {} (this can take a while)", source.display())
            },
            IngestEvent::Converted { source, files } => println!("Converted {} into {files} file(s)", source.display()),
            IngestEvent::Replaced { slot } => println!("Cleared slot {slot}"),
            IngestEvent::Copied { index, source } => println!("  {index}  {}", source.display()),
            IngestEvent::Committed { slot, record } => {
                println!("Slot {slot}: {} ({}, {} tracks)", record.name, record.content_type, record.track_count)
            },
        }
    }
    drop(events);

    if let Some(err) = unsaved {
        // The slot is fully written; only the sidecar is missing it.
        tracing::warn!(error = ?err, "Saving the database failed; retrying once");
        library.save().await.or_raise(|| ErrorKind::Library)?;
        println!("Done.");
    }
    Ok(ExitCode::SUCCESS)
}

async fn delete(library: &Library, slot: SlotId, yes: bool) -> Result<ExitCode> {
    if !yes {
        let what = match library.record(slot).await {
            Some(record) => format!("\"{}\" ({})", record.name, record.content_type),
            None => "unregistered files".to_string(),
        };
        if !ask(&format!("Delete slot {slot} with {what}?")).await? {
            println!("Nothing deleted.");
            return Ok(ExitCode::SUCCESS);
        }
    }
    let deletion = library.delete_slot(slot).await.or_raise(|| ErrorKind::Library)?;
    match (&deletion.removed_record, deletion.removed_directory) {
        (Some(record), true) => println!("Deleted slot {slot} ({})", record.name),
        (Some(record), false) => println!("Removed record for slot {slot} ({}); it had no folder", record.name),
        (None, _) => println!("Removed folder of unregistered slot {slot}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn backends(config: &Config) -> Result<ExitCode> {
    let probes = Converter::probe(config.converter.backends.as_slice()).or_raise(|| ErrorKind::Config)?;
    let mut any = false;
    for probe in &probes {
        match &probe.backend {
            Some(backend) => {
                any = true;
                println!("{:<10} available  {}", probe.id, backend.program().display());
            },
            None => println!("{:<10} not found  (looked for {})", probe.id, probe.id.program()),
        }
    }
    if !any {
        eprintln!("No converter available; protected audio can't be ingested.");
    }
    Ok(ExitCode::SUCCESS)
}

/// Asks a yes/no question on the terminal. Anything but "y"/"yes" is no.
async fn ask(question: &str) -> Result<bool> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(format!("{question} [y/N] ").as_bytes()).await.or_raise(|| ErrorKind::Terminal)?;
    stderr.flush().await.or_raise(|| ErrorKind::Terminal)?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await.or_raise(|| ErrorKind::Terminal)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "synced",
        SyncStatus::Modified => "modified",
        SyncStatus::TrackCountMismatch => "count-mismatch",
        SyncStatus::Unregistered => "unregistered",
    }
}

fn print_slots(slots: &[SlotStatus]) {
    println!("{:<4}  {:<14}  {:>6}  {:<9}  NAME", "SLOT", "STATUS", "TRACKS", "TYPE");
    for slot in slots {
        let (content_type, name) = match &slot.record {
            Some(record) => (record.content_type.to_string(), record.name.as_str()),
            None => ("-".to_string(), "-"),
        };
        println!(
            "{:<4}  {:<14}  {:>6}  {:<9}  {}",
            slot.slot,
            status_label(slot.status),
            slot.observed_tracks,
            content_type,
            name
        );
    }
}

fn print_summary(report: &Report) {
    println!();
    println!(
        "{} synced, {} modified, {} count mismatch, {} unregistered",
        report.synced, report.modified, report.track_count_mismatch, report.unregistered
    );
    if !report.orphaned.is_empty() {
        let orphaned: Vec<String> = report.orphaned.iter().map(SlotId::to_string).collect();
        println!("Records without a folder: {}", orphaned.join(", "));
    }
}
