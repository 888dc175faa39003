//! Command-line front end: wires config, settings and the store into a
//! `Session`, runs one command and prints what the session reports.

use crate::{
    config::{AppConfig, Command, ConfigCommand},
    handlers::{check_handlers::run_checks, render::render_listing},
    models::upload::UploadSource,
    paths,
    services::{
        deletion_index::Confirmed,
        session::{ManagerEvent, Session},
        settings_store::SettingsStore,
        store_client::{HttpObjectStore, ObjectStore},
        transfer_service::TransferService,
    },
};
use anyhow::{Context, Result};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};
use tokio::{fs, sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::debug;
use url::Url;

/// Run `command` to completion and report how the process should exit.
pub async fn run(cfg: AppConfig, command: Command) -> Result<ExitCode> {
    let mut settings = SettingsStore::open(&cfg.settings_path)
        .await
        .with_context(|| format!("opening settings file {}", cfg.settings_path.display()))?;

    if let Command::Config(config_command) = &command {
        return run_config(&mut settings, config_command).await;
    }

    let capability_url = cfg
        .par_url
        .clone()
        .or_else(|| settings.get().capability_url().map(str::to_string));
    let http_store = HttpObjectStore::new(capability_url.as_deref(), cfg.request_timeout)
        .context("building object store client")?;
    let transfers = TransferService::new(
        Arc::new(http_store.clone()) as Arc<dyn ObjectStore>,
        http_store.http_client(),
        cfg.upload_concurrency,
    );
    let store: Arc<dyn ObjectStore> = Arc::new(http_store);

    if matches!(command, Command::Check) {
        let report = run_checks(settings.get(), cfg.par_url.is_some(), store.as_ref()).await;
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("encoding check report")?
        );
        return Ok(if report.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let (mut session, events) = Session::new(store, transfers, settings, cfg.list_timeout);
    let printer = spawn_event_printer(events);
    let outcome = dispatch(&mut session, command).await;
    // closing the channel lets the printer drain and stop
    drop(session);
    if let Err(err) = printer.await {
        debug!(error = %err, "event printer stopped abnormally");
    }
    outcome
}

async fn run_config(settings: &mut SettingsStore, command: &ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::SetUrl { url } => {
            settings.set_par_url(url).await?;
            println!("Saved capability URL to {}", settings.path().display());
        }
        ConfigCommand::Show => {
            let mut shown = settings.get().clone();
            shown.par_url = shown.par_url.as_deref().map(redact_capability_url);
            println!(
                "{}",
                serde_json::to_string_pretty(&shown).context("encoding settings")?
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(session: &mut Session, command: Command) -> Result<ExitCode> {
    let ok = match command {
        Command::Ls { path, show_deleted } => {
            session.set_show_deleted(show_deleted);
            let path = path.unwrap_or_else(|| session.current_path().to_string());
            match session.navigate(&path).await {
                Ok(listing) => {
                    println!("Index of {}", listing.current_path);
                    for row in render_listing(&listing) {
                        println!("{row}");
                    }
                    true
                }
                Err(_) => false,
            }
        }
        Command::Upload { files, to } => {
            if !enter_folder(session, to).await {
                return Ok(ExitCode::FAILURE);
            }
            let sources = read_sources(&files).await?;
            let results = session.upload(sources).await;
            results.iter().all(|result| result.success)
        }
        Command::Download { key, out } => session.download(&key, &out).await.is_ok(),
        Command::Mkdir { name, parent } => {
            enter_folder(session, parent).await && session.create_folder(&name).await.is_ok()
        }
        Command::Rm { key, yes } => {
            let prompt = format!(
                "Are you sure you want to delete {}?",
                paths::file_name(&key)
            );
            if !yes && !confirm(prompt).await? {
                println!("Cancelled");
                return Ok(ExitCode::SUCCESS);
            }
            session.delete(&key, Confirmed::by_user()).await.is_ok()
        }
        Command::Restore { key } => session.restore(&key).await.is_ok(),
        Command::Import { url, to } => {
            enter_folder(session, to).await && session.import_url(&url).await.is_ok()
        }
        Command::Folders => match session.known_folders().await {
            Ok(folders) => {
                for folder in folders {
                    println!("{folder}");
                }
                true
            }
            Err(_) => false,
        },
        // answered in `run` before a session is built
        Command::Config(_) | Command::Check => true,
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Navigate to `folder` when one was given on the command line.
async fn enter_folder(session: &mut Session, folder: Option<String>) -> bool {
    match folder {
        Some(folder) => session.navigate(&folder).await.is_ok(),
        None => true,
    }
}

async fn read_sources(files: &[PathBuf]) -> Result<Vec<UploadSource>> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?;
        let body = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        sources.push(UploadSource::new(name, body));
    }
    Ok(sources)
}

async fn confirm(prompt: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> io::Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} [y/N] ")?;
        stdout.flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    })
    .await
    .context("confirmation prompt")?
    .context("reading confirmation")
}

fn spawn_event_printer(mut events: UnboundedReceiver<ManagerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ManagerEvent::Status(message) => eprintln!("{message}"),
                ManagerEvent::UploadProgress(progress) => match &progress.error {
                    Some(error) => eprintln!(
                        "[{}/{}] {} failed: {}",
                        progress.completed, progress.total, progress.file_name, error
                    ),
                    None => eprintln!(
                        "[{}/{}] {} ({}%)",
                        progress.completed,
                        progress.total,
                        progress.file_name,
                        progress.percent()
                    ),
                },
                ManagerEvent::DeletionStateChanged { show_deleted } => {
                    debug!(show_deleted, "deleted files visibility changed");
                }
                ManagerEvent::ListingReady(_) | ManagerEvent::UploadBatchComplete(_) => {}
            }
        }
    })
}

/// Hide the token segment of a capability URL (`/p/<token>/...`).
pub fn redact_capability_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<invalid URL>".to_string();
    };
    let segments: Vec<String> = match url.path_segments() {
        Some(segments) => segments.map(str::to_string).collect(),
        None => return url.to_string(),
    };
    let redacted: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            if idx > 0 && segments[idx - 1] == "p" {
                "***"
            } else {
                segment.as_str()
            }
        })
        .collect();
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(redacted);
    }
    url.set_query(None);
    url.to_string()
}
