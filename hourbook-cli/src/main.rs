mod cli;
mod config;
mod render;

use anyhow::{bail, Result};
use chrono::Local;
use clap::Parser;
use hourbook::ports::AnalyticsBackend;
use hourbook::{DevBackend, HourlyEditSession, HttpAnalyticsBackend, SyncError};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, EditArgs, ViewArgs};
use config::HourbookConfig;

const DEFAULT_LOG_FILTER: &str = "hourbook=info,hourbook_cli=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::ConfigPath = cli.command {
        let path = HourbookConfig::ensure_file()?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = HourbookConfig::load()?;
    let backend: Arc<dyn AnalyticsBackend> = if cli.dev {
        info!("using in-memory dev data");
        Arc::new(DevBackend::new())
    } else {
        Arc::new(HttpAnalyticsBackend::new(
            &config.api_url,
            config.token.clone(),
        )?)
    };

    match cli.command {
        Commands::Show(view) => show(backend, &config, view).await,
        Commands::Edit(args) => edit(backend, &config, args).await,
        Commands::ConfigPath => Ok(()),
    }
}

async fn open_session(
    backend: Arc<dyn AnalyticsBackend>,
    config: &HourbookConfig,
    view: ViewArgs,
) -> Result<HourlyEditSession<dyn AnalyticsBackend>> {
    let settings = config.session_settings(view.screen)?;
    let mut session = HourlyEditSession::new(backend, view.screen, config.role, settings);
    let date = view.date.unwrap_or_else(|| Local::now().date_naive());
    session.load(date, view.scope).await?;
    Ok(session)
}

async fn show(
    backend: Arc<dyn AnalyticsBackend>,
    config: &HourbookConfig,
    view: ViewArgs,
) -> Result<()> {
    let session = open_session(backend, config, view).await?;
    render::print_rows(&session);
    render::print_totals(&session);
    if let Some(snapshot) = session.snapshot() {
        render::print_stats(snapshot);
    }
    Ok(())
}

async fn edit(
    backend: Arc<dyn AnalyticsBackend>,
    config: &HourbookConfig,
    args: EditArgs,
) -> Result<()> {
    let mut session = open_session(backend, config, args.view).await?;

    let mut rejected = 0;
    for edit in &args.edits {
        match session.set_field(edit.hour, edit.field, &edit.value) {
            Ok(true) => {}
            Ok(false) => {
                rejected += 1;
                eprintln!(
                    "{}:00 {}: {:?} is not a valid value",
                    edit.hour, edit.field, edit.value
                );
            }
            Err(reason) => {
                rejected += 1;
                eprintln!("{}:00 {}: {reason}", edit.hour, edit.field);
            }
        }
    }

    render::print_rows(&session);
    render::print_totals(&session);

    if args.dry_run {
        println!(
            "Dry run: {} hour(s) pending, nothing saved.",
            session.overlay().len()
        );
    } else if session.is_dirty() {
        match session.save().await {
            Ok(summary) => println!("Saved {} hour(s).", summary.settled.len()),
            Err(SyncError::PartialSaveFailure { failed, refetch }) => {
                for bucket in &failed {
                    warn!(%bucket, "hour not saved");
                }
                if refetch.is_none() {
                    render::print_totals(&session);
                }
                bail!(SyncError::PartialSaveFailure { failed, refetch });
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        println!("Nothing to save.");
    }

    if rejected > 0 {
        bail!("{rejected} edit(s) were not applied");
    }
    Ok(())
}
