//! Gestionale CLI - admin console for the Camporosso reservation book
//!
//! Drives the shared synchronization layer from the terminal: list, export,
//! confirm, reject, and delete reservations against the remote store,
//! degrading to the local fallback file when the store is unreachable.

mod auth;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};
use gestionale_core::auth::{
    username_from_email, AuthError, AuthSession, FirebaseAuthClient, Persistence,
    SessionPersistence,
};
use gestionale_core::config::GestionaleConfig;
use gestionale_core::export::{render_csv, suggested_export_file_name};
use gestionale_core::notify::{Notifier, StdoutOpener};
use gestionale_core::query::{filter_by_date_window, filter_by_text, DateWindow};
use gestionale_core::render::{render_table, TableView};
use gestionale_core::store::{FallbackStore, FirestoreStore};
use gestionale_core::sync::{BulkDelete, LoadResult, StatusWrite, StoreHandle, SyncService};
use gestionale_core::{Cache, Reservation};
use thiserror::Error;

use crate::auth::KeyringStore;

#[derive(Parser)]
#[command(name = "gestionale")]
#[command(about = "Gestionale prenotazioni dell'Agriturismo Camporosso")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the local fallback file (defaults to the platform
    /// data directory)
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List reservations, optionally filtered
    List {
        /// Free-text search over name, surname, email, and phone
        #[arg(short, long)]
        search: Option<String>,
        /// Relative date window
        #[arg(long, value_enum)]
        window: Option<WindowArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export reservations as CSV
    Export {
        /// Optional output path (prenotazioni_<date>.csv when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Accept a reservation: open the WhatsApp message and mark it confirmed
    Confirm {
        /// Remote document id, or the creation timestamp for local records
        id: String,
    },
    /// Decline a reservation: open the WhatsApp message and mark it rejected
    Reject {
        /// Remote document id, or the creation timestamp for local records
        id: String,
        /// Also delete the record afterwards
        #[arg(long)]
        delete: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete one reservation
    Delete {
        /// Remote document id, or the creation timestamp for local records
        #[arg(conflicts_with = "local")]
        id: Option<String>,
        /// Position in the local fallback list instead of an id
        #[arg(long, value_name = "INDEX")]
        local: Option<usize>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete every reservation
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage the admin login
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Sign in with the admin username
    Login {
        username: String,
        password: String,
        /// Keep the session across restarts
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Status,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] gestionale_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Reservation not found for id: {0}")]
    ReservationNotFound(String),
    #[error("Provide a document id or --local <INDEX>")]
    MissingDeleteTarget,
    #[error(
        "Auth is not configured. Set GESTIONALE_FIREBASE_API_KEY to enable `gestionale auth login`."
    )]
    AuthNotConfigured,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum WindowArg {
    Today,
    Week,
    Month,
}

impl From<WindowArg> for DateWindow {
    fn from(value: WindowArg) -> Self {
        match value {
            WindowArg::Today => Self::Today,
            WindowArg::Week => Self::Week,
            WindowArg::Month => Self::Month,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gestionale=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = GestionaleConfig::from_env();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Commands::List {
            search,
            window,
            json,
        } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_list(&mut service, &config, search.as_deref(), window, json).await?;
        }
        Commands::Export { output } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_export(&mut service, output.as_deref()).await?;
        }
        Commands::Confirm { id } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_confirm(&mut service, &config, &id).await?;
        }
        Commands::Reject { id, delete, yes } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_reject(&mut service, &config, &id, delete, yes).await?;
        }
        Commands::Delete { id, local, yes } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_delete(&mut service, id.as_deref(), local, yes).await?;
        }
        Commands::Clear { yes } => {
            let mut service = open_service(&config, &data_dir).await?;
            run_clear(&mut service, yes).await?;
        }
        Commands::Auth { command } => run_auth(command, &config, &data_dir).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

async fn open_service(
    config: &GestionaleConfig,
    data_dir: &Path,
) -> Result<SyncService, CliError> {
    let fallback = FallbackStore::new(data_dir.join("gestionale.json"));
    let handle = StoreHandle::new();

    let ready_timeout = if let Some(project_id) = config.project_id() {
        let mut store = FirestoreStore::new(project_id, config.collection.clone())?;
        if let Some(session) = restore_session(config).await {
            store = store.with_auth_token(session.id_token);
        }
        handle.provide(Arc::new(store));
        config.ready_timeout()
    } else {
        // No store will ever be provided; land in Unavailable immediately
        Duration::ZERO
    };

    let mut service = SyncService::new(handle, fallback, Arc::new(Cache::new()), ready_timeout);
    service.connect().await;
    Ok(service)
}

async fn restore_session(config: &GestionaleConfig) -> Option<AuthSession> {
    let api_key = config.api_key()?;
    let client =
        match FirebaseAuthClient::new(api_key, config.username_domain.clone(), KeyringStore) {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(%error, "auth client unavailable, proceeding without a session");
                return None;
            }
        };

    match client.restore_session().await {
        Ok(session) => session,
        Err(error) => {
            tracing::warn!(%error, "stored session could not be restored");
            None
        }
    }
}

async fn run_list(
    service: &mut SyncService,
    config: &GestionaleConfig,
    search: Option<&str>,
    window: Option<WindowArg>,
    as_json: bool,
) -> Result<(), CliError> {
    let loaded = service.load().await?;
    report_degraded(&loaded);
    let today = Local::now().date_naive();

    let mut records = loaded.records;
    if let Some(term) = search {
        records = filter_by_text(&records, term);
    }
    if let Some(window) = window {
        records = filter_by_date_window(&records, window.into(), today);
    }

    let view = render_table(&records, today, &config.country_code);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in format_table_lines(&view) {
            println!("{line}");
        }
    }

    Ok(())
}

fn format_table_lines(view: &TableView) -> Vec<String> {
    if view.is_empty() {
        return vec!["Nessuna prenotazione trovata".to_string()];
    }

    let mut lines = vec![format!(
        "Totali: {}  Oggi: {}  Settimana: {}",
        view.stats.total, view.stats.today, view.stats.week
    )];
    lines.extend(view.rows.iter().map(|row| {
        format!(
            "{:<15}  {:<5}  {:<24}  {:>2}  {:<9}  {}",
            row.date, row.time, row.full_name, row.guests, row.status_label, row.notes
        )
    }));
    lines
}

async fn run_export(service: &mut SyncService, output: Option<&Path>) -> Result<(), CliError> {
    let loaded = service.load().await?;
    report_degraded(&loaded);
    if loaded.records.is_empty() {
        println!("Nessuna prenotazione da esportare");
        return Ok(());
    }

    let rendered = render_csv(&loaded.records);
    let path = output.map_or_else(
        || PathBuf::from(suggested_export_file_name(Local::now().date_naive())),
        Path::to_path_buf,
    );
    std::fs::write(&path, rendered)?;
    println!("{}", path.display());
    Ok(())
}

async fn run_confirm(
    service: &mut SyncService,
    config: &GestionaleConfig,
    id: &str,
) -> Result<(), CliError> {
    let loaded = service.load().await?;
    report_degraded(&loaded);
    let record = find_reservation(&loaded.records, id)?;

    match notifier(config).confirm(&record, service).await? {
        StatusWrite::Applied => println!("Prenotazione di {} confermata", record.full_name()),
        StatusWrite::Skipped => {
            println!("Messaggio aperto; il record non ha un id remoto, stato non aggiornato");
        }
    }
    Ok(())
}

async fn run_reject(
    service: &mut SyncService,
    config: &GestionaleConfig,
    id: &str,
    delete: bool,
    assume_yes: bool,
) -> Result<(), CliError> {
    let loaded = service.load().await?;
    report_degraded(&loaded);
    let record = find_reservation(&loaded.records, id)?;
    let notifier = notifier(config);

    match notifier.reject(&record, service).await? {
        StatusWrite::Applied => println!("Prenotazione di {} rifiutata", record.full_name()),
        StatusWrite::Skipped => {
            println!("Messaggio aperto; il record non ha un id remoto, stato non aggiornato");
        }
    }

    if delete {
        if confirm_prompt("Eliminare definitivamente la prenotazione rifiutata?", assume_yes)? {
            notifier.delete_rejected(&record, service).await?;
            println!("Prenotazione eliminata");
        } else {
            println!("Eliminazione annullata");
        }
    }

    Ok(())
}

async fn run_delete(
    service: &mut SyncService,
    id: Option<&str>,
    local: Option<usize>,
    assume_yes: bool,
) -> Result<(), CliError> {
    let identity = match (id, local) {
        (Some(needle), None) => {
            let loaded = service.load().await?;
            report_degraded(&loaded);
            find_reservation(&loaded.records, needle)?.identity()
        }
        (None, Some(index)) => gestionale_core::Identity::Local(index),
        _ => return Err(CliError::MissingDeleteTarget),
    };

    if !confirm_prompt("Eliminare la prenotazione?", assume_yes)? {
        println!("Eliminazione annullata");
        return Ok(());
    }

    service.delete_one(&identity).await?;
    println!("Prenotazione eliminata");
    Ok(())
}

async fn run_clear(service: &mut SyncService, assume_yes: bool) -> Result<(), CliError> {
    if !confirm_prompt("Eliminare TUTTE le prenotazioni?", assume_yes)? {
        println!("Eliminazione annullata");
        return Ok(());
    }

    match service.delete_all().await? {
        BulkDelete::Empty => println!("Nessuna prenotazione da eliminare"),
        BulkDelete::Deleted(count) => println!("Eliminate {count} prenotazioni"),
    }
    Ok(())
}

async fn run_auth(
    command: AuthCommands,
    config: &GestionaleConfig,
    data_dir: &Path,
) -> Result<(), CliError> {
    let fallback = FallbackStore::new(data_dir.join("gestionale.json"));

    match command {
        AuthCommands::Login {
            username,
            password,
            remember,
        } => {
            let api_key = config.api_key().ok_or(CliError::AuthNotConfigured)?;
            let mut client =
                FirebaseAuthClient::new(api_key, config.username_domain.clone(), KeyringStore)?;
            if remember {
                client.set_persistence(Persistence::Local);
            }
            fallback.set_remember_me(remember)?;

            let session = client.sign_in(&username, &password).await?;
            let display = session.user.email.as_deref().map_or_else(
                || username.clone(),
                |email| username_from_email(email, &config.username_domain),
            );
            println!("Accesso eseguito come {display}");
        }
        AuthCommands::Logout => {
            KeyringStore.clear_session()?;
            fallback.set_remember_me(false)?;
            println!("Sessione terminata");
        }
        AuthCommands::Status => match KeyringStore.load_session()? {
            Some(session) => {
                let display = session.user.email.as_deref().map_or_else(
                    || session.user.id.clone(),
                    |email| username_from_email(email, &config.username_domain),
                );
                println!("Connesso come {display}");
            }
            None => println!("Nessuna sessione attiva"),
        },
    }

    Ok(())
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "gestionale", buffer);
}

fn notifier(config: &GestionaleConfig) -> Notifier<StdoutOpener> {
    Notifier::new(
        StdoutOpener,
        config.venue_name.clone(),
        config.venue_address.clone(),
        config.country_code.clone(),
    )
}

/// Warn the operator when remote data could not be read and the list on
/// screen comes from the local fallback instead.
fn report_degraded(loaded: &LoadResult) {
    if let Some(notice) = degraded_notice(loaded) {
        eprintln!("{notice}");
    }
}

fn degraded_notice(loaded: &LoadResult) -> Option<String> {
    let error = loaded.degraded.as_ref()?;
    Some(match error {
        gestionale_core::Error::PermissionDenied(detail) => format!(
            "Attenzione: permessi insufficienti sullo store remoto ({detail}); dati letti dal fallback locale"
        ),
        other => format!(
            "Attenzione: store remoto non disponibile ({other}); dati letti dal fallback locale"
        ),
    })
}

/// Look a record up by remote document id, falling back to the creation
/// timestamp for records that were never persisted remotely.
fn find_reservation(records: &[Reservation], needle: &str) -> Result<Reservation, CliError> {
    records
        .iter()
        .find(|r| r.id.as_deref() == Some(needle) || r.created_at == needle)
        .cloned()
        .ok_or_else(|| CliError::ReservationNotFound(needle.to_string()))
}

fn confirm_prompt(question: &str, assume_yes: bool) -> Result<bool, CliError> {
    if assume_yes {
        return Ok(true);
    }

    print!("{question} [s/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "s\u{ec}" | "y" | "yes"
    )
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("GESTIONALE_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gestionale")
}
