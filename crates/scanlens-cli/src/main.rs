mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scanlens_core::{card, QrDetector, ResultSet};
use scanlens_screen::{
    spawn_engine, HistoryScreen, PermissionHub, Permissions, Scanner, UiState,
};
use scanlens_store::{PreferencesStore, ResultStore, StoredCard, Theme};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "scanlens", about = "Scan images for codes and keep a history of results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one or more images for QR codes
    Scan {
        /// Image files to analyze
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Save the accumulated results to history
        #[arg(long)]
        save: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved results, newest first
    History {
        #[arg(long)]
        json: bool,
    },
    /// Delete every saved result
    Clear,
    /// Set or toggle the color theme
    Theme {
        #[arg(value_enum)]
        mode: ThemeMode,
    },
    /// Sign in under a display name
    Login { name: String },
    /// Sign out
    Logout,
    /// Mark onboarding as complete
    Onboard,
    /// Show paths, history size and preferences
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeMode {
    Light,
    Dark,
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env();
    let prefs = PreferencesStore::new(&config.prefs_path);

    match cli.command {
        Commands::Scan { images, save, json } => {
            let store = open_store(&config).await?;
            scan(&config, store, images, save, json).await?;
        }
        Commands::History { json } => {
            let store = open_store(&config).await?;
            let cards = store.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else if cards.is_empty() {
                println!("No saved results");
            } else {
                for stored in &cards {
                    print_stored(stored);
                }
            }
        }
        Commands::Clear => {
            let store = open_store(&config).await?;
            let history = HistoryScreen::new(store);
            history.clear_all();
            history.wait_idle().await;
            match history.ui_state().get() {
                UiState::Success(message) => println!("{message}"),
                UiState::Error(message) => bail!(message),
                other => bail!("unexpected state after clear: {other:?}"),
            }
        }
        Commands::Theme { mode } => {
            let updated = match mode {
                ThemeMode::Light => prefs.set_theme(Theme::Light)?,
                ThemeMode::Dark => prefs.set_theme(Theme::Dark)?,
                ThemeMode::Toggle => prefs.toggle_theme()?,
            };
            println!("Theme: {:?}", updated.theme);
        }
        Commands::Login { name } => {
            let updated = prefs.sign_in(&name)?;
            if let Some(user) = updated.signed_in_as {
                println!("Signed in as {user}");
            }
        }
        Commands::Logout => {
            prefs.sign_out()?;
            println!("Signed out");
        }
        Commands::Onboard => {
            prefs.complete_onboarding()?;
            println!("Onboarding complete");
        }
        Commands::Status => {
            let store = open_store(&config).await?;
            let saved = store.count().await?;
            let current = prefs.load()?;
            let status = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "db_path": config.db_path,
                "prefs_path": config.prefs_path,
                "engine_queue": config.engine_queue,
                "saved_results": saved,
                "preferences": current,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn open_store(config: &config::Config) -> Result<ResultStore> {
    ResultStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))
}

async fn scan(
    config: &config::Config,
    store: ResultStore,
    images: Vec<PathBuf>,
    save: bool,
    json: bool,
) -> Result<()> {
    let engine = spawn_engine(QrDetector::new(), config.engine_queue)?;
    // No camera on the command line; only picked images are analyzed.
    let permissions = PermissionHub::new(Permissions {
        camera: false,
        storage: true,
    });
    let scanner = Scanner::new(engine, Arc::new(store), permissions);
    let mut messages = scanner.messages();

    for path in &images {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                eprintln!("{}: {e}", path.display());
                continue;
            }
        };
        scanner.analyze_static(image, path.display().to_string());
        scanner.wait_idle().await;
        drain_messages(&mut messages);
        if let UiState::Error(message) = scanner.ui_state().get() {
            eprintln!("{}: {message}", path.display());
            scanner.reset_ui_state();
        }
    }

    let results = scanner.results().get();
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }

    if save {
        scanner.save();
        scanner.wait_idle().await;
        match scanner.ui_state().get() {
            UiState::Error(message) => bail!("save failed: {message}"),
            _ => println!("Saved {} result(s)", results.len()),
        }
    }

    Ok(())
}

fn drain_messages(messages: &mut broadcast::Receiver<String>) {
    while let Ok(message) = messages.try_recv() {
        println!("{message}");
    }
}

fn print_results(results: &ResultSet) {
    let now = chrono::Utc::now();
    for projected in card::project(results, now) {
        println!("{}", projected.title);
        println!("    {}", projected.subtitle);
        if let Some(image_ref) = &projected.image_ref {
            println!("    from {image_ref}");
        }
    }
}

fn print_stored(stored: &StoredCard) {
    let card = &stored.card;
    println!(
        "#{:<4} {}  {}",
        stored.id,
        card.created_at.format("%Y-%m-%d %H:%M:%S"),
        card.title
    );
    println!("      {}", card.subtitle);
}
