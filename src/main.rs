use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use review_scheduler::config::Config;
use review_scheduler::export;
use review_scheduler::models::sm2::format_interval;
use review_scheduler::models::{CardId, Deck, ReviewTime};
use review_scheduler::{Scheduler, SqliteStore};

#[derive(Parser)]
#[command(name = "review", about = "SM-2 spaced repetition reviews", version)]
struct Cli {
    /// Config file (default: review.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and a sample deck if the catalog is empty
    Init,
    /// Import a deck from a JSON file
    Import { path: PathBuf },
    /// Export a deck to a JSON file
    ExportDeck { name: String, path: PathBuf },
    /// List cards due today
    Due,
    /// Show how many cards are due today
    Stats,
    /// Rate a card from 0 (total blackout) to 5 (perfect recall)
    Rate { card: i64, quality: i32 },
    /// Show the interval each rating would give a card
    Preview { card: i64 },
    /// Advance the simulated date by one day
    NextDay,
    /// Write all review states to a JSON file
    Backup { path: PathBuf },
    /// Restore review states from a JSON backup
    Restore { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let today = store.init_current_date(Local::now().date_naive())?;
    let scheduler = Scheduler::with_options(store, config.scheduler_options());
    let user = config.user();

    match cli.command {
        Command::Init => {
            if scheduler.store().deck_names(user)?.is_empty() {
                let deck = Deck::with_cards(
                    "Polish Vocabulary",
                    [("cześć", "hello"), ("dziękuję", "thank you"), ("proszę", "please")],
                );
                scheduler.store().import_deck(user, &deck)?;
                println!("Sample data created!");
            }
            for name in scheduler.store().deck_names(user)? {
                println!("  - {name}");
            }
            println!("Today is {today}");
        }
        Command::Import { path } => {
            let deck = export::import_deck(&path)?;
            let ids = scheduler.store().import_deck(user, &deck)?;
            println!("Deck '{}' imported with {} cards", deck.name, ids.len());
        }
        Command::ExportDeck { name, path } => {
            let Some(deck) = scheduler.store().deck(user, &name)? else {
                bail!("no deck named '{name}'");
            };
            export::export_deck_to_path(&deck, &path)?;
            println!("Deck '{}' exported to '{}'", deck.name, path.display());
        }
        Command::Due => {
            let due = scheduler.fetch_due(user, today)?;
            println!("{} cards due on {today}", due.len());
            for entry in due {
                let status = match entry.state.due_date() {
                    None => "new".to_string(),
                    Some(date) => format!("due {date}"),
                };
                println!("  [{}] {} ({status})", entry.card.id, entry.card.front);
            }
        }
        Command::Stats => {
            let stats = scheduler.stats(user, today)?;
            println!("Cards due today: {}", stats.cards_due_today);
        }
        Command::Rate { card, quality } => {
            let at = review_time(today);
            let result = scheduler.rate(user, CardId(card), quality, at)?;
            if result.lapsed {
                println!("Lapsed, streak reset.");
            }
            println!(
                "Review again in {} (on {}), ease factor {:.2}",
                format_interval(result.new_interval_days),
                result.due_date,
                result.new_ease_factor
            );
        }
        Command::Preview { card } => {
            for entry in scheduler.preview(user, CardId(card))? {
                println!(
                    "  {} {:<28} {}",
                    entry.quality,
                    entry.quality.label(),
                    format_interval(entry.interval_days)
                );
            }
        }
        Command::NextDay => {
            let next = scheduler.store().advance_day()?;
            println!("Today is {next}");
        }
        Command::Backup { path } => {
            let count = export::export_review_states(scheduler.store(), user, &path)?;
            println!("Saved {count} review states to '{}'", path.display());
        }
        Command::Restore { path } => {
            let snapshot = export::restore_review_states(scheduler.store(), user, &path)?;
            println!("Restored {} review states for user {user}", snapshot.states.len());
        }
    }

    Ok(())
}

/// Ratings are recorded at the wall-clock instant but counted from the simulated day.
fn review_time(today: NaiveDate) -> ReviewTime {
    ReviewTime::new(today, Utc::now())
}
