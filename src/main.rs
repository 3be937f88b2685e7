// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

use cookie_vote::{
    load_competitors_csv, open_counter_store, Category, Config, CounterStore, SqliteCounterStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging first so the defaults Config reports are recorded
    init_logging(&Config::log_path())?;
    let config = Config::load()?;

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => {
            let Some(csv_path) = args.get(2) else {
                bail!("Usage: cookie-vote seed <competitors.csv>");
            };
            run_seed(&config, Path::new(csv_path))?;
        }
        Some("tally") => run_tally(&config).await?,
        _ => run_ui_mode(config).await?,
    }

    Ok(())
}

/// Log to a file: stdout belongs to the terminal UI
fn init_logging(log_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn run_seed(config: &Config, csv_path: &Path) -> Result<()> {
    println!("🍪 Seeding competitors - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let competitors = load_competitors_csv(csv_path)?;
    println!("✓ Loaded {} competitors from CSV", competitors.len());

    // 2. Open shared store
    println!("\n🔧 Opening store {:?}...", config.store_path);
    let store = SqliteCounterStore::open(&config.store_path)?;

    // 3. Insert competitors
    println!("\n💾 Inserting competitors...");
    let inserted = store.seed(&competitors)?;
    println!("✓ Inserted: {} competitors", inserted);
    println!("✓ Skipped existing: {}", competitors.len() - inserted);

    Ok(())
}

async fn run_tally(config: &Config) -> Result<()> {
    let store = open_counter_store(config)?;
    let competitors = store.list_all().await?;

    println!("🏆 {}", config.title);
    for category in Category::ALL {
        let counter = category.counter();
        let mut ranked: Vec<_> = competitors.iter().collect();
        ranked.sort_by(|a, b| b.votes(counter).cmp(&a.votes(counter)));

        println!("\n{}", category);
        for (rank, competitor) in ranked.iter().enumerate() {
            println!("  {:>2}. {:<30} {:>5}", rank + 1, competitor.name, competitor.votes(counter));
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
async fn run_ui_mode(config: Config) -> Result<()> {
    println!("🖥️  Loading {}...\n", config.title);

    let mut controller = cookie_vote::VoteController::from_config(&config)?;
    let notice = match controller.initialize().await {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    };

    let mut app = ui::App::new(controller, config.title.clone());
    app.message = notice;
    ui::run_ui(&mut app).await?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
async fn run_ui_mode(_config: Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print standings: cargo run -- tally");
    std::process::exit(1);
}
