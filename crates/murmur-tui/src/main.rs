//! murmur - a terminal client for the murmur social network.
//!
//! Without arguments this starts the keyboard-driven TUI. A handful of
//! subcommands (`login`, `logout`, `whoami`, `feed`) work without it.

mod app;
mod ui;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use murmur_core::utils::{format_timestamp, truncate};
use murmur_core::{ApiClient, Config};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written while the TUI owns the terminal
const LOG_FILE_NAME: &str = "murmur.log";

const USAGE: &str = "\
Usage: murmur [COMMAND]

Commands:
  (none)          Start the terminal UI
  login [EMAIL]   Log in and store the session
  logout          Forget the stored session
  whoami          Show the logged-in user
  feed [--json]   Print the latest posts
  help            Show this message";

/// Initialize tracing for CLI commands. Use RUST_LOG to control the level.
fn init_cli_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Initialize tracing for the TUI. Output goes to a file in the cache
/// directory since stderr would draw over the interface.
fn init_tui_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let appender = config.cache_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(LOG_FILE_NAME)
            .build(dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load config")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_tui(config).await,
        Some("login") => {
            init_cli_tracing();
            cmd_login(config, args.get(1).cloned()).await
        }
        Some("logout") => {
            init_cli_tracing();
            cmd_logout(config).await
        }
        Some("whoami") => {
            init_cli_tracing();
            cmd_whoami(config).await
        }
        Some("feed") => {
            init_cli_tracing();
            cmd_feed(config, args.iter().any(|a| a == "--json")).await
        }
        Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

// ============================================================================
// CLI commands
// ============================================================================

async fn cmd_login(mut config: Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| std::env::var("MURMUR_EMAIL").ok()) {
        Some(email) => email,
        None => {
            print!("Email: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    let password = match std::env::var("MURMUR_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let api = ApiClient::connect(&config)?;
    let identity = api.session().login(&email, &password).await?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    println!("Logged in as {} (id {})", identity.display_name(), identity.user_id);
    Ok(())
}

async fn cmd_logout(config: Config) -> Result<()> {
    let api = ApiClient::connect(&config)?;
    api.session().logout();
    println!("Logged out");
    Ok(())
}

async fn cmd_whoami(config: Config) -> Result<()> {
    let api = ApiClient::connect(&config)?;
    let Some(identity) = api.session().restore().await else {
        anyhow::bail!("Not logged in. Run `murmur login` first.");
    };

    let profile = api.fetch_my_profile().await?;
    println!("{} <{}>", profile.name, profile.email.as_deref().unwrap_or("-"));
    println!("id:         {}", profile.id);
    println!("followers:  {}", profile.follower_count);
    println!("following:  {}", profile.following_count);
    if !profile.bio_text().is_empty() {
        println!("bio:        {}", profile.bio_text());
    }
    println!("token ends: {}", format_timestamp(&identity.expires_at));
    Ok(())
}

async fn cmd_feed(config: Config, json: bool) -> Result<()> {
    let api = ApiClient::connect(&config)?;
    if api.session().restore().await.is_none() {
        anyhow::bail!("Not logged in. Run `murmur login` first.");
    }

    let posts = api.fetch_feed().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    for post in &posts {
        let when = post
            .created_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();
        println!(
            "#{:<5} {:<20} {:>4} likes  {}",
            post.id,
            truncate(&post.user_name, 20),
            post.like_count,
            when
        );
        println!("       {}\n", truncate(&post.content.replace('\n', " "), 100));
    }
    eprintln!("{} posts", posts.len());
    Ok(())
}

// ============================================================================
// TUI
// ============================================================================

async fn run_tui(config: Config) -> Result<()> {
    let _log_guard = init_tui_tracing(&config);
    info!("murmur starting");

    let api = ApiClient::connect(&config)?;
    let mut app = App::new(config, api);

    // Resume a stored session before taking over the terminal
    if app.restore_session().await {
        app.load_initial();
    } else {
        app.start_login();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("murmur shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
