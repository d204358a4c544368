//! gatekeep - terminal front end for the admin console session.
//!
//! Logs in against the console API, keeps tokens between runs and shows
//! where the route guard would send you.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gatekeep_core::api::Credentials;
use gatekeep_core::nav::{main_menu, profile_menu, profile_visible_for, visible_for, Access, MenuItem};
use gatekeep_core::notify::{ChannelSink, Notification, Severity};
use gatekeep_core::{App, AuthOutcome, Config};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// How often the shell looks for background session events
const SHELL_POLL_INTERVAL_MS: u64 = 500;

/// Password source for non-interactive logins
const ENV_PASSWORD: &str = "GATEKEEP_PASSWORD";

const USAGE: &str = "\
Usage: gatekeep <command>

Commands:
  login [username]   Log in (password from GATEKEEP_PASSWORD or a prompt)
  logout             Log out and forget stored tokens
  status             Show the current session
  check              Reconcile tokens with the server
  open <path>        Show where navigating to <path> lands
  menu               Show the menus visible to the signed-in user
  shell              Interactive session with background refresh";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load config")?;
    let state_dir = config.state_dir()?;
    let (sink, mut notes) = ChannelSink::channel();
    let mut app = App::from_config(&config, &state_dir, Arc::new(sink))?;
    info!(command, "gatekeep starting");

    let result = match command {
        "login" => login(&mut app, &mut config, args.get(1).cloned()).await,
        "logout" => logout(&mut app).await,
        "status" => status(&mut app).await,
        "check" => check(&mut app).await,
        "open" => match args.get(1) {
            Some(path) => open(&mut app, path).await,
            None => Err(anyhow::anyhow!("open needs a path")),
        },
        "menu" => menu(&mut app).await,
        "shell" => shell(&mut app, &mut config, &mut notes).await,
        other => Err(anyhow::anyhow!("Unknown command: {}\n\n{}", other, USAGE)),
    };

    print_notifications(&mut notes);
    app.shutdown();
    result
}

// ============================================================================
// Commands
// ============================================================================

async fn login(app: &mut App, config: &mut Config, username: Option<String>) -> Result<()> {
    app.boot("/").await?;
    authenticate(app, config, username).await
}

async fn authenticate(app: &mut App, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => prompt_username(config.last_username.as_deref())?,
    };
    if username.is_empty() {
        bail!("Username required");
    }
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    println!("Authenticating...");
    match app.login(&Credentials::new(username.clone(), password)).await? {
        AuthOutcome::Success => {
            config.last_username = Some(username);
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
            println!("Logged in, now at {}", app.current_path().unwrap_or("/"));
            Ok(())
        }
        AuthOutcome::Busy => bail!("Another login is already in progress"),
        AuthOutcome::Rejected | AuthOutcome::Failed => bail!("Login failed"),
    }
}

async fn logout(app: &mut App) -> Result<()> {
    app.boot("/").await?;
    let outcome = app.logout().await?;
    // Local state is gone either way
    println!("Logged out ({:?})", outcome);
    Ok(())
}

async fn status(app: &mut App) -> Result<()> {
    app.boot("/").await?;
    print_status(app)
}

fn print_status(app: &App) -> Result<()> {
    let session = app.session();

    println!("Phase:         {:?}", session.phase());
    println!("Authenticated: {}", session.is_authenticated());
    match session.tokens().access_expires_at() {
        Some(at) if session.has_tokens() => println!("Access until:  {}", at),
        _ => println!("Access until:  -"),
    }
    let user = session.user();
    if user.as_object().is_some_and(|fields| !fields.is_empty()) {
        println!("User:          {}", serde_json::to_string_pretty(&user)?);
    }
    Ok(())
}

async fn check(app: &mut App) -> Result<()> {
    app.session().restore();
    let outcome = app.session().check_and_refresh_tokens().await;
    println!("{:?}", outcome);
    Ok(())
}

async fn open(app: &mut App, path: &str) -> Result<()> {
    let landed = app.boot(path).await?;
    println!("{}", landed);
    let trail: Vec<String> = app
        .router()
        .breadcrumbs()
        .into_iter()
        .map(|b| b.meta.label.unwrap_or(b.path))
        .collect();
    println!("{}", trail.join(" > "));
    Ok(())
}

async fn menu(app: &mut App) -> Result<()> {
    app.boot("/dashboard").await?;
    if !app.session().has_tokens() {
        bail!("Not logged in");
    }

    let access = Access::from_user(&app.session().user());
    print_menu(&visible_for(&main_menu(), &access), 0);
    println!();
    for item in profile_visible_for(&profile_menu(), &access) {
        println!("{:<20} {}", item.label, item.to);
    }
    Ok(())
}

fn print_menu(items: &[MenuItem], depth: usize) {
    for item in items {
        let indent = "  ".repeat(depth);
        let name = format!("{}{}", indent, item.name);
        println!("{:<24} {}", name, item.to.as_deref().unwrap_or(""));
        print_menu(&item.sub_menu, depth + 1);
    }
}

// ============================================================================
// Shell
// ============================================================================

async fn shell(
    app: &mut App,
    config: &mut Config,
    notes: &mut UnboundedReceiver<Notification>,
) -> Result<()> {
    let landed = app.boot("/").await?;
    println!("At {}. Commands: open <path>, login [user], logout, status, quit", landed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = tokio::time::interval(Duration::from_millis(SHELL_POLL_INTERVAL_MS));

    loop {
        prompt(app.current_path().unwrap_or("/"))?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
            _ = wait_for_expiry(app, &mut poll) => {
                println!("\nSession ended, now at {}", app.current_path().unwrap_or("/"));
                print_notifications(notes);
                continue;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let mut words = line.split_whitespace();
        let result = match (words.next(), words.next()) {
            (None, _) => Ok(()),
            (Some("quit" | "exit"), _) => break,
            (Some("open"), Some(path)) => app
                .navigate(path)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
            (Some("login"), user) => authenticate(app, config, user.map(str::to_string)).await,
            (Some("logout"), _) => app.logout().await.map(|_| ()).map_err(anyhow::Error::from),
            (Some("status"), _) => print_status(app),
            (Some(other), _) => Err(anyhow::anyhow!("Unknown command: {}", other)),
        };
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
        print_notifications(notes);
    }

    Ok(())
}

/// Resolves once a background check has ended the session.
async fn wait_for_expiry(app: &mut App, poll: &mut tokio::time::Interval) {
    loop {
        poll.tick().await;
        match app.check_background_tasks().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                return;
            }
        }
    }
}

// ============================================================================
// Terminal helpers
// ============================================================================

fn prompt(path: &str) -> Result<()> {
    print!("{} > ", path);
    io::stdout().flush()?;
    Ok(())
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn print_notifications(notes: &mut UnboundedReceiver<Notification>) {
    while let Ok(n) = notes.try_recv() {
        let tag = match n.severity {
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        println!("[{}] {}: {}", tag, n.summary, n.detail);
    }
}
