//! meteowatch - command-line front end for the weather dashboard session.
//!
//! Each subcommand plays the part of one dashboard surface: the login and
//! register forms, the header's logout button, the protected views behind
//! the route gate, and the auto-refreshing temperature panel.

mod input;

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meteowatch_core::api::Method;
use meteowatch_core::readings::{PollUpdate, Poller, ReadingsClient};
use meteowatch_core::utils::{format_clock, format_remaining, format_temperature, truncate_string};
use meteowatch_core::{
    AuthError, AuthService, Config, GateDecision, RequestOptions, RouteGate, SessionContext,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the poll update channel
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "meteowatch.log";

/// Longest response body printed by `request` before truncating
const MAX_PRINTED_BODY: usize = 4000;

#[derive(Parser)]
#[command(name = "meteowatch", version, about = "Weather dashboard session client")]
struct Cli {
    /// Backend base URL (overrides config and METEOWATCH_API_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        #[arg(long, short)]
        username: Option<String>,
        /// Location to return to after signing in
        #[arg(long)]
        from: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long, short)]
        username: Option<String>,
        #[arg(long, short)]
        email: Option<String>,
    },
    /// End the session locally
    Logout,
    /// Show the current session state
    Status,
    /// Ask the backend whether the stored token is still accepted
    Verify {
        /// Sign out locally if the backend rejects the token
        #[arg(long)]
        discard: bool,
    },
    /// Navigate to a view through the route gate
    Open {
        path: String,
        #[arg(long)]
        from: Option<String>,
    },
    /// Send an authorized request to the backend
    Request {
        path: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long, short)]
        data: Option<String>,
    },
    /// Poll the latest reading and history until the session ends
    Watch {
        /// Polling interval in seconds (defaults to the configured interval)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Stop after this many latest readings
        #[arg(long)]
        rounds: Option<usize>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_env();
    config.override_base_url(cli.server.clone());

    let log_dir = if cli.log_file {
        Some(config.cache_dir()?.join("logs"))
    } else {
        None
    };
    let _guard = init_tracing(log_dir.as_deref());
    info!(base_url = %config.base_url, "meteowatch starting");

    let store = config.token_store()?;
    let auth = Arc::new(AuthService::new(&config.base_url, store)?);
    let session = Arc::new(SessionContext::new(Arc::clone(&auth)));

    match cli.command {
        Commands::Login { username, from } => cmd_login(&session, &mut config, username, from).await,
        Commands::Register { username, email } => {
            cmd_register(&session, &mut config, username, email).await
        }
        Commands::Logout => {
            session.logout();
            println!("Signed out.");
            Ok(())
        }
        Commands::Status => cmd_status(&session, &config),
        Commands::Verify { discard } => cmd_verify(&session, discard).await,
        Commands::Open { path, from } => cmd_open(&session, &path, from.as_deref()),
        Commands::Request { path, method, data } => {
            cmd_request(&session, &path, &method, data.as_deref()).await
        }
        Commands::Watch { interval, rounds } => {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.poll_interval());
            cmd_watch(&session, interval, rounds).await
        }
    }
}

fn remember_username(config: &mut Config, username: &str) {
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

async fn cmd_login(
    session: &SessionContext,
    config: &mut Config,
    username: Option<String>,
    from: Option<String>,
) -> Result<()> {
    if session.is_authenticated() {
        if let Some(user) = session.user() {
            println!("Already signed in as {}.", user.username);
        }
        return Ok(());
    }

    let username = input::resolve_username(username, config.last_username.as_deref())?;
    let password = input::prompt_password("Password")?;

    println!("Authenticating...");
    match session.login(&username, &password).await {
        Ok(user) => {
            remember_username(config, &username);
            println!("Signed in as {}.", user.username);
            println!("Continue to {}", RouteGate::post_login_destination(from.as_deref()));
            Ok(())
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}

async fn cmd_register(
    session: &SessionContext,
    config: &mut Config,
    username: Option<String>,
    email: Option<String>,
) -> Result<()> {
    let username = input::resolve_username(username, None)?;
    let email = match email {
        Some(email) => email,
        None => input::prompt_line("Email")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }
    let password = input::prompt_password("Password")?;
    let confirmation = input::prompt_password("Confirm password")?;
    input::validate_new_password(&password, &confirmation)?;

    match session.register(&username, &email, &password).await {
        Ok(user) => {
            remember_username(config, &username);
            println!("Account created. Signed in as {}.", user.username);
            Ok(())
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}

fn cmd_status(session: &SessionContext, config: &Config) -> Result<()> {
    let state = session.state();
    println!("Server:  {}", config.base_url);
    println!("Session: {}", state.phase().label());

    if let Some(ref user) = state.user {
        println!("User:    {} (id {})", user.username, user.id);
    }
    match session.auth().token_store().expires_in() {
        Some(remaining) => println!("Token:   expires in {}", format_remaining(remaining)),
        None if session.auth().token_store().get_token().is_some() => {
            println!("Token:   unreadable")
        }
        None => println!("Token:   none"),
    }
    Ok(())
}

async fn cmd_verify(session: &SessionContext, discard: bool) -> Result<()> {
    if session.auth().verify_session().await {
        println!("Session accepted by server.");
        return Ok(());
    }

    println!("Session not accepted by server.");
    if discard {
        session.logout();
        println!("Signed out.");
    }
    Ok(())
}

fn cmd_open(session: &SessionContext, path: &str, from: Option<&str>) -> Result<()> {
    match RouteGate::check_with_origin(&session.state(), path, from) {
        GateDecision::Render(view) => println!("{} ({})", view.title(), view.path()),
        GateDecision::Redirect { to, from: Some(origin) } => {
            println!("Redirect to {} (return to {} after login)", to, origin)
        }
        GateDecision::Redirect { to, from: None } => println!("Redirect to {}", to),
    }
    Ok(())
}

async fn cmd_request(
    session: &SessionContext,
    path: &str,
    method: &str,
    data: Option<&str>,
) -> Result<()> {
    let method = method
        .to_uppercase()
        .parse::<Method>()
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let mut options = RequestOptions::new(method);
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("Invalid JSON body")?;
        options = options.json(body);
    }

    let response = match session.auth().authorized_request(path, options).await {
        Ok(response) => response,
        Err(AuthError::SessionExpired) => {
            session.resync();
            bail!("Session expired. Please login again.");
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    println!("{}", status);

    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };
    if !body.is_empty() {
        println!("{}", truncate_string(&body, MAX_PRINTED_BODY));
    }
    Ok(())
}

async fn cmd_watch(
    session: &Arc<SessionContext>,
    interval: std::time::Duration,
    rounds: Option<usize>,
) -> Result<()> {
    if let GateDecision::Redirect { .. } = RouteGate::check(&session.state(), "/temperature") {
        bail!("Not signed in. Run `meteowatch login` first.");
    }

    let listener = session.spawn_event_listener();
    let client = ReadingsClient::new(Arc::clone(session.auth()));
    let (tx, mut rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let poller = Poller::new(client, interval).spawn(tx);
    let mut seen = 0;

    while let Some(update) = rx.recv().await {
        match update {
            PollUpdate::Latest { reading, trend } => {
                let time = reading.time.as_deref().map(format_clock).unwrap_or_default();
                println!(
                    "{} {} {}",
                    time,
                    format_temperature(reading.temperature),
                    trend.symbol()
                );
                seen += 1;
                if rounds.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            PollUpdate::History(history) => {
                let series: Vec<String> = history
                    .points()
                    .map(|(t, temp)| format!("{} {}", format_clock(t), format_temperature(temp)))
                    .collect();
                println!("  history: {}", series.join(", "));
            }
            PollUpdate::SessionExpired => {
                println!("Session expired. Please login again.");
                break;
            }
            PollUpdate::Failed(reason) => println!("  fetch failed: {}", reason),
        }
    }

    poller.stop();
    listener.abort();
    Ok(())
}
