//! CLI entry and dispatch.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sentinel_core::dashboard::{pick_alert, refresh_all, RefreshResult, Snapshot};
use sentinel_core::{ApiError, App, Config, Resolved};
use tracing::{info, warn};

use crate::format;

const PASSWORD_ENV: &str = "SENTINEL_PASSWORD";
const NEW_PASSWORD_ENV: &str = "SENTINEL_NEW_PASSWORD";

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version)]
#[command(about = "Sentinel sensor monitoring client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        /// Defaults to the last username that logged in
        #[arg(short, long)]
        username: Option<String>,

        #[arg(long, env = PASSWORD_ENV, hide = true, hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show the session state and where data comes from
    Status,

    /// Latest sensor readings with the current alert
    Dashboard,

    /// List news items, or open one by heading
    News {
        /// Heading of the item to open; marks it as read
        #[arg(long, value_name = "HEADING")]
        open: Option<String>,
    },

    /// Show the logged-in user's profile
    Profile,

    /// Historical readings for a device
    History {
        /// Device id (defaults to `device_id` from the config file)
        device: Option<String>,

        /// Start of the range, RFC 3339 (default: 30 days ago)
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// End of the range, RFC 3339 (default: now)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },

    /// Refresh the dashboard periodically
    Watch {
        /// Seconds between refreshes (default from config, 30)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,

        /// Stop after this many refreshes
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },

    /// Email password reset instructions
    ForgotPassword { email: String },

    /// Set a new password with the token from the reset email
    ResetPassword {
        token: String,

        #[arg(long = "new-password", env = NEW_PASSWORD_ENV, hide = true, hide_env_values = true)]
        new_password: Option<String>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    if let Commands::Watch {
        interval: Some(secs),
        ..
    } = cli.command
    {
        config.refresh_interval_secs = Some(secs);
    }

    let mut app = App::new(config).await?;
    info!(backend = app.credential_backend(), "Sentinel CLI starting");

    match cli.command {
        Commands::Login { username, password } => login(&mut app, username, password).await,
        Commands::Logout => {
            app.session.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Commands::Status => status(&app).await,
        Commands::Dashboard => {
            app.start().await;
            let snapshot = refresh_all(&app.api).await;
            print_dashboard(&mut app, &snapshot).await;
            Ok(())
        }
        Commands::News { open } => news(&mut app, open).await,
        Commands::Profile => {
            app.start().await;
            let resolved = app.profile().await;
            println!("{}", format::source_line(&resolved));
            println!("{}", format::profile(&resolved.data));
            print_hint(&resolved);
            Ok(())
        }
        Commands::History { device, from, to } => history(&app, device, from, to).await,
        Commands::Watch { count, .. } => watch(&mut app, count).await,
        Commands::ForgotPassword { email } => {
            app.recovery().request_reset(&email).await?;
            println!("If an account exists for {}, reset instructions are on their way.", email.trim());
            Ok(())
        }
        Commands::ResetPassword {
            token,
            new_password,
        } => reset_password(&app, &token, new_password).await,
    }
}

async fn login(app: &mut App, username: Option<String>, password: Option<String>) -> Result<()> {
    let username = match username.or_else(|| app.config.last_username.clone()) {
        Some(username) => username,
        None => prompt_line("Username: ")?,
    };
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if let Err(e) = app.session.login(&username, &password).await {
        bail!(e.user_message());
    }

    let username = username.trim().to_string();
    println!("Logged in as {}.", username);

    app.config.last_username = Some(username);
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to save config");
    }
    Ok(())
}

async fn status(app: &App) -> Result<()> {
    let state = app.start().await;
    println!("Session: {}", state.label());
    println!("Backend: {}", app.api.base_url());
    println!("Credential storage: {}", app.credential_backend());
    Ok(())
}

async fn news(app: &mut App, open: Option<String>) -> Result<()> {
    app.start().await;

    if let Some(heading) = open {
        let item = app
            .open_news(&heading)
            .await
            .ok_or_else(|| anyhow!("No news item titled \"{}\"", heading))?;
        println!("{}", format::news_item(&item));
        return Ok(());
    }

    let resolved = app.news_feed().await;
    println!("{}", format::source_line(&resolved));
    println!("{} unread", app.news.unread().len());
    println!("{}", format::news_list(&resolved.data, &app.news));
    print_hint(&resolved);
    Ok(())
}

async fn history(
    app: &App,
    device: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let device = device
        .or_else(|| app.config.device_id.clone())
        .ok_or_else(|| anyhow!("No device given. Pass a device id or set device_id in the config file."))?;

    app.start().await;
    let resolved = match app.history(&device, from, to).await {
        Ok(resolved) => resolved,
        Err(ApiError::InvalidDateRange) => bail!("--from must be earlier than --to"),
        Err(ApiError::MissingDeviceId) => bail!("Device id must not be blank"),
        Err(e) => return Err(e.into()),
    };

    println!("{}", format::source_line(&resolved));
    println!("{}", format::history(&resolved.data));
    print_hint(&resolved);
    Ok(())
}

async fn watch(app: &mut App, count: Option<usize>) -> Result<()> {
    app.start().await;
    let mut handle = app.start_refresh();
    let mut shown = 0;

    while let Some(result) = handle.next().await {
        match result {
            RefreshResult::Snapshot(snapshot) => {
                print_dashboard(app, &snapshot).await;
                shown += 1;
                if count.is_some_and(|limit| shown >= limit) {
                    break;
                }
                println!();
            }
            RefreshResult::SessionExpired => {
                println!("Session expired. Stopped refreshing.");
                break;
            }
        }
    }

    handle.stop();
    Ok(())
}

async fn reset_password(app: &App, token: &str, new_password: Option<String>) -> Result<()> {
    let (new_password, confirm) = match new_password {
        Some(password) => (password.clone(), password),
        None => (
            rpassword::prompt_password("New password: ").context("Failed to read password")?,
            rpassword::prompt_password("Confirm password: ").context("Failed to read password")?,
        ),
    };

    app.recovery()
        .reset(Some(token), &new_password, &confirm)
        .await?;
    println!("Password updated. You can now log in with your new password.");
    Ok(())
}

async fn print_dashboard(app: &mut App, snapshot: &Snapshot) {
    app.news.sync(&snapshot.news.data).await;

    if let Some(username) = snapshot.profile.data.username.as_deref() {
        println!("Welcome, {}", username);
    }
    println!("{}", format::source_line(&snapshot.sensors));
    println!("{}", format::alert(pick_alert(&snapshot.sensors.data)));
    println!("{}", format::sensors(&snapshot.sensors.data));
    println!("Unread news: {}", app.news.unread().len());
    print_hint(&snapshot.sensors);
}

fn print_hint<T>(resolved: &Resolved<T>) {
    if let Some(hint) = format::session_hint(resolved) {
        println!("{}", hint);
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_history_parses_rfc3339_range() {
        let cli = Cli::try_parse_from([
            "sentinel",
            "history",
            "dev-1",
            "--from",
            "2024-05-01T00:00:00Z",
            "--to",
            "2024-05-02T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::History { device, from, to } => {
                assert_eq!(device.as_deref(), Some("dev-1"));
                assert!(from.unwrap() < to.unwrap());
            }
            _ => panic!("expected history"),
        }
    }

    #[test]
    fn test_history_rejects_bad_timestamp() {
        assert!(Cli::try_parse_from(["sentinel", "history", "--from", "last week"]).is_err());
    }
}
