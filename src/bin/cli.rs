use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::{Row, SqlitePool};

use staydesk::authz::{normalize_path, parse_permissions, DefaultPolicyEvaluator, GuardDecision, RouteCatalog, RouteGuard};
use staydesk::client::{ApiClient, ClientError};
use staydesk::db;
use staydesk::session::{FileStorage, SessionInfo, SessionStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "staydesk admin tool", long_about = None)]
struct Cli {
    /// Base URL of the staydesk API
    #[arg(long, env = "STAYDESK_API_URL", default_value = "http://localhost:8000", global = true)]
    api_url: String,

    /// Where the login session is persisted
    #[arg(long, env = "STAYDESK_SESSION_FILE", default_value = ".staydesk-session.json", global = true)]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Grant every permission to the user with this mobile number
    BootstrapAdmin {
        mobile: String,
        #[arg(long, default_value = "Administrator")]
        name: String,
    },
    /// Log in with a one-time code sent to the mobile number
    Login {
        mobile: String,
        /// Code to verify; prompted for when omitted
        #[arg(long)]
        otp: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Close the server session and forget local credentials
    Logout,
    /// Show the logged-in user as the server sees them
    Whoami,
    /// Exchange the refresh token for an access token with current permissions
    Refresh,
    /// List the permissions granted to the local session
    Perms,
    /// Check whether the local session may open an admin screen
    Can {
        path: String,
        /// Ask the server instead of deciding locally
        #[arg(long)]
        remote: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            db::migrator().await?.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = db::migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::BootstrapAdmin { mobile, name } => {
            let pool = get_pool().await?;
            db::migrator().await?.run(&pool).await?;
            let user = db::bootstrap_admin(&pool, &mobile, &name).await?;
            println!("{} ({}) now holds every permission", user.mobile, user.id);
        }
        Commands::Login { mobile, otp, name } => {
            let store = open_store(&cli.session_file);
            let client = ApiClient::new(&cli.api_url)?;

            let code = match otp {
                Some(code) => code,
                None => {
                    let sent = client.send_otp(&mobile).await?;
                    if let Some(code) = sent.debug_code {
                        println!("debug code: {code}");
                    }
                    prompt(&format!("OTP ({}s): ", sent.expires_in))?
                }
            };

            let payload = client.verify_otp(&mobile, code.trim(), name.as_deref()).await?;
            let info = store.login(payload).await?;
            println!("logged in as {} ({}), {} permissions", display_name(&info), info.role, info.permissions.len());
        }
        Commands::Logout => {
            let store = open_store(&cli.session_file);
            store.hydrate().await?;
            if let Some(info) = store.snapshot().info() {
                let client = ApiClient::new(&cli.api_url)?.with_token(info.access_token.clone());
                if let Err(err) = client.logout().await {
                    tracing::warn!(error = %err, "server logout failed, clearing local session anyway");
                }
            }
            store.logout().await?;
            println!("logged out");
        }
        Commands::Whoami => {
            let info = require_session(&cli.session_file).await?;
            let client = ApiClient::new(&cli.api_url)?.with_token(info.access_token.clone());
            match client.me().await {
                Ok(me) => println!("{} {} ({}) session {}", me.user.id, me.user.mobile, me.user.user_role, me.session_id),
                Err(ClientError::Unauthorized(message)) => {
                    anyhow::bail!("session rejected by server: {message}")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Refresh => {
            let store = open_store(&cli.session_file);
            store.hydrate().await?;
            let info = store.snapshot().info().cloned().context("not logged in")?;
            let refresh_token = info.refresh_token.clone().context("session has no refresh token")?;

            let client = ApiClient::new(&cli.api_url)?;
            let refreshed = client.refresh(&refresh_token).await?;
            let granted = parse_permissions(&refreshed.permissions).into_iter().collect();
            let info = store.refresh(refreshed.access_token, granted).await?;
            println!("refreshed, {} permissions", info.permissions.len());
        }
        Commands::Perms => {
            let info = require_session(&cli.session_file).await?;
            for permission in info.permissions.sorted() {
                println!("{permission}");
            }
        }
        Commands::Can { path, remote } => {
            let path = normalize_path(&path);
            if remote {
                let info = require_session(&cli.session_file).await?;
                let client = ApiClient::new(&cli.api_url)?.with_token(info.access_token.clone());
                let answer = client.route_access(&path).await?;
                println!("{}", serde_json::to_string_pretty(&answer)?);
                return Ok(());
            }

            let store = open_store(&cli.session_file);
            store.hydrate().await?;

            let catalog = Arc::new(RouteCatalog::admin_pages()?);
            let guard = RouteGuard::new(Arc::new(DefaultPolicyEvaluator::new(catalog)));
            match guard.resolve(&store, &path).await {
                GuardDecision::Allow => println!("allow {path}"),
                GuardDecision::Pending => println!("pending {path}"),
                GuardDecision::Redirect { location, reason } => {
                    println!("deny {path}: {reason:?}, redirect to {location}")
                }
            }
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> SessionStore {
    SessionStore::new(Arc::new(FileStorage::new(path)))
}

async fn require_session(path: &Path) -> anyhow::Result<SessionInfo> {
    let store = open_store(path);
    store.hydrate().await?;
    let state = store.snapshot();
    state.info().cloned().context("not logged in; run `login` first")
}

fn display_name(info: &SessionInfo) -> &str {
    if info.name.is_empty() {
        &info.user_id
    } else {
        &info.name
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    db::connect(&database_url).await
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
