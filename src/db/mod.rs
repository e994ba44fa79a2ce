use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::authz::roles::{ADMIN, SUPER_ADMIN_GROUP};
use crate::authz::{parse_permissions, KNOWN_PERMISSIONS};
use crate::errors::AppResult;
use crate::models::user::User;
use crate::utils::{normalize_mobile, utc_now};

pub mod activity;
pub mod group_roles;
pub mod otp;
pub mod sessions;
pub mod users;

/// Connect, migrate and seed the permission vocabulary.
pub async fn init() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = connect(&database_url).await?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let seeded = seed_permissions(&pool)
        .await
        .context("failed to seed permission catalog")?;
    if seeded > 0 {
        tracing::info!(seeded, "permission catalog seeded");
    }

    Ok(pool)
}

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

/// Migrations from `./migrations`, falling back to the crate directory.
pub async fn migrator() -> anyhow::Result<Migrator> {
    let local = Path::new("./migrations");
    let path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = path.display().to_string();
    Migrator::new(path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}

/// Insert catalog permissions that are not stored yet. Returns how many were added.
pub async fn seed_permissions(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let now = utc_now();
    let mut tx = pool.begin().await?;
    let mut added = 0;

    for (name, description) in KNOWN_PERMISSIONS {
        added += sqlx::query(
            "INSERT OR IGNORE INTO permissions (name, description, is_active, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(*name)
        .bind(*description)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(added)
}

/// Ensure a user with every catalog permission exists for first-time setup.
///
/// Creates (or reactivates) the super admin group role holding the whole
/// vocabulary and assigns it to the user with the given mobile number.
pub async fn bootstrap_admin(pool: &SqlitePool, mobile: &str, name: &str) -> AppResult<User> {
    let mobile = normalize_mobile(mobile)?;
    seed_permissions(pool).await?;

    let (user, _) = users::get_or_create(pool, &mobile).await?;
    let user = users::update_profile(pool, user.id, Some(name), Some(ADMIN)).await?;

    let everything = parse_permissions(KNOWN_PERMISSIONS.iter().map(|(name, _)| *name));
    let group = match group_roles::find_by_name(pool, SUPER_ADMIN_GROUP).await? {
        Some(existing) => {
            let changes = group_roles::RoleChanges {
                name: None,
                permissions: Some(&everything),
                is_active: Some(true),
            };
            group_roles::update(pool, existing.id, changes).await?
        }
        None => group_roles::create(pool, SUPER_ADMIN_GROUP, &everything).await?,
    };

    group_roles::assign_to_user(pool, user.id, group.id).await?;
    tracing::info!(user_id = %user.id, group = %group.name, "admin bootstrapped");

    Ok(user)
}
