use sqlx::Row;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::SqlitePool;

use storefront_rbac::authz::{groups, Actor, PermissionChecker, RbacManager, RbacSeed};
use storefront_rbac::db;
use storefront_rbac::models::user::{UserCreateRequest, UserStatus};
use storefront_rbac::repo::{RbacRepository, SqliteRbacRepository};
use storefront_rbac::services::UserService;

#[derive(Parser, Debug)]
#[command(author, version, about = "storefront RBAC administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Provision permissions, roles and groups (idempotent)
    Bootstrap {
        /// JSON seed file replacing the built-in layout
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Create an active admin account in the super_admins group
    CreateAdmin {
        email: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::Bootstrap { seed } => {
            let repo = migrated_repo().await?;
            let manager = RbacManager::new(repo);
            let report = match seed {
                Some(path) => manager.bootstrap_with(&RbacSeed::from_file(&path)?).await?,
                None => manager.bootstrap().await?,
            };
            println!(
                "Created {} permissions, {} roles, {} groups, {} role grants, {} group roles",
                report.permissions, report.roles, report.groups, report.role_permissions, report.group_roles
            );
        }
        Commands::CreateAdmin { email, password, name } => {
            let repo = migrated_repo().await?;
            RbacManager::new(repo.clone()).bootstrap().await?;

            let group = repo
                .find_group_by_name(groups::SUPER_ADMINS)
                .await?
                .with_context(|| format!("group {} missing after bootstrap", groups::SUPER_ADMINS))?;

            let checker = PermissionChecker::new(repo.clone());
            let user = UserService::new(repo, checker)
                .create(
                    Actor::System,
                    UserCreateRequest {
                        email,
                        password,
                        name,
                        is_admin: true,
                        status: Some(UserStatus::Active),
                        group_id: Some(group.id),
                    },
                )
                .await?;
            println!("Created admin {} ({})", user.email, user.id);
        }
    }

    Ok(())
}

async fn migrated_repo() -> anyhow::Result<Arc<dyn RbacRepository>> {
    let pool = db::init().await?;
    Ok(Arc::new(SqliteRbacRepository::new(pool)))
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y_%m_%d_%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    db::connect(&database_url).await
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if table.is_some() {
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
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
