//! CLI administration tool for imangor.
//!
//! Provides commands for managing users and API keys, viewing usage
//! statistics, and performing database checks without going through the
//! HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Create an administrator
//! cargo run --bin imangor-admin -- user create-admin --email admin@example.com
//!
//! # List users
//! cargo run --bin imangor-admin -- user list
//!
//! # Deactivate a user by id or email
//! cargo run --bin imangor-admin -- user deactivate alice@example.com
//!
//! # Create an API key for a user
//! cargo run --bin imangor-admin -- api-key create --user admin@example.com --name ci
//!
//! # List and revoke a user's API keys
//! cargo run --bin imangor-admin -- api-key list --user admin@example.com
//! cargo run --bin imangor-admin -- api-key revoke 3
//!
//! # View statistics
//! cargo run --bin imangor-admin -- stats
//!
//! # Check database connection
//! cargo run --bin imangor-admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! The same as the server (`DATABASE_URL`, `JWT_SECRET`, `API_KEY_SECRET`, ...).
//! The in-process store is rejected since it would not outlive the command.

use imangor::application::tasks::AppTaskHandler;
use imangor::application::services::{Registration, UserService};
use imangor::config::{self, Config};
use imangor::domain::crud::PageRequest;
use imangor::domain::entities::{Role, User, UserFilter};
use imangor::error::AppError;
use imangor::infrastructure::cache::MemoryCache;
use imangor::infrastructure::persistence::Repositories;
use imangor::infrastructure::tasks::{MemoryBroker, TaskQueue};
use imangor::server::connect_pool;
use imangor::state::AppState;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input, Password};
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing imangor.
#[derive(Parser)]
#[command(name = "imangor-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage API keys
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },

    /// Show statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// User management subcommands.
#[derive(Subcommand)]
enum UserAction {
    /// Create a user with the admin role
    CreateAdmin {
        #[arg(short, long)]
        email: Option<String>,

        #[arg(short = 'n', long)]
        full_name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List users
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Deactivate a user
    Deactivate {
        /// User id or email
        id_or_email: String,
    },
}

/// API key subcommands.
#[derive(Subcommand)]
enum ApiKeyAction {
    /// Create an API key for a user
    Create {
        /// Owner id or email
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// List a user's API keys
    List {
        /// Owner id or email
        #[arg(short, long)]
        user: String,
    },

    /// Revoke an API key by id
    Revoke {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;

    if config.uses_memory_store() {
        anyhow::bail!("imangor-admin needs a PostgreSQL DATABASE_URL");
    }

    let pool = connect_pool(&config).await?;

    match cli.command {
        Commands::User { action } => handle_user_action(action, &state(&config, &pool)?).await?,
        Commands::ApiKey { action } => {
            handle_api_key_action(action, &state(&config, &pool)?).await?
        }
        Commands::Stats => handle_stats(&state(&config, &pool)?).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Services over PostgreSQL with in-process cache and broker; the CLI never
/// enqueues tasks.
fn state(config: &Config, pool: &PgPool) -> Result<AppState> {
    let state = AppState::new(
        Repositories::postgres(Arc::new(pool.clone())),
        Arc::new(MemoryCache::new(config.cache_ttl_seconds)),
        TaskQueue::new(Arc::new(MemoryBroker::new())),
        config.service_settings()?,
    )?;
    Ok(state)
}

/// Dispatches user management commands.
async fn handle_user_action(action: UserAction, state: &AppState) -> Result<()> {
    match action {
        UserAction::CreateAdmin {
            email,
            full_name,
            yes,
        } => create_admin(&state.user_service, email, full_name, yes).await?,
        UserAction::List { skip, limit } => list_users(&state.user_service, skip, limit).await?,
        UserAction::Deactivate { id_or_email } => {
            deactivate_user(&state.user_service, &id_or_email).await?
        }
    }

    Ok(())
}

/// Creates an administrator with interactive prompts.
///
/// The password is always prompted for so it never lands in shell history.
async fn create_admin(
    users: &UserService,
    email: Option<String>,
    full_name: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "👤 Create Administrator".bright_blue().bold());
    println!();

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };

    let password = Password::new()
        .with_prompt("Password (min 8 characters)")
        .with_confirmation("Repeat password", "Passwords do not match")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.chars().count() >= 8 {
                Ok(())
            } else {
                Err("Password must be at least 8 characters")
            }
        })
        .interact()?;

    println!();
    println!("  Email: {}", email.cyan());
    if let Some(name) = &full_name {
        println!("  Name:  {}", name.cyan());
    }
    println!("  Roles: {}", "user, admin".cyan());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Create this administrator?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let user = users
        .register_with_roles(
            Registration {
                email,
                password,
                full_name,
            },
            vec![Role::User, Role::Admin],
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create administrator: {}", e))?;

    println!();
    println!(
        "{} (id {})",
        "✅ Administrator created".green().bold(),
        user.id.to_string().bright_white()
    );
    println!();

    Ok(())
}

/// Lists users with status indicators.
///
/// # Output Format
///
/// ```text
/// 📋 Users
///
///   ID  Email                          Roles          Created              Status
///   ─────────────────────────────────────────────────────────────────────────────
///   1   admin@example.com              user,admin     2024-01-15 10:30     ACTIVE
/// ```
async fn list_users(users: &UserService, skip: i64, limit: i64) -> Result<()> {
    println!("{}", "📋 Users".bright_blue().bold());
    println!();

    let page = users
        .list(PageRequest::new(skip, limit), UserFilter::default())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

    if page.items.is_empty() {
        println!("{}", "  No users found".yellow());
        println!();
        println!(
            "  Create one with: {} imangor-admin user create-admin",
            "cargo run --bin".bright_cyan()
        );
        return Ok(());
    }

    println!(
        "  {:<5} {:<30} {:<14} {:<20} {:<10}",
        "ID".bright_white().bold(),
        "Email".bright_white().bold(),
        "Roles".bright_white().bold(),
        "Created".bright_white().bold(),
        "Status".bright_white().bold()
    );
    println!("  {}", "─".repeat(85).bright_black());

    for user in &page.items {
        let status = if user.is_active {
            "ACTIVE".green()
        } else {
            "INACTIVE".red()
        };
        let roles = user
            .roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",");

        println!(
            "  {:<5} {:<30} {:<14} {:<20} {}",
            user.id.to_string().bright_black(),
            user.email.cyan(),
            roles,
            user.created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black(),
            status
        );
    }

    println!();
    println!(
        "  Showing {} of {}",
        page.items.len().to_string().bright_white().bold(),
        page.total.to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Resolves a user by numeric id or by email.
async fn find_user(users: &UserService, id_or_email: &str) -> Result<User> {
    let user = match id_or_email.parse::<i64>() {
        Ok(id) => match users.get(id).await {
            Ok(user) => Some(user),
            Err(AppError::NotFound { .. }) => None,
            Err(e) => anyhow::bail!("Database error: {}", e),
        },
        Err(_) => users
            .get_by_email(id_or_email)
            .await
            .map_err(|e| anyhow::anyhow!("Database error: {}", e))?,
    };

    user.context("User not found")
}

/// Deactivates a user after confirmation (default: No).
async fn deactivate_user(users: &UserService, id_or_email: &str) -> Result<()> {
    println!("{}", "🔒 Deactivate User".bright_blue().bold());
    println!();

    let user = find_user(users, id_or_email).await?;

    if !user.is_active {
        println!("{}", "⚠️  This user is already inactive".yellow());
        return Ok(());
    }

    println!("  User: {}", user.email.cyan());
    println!("  ID:   {}", user.id.to_string().bright_black());
    println!();

    let confirmed = Confirm::new()
        .with_prompt("Deactivate this user?")
        .default(false)
        .interact()?;

    if !confirmed {
        println!("{}", "❌ Cancelled".red());
        return Ok(());
    }

    users
        .deactivate(user.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to deactivate user: {}", e))?;

    println!();
    println!("{}", "✅ User deactivated".green().bold());
    println!();

    Ok(())
}

/// Dispatches API key commands.
async fn handle_api_key_action(action: ApiKeyAction, state: &AppState) -> Result<()> {
    match action {
        ApiKeyAction::Create { user, name } => {
            println!("{}", "🔑 Create API Key".bright_blue().bold());
            println!();

            let owner = find_user(&state.user_service, &user).await?;
            let name = match name {
                Some(n) => n,
                None => Input::new()
                    .with_prompt("Key name")
                    .with_initial_text("ci")
                    .interact_text()?,
            };

            let created = state
                .auth_service
                .create_api_key(&owner, name)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create API key: {}", e))?;

            println!("  Owner: {}", owner.email.cyan());
            println!("  Name:  {}", created.key.name.cyan());
            println!("  Key:   {}", created.raw_key.bright_yellow().bold());
            println!();
            println!(
                "{}",
                "⚠️  IMPORTANT: Save this key now! You won't be able to see it again."
                    .red()
                    .bold()
            );
            println!();
            println!("{}", "Example:".bright_white());
            println!(
                "  curl -H \"X-API-Key: {}\" http://localhost:8000/api/v1/users/me",
                created.raw_key.bright_yellow()
            );
            println!();
        }
        ApiKeyAction::List { user } => {
            let owner = find_user(&state.user_service, &user).await?;
            let keys = state
                .auth_service
                .list_api_keys(&owner)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to list API keys: {}", e))?;

            println!("{} {}", "🔑 API keys of".bright_blue().bold(), owner.email.cyan());
            println!();

            if keys.is_empty() {
                println!("{}", "  No API keys".yellow());
                println!();
                return Ok(());
            }

            println!(
                "  {:<5} {:<20} {:<20} {:<20} {:<10}",
                "ID".bright_white().bold(),
                "Name".bright_white().bold(),
                "Created".bright_white().bold(),
                "Last used".bright_white().bold(),
                "Status".bright_white().bold()
            );
            println!("  {}", "─".repeat(80).bright_black());

            for key in &keys {
                let status = if key.is_revoked() {
                    "REVOKED".red()
                } else {
                    "ACTIVE".green()
                };
                let last_used = key
                    .last_used_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());

                println!(
                    "  {:<5} {:<20} {:<20} {:<20} {}",
                    key.id.to_string().bright_black(),
                    key.name.cyan(),
                    key.created_at
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                        .bright_black(),
                    last_used.bright_black(),
                    status
                );
            }
            println!();
        }
        ApiKeyAction::Revoke { id, yes } => {
            println!("{}", "🔒 Revoke API Key".bright_blue().bold());
            println!();

            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Revoke API key {}?", id))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("{}", "❌ Cancelled".red());
                return Ok(());
            }

            let key = state
                .auth_service
                .revoke_api_key_by_id(id)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to revoke API key: {}", e))?;

            println!("  Name:    {}", key.name.cyan());
            println!("  Owner:   {}", key.user_id.to_string().bright_black());
            if let Some(at) = key.revoked_at {
                println!("  Revoked: {}", at.format("%Y-%m-%d %H:%M:%S").to_string().bright_black());
            }
            println!();
            println!("{}", "✅ API key revoked".green().bold());
            println!();
        }
    }

    Ok(())
}

/// Displays user and order counts.
async fn handle_stats(state: &AppState) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let snapshot = AppTaskHandler::new(
        Arc::clone(&state.user_service),
        Arc::clone(&state.order_service),
    )
    .usage_snapshot()
    .await
    .map_err(|e| anyhow::anyhow!("Failed to collect statistics: {}", e))?;

    println!(
        "  Users:            {}",
        snapshot.users_total.to_string().bright_green().bold()
    );
    println!(
        "  Active users:     {}",
        snapshot.users_active.to_string().bright_green().bold()
    );
    println!(
        "  Orders:           {}",
        snapshot.orders.total().to_string().bright_green().bold()
    );
    println!(
        "    pending:        {}",
        snapshot.orders.pending.to_string().bright_white()
    );
    println!(
        "    processed:      {}",
        snapshot.orders.processed.to_string().bright_white()
    );
    println!(
        "    cancelled:      {}",
        snapshot.orders.cancelled.to_string().bright_white()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            let migrations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
                .fetch_one(pool)
                .await
                .unwrap_or(0);

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Migrations: {}", migrations.to_string().bright_white());
            println!();
        }
    }

    Ok(())
}
