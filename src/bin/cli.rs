use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use managrr::aggregate::{self, NewEmployee};
use managrr::authz::{Actor, Decision, DefaultPolicy, Operation, OwnershipResolver, PolicyEvaluator, Resource, Role};
use managrr::db::SqliteStore;
use managrr::utils::{hash_password, utc_now};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "managrr operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create an account directly in the database
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// house_owner, contractor or employee
        #[arg(long)]
        role: Role,
        #[arg(long)]
        password: String,
        /// Employing contractor's user id; required for employees
        #[arg(long)]
        contractor: Option<Uuid>,
    },
    /// Print how a user relates to a project and what they may do there
    ExplainAccess {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        project: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CreateUser {
            email,
            name,
            role,
            password,
            contractor,
        } => {
            let id = create_user(&pool, &email, &name, role, &password, contractor).await?;
            println!("Created {role} {email} ({id})");
        }
        Commands::ExplainAccess { user, project } => {
            explain_access(&pool, user, project).await?;
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, otherwise the crate's own folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: HashSet<i64> = if has_table.is_some() {
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
        let description = migration.description.trim();
        let name = if description.is_empty() { "unknown" } else { description };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn create_user(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
    contractor: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let email = email.trim().to_lowercase();
    let password_hash = hash_password(password)?;

    if role == Role::Employee {
        let contractor_id = contractor.context("--contractor is required for employees")?;
        let employee = aggregate::onboard_employee(
            pool,
            NewEmployee {
                contractor_id,
                name,
                email: &email,
                phone: None,
                hourly_rate: 0.0,
                password_hash: &password_hash,
            },
        )
        .await?;
        return Ok(employee.user_id);
    }

    let id = Uuid::new_v4();
    let now = utc_now();
    sqlx::query(
        "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&email)
    .bind(name)
    .bind(&password_hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("failed to create {email}"))?;

    Ok(id)
}

async fn explain_access(pool: &SqlitePool, user_id: Uuid, project_id: Uuid) -> anyhow::Result<()> {
    let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user {user_id}"))?;
    let actor = Actor::new(user_id, role);

    let resolver = OwnershipResolver::new(SqliteStore::new(pool.clone()));
    let facts = resolver.project(&actor, project_id).await?;
    let policy = DefaultPolicy::new();

    println!("user      {user_id} ({role})");
    println!("project   {project_id}");
    println!("relation  {}", facts.relation);
    if let Some(slice) = facts.contractor_slice {
        println!("slice     contractor {slice}");
    }
    println!();

    let resources = [
        ("project", Resource::Project(facts)),
        ("contracts", Resource::ProjectContracts(facts)),
        ("contractors", Resource::ProjectContractors(facts)),
        ("docs", Resource::ProjectDocs(facts)),
        ("expenses", Resource::Expenses(facts)),
        ("payments", Resource::Payments(facts)),
        ("work_logs", Resource::WorkLogs(facts)),
    ];

    print!("{:<12}", "");
    for operation in Operation::ALL {
        print!(" {:<14}", operation.to_string());
    }
    println!();

    for (label, resource) in resources {
        print!("{label:<12}");
        for operation in Operation::ALL {
            let decision = match policy.authorize(&actor, operation, &resource) {
                Decision::Allow => "allow".to_string(),
                Decision::Deny(reason) => format!("deny: {reason}"),
            };
            print!(" {decision:<14}");
        }
        println!();
    }

    Ok(())
}
